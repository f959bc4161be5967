use async_process::Command;
use async_trait::async_trait;
use futures::{StreamExt, TryStreamExt};
use serde::Deserialize;
use std::{collections::HashMap, sync::Arc, time::Duration};
use tracing::{debug, info};

use super::{ByteStream, StreamHandle, Track, TrackResolver};
use crate::error::{PlayerError, PlayerResult};

/// Información extraída de yt-dlp
#[derive(Debug, Deserialize)]
struct YtDlpInfo {
    id: String,
    title: String,
    duration: Option<f64>,
    /// URL del formato seleccionado con `-f`
    url: Option<String>,
    #[serde(default)]
    http_headers: HashMap<String, String>,
}

/// Cliente para resolver tracks con yt-dlp
pub struct YtDlpResolver {
    binary: String,
    client: reqwest::Client,
}

impl YtDlpResolver {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            client: reqwest::Client::new(),
        }
    }

    /// Normaliza el locator: un id de YouTube suelto se convierte en URL.
    ///
    /// Los ids son lo que se persiste entre reinicios, así que ambos formatos
    /// tienen que resolverse por el mismo camino. Solo se aceptan hosts de
    /// YouTube: el id de otro extractor no se podría volver a resolver.
    pub fn normalize_locator(locator: &str) -> PlayerResult<String> {
        let locator = locator.trim().trim_start_matches('<').trim_end_matches('>');

        if is_video_id(locator) {
            return Ok(format!("https://www.youtube.com/watch?v={locator}"));
        }

        let url = url::Url::parse(locator).map_err(|e| PlayerError::resolution(locator, e))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(PlayerError::resolution(
                locator,
                format!("esquema no soportado: {}", url.scheme()),
            ));
        }
        match url.host_str() {
            Some(host) if is_youtube_host(host) => Ok(url.into()),
            host => Err(PlayerError::resolution(
                locator,
                format!("solo se soporta YouTube, no {}", host.unwrap_or("(sin host)")),
            )),
        }
    }

    async fn dump_json(&self, target: &str) -> PlayerResult<YtDlpInfo> {
        let output = Command::new(&self.binary)
            .args([
                "--no-playlist",
                "--dump-json",
                "--no-warnings",
                "-f",
                "bestaudio/best",
                target,
            ])
            .output()
            .await
            .map_err(|e| PlayerError::resolution(target, format!("error al ejecutar yt-dlp: {e}")))?;

        if !output.status.success() {
            let error = String::from_utf8_lossy(&output.stderr);
            return Err(PlayerError::resolution(target, error.trim()));
        }

        serde_json::from_slice(&output.stdout).map_err(|e| PlayerError::resolution(target, e))
    }
}

#[async_trait]
impl TrackResolver for YtDlpResolver {
    async fn resolve(&self, locator: &str) -> PlayerResult<Track> {
        let target = Self::normalize_locator(locator)?;
        debug!("📊 Obteniendo info de: {}", target);

        let info = self.dump_json(&target).await?;
        let url = info
            .url
            .ok_or_else(|| PlayerError::resolution(&target, "no hay formatos de audio disponibles"))?;

        info!("🎵 Track resuelto: {} ({})", info.title, info.id);

        let stream = HttpStream {
            client: self.client.clone(),
            url,
            headers: info.http_headers,
        };
        let mut track = Track::new(info.id, info.title, Arc::new(stream));
        if let Some(duration) = track_duration(info.duration) {
            track = track.with_duration(duration);
        }

        Ok(track)
    }

    fn source_name(&self) -> &'static str {
        "yt-dlp"
    }
}

/// Stream HTTP del formato de audio elegido por yt-dlp
struct HttpStream {
    client: reqwest::Client,
    url: String,
    headers: HashMap<String, String>,
}

#[async_trait]
impl StreamHandle for HttpStream {
    async fn open(&self) -> PlayerResult<ByteStream> {
        let mut request = self.client.get(&self.url);
        for (name, value) in &self.headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let response = request
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|e| PlayerError::resolution(&self.url, e))?;

        Ok(response.bytes_stream().map_err(std::io::Error::other).boxed())
    }
}

/// Duración reportada por yt-dlp; valores negativos, NaN o enormes se ignoran
fn track_duration(seconds: Option<f64>) -> Option<Duration> {
    seconds.and_then(|s| Duration::try_from_secs_f64(s).ok())
}

fn is_youtube_host(host: &str) -> bool {
    matches!(
        host,
        "youtube.com" | "www.youtube.com" | "m.youtube.com" | "music.youtube.com" | "youtu.be"
    )
}

/// Ids de YouTube: 11 caracteres del alfabeto base64 url-safe
fn is_video_id(candidate: &str) -> bool {
    candidate.len() == 11
        && candidate
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

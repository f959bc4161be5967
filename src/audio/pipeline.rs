//! Download → encode → stream pipeline for a single track.
//!
//! [`Pipeline`] owns the three stages exclusively:
//!
//! 1. a spawned download task copying the track's byte stream into the write
//!    half of an in-memory pipe,
//! 2. the external encoder, fed with the read half ([`PipeSource`]),
//! 3. the external streamer session returned by [`VoiceBinding::stream`].
//!
//! Cancelling the download sink is the only cancellation primitive: it drops
//! the write half, the encoder sees EOF and the upstream HTTP body is dropped
//! with it. Dropping a `Pipeline` cancels the sink as well.

use futures::StreamExt;
use std::time::Duration;
use tokio::io::{AsyncWriteExt, DuplexStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn, Instrument};

use super::voice::{StreamSession, VoiceBinding};
use crate::{error::PlayerResult, sources::Track};

/// Capacidad del pipe entre la descarga y el encoder
pub const PIPE_CAPACITY: usize = 64 * 1024;

/// Extremo de lectura del pipe, consumido por el encoder externo
pub type PipeSource = DuplexStream;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineStatus {
    Running,
    Finished,
    Failed(String),
}

pub struct Pipeline {
    track: Track,
    session: Box<dyn StreamSession>,
    sink: CancellationToken,
}

impl Pipeline {
    /// Arranca la descarga en segundo plano y entrega el pipe al streamer.
    ///
    /// Solo espera al handoff con el streamer; la descarga y el encode
    /// continúan de forma asíncrona.
    pub async fn start(track: Track, binding: &dyn VoiceBinding) -> PlayerResult<Self> {
        let (writer, source) = tokio::io::duplex(PIPE_CAPACITY);
        let sink = CancellationToken::new();

        let span = tracing::debug_span!("download", track = %track.id());
        tokio::spawn(download(track.clone(), writer, sink.clone()).instrument(span));

        match binding.stream(source).await {
            Ok(session) => Ok(Self {
                track,
                session,
                sink,
            }),
            Err(e) => {
                sink.cancel();
                Err(e)
            }
        }
    }

    pub fn track(&self) -> &Track {
        &self.track
    }

    pub async fn poll_status(&self) -> PipelineStatus {
        match self.session.finished().await {
            Ok(false) => PipelineStatus::Running,
            Ok(true) => PipelineStatus::Finished,
            Err(e) => PipelineStatus::Failed(e.to_string()),
        }
    }

    pub fn set_running(&self, running: bool) {
        self.session.set_running(running);
    }

    pub async fn paused(&self) -> bool {
        self.session.paused().await
    }

    pub async fn position(&self) -> Duration {
        self.session.position().await
    }

    /// Cierra el sink de descarga, detiene el streamer y libera el encoder.
    pub fn stop(self) {
        self.sink.cancel();
        self.session.stop();
        debug!("⏹️ Pipeline detenido: {}", self.track.title());
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        self.sink.cancel();
    }
}

/// Stage de descarga: copia el audio al pipe hasta EOF o cancelación.
async fn download(track: Track, mut writer: DuplexStream, sink: CancellationToken) {
    let result = tokio::select! {
        _ = sink.cancelled() => {
            debug!("🛑 Descarga cancelada: {}", track.title());
            return;
        }
        result = pump(&track, &mut writer) => result,
    };

    match result {
        Ok(bytes) => debug!("📥 Descarga completa: {} ({} bytes)", track.title(), bytes),
        // El encoder pudo cerrar su extremo; el streamer lo reporta en el tick.
        Err(e) => warn!("⚠️ Descarga interrumpida para {}: {}", track.title(), e),
    }

    let _ = writer.shutdown().await;
}

async fn pump(track: &Track, writer: &mut DuplexStream) -> PlayerResult<u64> {
    let mut stream = track.stream().open().await?;
    let mut total = 0u64;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        writer.write_all(&chunk).await?;
        total += chunk.len() as u64;
    }

    Ok(total)
}

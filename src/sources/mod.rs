//! # Sources Module
//!
//! Track resolution for the player core.
//!
//! A [`TrackResolver`] turns a user supplied locator (URL or video id) into a
//! [`Track`]: display metadata plus an opaque [`StreamHandle`] that the
//! download stage of the playback pipeline pulls raw bytes from.
//!
//! ## Implementations
//!
//! - [`ytdlp::YtDlpResolver`] - metadata via `yt-dlp --dump-json`, audio bytes
//!   streamed over HTTP with `reqwest`
//!
//! The resolver runs on the caller's task, never inside a player actor, so a
//! slow lookup only delays the command that triggered it.

pub mod ytdlp;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use std::{fmt, sync::Arc, time::Duration};

use crate::error::PlayerResult;

pub use ytdlp::YtDlpResolver;

/// Flujo de bytes crudos de audio tal como llegan de la fuente.
pub type ByteStream = BoxStream<'static, std::io::Result<Bytes>>;

/// Trait común para todas las fuentes de música
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TrackResolver: Send + Sync {
    /// Resuelve un locator (URL o id) a un track reproducible
    async fn resolve(&self, locator: &str) -> PlayerResult<Track>;

    /// Nombre de la fuente
    fn source_name(&self) -> &'static str;
}

/// Handle opaco al audio de un track.
///
/// Cada llamada a [`StreamHandle::open`] abre una conexión nueva; el stage de
/// descarga la consume hasta el final o hasta que se cancele.
#[async_trait]
pub trait StreamHandle: Send + Sync {
    async fn open(&self) -> PlayerResult<ByteStream>;
}

/// Representa un track de música ya resuelto.
///
/// Inmutable una vez creado: la cola lo posee y solo se clona el handle.
#[derive(Clone)]
pub struct Track {
    id: String,
    title: String,
    duration: Option<Duration>,
    stream: Arc<dyn StreamHandle>,
}

impl Track {
    pub fn new(id: impl Into<String>, title: impl Into<String>, stream: Arc<dyn StreamHandle>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            duration: None,
            stream,
        }
    }

    // Getters
    pub fn id(&self) -> &str {
        &self.id
    }
    pub fn title(&self) -> &str {
        &self.title
    }
    pub fn duration(&self) -> Option<Duration> {
        self.duration
    }
    pub fn stream(&self) -> Arc<dyn StreamHandle> {
        self.stream.clone()
    }

    // Setters
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }
}

impl fmt::Debug for Track {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Track")
            .field("id", &self.id)
            .field("title", &self.title)
            .field("duration", &self.duration)
            .finish_non_exhaustive()
    }
}

impl PartialEq for Track {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.title == other.title && self.duration == other.duration
    }
}

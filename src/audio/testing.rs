//! Fakes de transporte, conexión y streamer para los tests del núcleo.

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use parking_lot::Mutex;
use serenity::model::id::{ChannelId, GuildId};
use std::{
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use super::{
    pipeline::PipeSource,
    player::PlayerSettings,
    registry::PlayerRegistry,
    voice::{StreamSession, VoiceBinding, VoiceTransport},
};
use crate::{
    error::{PlayerError, PlayerResult},
    sources::{ByteStream, StreamHandle, Track},
};

pub fn guild() -> GuildId {
    GuildId::new(1)
}

pub fn channel() -> ChannelId {
    ChannelId::new(10)
}

/// Stream que entrega `audio:<id>` y termina
pub struct StaticStream(pub String);

#[async_trait]
impl StreamHandle for StaticStream {
    async fn open(&self) -> PlayerResult<ByteStream> {
        let chunk = Bytes::from(format!("audio:{}", self.0));
        Ok(futures::stream::iter(vec![Ok(chunk)]).boxed())
    }
}

/// Stream que nunca produce datos
pub struct PendingStream;

#[async_trait]
impl StreamHandle for PendingStream {
    async fn open(&self) -> PlayerResult<ByteStream> {
        Ok(futures::stream::pending().boxed())
    }
}

pub fn track(id: &str) -> Track {
    Track::new(id, format!("Track {id}"), Arc::new(StaticStream(id.to_string())))
        .with_duration(Duration::from_secs(180))
}

pub fn ids(tracks: &[Track]) -> Vec<String> {
    tracks.iter().map(|t| t.id().to_string()).collect()
}

pub fn settings(max_queue_size: usize) -> PlayerSettings {
    PlayerSettings {
        max_queue_size,
        ..PlayerSettings::default()
    }
}

pub fn registry(max_queue_size: usize) -> (PlayerRegistry, Arc<FakeTransport>) {
    let transport = FakeTransport::new();
    let registry = PlayerRegistry::new(transport.clone(), settings(max_queue_size));
    (registry, transport)
}

#[derive(Default)]
pub struct FakeTransport {
    joins: AtomicUsize,
    fail: AtomicBool,
    bindings: Mutex<Vec<Arc<FakeBinding>>>,
}

impl FakeTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn join_count(&self) -> usize {
        self.joins.load(Ordering::SeqCst)
    }

    pub fn binding(&self, index: usize) -> Arc<FakeBinding> {
        self.bindings.lock()[index].clone()
    }
}

#[async_trait]
impl VoiceTransport for FakeTransport {
    async fn join(&self, guild_id: GuildId, channel_id: ChannelId) -> PlayerResult<Arc<dyn VoiceBinding>> {
        // Simula la latencia del handshake de voz
        tokio::task::yield_now().await;

        if self.fail.load(Ordering::SeqCst) {
            return Err(PlayerError::Join {
                guild_id,
                reason: "canal lleno".into(),
            });
        }

        self.joins.fetch_add(1, Ordering::SeqCst);
        let binding = FakeBinding::new(channel_id);
        self.bindings.lock().push(binding.clone());
        Ok(binding)
    }
}

pub struct FakeBinding {
    channel_id: ChannelId,
    disconnects: AtomicUsize,
    fail_stream: AtomicBool,
    sessions: Mutex<Vec<Arc<FakeSession>>>,
    /// Lado de lectura que recibió un `stream` fallido
    rejected: Mutex<Option<PipeSource>>,
}

impl FakeBinding {
    pub fn new(channel_id: ChannelId) -> Arc<Self> {
        Arc::new(Self {
            channel_id,
            disconnects: AtomicUsize::new(0),
            fail_stream: AtomicBool::new(false),
            sessions: Mutex::new(Vec::new()),
            rejected: Mutex::new(None),
        })
    }

    pub fn fail_next_stream(&self) {
        self.fail_stream.store(true, Ordering::SeqCst);
    }

    pub fn disconnect_count(&self) -> usize {
        self.disconnects.load(Ordering::SeqCst)
    }

    pub fn session_count(&self) -> usize {
        self.sessions.lock().len()
    }

    pub fn session(&self, index: usize) -> Arc<FakeSession> {
        self.sessions.lock()[index].clone()
    }

    pub fn take_rejected_source(&self) -> Option<PipeSource> {
        self.rejected.lock().take()
    }
}

#[async_trait]
impl VoiceBinding for FakeBinding {
    fn channel_id(&self) -> Option<ChannelId> {
        Some(self.channel_id)
    }

    async fn stream(&self, source: PipeSource) -> PlayerResult<Box<dyn StreamSession>> {
        if self.fail_stream.swap(false, Ordering::SeqCst) {
            *self.rejected.lock() = Some(source);
            return Err(PlayerError::Stream("encoder no disponible".into()));
        }

        let session = Arc::new(FakeSession::new(source));
        self.sessions.lock().push(session.clone());
        Ok(Box::new(SharedSession(session)))
    }

    async fn disconnect(&self) -> PlayerResult<()> {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Default)]
struct SessionState {
    running: bool,
    stopped: bool,
    outcome: Option<Result<(), String>>,
    position: Duration,
}

pub struct FakeSession {
    state: Mutex<SessionState>,
    source: Mutex<Option<PipeSource>>,
}

impl FakeSession {
    fn new(source: PipeSource) -> Self {
        Self {
            state: Mutex::new(SessionState {
                running: true,
                ..SessionState::default()
            }),
            source: Mutex::new(Some(source)),
        }
    }

    pub fn take_source(&self) -> Option<PipeSource> {
        self.source.lock().take()
    }

    pub fn finish(&self) {
        self.state.lock().outcome = Some(Ok(()));
    }

    pub fn fail(&self, reason: &str) {
        self.state.lock().outcome = Some(Err(reason.to_string()));
    }

    pub fn set_position(&self, position: Duration) {
        self.state.lock().position = position;
    }

    pub fn is_running(&self) -> bool {
        self.state.lock().running
    }

    pub fn is_stopped(&self) -> bool {
        self.state.lock().stopped
    }
}

struct SharedSession(Arc<FakeSession>);

#[async_trait]
impl StreamSession for SharedSession {
    async fn finished(&self) -> PlayerResult<bool> {
        match &self.0.state.lock().outcome {
            None => Ok(false),
            Some(Ok(())) => Ok(true),
            Some(Err(reason)) => Err(PlayerError::Stream(reason.clone())),
        }
    }

    fn set_running(&self, running: bool) {
        self.0.state.lock().running = running;
    }

    async fn paused(&self) -> bool {
        !self.0.state.lock().running
    }

    async fn position(&self) -> Duration {
        self.0.state.lock().position
    }

    fn stop(&self) {
        let mut state = self.0.state.lock();
        state.running = false;
        state.stopped = true;
    }
}

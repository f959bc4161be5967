//! Voice transport backed by songbird.
//!
//! songbird owns the encoder and the streamer: the read half of the pipe is
//! wrapped as a live input and decoded by symphonia inside the driver.

use async_trait::async_trait;
use serenity::model::id::{ChannelId, GuildId};
use songbird::{
    driver::Bitrate,
    error::ControlError,
    input::{AsyncAdapterStream, AsyncMediaSource, AudioStream, Input, LiveInput},
    tracks::{PlayMode, TrackHandle},
    Call, Songbird,
};
use std::{
    io::{self, SeekFrom},
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
    time::Duration,
};
use symphonia::core::io::MediaSource;
use tokio::{
    io::{AsyncRead, AsyncSeek, ReadBuf},
    sync::Mutex,
};
use tracing::{debug, info, warn};

use super::{
    pipeline::{PipeSource, PIPE_CAPACITY},
    voice::{StreamSession, VoiceBinding, VoiceTransport},
};
use crate::error::{PlayerError, PlayerResult};

pub struct SongbirdTransport {
    manager: Arc<Songbird>,
    bitrate: i32,
}

impl SongbirdTransport {
    pub fn new(manager: Arc<Songbird>, bitrate: u32) -> Self {
        Self {
            manager,
            bitrate: i32::try_from(bitrate).unwrap_or(i32::MAX),
        }
    }
}

#[async_trait]
impl VoiceTransport for SongbirdTransport {
    async fn join(&self, guild_id: GuildId, channel_id: ChannelId) -> PlayerResult<Arc<dyn VoiceBinding>> {
        let call = self
            .manager
            .join(guild_id, channel_id)
            .await
            .map_err(|e| PlayerError::Join {
                guild_id,
                reason: format!("{:?}", e),
            })?;

        {
            let mut handler = call.lock().await;
            handler.set_bitrate(Bitrate::BitsPerSecond(self.bitrate));
        }

        info!("🔊 Conectado al canal de voz {} en guild {}", channel_id, guild_id);
        Ok(Arc::new(SongbirdBinding {
            manager: self.manager.clone(),
            guild_id,
            channel_id,
            call,
        }))
    }
}

struct SongbirdBinding {
    manager: Arc<Songbird>,
    guild_id: GuildId,
    channel_id: ChannelId,
    call: Arc<Mutex<Call>>,
}

#[async_trait]
impl VoiceBinding for SongbirdBinding {
    fn channel_id(&self) -> Option<ChannelId> {
        Some(self.channel_id)
    }

    async fn stream(&self, source: PipeSource) -> PlayerResult<Box<dyn StreamSession>> {
        let media: Box<dyn AsyncMediaSource> = Box::new(PipeMedia(source));
        let input = Input::Live(
            LiveInput::Raw(AudioStream {
                input: Box::new(AsyncAdapterStream::new(media, PIPE_CAPACITY)) as Box<dyn MediaSource>,
                hint: None,
            }),
            None,
        );

        let handle = self.call.lock().await.play_only_input(input);
        debug!("🎚️ Streamer iniciado en guild {}", self.guild_id);
        Ok(Box::new(SongbirdSession { handle }))
    }

    async fn disconnect(&self) -> PlayerResult<()> {
        self.manager
            .remove(self.guild_id)
            .await
            .map_err(|e| PlayerError::Voice {
                guild_id: self.guild_id,
                reason: format!("{:?}", e),
            })?;

        info!("👋 Desconectado del canal de voz en guild {}", self.guild_id);
        Ok(())
    }
}

struct SongbirdSession {
    handle: TrackHandle,
}

#[async_trait]
impl StreamSession for SongbirdSession {
    async fn finished(&self) -> PlayerResult<bool> {
        match self.handle.get_info().await {
            Ok(state) => match state.playing {
                PlayMode::End | PlayMode::Stop => Ok(true),
                PlayMode::Errored(e) => Err(PlayerError::Stream(format!("{:?}", e))),
                _ => Ok(false),
            },
            // El driver ya soltó el track
            Err(ControlError::Finished) => Ok(true),
            Err(e) => Err(PlayerError::Stream(format!("{:?}", e))),
        }
    }

    fn set_running(&self, running: bool) {
        let result = if running { self.handle.play() } else { self.handle.pause() };
        if let Err(e) = result {
            warn!("No se pudo cambiar el estado del track: {:?}", e);
        }
    }

    async fn paused(&self) -> bool {
        match self.handle.get_info().await {
            Ok(state) => !matches!(state.playing, PlayMode::Play),
            Err(_) => true,
        }
    }

    async fn position(&self) -> Duration {
        self.handle
            .get_info()
            .await
            .map(|state| state.position)
            .unwrap_or_default()
    }

    fn stop(&self) {
        // Falla solo si el track ya terminó
        let _ = self.handle.stop();
    }
}

/// Extremo de lectura del pipe expuesto como fuente no seekable
struct PipeMedia(PipeSource);

impl AsyncRead for PipeMedia {
    fn poll_read(mut self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.0).poll_read(cx, buf)
    }
}

impl AsyncSeek for PipeMedia {
    fn start_seek(self: Pin<&mut Self>, _position: SeekFrom) -> io::Result<()> {
        Err(io::ErrorKind::Unsupported.into())
    }

    fn poll_complete(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<u64>> {
        Poll::Ready(Err(io::ErrorKind::Unsupported.into()))
    }
}

#[async_trait]
impl AsyncMediaSource for PipeMedia {
    fn is_seekable(&self) -> bool {
        false
    }

    async fn byte_len(&self) -> Option<u64> {
        None
    }
}

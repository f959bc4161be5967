//! Seams to the external voice transport and encoder/streamer.
//!
//! The player core only talks to these traits. The production
//! implementation lives in [`super::discord`] (songbird); tests use fakes.

use async_trait::async_trait;
use serenity::model::id::{ChannelId, GuildId};
use std::{sync::Arc, time::Duration};

use super::pipeline::PipeSource;
use crate::error::PlayerResult;

/// Cliente de transporte de voz: abre una conexión por guild.
#[async_trait]
pub trait VoiceTransport: Send + Sync {
    async fn join(&self, guild_id: GuildId, channel_id: ChannelId) -> PlayerResult<Arc<dyn VoiceBinding>>;
}

/// Conexión de voz activa en un guild.
#[async_trait]
pub trait VoiceBinding: Send + Sync {
    /// Canal al que está unida la conexión, si se conoce
    fn channel_id(&self) -> Option<ChannelId>;

    /// Espera a que la conexión esté lista para transmitir
    async fn ready(&self) {}

    /// Entrega el extremo de lectura del pipe al encoder/streamer externo
    async fn stream(&self, source: PipeSource) -> PlayerResult<Box<dyn StreamSession>>;

    async fn disconnect(&self) -> PlayerResult<()>;
}

/// Sesión de encode + streaming de un único track.
#[async_trait]
pub trait StreamSession: Send + Sync {
    /// `Ok(true)` cuando terminó limpio, `Err` cuando terminó con error.
    async fn finished(&self) -> PlayerResult<bool>;

    fn set_running(&self, running: bool);

    async fn paused(&self) -> bool;

    async fn position(&self) -> Duration;

    /// Detiene el streamer y libera el encoder. Idempotente.
    fn stop(&self);
}

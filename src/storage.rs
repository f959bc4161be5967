use serde::{Deserialize, Serialize};
use serenity::model::id::{ChannelId, GuildId};
use std::{
    io::ErrorKind,
    num::NonZeroU64,
    path::{Path, PathBuf},
};
use tokio::fs;
use tracing::{info, warn};

use crate::{
    audio::{player::PlayerStatus, registry::PlayerRegistry},
    error::PlayerResult,
    sources::TrackResolver,
};

/// Proyección durable de un player persistente.
///
/// Solo se guardan los ids de los tracks y el modo aleatorio; el track en
/// curso y la posición se pierden entre reinicios.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedState {
    pub guild_id: String,
    pub channel_id: String,
    pub queue: Vec<String>,
    pub shuffle: bool,
}

impl SavedState {
    /// `None` para players sin persist, con la cola vacía o sin canal conocido
    pub fn from_status(guild_id: GuildId, status: &PlayerStatus) -> Option<Self> {
        if !status.persist || status.queue.is_empty() {
            return None;
        }
        let channel_id = status.channel_id?;

        Some(Self {
            guild_id: guild_id.to_string(),
            channel_id: channel_id.to_string(),
            queue: status.queue.iter().map(|t| t.id().to_string()).collect(),
            shuffle: status.shuffle,
        })
    }

    fn ids(&self) -> Option<(GuildId, ChannelId)> {
        let guild = self.guild_id.parse().ok().and_then(NonZeroU64::new)?;
        let channel = self.channel_id.parse().ok().and_then(NonZeroU64::new)?;
        Some((GuildId::from(guild), ChannelId::from(channel)))
    }
}

/// Resultado de una restauración, para el log de arranque
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RestoreReport {
    pub players_restored: usize,
    pub players_failed: usize,
    pub tracks_restored: usize,
    pub tracks_failed: usize,
}

/// Almacenamiento del estado de los players en un único archivo JSON
pub struct PlayerStorage {
    path: PathBuf,
}

impl PlayerStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Lee el archivo de estado. Que no exista no es un error.
    pub async fn load(&self) -> PlayerResult<Vec<SavedState>> {
        match fs::read(&self.path).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!("📁 Sin estado guardado en {}", self.path.display());
                Ok(Vec::new())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Escribe el conjunto completo de una vez (archivo temporal + rename)
    pub async fn save(&self, states: &[SavedState]) -> PlayerResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }

        let json = serde_json::to_vec_pretty(states)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json).await?;
        fs::rename(&tmp, &self.path).await?;

        info!("💾 Estado de {} players guardado en {}", states.len(), self.path.display());
        Ok(())
    }

    /// Guarda los players persistentes. Con el conjunto vacío no escribe nada.
    pub async fn snapshot(&self, registry: &PlayerRegistry) -> PlayerResult<usize> {
        let mut states = Vec::new();

        for player in registry.players() {
            match player.status().await {
                Ok(status) => states.extend(SavedState::from_status(player.guild_id(), &status)),
                Err(e) => warn!("⚠️ Omitiendo player de guild {}: {}", player.guild_id(), e),
            }
        }

        if states.is_empty() {
            info!("📭 Ningún player persistente, no se guarda estado");
            return Ok(0);
        }

        self.save(&states).await?;
        Ok(states.len())
    }

    /// Recrea los players guardados y vuelve a encolar sus tracks.
    ///
    /// Los fallos individuales (join, resolución) se registran y se cuentan
    /// en el reporte sin abortar el resto.
    pub async fn restore(&self, registry: &PlayerRegistry, resolver: &dyn TrackResolver) -> PlayerResult<RestoreReport> {
        let states = self.load().await?;
        let mut report = RestoreReport::default();

        for state in states {
            let Some((guild_id, channel_id)) = state.ids() else {
                warn!("⚠️ Ids inválidos en estado guardado: {} / {}", state.guild_id, state.channel_id);
                report.players_failed += 1;
                continue;
            };

            if registry.get(guild_id).is_some_and(|p| p.is_running()) {
                info!("⏭️ Guild {} ya tiene un player activo, omitiendo", guild_id);
                continue;
            }

            let player = match registry.get_or_create(guild_id, channel_id).await {
                Ok(player) => player,
                Err(e) => {
                    warn!("❌ No se pudo restaurar guild {}: {}", guild_id, e);
                    report.players_failed += 1;
                    continue;
                }
            };

            let modes = async {
                player.set_shuffle(state.shuffle).await?;
                player.set_persist(true).await
            };
            if let Err(e) = modes.await {
                warn!("❌ Player de guild {} no disponible: {}", guild_id, e);
                report.players_failed += 1;
                continue;
            }

            for id in &state.queue {
                match player.queue_up(resolver, id).await {
                    Ok(_) => report.tracks_restored += 1,
                    Err(e) => {
                        warn!("⚠️ Track {} omitido: {}", id, e);
                        report.tracks_failed += 1;
                    }
                }
            }

            report.players_restored += 1;
        }

        info!(
            "🔄 Restauración completa: {} players ({} fallidos), {} tracks ({} fallidos)",
            report.players_restored, report.players_failed, report.tracks_restored, report.tracks_failed
        );
        Ok(report)
    }
}

use dashmap::DashMap;
use parking_lot::Mutex;
use serenity::model::id::{ChannelId, GuildId};
use std::{
    collections::HashMap,
    sync::{Arc, Weak},
};
use tracing::{debug, info};

use super::{
    player::{Player, PlayerSettings},
    voice::VoiceTransport,
};
use crate::error::PlayerResult;

/// Registro de players del proceso: como mucho un player por guild.
///
/// El lock del mapa solo protege chequeos e inserciones cortas. La creación
/// de cada guild se serializa con su propio gate asíncrono, así que el join
/// de voz nunca ocurre con el mapa bloqueado y dos joins concurrentes al
/// mismo guild no pueden ganar ambos.
#[derive(Clone)]
pub struct PlayerRegistry {
    inner: Arc<RegistryInner>,
}

struct RegistryInner {
    transport: Arc<dyn VoiceTransport>,
    settings: PlayerSettings,
    players: Mutex<HashMap<GuildId, Player>>,
    gates: DashMap<GuildId, Arc<tokio::sync::Mutex<()>>>,
}

/// Referencia débil que cada actor guarda para darse de baja.
pub(super) struct RegistryLink(Weak<RegistryInner>);

impl RegistryLink {
    /// Quita la entrada solo si sigue perteneciendo al mismo player
    pub(super) fn remove(&self, guild_id: GuildId, player_id: u64) {
        if let Some(inner) = self.0.upgrade() {
            let mut players = inner.players.lock();
            if players.get(&guild_id).is_some_and(|p| p.id() == player_id) {
                players.remove(&guild_id);
                debug!("🗑️ Player {} eliminado del registro", player_id);
            }
        }
    }
}

impl PlayerRegistry {
    pub fn new(transport: Arc<dyn VoiceTransport>, settings: PlayerSettings) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                transport,
                settings,
                players: Mutex::new(HashMap::new()),
                gates: DashMap::new(),
            }),
        }
    }

    pub fn get(&self, guild_id: GuildId) -> Option<Player> {
        self.inner.players.lock().get(&guild_id).cloned()
    }

    /// Copia de todas las entradas, para procesarlas fuera del lock
    pub fn players(&self) -> Vec<Player> {
        self.inner.players.lock().values().cloned().collect()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.inner.players.lock().len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.inner.players.lock().is_empty()
    }

    /// Devuelve el player del guild o se une al canal y crea uno nuevo.
    ///
    /// Una entrada existente se devuelve tal cual, sin un segundo join. Si el
    /// join falla no queda ninguna entrada registrada.
    pub async fn get_or_create(&self, guild_id: GuildId, channel_id: ChannelId) -> PlayerResult<Player> {
        if let Some(player) = self.get(guild_id) {
            return Ok(player);
        }

        let gate = self.inner.gates.entry(guild_id).or_default().clone();
        let _creating = gate.lock().await;

        // Otro llamador pudo terminar la creación mientras esperábamos
        if let Some(player) = self.get(guild_id) {
            return Ok(player);
        }

        info!("🔗 Conectando al canal de voz {} en guild {}", channel_id, guild_id);
        let binding = self.inner.transport.join(guild_id, channel_id).await?;

        let player = Player::spawn(
            guild_id,
            binding,
            self.inner.settings.clone(),
            RegistryLink(Arc::downgrade(&self.inner)),
        );
        self.inner.players.lock().insert(guild_id, player.clone());

        info!("✅ Player creado para guild {}", guild_id);
        Ok(player)
    }

    /// Mata todos los players registrados y espera a que sus loops terminen
    pub async fn shutdown(&self) {
        let players = self.players();
        info!("🛑 Deteniendo {} players...", players.len());

        for player in &players {
            player.kill();
        }
        for player in &players {
            player.closed().await;
        }

        // Entradas de players que ya habían muerto por error de pipeline
        self.inner.players.lock().clear();
        info!("✅ Todos los players detenidos");
    }
}

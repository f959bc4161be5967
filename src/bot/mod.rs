//! # Bot Module
//!
//! Discord front end of the jukebox.
//!
//! [`JukeboxBot`] implements Serenity's [`EventHandler`] and translates
//! gateway events into registry and player operations:
//!
//! - `ready`: restores persisted players once per process
//! - `message`: prefix commands, parsed by [`commands::Command::parse`]
//! - `voice_state_update`: kills the guild's player when the bot is
//!   disconnected from voice

use serenity::{
    all::{Context, EventHandler, Message, Ready, VoiceState},
    async_trait,
};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use tracing::{debug, error, info};

pub mod commands;
pub mod handlers;

use self::commands::{Command, CommandError};
use crate::{
    audio::registry::PlayerRegistry, config::Config, sources::TrackResolver, storage::PlayerStorage, ui::embeds,
};

/// Handler principal de eventos de Discord.
pub struct JukeboxBot {
    config: Arc<Config>,
    registry: PlayerRegistry,
    resolver: Arc<dyn TrackResolver>,
    storage: Arc<PlayerStorage>,
    /// El `ready` se repite en cada reconexión; la restauración solo una vez
    restored: AtomicBool,
}

impl JukeboxBot {
    pub fn new(
        config: Arc<Config>,
        registry: PlayerRegistry,
        resolver: Arc<dyn TrackResolver>,
        storage: Arc<PlayerStorage>,
    ) -> Self {
        Self {
            config,
            registry,
            resolver,
            storage,
            restored: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl EventHandler for JukeboxBot {
    async fn ready(&self, _ctx: Context, ready: Ready) {
        info!("🤖 {} está en línea!", ready.user.name);
        info!("📊 Conectado a {} servidores", ready.guilds.len());

        if self.restored.swap(true, Ordering::SeqCst) {
            return;
        }

        // La resolución de cada track puede tardar; no bloquea el handler
        let registry = self.registry.clone();
        let resolver = self.resolver.clone();
        let storage = self.storage.clone();
        tokio::spawn(async move {
            if let Err(e) = storage.restore(&registry, resolver.as_ref()).await {
                error!("Error al cargar players desde {}: {}", storage.path().display(), e);
            }
        });
    }

    async fn message(&self, ctx: Context, msg: Message) {
        if msg.author.bot {
            return;
        }

        let command = match Command::parse(&msg.content, &self.config.command_prefix) {
            None => return,
            Some(Ok(command)) => command,
            Some(Err(CommandError::Unknown(name))) => {
                debug!("Comando ignorado: {}", name);
                return;
            }
            Some(Err(e)) => {
                let embed = embeds::create_error_embed("Comando inválido", &e.to_string());
                if let Err(e) = handlers::reply(&ctx, &msg, embed).await {
                    error!("Error al responder: {:?}", e);
                }
                return;
            }
        };

        if let Err(e) = handlers::handle_command(&ctx, &msg, command, self).await {
            error!("Error manejando comando: {:?}", e);
            let embed = embeds::create_error_embed("Error", &e.to_string());
            if let Err(e) = handlers::reply(&ctx, &msg, embed).await {
                error!("Error al responder: {:?}", e);
            }
        }
    }

    /// Si el bot sale del canal de voz (kick o desconexión manual) el player
    /// de ese guild se elimina.
    async fn voice_state_update(&self, ctx: Context, old: Option<VoiceState>, new: VoiceState) {
        let current_user_id = ctx.cache.current_user().id;
        if new.user_id != current_user_id || old.is_none() || new.channel_id.is_some() {
            return;
        }

        if let Some(guild_id) = new.guild_id {
            info!("🔌 Bot desconectado en guild {}", guild_id);
            if let Some(player) = self.registry.get(guild_id) {
                player.kill();
            }
        }
    }
}

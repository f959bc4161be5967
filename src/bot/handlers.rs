use anyhow::Result;
use serenity::{
    builder::{CreateEmbed, CreateMessage},
    model::{
        channel::Message,
        id::{ChannelId, GuildId, UserId},
    },
    prelude::Context,
};
use tracing::info;

use super::{commands::Command, JukeboxBot};
use crate::{
    audio::player::PlayerEvent,
    ui::embeds,
};

/// Ejecuta un comando ya interpretado
pub async fn handle_command(ctx: &Context, msg: &Message, command: Command, bot: &JukeboxBot) -> Result<()> {
    if command == Command::Help {
        return reply(ctx, msg, embeds::create_help_embed(bot.config.command_prefix.as_str())).await;
    }

    let Some(guild_id) = msg.guild_id else {
        return Ok(());
    };

    info!("📝 Comando {:?} usado por {} en guild {}", command, msg.author.name, guild_id);

    let Some(channel_id) = get_user_voice_channel(ctx, guild_id, msg.author.id) else {
        return reply(
            ctx,
            msg,
            embeds::create_error_embed("Sin canal de voz", "Debes estar en un canal de voz"),
        )
        .await;
    };

    if command == Command::Join {
        bot.registry.get_or_create(guild_id, channel_id).await?;
        return reply(
            ctx,
            msg,
            embeds::create_success_embed("Conectado", &format!("Uniéndome a <#{}>", channel_id)),
        )
        .await;
    }

    // El resto de comandos necesita un player en el guild
    let Some(player) = bot.registry.get(guild_id) else {
        let prefix = &bot.config.command_prefix;
        return reply(
            ctx,
            msg,
            embeds::create_error_embed("Sin player", &format!("Usa `{prefix}join` primero")),
        )
        .await;
    };

    let embed = match command {
        Command::Help | Command::Join => return Ok(()),
        Command::Kill => {
            player.kill();
            embeds::create_success_embed("Player eliminado", "👋 Hasta la próxima")
        }
        Command::Resume => {
            player.send(PlayerEvent::Resume)?;
            embeds::create_success_embed("Reanudado", "▶️ Reproducción reanudada")
        }
        Command::Pause => {
            player.send(PlayerEvent::Pause)?;
            embeds::create_success_embed("Pausado", "⏸️ Reproducción pausada")
        }
        Command::Add(locator) => {
            let track = player.queue_up(bot.resolver.as_ref(), &locator).await?;
            embeds::create_success_embed("Agregado a la cola", &format!("**{}**", track.title()))
        }
        Command::Next => {
            player.send(PlayerEvent::Next { index: None, random: false })?;
            embeds::create_success_embed("Siguiente", "⏭️ Pasando al siguiente")
        }
        Command::RandomNext => {
            player.send(PlayerEvent::Next { index: None, random: true })?;
            embeds::create_success_embed("Siguiente aleatorio", "🔀 Eligiendo uno al azar")
        }
        Command::Goto(index) => {
            player.send(PlayerEvent::Next {
                index: Some(index),
                random: false,
            })?;
            embeds::create_success_embed("Saltando", &format!("Reproduciendo el elemento #{}", index))
        }
        Command::Status => embeds::create_status_embed(&player.status().await?),
        Command::Persist => {
            let enabled = player.toggle_persist().await?;
            embeds::create_success_embed("Persistente", &format!("Persist: {}", enabled))
        }
        Command::Shuffle => {
            let enabled = player.toggle_shuffle().await?;
            embeds::create_success_embed("Aleatorio", &format!("Shuffle: {}", enabled))
        }
        Command::Remove(index) => {
            player.send(PlayerEvent::Remove { index })?;
            embeds::create_success_embed("Eliminado", &format!("Elemento #{} eliminado", index))
        }
    };

    reply(ctx, msg, embed).await
}

pub async fn reply(ctx: &Context, msg: &Message, embed: CreateEmbed) -> Result<()> {
    msg.channel_id
        .send_message(&ctx.http, CreateMessage::new().embed(embed))
        .await?;
    Ok(())
}

// Funciones auxiliares

fn get_user_voice_channel(ctx: &Context, guild_id: GuildId, user_id: UserId) -> Option<ChannelId> {
    let guild = guild_id.to_guild_cached(&ctx.cache)?;

    guild
        .voice_states
        .get(&user_id)
        .and_then(|voice_state| voice_state.channel_id)
}

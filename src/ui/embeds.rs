use serenity::builder::{CreateEmbed, CreateEmbedFooter};
use std::time::Duration;

use crate::audio::player::PlayerStatus;

/// Colores estándar del bot
pub mod colors {
    use serenity::all::Colour;

    pub const SUCCESS_GREEN: Colour = Colour::from_rgb(67, 181, 129);
    pub const ERROR_RED: Colour = Colour::from_rgb(220, 53, 69);
    pub const INFO_BLUE: Colour = Colour::from_rgb(52, 144, 220);
    pub const MUSIC_PURPLE: Colour = Colour::from_rgb(138, 43, 226);
    pub const NEUTRAL_GRAY: Colour = Colour::from_rgb(108, 117, 125);
}

const STANDARD_FOOTER: &str = "🎵 Jukebox";

/// Máximo de entradas de la cola listadas en el estado
const MAX_LISTED: usize = 20;

/// Crea el embed de `status`: track actual, modos y cola numerada
pub fn create_status_embed(status: &PlayerStatus) -> CreateEmbed {
    let (title, position) = match &status.current {
        Some(track) => (
            track.title().to_string(),
            format!(
                "{} / {}",
                format_duration(status.position),
                track.duration().map_or_else(|| "🔴 En vivo".to_string(), format_duration)
            ),
        ),
        None => ("😴 Silencio absoluto".to_string(), "-".to_string()),
    };

    let mut embed = CreateEmbed::default()
        .title("📻 Estado del Player")
        .color(if status.current.is_some() {
            colors::MUSIC_PURPLE
        } else {
            colors::NEUTRAL_GRAY
        })
        .field("🎵 Título", title, false)
        .field("⏱️ Posición", position, true)
        .field("⏸️ Pausado", yes_no(status.paused), true)
        .field("🔀 Aleatorio", yes_no(status.shuffle), true)
        .field("🔁 Persistente", yes_no(status.persist), true);

    if !status.queue.is_empty() {
        embed = embed.description(format_queue(status));
    }

    embed.footer(CreateEmbedFooter::new(format!(
        "{} canciones en cola • {}",
        status.queue.len(),
        STANDARD_FOOTER
    )))
}

/// Crea el embed de ayuda con el prefijo configurado
pub fn create_help_embed(prefix: &str) -> CreateEmbed {
    let p = prefix;

    CreateEmbed::default()
        .title(format!("🎵 Jukebox v{}", env!("CARGO_PKG_VERSION")))
        .color(colors::INFO_BLUE)
        .field(
            "Importante",
            format!(
                "`{p}help` - Muestra este menú\n\
                `{p}join` - Se une a tu canal de voz (necesario antes del resto)\n\
                `{p}kill` / `{p}leave` - Elimina el player y sale del canal (la cola se pierde)"
            ),
            false,
        )
        .field(
            "Reproducción",
            format!(
                "`{p}add <link>` - Agrega un video a la cola\n\
                `{p}remove <índice>` - Elimina un elemento de la cola\n\
                `{p}pause` / `{p}stop` - Pausa la reproducción\n\
                `{p}play` / `{p}resume` - Reanuda la reproducción\n\
                `{p}next` / `{p}skip` - Pasa al siguiente de la cola\n\
                `{p}randnext` / `{p}rnext` - Pasa a un elemento aleatorio\n\
                `{p}goto <índice>` - Reproduce el elemento indicado"
            ),
            false,
        )
        .field(
            "Utilidades",
            format!(
                "`{p}status` - Muestra el estado del player\n\
                `{p}persist` - Los tracks reproducidos se quedan en la cola\n\
                `{p}shuffle` - Activa o desactiva el modo aleatorio"
            ),
            false,
        )
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

/// Crea embed de error
pub fn create_error_embed(title: &str, description: &str) -> CreateEmbed {
    CreateEmbed::default()
        .title(format!("❌ {}", title))
        .description(description)
        .color(colors::ERROR_RED)
}

/// Crea embed de éxito
pub fn create_success_embed(title: &str, description: &str) -> CreateEmbed {
    CreateEmbed::default()
        .title(format!("✅ {}", title))
        .description(description)
        .color(colors::SUCCESS_GREEN)
}

fn format_queue(status: &PlayerStatus) -> String {
    let mut out = String::from("**Cola:**\n");

    for (i, track) in status.queue.iter().enumerate().take(MAX_LISTED) {
        let marker = if i == status.next_index { "▶" } else { " " };
        let duration = track.duration().map(format_duration).unwrap_or_default();
        out.push_str(&format!(
            "{} **#{}:** {} `[{}]` (<{}>)\n",
            marker,
            i,
            track.title(),
            duration,
            watch_url(track.id())
        ));
    }

    if status.queue.len() > MAX_LISTED {
        out.push_str(&format!("... y {} más\n", status.queue.len() - MAX_LISTED));
    }

    out
}

/// El resolver solo acepta YouTube, así que el id siempre es de un video
fn watch_url(id: &str) -> String {
    format!("https://www.youtube.com/watch?v={}", id)
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "Sí"
    } else {
        "No"
    }
}

/// Formatea con precisión de segundos (`3m 20s`)
fn format_duration(duration: Duration) -> String {
    humantime::format_duration(Duration::from_secs(duration.as_secs())).to_string()
}

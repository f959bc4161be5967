use serenity::model::id::GuildId;
use thiserror::Error;

/// Errores del núcleo de reproducción.
///
/// Los errores por track (resolución, streaming) son locales al intento y
/// nunca tumban el loop del actor; solo se devuelven a quien originó el
/// comando.
#[derive(Debug, Error)]
pub enum PlayerError {
    /// El transporte de voz no pudo unirse al canal. No se crea ninguna entrada.
    #[error("no se pudo conectar al canal de voz en guild {guild_id}: {reason}")]
    Join { guild_id: GuildId, reason: String },

    /// El resolver externo no encontró o no pudo leer el track.
    #[error("no se pudo resolver '{locator}': {reason}")]
    Resolution { locator: String, reason: String },

    /// El actor del player ya terminó (Kill o error de pipeline).
    #[error("el player de guild {0} no está activo")]
    NotRunning(GuildId),

    /// Fallo al desconectar la llamada de voz.
    #[error("error de voz en guild {guild_id}: {reason}")]
    Voice { guild_id: GuildId, reason: String },

    /// Fallo al arrancar o consultar el streamer externo.
    #[error("error de streaming: {0}")]
    Stream(String),

    #[error("error de E/S en persistencia: {0}")]
    Io(#[from] std::io::Error),

    #[error("estado persistido inválido: {0}")]
    Json(#[from] serde_json::Error),
}

impl PlayerError {
    pub fn resolution(locator: impl Into<String>, reason: impl ToString) -> Self {
        Self::Resolution {
            locator: locator.into(),
            reason: reason.to_string(),
        }
    }
}

pub type PlayerResult<T> = std::result::Result<T, PlayerError>;

use anyhow::{Context, Result};
use std::{path::PathBuf, time::Duration};

use crate::audio::player::PlayerSettings;

#[derive(Debug, Clone)]
pub struct Config {
    // Discord
    pub discord_token: String,
    pub command_prefix: String,

    // Audio
    pub max_queue_size: usize,
    pub opus_bitrate: u32,
    pub deregister_on_pipeline_error: bool,

    // Paths
    pub data_dir: PathBuf,
    pub players_path: PathBuf,
    pub ytdlp_path: String,
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let data_dir: PathBuf = env_or("DATA_DIR", "./data").into();
        let players_path = match std::env::var("PLAYERS_PATH") {
            Ok(path) if !path.trim().is_empty() => path.into(),
            _ => data_dir.join("players.json"),
        };

        let config = Self {
            // Discord
            discord_token: std::env::var("DISCORD_TOKEN").context("DISCORD_TOKEN no está definido")?,
            command_prefix: env_or("COMMAND_PREFIX", ">"),

            // Audio
            max_queue_size: env_or("MAX_QUEUE_SIZE", "100")
                .parse()
                .context("MAX_QUEUE_SIZE inválido")?,
            opus_bitrate: env_or("OPUS_BITRATE", "128000") // 128kbps
                .parse()
                .context("OPUS_BITRATE inválido")?,
            deregister_on_pipeline_error: env_or("DEREGISTER_ON_PIPELINE_ERROR", "false")
                .parse()
                .context("DEREGISTER_ON_PIPELINE_ERROR debe ser true o false")?,

            // Paths
            data_dir,
            players_path,
            ytdlp_path: env_or("YTDLP_PATH", "yt-dlp"),
        };

        // Create directories if they don't exist
        std::fs::create_dir_all(&config.data_dir)
            .with_context(|| format!("no se pudo crear {}", config.data_dir.display()))?;

        config.validate()?;

        Ok(config)
    }

    /// Validates configuration values for correctness.
    ///
    /// - Opus bitrate must be within 8kbps..=510kbps (Discord limits)
    /// - Max queue size must be greater than 0
    /// - Token and prefix must not be empty
    pub fn validate(&self) -> Result<()> {
        if self.discord_token.trim().is_empty() {
            anyhow::bail!("DISCORD_TOKEN cannot be empty");
        }

        if self.command_prefix.is_empty() {
            anyhow::bail!("Command prefix cannot be empty");
        }

        if self.opus_bitrate > 510000 {
            anyhow::bail!("Opus bitrate cannot exceed 510kbps, got: {}", self.opus_bitrate);
        }

        if self.opus_bitrate < 8000 {
            anyhow::bail!("Opus bitrate too low, minimum 8kbps, got: {}", self.opus_bitrate);
        }

        if self.max_queue_size == 0 {
            anyhow::bail!("Max queue size must be greater than 0");
        }

        Ok(())
    }

    /// Returns a summary of the current configuration for logging.
    ///
    /// The token is never included.
    pub fn summary(&self) -> String {
        format!(
            "Config Summary:\n  \
            Commands: prefix '{}'\n  \
            Audio: {}kbps, {} max queue, deregister on error={}\n  \
            Paths: data {}, players {}, yt-dlp {}",
            self.command_prefix,
            self.opus_bitrate / 1000,
            self.max_queue_size,
            self.deregister_on_pipeline_error,
            self.data_dir.display(),
            self.players_path.display(),
            self.ytdlp_path,
        )
    }

    pub fn player_settings(&self) -> PlayerSettings {
        PlayerSettings {
            max_queue_size: self.max_queue_size,
            tick_interval: Duration::from_secs(1),
            deregister_on_error: self.deregister_on_pipeline_error,
        }
    }
}

/// Default configuration values.
///
/// Used as fallbacks when environment variables are not provided.
impl Default for Config {
    fn default() -> Self {
        let data_dir = PathBuf::from("./data");
        Self {
            // Discord (no defaults - must be provided)
            discord_token: String::new(),
            command_prefix: ">".to_string(),

            // Audio defaults
            max_queue_size: 100,
            opus_bitrate: 128000,
            deregister_on_pipeline_error: false,

            // Path defaults
            players_path: data_dir.join("players.json"),
            data_dir,
            ytdlp_path: "yt-dlp".to_string(),
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    match std::env::var(key) {
        Ok(val) if !val.trim().is_empty() => val,
        _ => default.to_string(),
    }
}

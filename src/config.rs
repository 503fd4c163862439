use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serenity::model::id::{ChannelId, GuildId};
use tokio::sync::RwLock;
use tracing::info;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("settings file read: {0}")]
    Io(#[from] std::io::Error),

    #[error("settings file parse: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("{0} is not a number: {1}")]
    BadEnv(&'static str, String),
}

/// Per-guild configuration, read by the auto-join path.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GuildSettings {
    pub default_playlist: Option<String>,
    pub voice_channel: Option<ChannelId>,
}

/// Process-level and per-guild settings. Guild settings are backed by a
/// JSON file and written back when changed.
pub struct Settings {
    alone_time_until_stop: i64,
    path: Option<PathBuf>,
    guilds: RwLock<HashMap<GuildId, GuildSettings>>,
}

impl Settings {
    pub fn new(alone_time_until_stop: i64) -> Self {
        Self {
            alone_time_until_stop,
            path: None,
            guilds: RwLock::new(HashMap::new()),
        }
    }

    /// Read `ALONE_TIME_UNTIL_STOP` from the environment (absent means
    /// disabled) and the per-guild settings from `path` if it exists.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let alone_time_until_stop =
            parse_alone_timeout(std::env::var("ALONE_TIME_UNTIL_STOP").ok())?;

        let mut settings = Self::new(alone_time_until_stop);
        settings.path = Some(path.to_path_buf());
        if path.exists() {
            let text = std::fs::read_to_string(path)?;
            settings.guilds = RwLock::new(serde_json::from_str(&text)?);
            info!(path = %path.display(), "loaded guild settings");
        }
        Ok(settings)
    }

    /// Idle threshold in seconds; zero or negative disables the timeout.
    pub fn alone_time_until_stop(&self) -> i64 {
        self.alone_time_until_stop
    }

    pub async fn default_playlist(&self, guild: GuildId) -> Option<String> {
        self.guilds
            .read()
            .await
            .get(&guild)
            .and_then(|settings| settings.default_playlist.clone())
    }

    pub async fn voice_channel(&self, guild: GuildId) -> Option<ChannelId> {
        self.guilds
            .read()
            .await
            .get(&guild)
            .and_then(|settings| settings.voice_channel)
    }

    /// Replace the guild's settings and write the file back if one is
    /// configured.
    pub async fn set_guild(
        &self,
        guild: GuildId,
        settings: GuildSettings,
    ) -> Result<(), ConfigError> {
        let mut guilds = self.guilds.write().await;
        guilds.insert(guild, settings);
        if let Some(path) = &self.path {
            let text = serde_json::to_string_pretty(&*guilds)?;
            tokio::fs::write(path, text).await?;
        }
        Ok(())
    }
}

/// Absent means disabled; junk is a configuration error.
fn parse_alone_timeout(raw: Option<String>) -> Result<i64, ConfigError> {
    match raw {
        Some(raw) => raw
            .trim()
            .parse::<i64>()
            .map_err(|_| ConfigError::BadEnv("ALONE_TIME_UNTIL_STOP", raw.clone())),
        None => Ok(0),
    }
}

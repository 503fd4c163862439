use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serenity::model::id::GuildId;
use songbird::Songbird;
use songbird::input::File;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::config::Settings;
use crate::gateway::{PlaybackError, PlaybackHandle, PlaybackManager};

/// Directory holding `<name>.txt` playlists, one audio file path per line.
const PLAYLIST_DIR: &str = "playlists";

/// Owns one playback handler per guild.
pub struct PlayerManager {
    manager: Arc<Songbird>,
    settings: Arc<Settings>,
    handlers: RwLock<HashMap<GuildId, Arc<GuildPlayer>>>,
}

impl PlayerManager {
    pub fn new(manager: Arc<Songbird>, settings: Arc<Settings>) -> Self {
        Self {
            manager,
            settings,
            handlers: RwLock::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl PlaybackManager for PlayerManager {
    async fn has_handler(&self, guild: GuildId) -> bool {
        self.handlers.read().await.contains_key(&guild)
    }

    async fn setup_handler(
        &self,
        guild: GuildId,
    ) -> Result<Arc<dyn PlaybackHandle>, PlaybackError> {
        let mut handlers = self.handlers.write().await;
        let handler = handlers.entry(guild).or_insert_with(|| {
            Arc::new(GuildPlayer {
                guild,
                manager: Arc::clone(&self.manager),
                settings: Arc::clone(&self.settings),
            })
        });
        Ok(Arc::clone(handler) as Arc<dyn PlaybackHandle>)
    }
}

/// Playback state for one guild, feeding the songbird track queue.
struct GuildPlayer {
    guild: GuildId,
    manager: Arc<Songbird>,
    settings: Arc<Settings>,
}

impl GuildPlayer {
    async fn queue_default(&self) -> Result<usize, PlaybackError> {
        let name = self
            .settings
            .default_playlist(self.guild)
            .await
            .ok_or(PlaybackError::NoPlaylist(self.guild))?;
        let tracks = load_playlist(&name).await?;

        let call = self.manager.get_or_insert(self.guild);
        let mut call = call.lock().await;
        let mut queued = 0;
        for path in tracks {
            if !path.exists() {
                debug!(guild = self.guild.get(), path = %path.display(), "skipping missing track");
                continue;
            }
            let _ = call.enqueue_input(File::new(path).into()).await;
            queued += 1;
        }
        debug!(guild = self.guild.get(), playlist = %name, queued, "queued default playlist");
        Ok(queued)
    }
}

#[async_trait]
impl PlaybackHandle for GuildPlayer {
    async fn play_from_default(&self) -> bool {
        match self.queue_default().await {
            Ok(queued) => queued > 0,
            Err(e) => {
                warn!(guild = self.guild.get(), error = %e, "default playback unavailable");
                false
            }
        }
    }
}

async fn load_playlist(name: &str) -> Result<Vec<PathBuf>, PlaybackError> {
    let path = PathBuf::from(PLAYLIST_DIR).join(format!("{name}.txt"));
    let text = tokio::fs::read_to_string(&path).await?;
    Ok(parse_playlist(&text))
}

/// Playlist format: one path per line, blank lines and `#` comments ignored.
fn parse_playlist(text: &str) -> Vec<PathBuf> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(PathBuf::from)
        .collect()
}

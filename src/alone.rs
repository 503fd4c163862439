use std::collections::HashMap;
use std::sync::Arc;

use serenity::model::id::GuildId;
use tokio::sync::RwLock;
use tokio::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::Settings;
use crate::gateway::{Directory, PlaybackManager, SessionController, VoiceUpdate};

/// Delay between the end of one sweep and the start of the next.
const SWEEP_DELAY: Duration = Duration::from_secs(5);

/// Guild -> instant it was first seen without a qualifying listener.
pub struct AloneRegistry {
    alone_since: RwLock<HashMap<GuildId, Instant>>,
}

impl AloneRegistry {
    fn new() -> Self {
        Self {
            alone_since: RwLock::new(HashMap::new()),
        }
    }

    /// Insert or overwrite the entry for `guild`. Last write wins.
    pub async fn register(&self, guild: GuildId, now: Instant) {
        self.alone_since.write().await.insert(guild, now);
    }

    /// Remove the entry if present; returns whether one existed.
    pub async fn unregister(&self, guild: GuildId) -> bool {
        self.alone_since.write().await.remove(&guild).is_some()
    }

    pub async fn contains(&self, guild: GuildId) -> bool {
        self.alone_since.read().await.contains_key(&guild)
    }

    /// Point-in-time copy of the entries. The sweep iterates this copy so
    /// the lock is never held across collaborator calls.
    pub async fn snapshot(&self) -> Vec<(GuildId, Instant)> {
        self.alone_since
            .read()
            .await
            .iter()
            .map(|(guild, since)| (*guild, *since))
            .collect()
    }
}

/// Tracks guilds whose voice channel has been left without listeners and
/// tears their sessions down once they have been alone for long enough.
///
/// The listener side only ever registers and unregisters guilds; all
/// session teardown happens in the periodic sweep.
pub struct AloneInVoiceHandler {
    registry: AloneRegistry,
    settings: Arc<Settings>,
    alone_time_until_stop: Duration,
    cancel: CancellationToken,
}

impl AloneInVoiceHandler {
    pub fn new(settings: Arc<Settings>) -> Self {
        let secs = settings.alone_time_until_stop();
        let alone_time_until_stop = if secs > 0 {
            Duration::from_secs(secs as u64)
        } else {
            Duration::ZERO
        };
        Self {
            registry: AloneRegistry::new(),
            settings,
            alone_time_until_stop,
            cancel: CancellationToken::new(),
        }
    }

    /// Whether the idle timeout is configured at all.
    pub fn enabled(&self) -> bool {
        !self.alone_time_until_stop.is_zero()
    }

    /// Start the background sweep. Does nothing when the timeout is
    /// disabled; the registry is then never consulted.
    pub fn init(
        self: Arc<Self>,
        directory: Arc<dyn Directory>,
        sessions: Arc<dyn SessionController>,
    ) {
        if !self.enabled() {
            info!("alone timeout disabled, sweeper not started");
            return;
        }
        info!(
            timeout_secs = self.alone_time_until_stop.as_secs(),
            "starting alone-in-voice sweeper"
        );
        tokio::spawn(async move {
            loop {
                self.sweep(directory.as_ref(), sessions.as_ref()).await;
                tokio::select! {
                    _ = self.cancel.cancelled() => break,
                    _ = tokio::time::sleep(SWEEP_DELAY) => {}
                }
            }
            debug!("alone-in-voice sweeper stopped");
        });
    }

    /// Cancel the background sweep.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    /// One pass over the registry: evict every guild that has been alone
    /// past the threshold or that no longer exists.
    async fn sweep(&self, directory: &dyn Directory, sessions: &dyn SessionController) {
        let now = Instant::now();
        let mut to_remove = Vec::new();

        for (guild, since) in self.registry.snapshot().await {
            if now.duration_since(since) < self.alone_time_until_stop {
                continue;
            }

            if !directory.resolve_guild(guild).await {
                debug!(guild = guild.get(), "alone guild no longer exists, dropping entry");
                to_remove.push(guild);
                continue;
            }

            info!(guild = guild.get(), "alone past timeout, stopping session");
            if let Err(e) = sessions.stop_and_clear(guild).await {
                warn!(guild = guild.get(), error = %e, "stop_and_clear failed");
            }
            if let Err(e) = sessions.close_connection(guild).await {
                warn!(guild = guild.get(), error = %e, "close_connection failed");
            }
            // Removed even when the calls fail; the listener re-registers
            // if the guild is still alone, so a broken transport cannot
            // turn into a retry storm.
            to_remove.push(guild);
        }

        for guild in to_remove {
            self.registry.unregister(guild).await;
        }
    }

    /// Handle one membership change.
    pub async fn on_voice_update(
        &self,
        update: VoiceUpdate,
        directory: &dyn Directory,
        sessions: &dyn SessionController,
        players: &dyn PlaybackManager,
    ) {
        let guild = update.guild;

        if directory.connected_channel(guild).await.is_none() && !update.is_self {
            self.maybe_auto_join(update, sessions, players).await;
        }

        // Idle tracking is meaningless without an active handler.
        if !players.has_handler(guild).await {
            return;
        }

        if self.is_alone(guild, directory).await {
            if !self.registry.contains(guild).await {
                self.registry.register(guild, Instant::now()).await;
                debug!(guild = guild.get(), "no listeners left, idle timeout started");
            }
        } else if self.registry.unregister(guild).await {
            debug!(guild = guild.get(), "a listener returned, idle timeout cancelled");
        }
    }

    /// Join the guild's configured channel when someone enters it and a
    /// default playlist is set up.
    async fn maybe_auto_join(
        &self,
        update: VoiceUpdate,
        sessions: &dyn SessionController,
        players: &dyn PlaybackManager,
    ) {
        let guild = update.guild;
        let (Some(_playlist), Some(channel)) = (
            self.settings.default_playlist(guild).await,
            self.settings.voice_channel(guild).await,
        ) else {
            return;
        };
        if update.channel_joined != Some(channel) {
            return;
        }

        let handler = match players.setup_handler(guild).await {
            Ok(handler) => handler,
            Err(e) => {
                debug!(guild = guild.get(), error = %e, "auto-join skipped, playback setup unavailable");
                return;
            }
        };
        if handler.play_from_default().await {
            info!(guild = guild.get(), channel = channel.get(), "auto-joining configured channel");
            if let Err(e) = sessions.open_connection(guild, channel).await {
                warn!(guild = guild.get(), error = %e, "auto-join connection failed");
            }
        }
    }

    /// A guild is alone when its connected channel holds no qualifying
    /// listener. A guild with no connection is never alone.
    async fn is_alone(&self, guild: GuildId, directory: &dyn Directory) -> bool {
        let Some(channel) = directory.connected_channel(guild).await else {
            return false;
        };
        directory
            .channel_members(guild, channel)
            .await
            .iter()
            .all(|member| !member.is_listener())
    }
}

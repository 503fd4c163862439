use std::sync::Arc;

use async_trait::async_trait;
use serenity::model::id::{ChannelId, GuildId};

/// One guild-voice membership change, as delivered by the gateway.
#[derive(Debug, Clone, Copy)]
pub struct VoiceUpdate {
    pub guild: GuildId,
    /// Channel the affected member ended up in, if any.
    pub channel_joined: Option<ChannelId>,
    /// Whether the affected member is this bot's own account.
    pub is_self: bool,
}

/// A member sitting in a voice channel, reduced to the two flags the
/// alone predicate cares about.
#[derive(Debug, Clone, Copy)]
pub struct VoiceMember {
    pub deafened: bool,
    pub bot: bool,
}

impl VoiceMember {
    /// A qualifying listener is neither server-deafened nor a bot.
    pub fn is_listener(&self) -> bool {
        !self.deafened && !self.bot
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("guild {0} has no active voice session")]
    NotConnected(GuildId),

    #[error("voice gateway: {0}")]
    Gateway(String),
}

#[derive(Debug, thiserror::Error)]
pub enum PlaybackError {
    #[error("guild {0} has no default playlist configured")]
    NoPlaylist(GuildId),

    #[error("playlist read: {0}")]
    Io(#[from] std::io::Error),
}

/// The only operations the idle-tracking core may invoke on the voice
/// transport.
#[async_trait]
pub trait SessionController: Send + Sync {
    /// Stop playback and drop everything queued for the guild.
    async fn stop_and_clear(&self, guild: GuildId) -> Result<(), SessionError>;

    /// Tear down the guild's voice connection.
    async fn close_connection(&self, guild: GuildId) -> Result<(), SessionError>;

    /// Connect to the given voice channel.
    async fn open_connection(&self, guild: GuildId, channel: ChannelId) -> Result<(), SessionError>;
}

/// Per-guild playback handlers, owned by the audio layer.
#[async_trait]
pub trait PlaybackManager: Send + Sync {
    async fn has_handler(&self, guild: GuildId) -> bool;

    /// Get or create the guild's playback handler.
    async fn setup_handler(&self, guild: GuildId)
    -> Result<Arc<dyn PlaybackHandle>, PlaybackError>;
}

/// Handle to one guild's playback state.
#[async_trait]
pub trait PlaybackHandle: Send + Sync {
    /// Queue the guild's default source; returns whether anything was queued.
    async fn play_from_default(&self) -> bool;
}

/// Read-only view of live guild and voice-channel state.
#[async_trait]
pub trait Directory: Send + Sync {
    /// Whether the guild still resolves to a live entity.
    async fn resolve_guild(&self, guild: GuildId) -> bool;

    /// Channel the bot is currently connected to in this guild, if any.
    async fn connected_channel(&self, guild: GuildId) -> Option<ChannelId>;

    /// Everyone currently sitting in the given voice channel.
    async fn channel_members(&self, guild: GuildId, channel: ChannelId) -> Vec<VoiceMember>;
}

use std::sync::Arc;

use async_trait::async_trait;
use serenity::cache::Cache;
use serenity::model::id::{ChannelId, GuildId};
use songbird::Songbird;

use crate::gateway::{Directory, SessionController, SessionError, VoiceMember};

/// Voice transport operations backed by songbird.
pub struct SongbirdSessions {
    manager: Arc<Songbird>,
}

impl SongbirdSessions {
    pub fn new(manager: Arc<Songbird>) -> Self {
        Self { manager }
    }
}

#[async_trait]
impl SessionController for SongbirdSessions {
    async fn stop_and_clear(&self, guild: GuildId) -> Result<(), SessionError> {
        let call = self
            .manager
            .get(guild)
            .ok_or(SessionError::NotConnected(guild))?;
        call.lock().await.queue().stop();
        Ok(())
    }

    async fn close_connection(&self, guild: GuildId) -> Result<(), SessionError> {
        self.manager
            .remove(guild)
            .await
            .map_err(|e| SessionError::Gateway(e.to_string()))
    }

    async fn open_connection(&self, guild: GuildId, channel: ChannelId) -> Result<(), SessionError> {
        self.manager
            .join(guild, channel)
            .await
            .map(|_| ())
            .map_err(|e| SessionError::Gateway(e.to_string()))
    }
}

/// Live guild and voice-channel lookups over the serenity cache.
pub struct CacheDirectory {
    cache: Arc<Cache>,
    manager: Arc<Songbird>,
}

impl CacheDirectory {
    pub fn new(cache: Arc<Cache>, manager: Arc<Songbird>) -> Self {
        Self { cache, manager }
    }
}

#[async_trait]
impl Directory for CacheDirectory {
    async fn resolve_guild(&self, guild: GuildId) -> bool {
        self.cache.guild(guild).is_some()
    }

    async fn connected_channel(&self, guild: GuildId) -> Option<ChannelId> {
        let call = self.manager.get(guild)?;
        let channel = call.lock().await.current_channel()?;
        Some(ChannelId::new(channel.0.get()))
    }

    async fn channel_members(&self, guild: GuildId, channel: ChannelId) -> Vec<VoiceMember> {
        let Some(guild_ref) = self.cache.guild(guild) else {
            return Vec::new();
        };
        guild_ref
            .voice_states
            .values()
            .filter(|state| state.channel_id == Some(channel))
            .map(|state| VoiceMember {
                deafened: state.deaf,
                bot: guild_ref
                    .members
                    .get(&state.user_id)
                    .is_some_and(|member| member.user.bot),
            })
            .collect()
    }
}

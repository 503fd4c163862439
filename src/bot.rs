use std::sync::Arc;

use serenity::all::{
    Command, CommandDataOptionValue, CommandInteraction, CommandOptionType, CreateCommand,
    CreateCommandOption, CreateInteractionResponse, CreateInteractionResponseMessage, Interaction,
    Ready,
};
use serenity::async_trait;
use serenity::model::id::ChannelId;
use serenity::model::voice::VoiceState;
use serenity::prelude::*;
use songbird::Songbird;
use tracing::{debug, error, info};

use crate::alone::AloneInVoiceHandler;
use crate::config::{GuildSettings, Settings};
use crate::gateway::VoiceUpdate;
use crate::player::PlayerManager;
use crate::session::{CacheDirectory, SongbirdSessions};

pub struct VoiceHandler {
    alone: Arc<AloneInVoiceHandler>,
    players: Arc<PlayerManager>,
    manager: Arc<Songbird>,
    settings: Arc<Settings>,
}

impl VoiceHandler {
    pub fn new(
        alone: Arc<AloneInVoiceHandler>,
        players: Arc<PlayerManager>,
        manager: Arc<Songbird>,
        settings: Arc<Settings>,
    ) -> Self {
        Self { alone, players, manager, settings }
    }
}

#[async_trait]
impl EventHandler for VoiceHandler {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!(user = %ready.user.name, "connected to the gateway");

        let cmd = CreateCommand::new("autojoin")
            .description("Join a voice channel and play the default playlist when someone enters")
            .add_option(
                CreateCommandOption::new(CommandOptionType::Channel, "channel", "Voice channel to watch")
                    .required(true),
            )
            .add_option(
                CreateCommandOption::new(CommandOptionType::String, "playlist", "Default playlist name")
                    .required(true),
            );
        if let Err(e) = Command::create_global_command(&ctx.http, cmd).await {
            error!(error = %e, "failed to register /autojoin");
        }
    }

    async fn voice_state_update(&self, ctx: Context, old: Option<VoiceState>, new: VoiceState) {
        let Some(guild) = new.guild_id else {
            return;
        };
        let is_self = new.user_id == ctx.cache.current_user().id;
        let channel_joined =
            joined_channel(old.as_ref().and_then(|state| state.channel_id), new.channel_id);
        let update = VoiceUpdate { guild, channel_joined, is_self };
        debug!(guild = guild.get(), channel = ?new.channel_id, "voice state update");

        let directory = CacheDirectory::new(ctx.cache.clone(), Arc::clone(&self.manager));
        let sessions = SongbirdSessions::new(Arc::clone(&self.manager));
        self.alone
            .on_voice_update(update, &directory, &sessions, self.players.as_ref())
            .await;
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        if let Interaction::Command(cmd) = interaction {
            if cmd.data.name == "autojoin" {
                self.handle_autojoin(&ctx, &cmd).await;
            }
        }
    }
}

impl VoiceHandler {
    async fn handle_autojoin(&self, ctx: &Context, cmd: &CommandInteraction) {
        let reply = |content: String| {
            CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new().content(content),
            )
        };

        let Some(guild) = cmd.guild_id else {
            let _ = cmd
                .create_response(&ctx.http, reply("This command only works in a server.".into()))
                .await;
            return;
        };

        let mut channel = None;
        let mut playlist = None;
        for option in &cmd.data.options {
            match (option.name.as_str(), &option.value) {
                ("channel", CommandDataOptionValue::Channel(id)) => channel = Some(*id),
                ("playlist", CommandDataOptionValue::String(name)) => {
                    playlist = Some(name.clone());
                }
                _ => {}
            }
        }
        let (Some(channel), Some(playlist)) = (channel, playlist) else {
            let _ = cmd
                .create_response(&ctx.http, reply("Both channel and playlist are required.".into()))
                .await;
            return;
        };

        let settings = GuildSettings {
            default_playlist: Some(playlist.clone()),
            voice_channel: Some(channel),
        };
        let content = match self.settings.set_guild(guild, settings).await {
            Ok(()) => format!("Auto-join set: <#{channel}> with playlist `{playlist}`."),
            Err(e) => {
                error!(guild = guild.get(), error = %e, "failed to save guild settings");
                "Failed to save the settings.".to_string()
            }
        };
        let _ = cmd.create_response(&ctx.http, reply(content)).await;
    }
}

/// Channel the member just joined or moved to. A state change inside the
/// same channel, such as a deafen toggle, is not a join.
fn joined_channel(old: Option<ChannelId>, new: Option<ChannelId>) -> Option<ChannelId> {
    if old != new { new } else { None }
}

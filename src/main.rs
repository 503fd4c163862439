use std::path::Path;
use std::sync::Arc;

use serenity::Client;
use serenity::all::GatewayIntents;
use songbird::{SerenityInit, Songbird};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod alone;
mod bot;
mod config;
mod gateway;
mod player;
mod session;

use crate::alone::AloneInVoiceHandler;
use crate::bot::VoiceHandler;
use crate::config::Settings;
use crate::player::PlayerManager;
use crate::session::{CacheDirectory, SongbirdSessions};

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let token = std::env::var("DISCORD_TOKEN").expect("DISCORD_TOKEN must be set");
    let settings = Arc::new(
        Settings::load(Path::new("serversettings.json")).expect("failed to load settings"),
    );

    let manager = Songbird::serenity();
    let players = Arc::new(PlayerManager::new(Arc::clone(&manager), Arc::clone(&settings)));
    let alone = Arc::new(AloneInVoiceHandler::new(Arc::clone(&settings)));

    let intents = GatewayIntents::GUILDS | GatewayIntents::GUILD_VOICE_STATES;
    let mut client = Client::builder(&token, intents)
        .event_handler(VoiceHandler::new(
            Arc::clone(&alone),
            Arc::clone(&players),
            Arc::clone(&manager),
            Arc::clone(&settings),
        ))
        .register_songbird_with(Arc::clone(&manager))
        .await
        .expect("failed to create client");

    let directory = Arc::new(CacheDirectory::new(client.cache.clone(), Arc::clone(&manager)));
    let sessions = Arc::new(SongbirdSessions::new(Arc::clone(&manager)));
    Arc::clone(&alone).init(directory, sessions);

    info!("starting up");
    tokio::select! {
        result = client.start() => {
            if let Err(why) = result {
                error!(error = %why, "client error");
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("shutting down");
        }
    }
    alone.shutdown();
}

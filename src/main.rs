mod commands;
mod config;
mod directory;
mod discord;
mod error;
mod handlers;
mod lifecycle;
mod messages;
mod panel;
mod platform;
mod policy;
mod state;
mod store;
mod util;

use crate::config::Config;
use crate::error::StartupError;
use crate::handlers::Handler;
use dotenv::dotenv;
use serenity::all::{Client, GatewayIntents};
use std::sync::Arc;

#[tokio::main]
async fn main() {
    dotenv().ok();
    pretty_env_logger::init();

    log::info!("Starting ticket bot...");

    if let Err(err) = run().await {
        log::error!("{}", err);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), StartupError> {
    let config = Arc::new(Config::from_env()?);

    let intents =
        GatewayIntents::GUILDS | GatewayIntents::GUILD_MESSAGES | GatewayIntents::MESSAGE_CONTENT;

    let mut client = Client::builder(&config.token, intents)
        .event_handler(Handler::new(config.clone()))
        .await?;

    client.start().await?;
    Ok(())
}

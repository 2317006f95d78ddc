use anyhow::Context as _;
use serenity::Client;
use serenity::all::GatewayIntents;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod config;
mod handler;
mod notification;
mod query;
mod report;

use crate::config::Config;
use crate::handler::ReportHandler;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rollcall=info,serenity=warn".into()),
        )
        .init();

    let config = Config::from_env()?;

    let intents =
        GatewayIntents::GUILDS | GatewayIntents::GUILD_MESSAGES | GatewayIntents::MESSAGE_CONTENT;

    let mut client = Client::builder(&config.token, intents)
        .event_handler(ReportHandler::new(config.clone()))
        .await
        .context("failed to build discord client")?;

    info!("starting gateway client");

    client.start().await.context("gateway client stopped")?;

    Ok(())
}

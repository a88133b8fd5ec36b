use discord_telegram_relay::config::Settings;
use discord_telegram_relay::destination::{Destination, TelegramDestination};
use discord_telegram_relay::gateway::discord;
use discord_telegram_relay::logging::{init_logging, RedactionPatterns};
use discord_telegram_relay::relay::{Relay, RelayOptions};
use dotenvy::dotenv;
use std::sync::Arc;
use teloxide::prelude::*;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file
    dotenv().ok();

    // Initialize redaction patterns early (before logging)
    let patterns = Arc::new(RedactionPatterns::new().map_err(|e| {
        eprintln!("Failed to compile regex patterns: {e}");
        e
    })?);

    init_logging(patterns);

    info!("Starting Discord to Telegram relay...");

    let settings = init_settings();

    let bot = Bot::new(settings.telegram_bot_token.clone());
    let telegram = TelegramDestination::new(bot, &settings.telegram_chat_id);
    info!(chat = ?telegram.recipient(), "Telegram destination ready");
    let destination: Arc<dyn Destination> = Arc::new(telegram);

    let options = RelayOptions::from_settings(&settings);
    if options.allowed_channels.is_empty() {
        warn!("ALLOWED_CHANNEL_IDS is empty, no messages will be relayed");
    }
    info!(
        channels = options.allowed_channels.len(),
        temp_dir = %options.staging_root.display(),
        "Relay configured"
    );
    let relay = Arc::new(Relay::new(options, destination));

    let shutdown = init_shutdown();

    info!("Relay is running...");
    discord::run(
        &settings.discord_bot_token,
        relay,
        settings.relay_timeout(),
        shutdown,
    )
    .await
    .map_err(|e| {
        error!("Discord gateway stopped: {e:#}");
        e
    })?;

    info!("Relay stopped");
    Ok(())
}

fn init_settings() -> Settings {
    match Settings::new() {
        Ok(s) => s,
        Err(e) => {
            error!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    }
}

/// Cancel the returned token on Ctrl-C
fn init_shutdown() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {e}");
            return;
        }
        info!("Ctrl-C received, shutting down");
        trigger.cancel();
    });
    token
}

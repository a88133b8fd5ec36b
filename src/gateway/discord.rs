//! Discord event source built on serenity.

use super::{run_relay_task, AttachmentMeta, InboundMessage, MessageKind};
use crate::relay::Relay;
use crate::utils::truncate_str;
use anyhow::Context as _;
use serenity::all::{
    Attachment, Client, Context, EventHandler, GatewayIntents, Message, MessageType, Ready,
};
use serenity::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Gateway intents the relay needs
#[must_use]
pub fn intents() -> GatewayIntents {
    GatewayIntents::GUILD_MESSAGES
        | GatewayIntents::DIRECT_MESSAGES
        | GatewayIntents::MESSAGE_CONTENT
}

/// Reduce a Discord message type to the kinds the relay distinguishes.
#[must_use]
pub fn message_kind(kind: MessageType) -> MessageKind {
    match kind {
        MessageType::Regular => MessageKind::Default,
        MessageType::InlineReply => MessageKind::Reply,
        MessageType::ThreadStarterMessage => MessageKind::ThreadStarter,
        _ => MessageKind::Other,
    }
}

fn attachment_meta(attachment: &Attachment) -> AttachmentMeta {
    AttachmentMeta {
        url: attachment.url.clone(),
        filename: attachment.filename.clone(),
        content_type: attachment.content_type.clone().unwrap_or_default(),
        size: u64::from(attachment.size),
    }
}

/// Convert a serenity message into the relay's inbound event.
#[must_use]
pub fn inbound_from_discord(msg: &Message) -> InboundMessage {
    InboundMessage {
        author_is_bot: msg.author.bot,
        channel_id: msg.channel_id.get(),
        kind: message_kind(msg.kind),
        text: msg.content.clone(),
        attachments: msg.attachments.iter().map(attachment_meta).collect(),
    }
}

/// Handler for Discord gateway events.
pub struct DiscordHandler {
    relay: Arc<Relay>,
    shutdown: CancellationToken,
    relay_timeout: Duration,
}

impl DiscordHandler {
    /// Create a handler feeding `relay`
    #[must_use]
    pub const fn new(relay: Arc<Relay>, relay_timeout: Duration, shutdown: CancellationToken) -> Self {
        Self {
            relay,
            shutdown,
            relay_timeout,
        }
    }
}

#[async_trait]
impl EventHandler for DiscordHandler {
    async fn ready(&self, _ctx: Context, ready: Ready) {
        info!(
            bot_name = %ready.user.name,
            guilds = ready.guilds.len(),
            channels = self.relay.options().allowed_channels.len(),
            "Discord bot ready"
        );
    }

    async fn message(&self, _ctx: Context, msg: Message) {
        let event = inbound_from_discord(&msg);
        if !self.relay.accepts(&event) {
            return;
        }
        debug!(
            message_id = msg.id.get(),
            channel_id = event.channel_id,
            attachments = event.attachments.len(),
            preview = %truncate_str(&event.text, 40),
            "Relaying message"
        );

        // One task per event; the gateway loop never waits on delivery
        tokio::spawn(run_relay_task(
            Arc::clone(&self.relay),
            event,
            self.relay_timeout,
            self.shutdown.clone(),
        ));
    }
}

/// Connect to the Discord gateway and relay messages until `shutdown` fires.
///
/// # Errors
///
/// Returns an error if the client cannot be built or the gateway connection
/// fails.
pub async fn run(
    token: &str,
    relay: Arc<Relay>,
    relay_timeout: Duration,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    let handler = DiscordHandler::new(relay, relay_timeout, shutdown.clone());
    let mut client = Client::builder(token, intents())
        .event_handler(handler)
        .await
        .context("Failed to create Discord client")?;

    let shard_manager = Arc::clone(&client.shard_manager);
    tokio::spawn(async move {
        shutdown.cancelled().await;
        info!("Shutting down Discord gateway");
        shard_manager.shutdown_all().await;
    });

    client
        .start()
        .await
        .context("Discord gateway connection failed")
}

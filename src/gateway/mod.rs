//! Inbound side of the relay.
//!
//! Defines the platform-neutral message event the relay consumes and the
//! task wrapper that runs one relay operation per event.

/// Discord gateway adapter (serenity).
pub mod discord;

use crate::relay::{Relay, RelayReport};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Kind of an inbound message, reduced to what the relay cares about
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    /// Ordinary channel message
    Default,
    /// Inline reply to another message
    Reply,
    /// System message announcing a new thread
    ThreadStarter,
    /// Any other system message
    Other,
}

/// Metadata of one attachment as reported by the source platform
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentMeta {
    /// Remote download URL
    pub url: String,
    /// Original filename
    pub filename: String,
    /// Declared MIME type, empty when unknown
    pub content_type: String,
    /// Declared size in bytes
    pub size: u64,
}

/// A message event received from the source platform
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    /// Whether the author is a bot account
    pub author_is_bot: bool,
    /// Channel the message was posted in
    pub channel_id: u64,
    /// Message kind
    pub kind: MessageKind,
    /// Message text, possibly empty
    pub text: String,
    /// Attachments in posting order
    pub attachments: Vec<AttachmentMeta>,
}

/// Runs one relay operation as an independent task body.
///
/// The operation is bounded by `timeout` and aborted when `shutdown` fires.
/// Aborting drops the relay future, which releases its staging directory.
/// Returns the report when the operation ran to completion.
pub async fn run_relay_task(
    relay: Arc<Relay>,
    event: InboundMessage,
    timeout: Duration,
    shutdown: CancellationToken,
) -> Option<RelayReport> {
    let channel_id = event.channel_id;
    tokio::select! {
        () = shutdown.cancelled() => {
            warn!(channel_id, "Relay aborted by shutdown");
            None
        }
        result = tokio::time::timeout(timeout, relay.handle(&event)) => match result {
            Ok(Ok(report)) => {
                info!(
                    channel_id,
                    delivered = report.delivered_count(),
                    skipped = report.skipped_count(),
                    failed = report.failed_count(),
                    fetch_failures = report.fetch_failures,
                    text_delivered = report.text_delivered,
                    "Relay finished"
                );
                Some(report)
            }
            Ok(Err(e)) => {
                error!(channel_id, error = %e, "Relay failed");
                None
            }
            Err(_) => {
                warn!(channel_id, timeout_secs = timeout.as_secs(), "Relay timed out");
                None
            }
        }
    }
}

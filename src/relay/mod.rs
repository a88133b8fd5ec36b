//! Relay pipeline: staging, fetching, classification, planning and delivery.
//!
//! [`Relay::handle`] drives one inbound message through the stages:
//!
//! ```text
//! Idle -> Fetching -> Classifying -> Planning -> Delivering -> CleaningUp -> Idle
//! ```

/// Attachment to media kind mapping
pub mod classify;
/// Plan execution against the destination
pub mod delivery;
/// Error types of the pipeline stages
pub mod error;
/// Concurrent attachment downloads
pub mod fetcher;
/// Limit enforcement and batching
pub mod planner;
/// Per-operation temporary storage
pub mod staging;
/// Data model
pub mod types;

pub use delivery::{DeliveryEngine, DeliveryOptions, DeliveryReport};
pub use error::{DeliveryError, FetchError, RelayError, StagingError};
pub use fetcher::{AttachmentFetcher, FetchBatch};
pub use planner::{DeliveryPlan, DocumentCaptionPolicy, MediaPlan, PlannerLimits};
pub use staging::{StagingHandle, StagingStore};
pub use types::{
    AttachmentDescriptor, ClassifiedItem, ItemOutcome, MediaKind, RelayOutcome, SkipReason,
};

use crate::config::Settings;
use crate::destination::Destination;
use crate::gateway::{InboundMessage, MessageKind};
use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Stage of a relay operation, for tracing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayState {
    /// Waiting for work
    Idle,
    /// Downloading attachments
    Fetching,
    /// Resolving media kinds
    Classifying,
    /// Building the delivery plan
    Planning,
    /// Sending to the destination
    Delivering,
    /// Releasing staged files
    CleaningUp,
}

impl fmt::Display for RelayState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Fetching => "fetching",
            Self::Classifying => "classifying",
            Self::Planning => "planning",
            Self::Delivering => "delivering",
            Self::CleaningUp => "cleaning_up",
        };
        f.write_str(name)
    }
}

/// Everything the relay needs besides the destination
#[derive(Debug, Clone)]
pub struct RelayOptions {
    /// Source channels whose messages are relayed
    pub allowed_channels: HashSet<u64>,
    /// Root of the per-operation staging directories
    pub staging_root: PathBuf,
    /// Timeout of one attachment download
    pub fetch_timeout: Duration,
    /// Destination limits
    pub limits: PlannerLimits,
    /// Document caption behavior
    pub caption_policy: DocumentCaptionPolicy,
    /// Delivery engine tunables
    pub delivery: DeliveryOptions,
}

impl RelayOptions {
    /// Build options from loaded settings
    #[must_use]
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            allowed_channels: settings.allowed_channels(),
            staging_root: PathBuf::from(&settings.temp_dir),
            fetch_timeout: settings.fetch_timeout(),
            limits: settings.planner_limits(),
            caption_policy: settings.document_caption_policy,
            delivery: DeliveryOptions::default(),
        }
    }
}

/// Summary of one relay operation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelayReport {
    /// Per-attachment outcomes
    pub outcomes: Vec<ItemOutcome>,
    /// Attachments that could not be downloaded
    pub fetch_failures: usize,
    /// Whether the message text reached the destination
    pub text_delivered: bool,
    /// Whether attachments were sent by URL because no download succeeded
    pub used_url_fallback: bool,
    /// Staged paths that could not be removed
    pub cleanup_failures: usize,
}

impl RelayReport {
    fn count(&self, pred: impl Fn(&RelayOutcome) -> bool) -> usize {
        self.outcomes.iter().filter(|o| pred(&o.outcome)).count()
    }

    /// Attachments accepted by the destination
    #[must_use]
    pub fn delivered_count(&self) -> usize {
        self.count(|o| matches!(o, RelayOutcome::Delivered))
    }

    /// Attachments not attempted because of limits
    #[must_use]
    pub fn skipped_count(&self) -> usize {
        self.count(|o| matches!(o, RelayOutcome::Skipped(_)))
    }

    /// Attachments the destination rejected
    #[must_use]
    pub fn failed_count(&self) -> usize {
        self.count(|o| matches!(o, RelayOutcome::FailedIndividually(_)))
    }
}

fn transition(channel_id: u64, from: RelayState, to: RelayState) -> RelayState {
    debug!(channel_id, from = %from, to = %to, "Relay state change");
    to
}

/// Relays source messages to the destination.
///
/// Shared immutably between all in-flight operations.
pub struct Relay {
    options: RelayOptions,
    staging: StagingStore,
    fetcher: AttachmentFetcher,
    destination: Arc<dyn Destination>,
}

impl Relay {
    /// Create a relay sending to `destination`
    #[must_use]
    pub fn new(options: RelayOptions, destination: Arc<dyn Destination>) -> Self {
        let fetcher = AttachmentFetcher::new(options.fetch_timeout);
        Self::with_fetcher(options, destination, fetcher)
    }

    /// Create a relay with a preconfigured fetcher
    #[must_use]
    pub fn with_fetcher(
        options: RelayOptions,
        destination: Arc<dyn Destination>,
        fetcher: AttachmentFetcher,
    ) -> Self {
        Self {
            staging: StagingStore::new(options.staging_root.clone()),
            options,
            fetcher,
            destination,
        }
    }

    /// Options this relay was built with
    #[must_use]
    pub const fn options(&self) -> &RelayOptions {
        &self.options
    }

    /// Whether an inbound message should be relayed at all
    #[must_use]
    pub fn accepts(&self, event: &InboundMessage) -> bool {
        if event.author_is_bot {
            debug!(channel_id = event.channel_id, "Ignoring bot message");
            return false;
        }
        if !self.options.allowed_channels.contains(&event.channel_id) {
            debug!(channel_id = event.channel_id, "Ignoring message from unlisted channel");
            return false;
        }
        if event.kind == MessageKind::ThreadStarter {
            debug!(channel_id = event.channel_id, "Ignoring thread starter message");
            return false;
        }
        true
    }

    /// Relay one message: text, attachments, or both.
    ///
    /// Attachment-level problems are folded into the report. Staged files are
    /// removed before returning, and also when the returned future is dropped.
    ///
    /// # Errors
    ///
    /// - `RelayError::Staging` if no staging directory can be created
    /// - `RelayError::Destination` if a text-only message cannot be sent
    pub async fn handle(&self, event: &InboundMessage) -> Result<RelayReport, RelayError> {
        let channel_id = event.channel_id;
        let engine = DeliveryEngine::new(self.destination.as_ref(), self.options.delivery);
        let has_text = !event.text.trim().is_empty();

        if event.attachments.is_empty() {
            if !has_text {
                debug!(channel_id, "Nothing to relay");
                return Ok(RelayReport::default());
            }
            engine.send_text(&event.text).await?;
            info!(channel_id, "Relayed text message");
            return Ok(RelayReport {
                text_delivered: true,
                ..RelayReport::default()
            });
        }

        let staging = self.staging.acquire().await?;
        let mut state = transition(channel_id, RelayState::Idle, RelayState::Fetching);

        let batch = self.fetcher.fetch_all(&event.attachments, &staging).await;
        let fetch_failures = batch.failures.len();
        let used_url_fallback = batch.descriptors.is_empty();
        let descriptors = if used_url_fallback {
            warn!(
                channel_id,
                attachments = event.attachments.len(),
                "No attachment could be downloaded, sending by URL"
            );
            event
                .attachments
                .iter()
                .map(AttachmentDescriptor::remote)
                .collect()
        } else {
            batch.descriptors
        };

        state = transition(channel_id, state, RelayState::Classifying);
        let items = classify::classify_all(descriptors, &event.text);

        state = transition(channel_id, state, RelayState::Planning);
        let plan = planner::plan(
            items,
            &event.text,
            &self.options.limits,
            self.options.caption_policy,
        );

        state = transition(channel_id, state, RelayState::Delivering);
        let delivery = engine.deliver(&plan).await;

        let mut text_delivered = delivery.text_delivered;
        if has_text && !text_delivered && plan.leading_text.is_none() {
            info!(channel_id, "Message text not delivered with attachments, sending it alone");
            match engine.send_text(&event.text).await {
                Ok(()) => text_delivered = true,
                Err(e) => warn!(channel_id, error = %e, "Failed to send message text"),
            }
        }

        state = transition(channel_id, state, RelayState::CleaningUp);
        let cleanup_failures = staging.release().await;
        transition(channel_id, state, RelayState::Idle);

        Ok(RelayReport {
            outcomes: delivery.outcomes,
            fetch_failures,
            text_delivered,
            used_url_fallback,
            cleanup_failures,
        })
    }
}

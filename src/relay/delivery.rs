//! Execution of a [`DeliveryPlan`] against a [`Destination`].

use super::error::DeliveryError;
use super::planner::{DeliveryPlan, MediaPlan};
use super::types::{ClassifiedItem, ItemOutcome, MediaKind, RelayOutcome};
use crate::config::TELEGRAM_MESSAGE_LIMIT;
use crate::destination::{Destination, DestinationError, OutboundMedia};
use crate::utils::split_long_message;
use tracing::{debug, info, warn};

/// Tunables of the delivery engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryOptions {
    /// Retry a failed photo/video/animation once as a plain document
    pub document_fallback: bool,
}

impl Default for DeliveryOptions {
    fn default() -> Self {
        Self {
            document_fallback: true,
        }
    }
}

/// What happened while executing one plan
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    /// Per-attachment outcomes: sent items in send order, then skipped ones
    pub outcomes: Vec<ItemOutcome>,
    /// Whether the message text reached the destination
    pub text_delivered: bool,
}

/// Sends planned batches, isolating failures per item
pub struct DeliveryEngine<'a> {
    destination: &'a dyn Destination,
    options: DeliveryOptions,
}

impl<'a> DeliveryEngine<'a> {
    /// Create an engine sending through `destination`
    #[must_use]
    pub fn new(destination: &'a dyn Destination, options: DeliveryOptions) -> Self {
        Self {
            destination,
            options,
        }
    }

    /// Send `text` as one or more plain messages within the length limit.
    ///
    /// # Errors
    ///
    /// Returns the first `DestinationError`; later parts are not sent.
    pub async fn send_text(&self, text: &str) -> Result<(), DestinationError> {
        let parts = split_long_message(text, TELEGRAM_MESSAGE_LIMIT);
        // Telegram rejects messages that are only whitespace
        for part in parts.iter().filter(|p| !p.trim().is_empty()) {
            self.destination.send_text(part).await?;
        }
        Ok(())
    }

    /// Execute `plan`: leading text, then media, then documents.
    ///
    /// Never fails as a whole; every problem ends up in the report.
    pub async fn deliver(&self, plan: &DeliveryPlan) -> DeliveryReport {
        let mut report = DeliveryReport::default();

        if let Some(text) = &plan.leading_text {
            match self.send_text(text).await {
                Ok(()) => report.text_delivered = true,
                Err(e) => warn!(error = %e, "Failed to send message text"),
            }
        }

        match &plan.media {
            MediaPlan::None => {}
            MediaPlan::Single(item) => self.send_each(std::slice::from_ref(item), &mut report).await,
            MediaPlan::Group(items) => self.send_group(items, &mut report).await,
            MediaPlan::Individual(items) => self.send_each(items, &mut report).await,
        }

        self.send_each(&plan.documents, &mut report).await;

        for (descriptor, reason) in &plan.skipped {
            report.outcomes.push(ItemOutcome::new(
                descriptor.filename(),
                RelayOutcome::Skipped(reason.clone()),
            ));
        }
        report
    }

    async fn send_group(&self, items: &[ClassifiedItem], report: &mut DeliveryReport) {
        let media: Vec<OutboundMedia> = items.iter().map(OutboundMedia::from_item).collect();
        match self.destination.send_media_group(&media).await {
            Ok(()) => {
                info!(items = items.len(), "Sent media group");
                report.text_delivered |= items.iter().any(|item| item.caption().is_some());
                report.outcomes.extend(
                    items
                        .iter()
                        .map(|item| ItemOutcome::new(item.descriptor().filename(), RelayOutcome::Delivered)),
                );
            }
            Err(source) => {
                let err = DeliveryError::GroupRejected {
                    items: items.len(),
                    source,
                };
                warn!(error = %err, "Falling back to individual sends");
                self.send_each(items, report).await;
            }
        }
    }

    async fn send_each(&self, items: &[ClassifiedItem], report: &mut DeliveryReport) {
        for item in items {
            let outcome = self.send_single(item).await;
            if outcome == RelayOutcome::Delivered && item.caption().is_some() {
                report.text_delivered = true;
            }
            report
                .outcomes
                .push(ItemOutcome::new(item.descriptor().filename(), outcome));
        }
    }

    async fn send_single(&self, item: &ClassifiedItem) -> RelayOutcome {
        let media = OutboundMedia::from_item(item);
        let filename = media.filename.clone();

        let result = match self.dispatch(&media).await {
            Err(e) if self.options.document_fallback && media.kind.is_media() => {
                info!(
                    filename = %filename,
                    kind = %media.kind,
                    error = %e,
                    "Send failed, retrying as document"
                );
                self.destination.send_document(&media.as_document()).await
            }
            other => other,
        };

        match result {
            Ok(()) => {
                debug!(filename = %filename, kind = %item.kind(), "Sent attachment");
                RelayOutcome::Delivered
            }
            Err(source) => {
                let err = DeliveryError::SingleSendFailed { filename, source };
                warn!(error = %err, "Attachment not delivered");
                RelayOutcome::FailedIndividually(err.to_string())
            }
        }
    }

    async fn dispatch(&self, media: &OutboundMedia) -> Result<(), DestinationError> {
        match media.kind {
            MediaKind::Photo => self.destination.send_photo(media).await,
            MediaKind::Video => self.destination.send_video(media).await,
            MediaKind::Animation => self.destination.send_animation(media).await,
            MediaKind::Document => self.destination.send_document(media).await,
        }
    }
}

//! Outbound side of the relay.
//!
//! The destination chat platform is reached through the [`Destination`]
//! trait so the relay can be driven against a fake in tests.

/// Telegram implementation backed by teloxide.
pub mod telegram;

use crate::relay::{ClassifiedItem, MediaKind};
use async_trait::async_trait;
use std::path::PathBuf;
use thiserror::Error;

pub use telegram::TelegramDestination;

/// Errors returned by a destination send call
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DestinationError {
    /// The destination API rejected the request
    #[error("API error: {0}")]
    Api(String),
    /// The request did not reach the destination
    #[error("Network error: {0}")]
    Network(String),
    /// The request could not be built
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl DestinationError {
    /// Whether retrying the same request may succeed
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Network(_))
    }
}

/// Where the destination reads media bytes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaSource {
    /// A staged local file
    File(PathBuf),
    /// A remote URL the destination downloads itself
    Url(String),
}

/// One media item ready to be handed to the destination
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMedia {
    /// How the destination should present the item
    pub kind: MediaKind,
    /// Where the bytes come from
    pub source: MediaSource,
    /// Filename shown to recipients
    pub filename: String,
    /// Caption, if any
    pub caption: Option<String>,
    /// Blur until opened
    pub spoiler: bool,
}

impl OutboundMedia {
    /// Build the outbound form of a classified item
    #[must_use]
    pub fn from_item(item: &ClassifiedItem) -> Self {
        let descriptor = item.descriptor();
        Self {
            kind: item.kind(),
            source: descriptor.media_source(),
            filename: descriptor.filename().to_string(),
            caption: item.caption().map(ToString::to_string),
            spoiler: descriptor.has_spoiler(),
        }
    }

    /// Same media presented as a generic document
    #[must_use]
    pub fn as_document(&self) -> Self {
        Self {
            kind: MediaKind::Document,
            spoiler: false,
            ..self.clone()
        }
    }
}

/// Interface for the destination chat platform's send API
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Destination: Send + Sync {
    /// Send a plain text message
    async fn send_text(&self, text: &str) -> Result<(), DestinationError>;
    /// Send one photo
    async fn send_photo(&self, media: &OutboundMedia) -> Result<(), DestinationError>;
    /// Send one video
    async fn send_video(&self, media: &OutboundMedia) -> Result<(), DestinationError>;
    /// Send one animation
    async fn send_animation(&self, media: &OutboundMedia) -> Result<(), DestinationError>;
    /// Send one generic document
    async fn send_document(&self, media: &OutboundMedia) -> Result<(), DestinationError>;
    /// Send 2–10 photos/videos/animations as one grouped message
    async fn send_media_group(&self, items: &[OutboundMedia]) -> Result<(), DestinationError>;
}

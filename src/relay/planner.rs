//! Partitioning of classified attachments into legal delivery batches.

use super::types::{AttachmentDescriptor, ClassifiedItem, MediaKind, SkipReason};
use crate::config::{
    TELEGRAM_CAPTION_LIMIT, TELEGRAM_MEDIA_GROUP_MAX, TELEGRAM_MEDIA_MAX_BYTES,
    TELEGRAM_PHOTO_MAX_BYTES,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Destination limits the planner enforces before anything is sent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlannerLimits {
    /// Larger photos are demoted to documents
    pub photo_max_bytes: u64,
    /// Larger videos are skipped
    pub video_max_bytes: u64,
    /// Larger documents and animations are skipped
    pub document_max_bytes: u64,
    /// Maximum items per media group
    pub group_max_items: usize,
    /// Texts longer than this many UTF-16 code units are sent separately
    /// instead of as captions
    pub caption_max_chars: usize,
}

impl Default for PlannerLimits {
    fn default() -> Self {
        Self {
            photo_max_bytes: TELEGRAM_PHOTO_MAX_BYTES,
            video_max_bytes: TELEGRAM_MEDIA_MAX_BYTES,
            document_max_bytes: TELEGRAM_MEDIA_MAX_BYTES,
            group_max_items: TELEGRAM_MEDIA_GROUP_MAX,
            caption_max_chars: TELEGRAM_CAPTION_LIMIT,
        }
    }
}

/// Which documents carry the message text
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentCaptionPolicy {
    /// Every document repeats the message text
    #[default]
    Repeat,
    /// Only a document that is the message's first attachment carries it
    FirstOnly,
}

/// How the media part of a message is sent
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum MediaPlan {
    /// No photos, videos or animations
    #[default]
    None,
    /// One item, sent with the message caption
    Single(ClassifiedItem),
    /// 2..=group limit items in one grouped send
    Group(Vec<ClassifiedItem>),
    /// Too many items for one group, sent one by one
    Individual(Vec<ClassifiedItem>),
}

impl MediaPlan {
    /// Items covered by this plan, in send order
    #[must_use]
    pub fn items(&self) -> &[ClassifiedItem] {
        match self {
            Self::None => &[],
            Self::Single(item) => std::slice::from_ref(item),
            Self::Group(items) | Self::Individual(items) => items,
        }
    }
}

/// Everything to send for one message, in order
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DeliveryPlan {
    /// Text sent as its own message before any media
    pub leading_text: Option<String>,
    /// Photo/video/animation sends
    pub media: MediaPlan,
    /// Document sends, one per item
    pub documents: Vec<ClassifiedItem>,
    /// Attachments dropped by limit enforcement
    pub skipped: Vec<(AttachmentDescriptor, SkipReason)>,
}

impl DeliveryPlan {
    /// Whether nothing at all would be sent
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.leading_text.is_none() && self.media.items().is_empty() && self.documents.is_empty()
    }
}

/// Apply size limits to one item: demote big photos, drop what cannot be sent.
fn enforce_limits(item: ClassifiedItem, limits: &PlannerLimits) -> Result<ClassifiedItem, SkipReason> {
    let size = item.descriptor().effective_size();
    let too_large = |limit: u64| SkipReason::TooLarge { size, limit };

    match item.kind() {
        MediaKind::Photo if size > limits.photo_max_bytes => {
            if size > limits.document_max_bytes {
                return Err(too_large(limits.document_max_bytes));
            }
            info!(
                filename = %item.descriptor().filename(),
                size,
                "Photo exceeds photo limit, sending as document"
            );
            Ok(item.with_kind(MediaKind::Document))
        }
        MediaKind::Video if size > limits.video_max_bytes => Err(too_large(limits.video_max_bytes)),
        MediaKind::Animation | MediaKind::Document if size > limits.document_max_bytes => {
            Err(too_large(limits.document_max_bytes))
        }
        _ => Ok(item),
    }
}

/// Build the delivery plan for one message.
///
/// `items` must be in attachment order, with at most the first one
/// captioned (see [`super::classify::classify_all`]).
#[must_use]
pub fn plan(
    items: Vec<ClassifiedItem>,
    text: &str,
    limits: &PlannerLimits,
    policy: DocumentCaptionPolicy,
) -> DeliveryPlan {
    let has_text = !text.trim().is_empty();
    let caption_overflows = text.encode_utf16().count() > limits.caption_max_chars;
    let message_caption = (has_text && !caption_overflows).then(|| text.to_string());

    let mut survivors = Vec::with_capacity(items.len());
    let mut skipped = Vec::new();
    let mut dropped_caption = None;
    for item in items {
        let caption = item.caption().map(ToString::to_string);
        match enforce_limits(item.clone(), limits) {
            Ok(item) => survivors.push(item),
            Err(reason) => {
                info!(
                    filename = %item.descriptor().filename(),
                    reason = %reason,
                    "Skipping attachment"
                );
                if caption.is_some() {
                    dropped_caption = caption;
                }
                skipped.push((item.descriptor().clone(), reason));
            }
        }
    }

    // The caption travels with the first attachment that is actually sent
    if let Some(caption) = dropped_caption {
        if let Some(first) = survivors.first_mut() {
            *first = first.clone().with_caption(Some(caption));
        }
    }

    if caption_overflows {
        survivors = survivors
            .into_iter()
            .map(|item| item.with_caption(None))
            .collect();
    }

    let (media, documents): (Vec<_>, Vec<_>) =
        survivors.into_iter().partition(|item| item.kind().is_media());

    let documents: Vec<ClassifiedItem> = match policy {
        DocumentCaptionPolicy::Repeat => documents
            .into_iter()
            .map(|item| item.with_caption(message_caption.clone()))
            .collect(),
        DocumentCaptionPolicy::FirstOnly => documents,
    };

    let media = match media.len() {
        0 => MediaPlan::None,
        1 => {
            let mut media = media;
            let item = media.remove(0).with_caption(message_caption.clone());
            MediaPlan::Single(item)
        }
        n if n <= limits.group_max_items => MediaPlan::Group(media),
        _ => MediaPlan::Individual(media),
    };

    let leading_text = if has_text
        && (caption_overflows || (media.items().is_empty() && documents.is_empty()))
    {
        Some(text.to_string())
    } else {
        None
    };

    let plan = DeliveryPlan {
        leading_text,
        media,
        documents,
        skipped,
    };
    debug!(
        leading_text = plan.leading_text.is_some(),
        media = plan.media.items().len(),
        documents = plan.documents.len(),
        skipped = plan.skipped.len(),
        "Planned delivery"
    );
    plan
}

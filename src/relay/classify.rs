//! Mapping of attachments onto destination media kinds.

use super::types::{AttachmentDescriptor, ClassifiedItem, MediaKind};

/// Extensions always treated as animations, whatever the declared type says
static ANIMATION_EXTENSIONS: &[&str] = &["gif", "webm"];

/// Lowercased substring after the last `.` of `filename`, empty if there is none.
#[must_use]
pub fn extension(filename: &str) -> String {
    filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_lowercase())
        .unwrap_or_default()
}

/// Resolve the destination media kind of an attachment.
///
/// First match wins: animated extensions, then `image` content types,
/// then `video` content types, then documents.
#[must_use]
pub fn classify(descriptor: &AttachmentDescriptor) -> MediaKind {
    let ext = extension(descriptor.filename());
    let content_type = descriptor.declared_content_type().to_ascii_lowercase();

    if ANIMATION_EXTENSIONS.contains(&ext.as_str()) {
        MediaKind::Animation
    } else if content_type.contains("image") {
        MediaKind::Photo
    } else if content_type.contains("video") {
        MediaKind::Video
    } else {
        MediaKind::Document
    }
}

/// Classify a message's attachments, captioning the first one with `text`.
#[must_use]
pub fn classify_all(descriptors: Vec<AttachmentDescriptor>, text: &str) -> Vec<ClassifiedItem> {
    let caption = (!text.trim().is_empty()).then(|| text.to_string());
    descriptors
        .into_iter()
        .enumerate()
        .map(|(i, descriptor)| {
            let kind = classify(&descriptor);
            let caption = if i == 0 { caption.clone() } else { None };
            ClassifiedItem::new(descriptor, kind, caption)
        })
        .collect()
}

//! Data model shared by the relay pipeline stages.

use crate::config::SPOILER_PREFIX;
use crate::destination::MediaSource;
use crate::gateway::AttachmentMeta;
use std::fmt;
use std::path::{Path, PathBuf};

/// One inbound attachment, resolved for delivery.
///
/// The source URL, filename and declared content type never change after
/// construction. A staged descriptor always points at an existing, non-empty
/// file inside the staging directory of the relay operation that created it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentDescriptor {
    source_url: String,
    local_path: Option<PathBuf>,
    filename: String,
    declared_content_type: String,
    declared_size: u64,
    has_spoiler: bool,
    size_on_disk: u64,
}

impl AttachmentDescriptor {
    /// Descriptor for an attachment whose bytes were written to `local_path`.
    #[must_use]
    pub fn staged(meta: &AttachmentMeta, local_path: PathBuf, size_on_disk: u64) -> Self {
        Self {
            local_path: Some(local_path),
            size_on_disk,
            ..Self::remote(meta)
        }
    }

    /// Descriptor that references the attachment by URL only.
    ///
    /// Used when nothing could be staged; the declared size stands in for
    /// the size on disk.
    #[must_use]
    pub fn remote(meta: &AttachmentMeta) -> Self {
        Self {
            source_url: meta.url.clone(),
            local_path: None,
            filename: meta.filename.clone(),
            declared_content_type: meta.content_type.clone(),
            declared_size: meta.size,
            has_spoiler: meta.filename.starts_with(SPOILER_PREFIX),
            size_on_disk: 0,
        }
    }

    /// Remote location of the attachment
    #[must_use]
    pub fn source_url(&self) -> &str {
        &self.source_url
    }

    /// Staging location, if the bytes were fetched
    #[must_use]
    pub fn local_path(&self) -> Option<&Path> {
        self.local_path.as_deref()
    }

    /// Original filename
    #[must_use]
    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// Declared MIME type, possibly empty
    #[must_use]
    pub fn declared_content_type(&self) -> &str {
        &self.declared_content_type
    }

    /// Size reported by the source platform
    #[must_use]
    pub const fn declared_size(&self) -> u64 {
        self.declared_size
    }

    /// Whether the media should be blurred until opened
    #[must_use]
    pub const fn has_spoiler(&self) -> bool {
        self.has_spoiler
    }

    /// Bytes actually written to the staging file
    #[must_use]
    pub const fn size_on_disk(&self) -> u64 {
        self.size_on_disk
    }

    /// Size used for limit checks: on-disk size when staged, declared otherwise
    #[must_use]
    pub const fn effective_size(&self) -> u64 {
        if self.local_path.is_some() {
            self.size_on_disk
        } else {
            self.declared_size
        }
    }

    /// Where the destination should read the media from
    #[must_use]
    pub fn media_source(&self) -> MediaSource {
        self.local_path.as_ref().map_or_else(
            || MediaSource::Url(self.source_url.clone()),
            |path| MediaSource::File(path.clone()),
        )
    }
}

/// Destination media kind of an attachment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    /// GIF or WebM, played as a looping animation
    Animation,
    /// Still image
    Photo,
    /// Video clip
    Video,
    /// Anything else, sent as a generic file
    Document,
}

impl MediaKind {
    /// Whether the kind can take part in a media group
    #[must_use]
    pub const fn is_media(self) -> bool {
        !matches!(self, Self::Document)
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Animation => "animation",
            Self::Photo => "photo",
            Self::Video => "video",
            Self::Document => "document",
        };
        f.write_str(name)
    }
}

/// An attachment paired with its media kind and optional caption
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedItem {
    descriptor: AttachmentDescriptor,
    kind: MediaKind,
    caption: Option<String>,
}

impl ClassifiedItem {
    /// Create a classified item
    #[must_use]
    pub const fn new(
        descriptor: AttachmentDescriptor,
        kind: MediaKind,
        caption: Option<String>,
    ) -> Self {
        Self {
            descriptor,
            kind,
            caption,
        }
    }

    /// The underlying attachment
    #[must_use]
    pub const fn descriptor(&self) -> &AttachmentDescriptor {
        &self.descriptor
    }

    /// Resolved media kind
    #[must_use]
    pub const fn kind(&self) -> MediaKind {
        self.kind
    }

    /// Caption carried by this item
    #[must_use]
    pub fn caption(&self) -> Option<&str> {
        self.caption.as_deref()
    }

    /// Same item with a different caption
    #[must_use]
    pub fn with_caption(self, caption: Option<String>) -> Self {
        Self { caption, ..self }
    }

    /// Same item reclassified as `kind`
    #[must_use]
    pub fn with_kind(self, kind: MediaKind) -> Self {
        Self { kind, ..self }
    }
}

/// Why an attachment was not sent
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// Exceeds the destination's size limit for its kind
    TooLarge {
        /// Attachment size in bytes
        size: u64,
        /// Applicable limit in bytes
        limit: u64,
    },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooLarge { size, limit } => {
                write!(f, "too large ({size} bytes, limit {limit} bytes)")
            }
        }
    }
}

/// Result of relaying one attachment
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayOutcome {
    /// Accepted by the destination
    Delivered,
    /// Not attempted
    Skipped(SkipReason),
    /// Attempted and rejected
    FailedIndividually(String),
}

/// Outcome of one attachment, keyed by filename
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemOutcome {
    /// Attachment filename
    pub filename: String,
    /// What happened to it
    pub outcome: RelayOutcome,
}

impl ItemOutcome {
    /// Create an outcome record
    #[must_use]
    pub fn new(filename: impl Into<String>, outcome: RelayOutcome) -> Self {
        Self {
            filename: filename.into(),
            outcome,
        }
    }
}

use crate::destination::DestinationError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while downloading an attachment
#[derive(Debug, Error)]
pub enum FetchError {
    /// The server answered with something other than 200 OK
    #[error("Unexpected HTTP status: {status}")]
    BadStatus {
        /// HTTP status code
        status: u16,
    },
    /// The staged file is missing or empty after the download
    #[error("Downloaded file is empty or missing: {}", path.display())]
    EmptyWrite {
        /// Staging path that was checked
        path: PathBuf,
    },
    /// Connection, timeout or body read failure
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    /// Local file system failure while writing the staged file
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised while executing a delivery plan.
///
/// These never abort a relay operation; they are logged and folded into
/// per-attachment outcomes.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// The destination refused a grouped send
    #[error("Media group of {items} items rejected: {source}")]
    GroupRejected {
        /// Number of items in the group
        items: usize,
        /// Destination error
        source: DestinationError,
    },
    /// A single send failed
    #[error("Sending {filename} failed: {source}")]
    SingleSendFailed {
        /// Attachment filename
        filename: String,
        /// Destination error
        source: DestinationError,
    },
    /// A staged file could not be removed
    #[error("Failed to remove staged file {}: {source}", path.display())]
    StagingCleanupFailed {
        /// Path that could not be removed
        path: PathBuf,
        /// Underlying IO error
        source: std::io::Error,
    },
}

/// Errors that can occur while creating a staging directory
#[derive(Debug, Error)]
pub enum StagingError {
    /// The per-event directory could not be created
    #[error("Failed to create staging directory {}: {source}", path.display())]
    CreateDir {
        /// Directory that could not be created
        path: PathBuf,
        /// Underlying IO error
        source: std::io::Error,
    },
}

/// Message-level errors; they end the relay of one message only
#[derive(Debug, Error)]
pub enum RelayError {
    /// Staging could not be set up
    #[error("Staging error: {0}")]
    Staging(#[from] StagingError),
    /// A text-only message could not be sent
    #[error("Destination error: {0}")]
    Destination(#[from] DestinationError),
}

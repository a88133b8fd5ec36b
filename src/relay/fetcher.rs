//! Attachment download into the staging directory.

use super::error::FetchError;
use super::staging::StagingHandle;
use super::types::AttachmentDescriptor;
use crate::gateway::AttachmentMeta;
use futures_util::future::join_all;
use futures_util::StreamExt;
use reqwest::{Client, StatusCode};
use std::io::ErrorKind;
use std::path::Path;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

/// Result of fetching every attachment of one message
#[derive(Debug, Default)]
pub struct FetchBatch {
    /// Successfully staged attachments, in input order
    pub descriptors: Vec<AttachmentDescriptor>,
    /// Failed attachments by filename, in input order
    pub failures: Vec<(String, FetchError)>,
}

/// Downloads attachments over HTTP
#[derive(Debug, Clone)]
pub struct AttachmentFetcher {
    client: Client,
    timeout: Duration,
}

impl AttachmentFetcher {
    /// Create a fetcher with its own HTTP client
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self::with_client(Client::new(), timeout)
    }

    /// Create a fetcher around an existing HTTP client
    #[must_use]
    pub const fn with_client(client: Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    /// Download one attachment to `dest` and verify the written file.
    ///
    /// # Errors
    ///
    /// - `FetchError::BadStatus` if the server does not answer 200 OK
    /// - `FetchError::Network` on connection, timeout or body errors
    /// - `FetchError::Io` if the file cannot be written
    /// - `FetchError::EmptyWrite` if the file is missing or empty afterwards
    pub async fn fetch(
        &self,
        meta: &AttachmentMeta,
        dest: &Path,
    ) -> Result<AttachmentDescriptor, FetchError> {
        let response = self
            .client
            .get(&meta.url)
            .timeout(self.timeout)
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(FetchError::BadStatus {
                status: status.as_u16(),
            });
        }

        let mut file = tokio::fs::File::create(dest).await?;
        let mut body = response.bytes_stream();
        while let Some(chunk) = body.next().await {
            file.write_all(&chunk?).await?;
        }
        file.flush().await?;
        drop(file);

        let size_on_disk = match tokio::fs::metadata(dest).await {
            Ok(metadata) => metadata.len(),
            Err(e) if e.kind() == ErrorKind::NotFound => 0,
            Err(e) => return Err(e.into()),
        };
        if size_on_disk == 0 {
            return Err(FetchError::EmptyWrite {
                path: dest.to_path_buf(),
            });
        }

        let descriptor = AttachmentDescriptor::staged(meta, dest.to_path_buf(), size_on_disk);
        info!(
            filename = %descriptor.filename(),
            path = %dest.display(),
            size = size_on_disk,
            declared_size = descriptor.declared_size(),
            "Downloaded attachment"
        );
        Ok(descriptor)
    }

    /// Download all attachments of one message concurrently.
    ///
    /// A failing download never affects the others. Successes and failures
    /// both keep the input order.
    pub async fn fetch_all(
        &self,
        attachments: &[AttachmentMeta],
        staging: &StagingHandle,
    ) -> FetchBatch {
        let downloads = attachments.iter().map(|meta| {
            let dest = staging.reserve(&meta.filename);
            async move { (meta, self.fetch(meta, &dest).await) }
        });

        let mut batch = FetchBatch::default();
        for (meta, result) in join_all(downloads).await {
            match result {
                Ok(descriptor) => batch.descriptors.push(descriptor),
                Err(e) => {
                    warn!(filename = %meta.filename, error = %e, "Failed to download attachment");
                    batch.failures.push((meta.filename.clone(), e));
                }
            }
        }
        batch
    }
}

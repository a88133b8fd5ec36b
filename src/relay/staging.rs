//! Transient local storage for fetched attachment bytes.
//!
//! Every relay operation acquires its own [`StagingHandle`], a unique
//! directory under the configured root. The handle owns every file reserved
//! through it and removes them when released or dropped, so cleanup also
//! happens on early returns, panics and task cancellation.

use super::error::{DeliveryError, StagingError};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use tracing::{debug, warn};
use uuid::Uuid;

const FALLBACK_FILENAME: &str = "attachment";

/// Creates per-operation staging directories under one root
#[derive(Debug, Clone)]
pub struct StagingStore {
    root: PathBuf,
}

impl StagingStore {
    /// Create a store rooted at `root`; nothing is created until `acquire`
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory holding the per-operation directories
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create a fresh, exclusively owned staging directory.
    ///
    /// # Errors
    ///
    /// Returns `StagingError::CreateDir` if the directory cannot be created.
    pub async fn acquire(&self) -> Result<StagingHandle, StagingError> {
        let dir = self.root.join(Uuid::new_v4().as_simple().to_string());
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|source| StagingError::CreateDir {
                path: dir.clone(),
                source,
            })?;
        debug!(dir = %dir.display(), "Acquired staging directory");
        Ok(StagingHandle {
            dir,
            files: Mutex::new(Vec::new()),
            released: false,
        })
    }
}

/// Exclusive staging directory of one relay operation
#[derive(Debug)]
pub struct StagingHandle {
    dir: PathBuf,
    files: Mutex<Vec<PathBuf>>,
    released: bool,
}

impl StagingHandle {
    /// Directory owned by this handle
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Reserve a path for `filename` inside the staging directory.
    ///
    /// Only the final path component of `filename` is used. A name already
    /// reserved through this handle gets a numeric prefix.
    pub fn reserve(&self, filename: &str) -> PathBuf {
        let base = Path::new(filename)
            .file_name()
            .and_then(|name| name.to_str())
            .filter(|name| !name.is_empty())
            .unwrap_or(FALLBACK_FILENAME);

        let mut files = self.files.lock().unwrap_or_else(PoisonError::into_inner);
        let mut candidate = self.dir.join(base);
        let mut n = 1;
        while files.contains(&candidate) {
            candidate = self.dir.join(format!("{n}_{base}"));
            n += 1;
        }
        files.push(candidate.clone());
        candidate
    }

    /// Paths reserved so far, in reservation order
    #[must_use]
    pub fn reserved(&self) -> Vec<PathBuf> {
        self.files
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Remove every reserved file and the directory itself.
    ///
    /// Already-missing files are fine. Other failures are logged and counted,
    /// never retried. Returns the number of paths that could not be removed.
    ///
    /// A path leaves the reservation list only after its removal finished, so
    /// dropping this future part way leaves the rest to `Drop`.
    pub async fn release(mut self) -> usize {
        let mut failures = 0;
        while let Some(path) = self.next_reserved() {
            let result = tokio::fs::remove_file(&path).await;
            self.forget(&path);
            match result {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(source) => {
                    failures += 1;
                    let err = DeliveryError::StagingCleanupFailed { path, source };
                    warn!(error = %err, "Staging cleanup failed");
                }
            }
        }
        match tokio::fs::remove_dir(&self.dir).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(source) => {
                failures += 1;
                let err = DeliveryError::StagingCleanupFailed {
                    path: self.dir.clone(),
                    source,
                };
                warn!(error = %err, "Staging cleanup failed");
            }
        }
        self.released = true;
        debug!(dir = %self.dir.display(), failures, "Released staging directory");
        failures
    }

    fn next_reserved(&self) -> Option<PathBuf> {
        self.files
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .first()
            .cloned()
    }

    fn forget(&self, path: &Path) {
        let mut files = self.files.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(pos) = files.iter().position(|p| p == path) {
            files.remove(pos);
        }
    }

    fn take_files(&self) -> Vec<PathBuf> {
        std::mem::take(&mut *self.files.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

impl Drop for StagingHandle {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        // Not released explicitly: the owning operation returned early,
        // panicked or was cancelled.
        for path in self.take_files() {
            if let Err(e) = std::fs::remove_file(&path) {
                if e.kind() != ErrorKind::NotFound {
                    warn!(path = %path.display(), error = %e, "Staging cleanup on drop failed");
                }
            }
        }
        if let Err(e) = std::fs::remove_dir(&self.dir) {
            if e.kind() != ErrorKind::NotFound {
                warn!(dir = %self.dir.display(), error = %e, "Staging cleanup on drop failed");
            }
        }
    }
}

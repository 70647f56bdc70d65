//! Scratch storage for intermediate pipeline artifacts.
//!
//! One [`TempWorkspace`] is owned by exactly one orchestrator instance.
//! The backing directory is created lazily on first use and removed when
//! the workspace is dropped; individual intermediate files are deleted
//! earlier, as soon as the next stage has consumed them, so a long job
//! never accumulates more than one intermediate at a time.

use crate::error::ConvertError;
use once_cell::sync::OnceCell;
use std::path::Path;
use tempfile::TempDir;
use tracing::debug;

/// Process-scoped scratch directory for one orchestrator.
#[derive(Debug)]
pub struct TempWorkspace {
    dir: OnceCell<TempDir>,
}

impl TempWorkspace {
    pub fn new() -> Self {
        Self {
            dir: OnceCell::new(),
        }
    }

    /// The scratch directory, created on first call.
    pub fn dir(&self) -> Result<&Path, ConvertError> {
        self.dir
            .get_or_try_init(|| {
                let dir = TempDir::with_prefix("zepdf-")
                    .map_err(|e| ConvertError::Internal(format!("tempdir: {e}")))?;
                debug!("created workspace {}", dir.path().display());
                Ok::<_, ConvertError>(dir)
            })
            .map(|d| d.path())
    }

    /// Delete an intermediate that has been consumed. Best-effort: only
    /// files inside the workspace are touched, so a caller-supplied input
    /// can never be removed by accident.
    pub fn discard(&self, path: &Path) {
        let Some(dir) = self.dir.get() else { return };
        if path.starts_with(dir.path()) {
            if std::fs::remove_file(path).is_ok() {
                debug!("discarded intermediate {}", path.display());
            }
        }
    }
}

impl Default for TempWorkspace {
    fn default() -> Self {
        Self::new()
    }
}

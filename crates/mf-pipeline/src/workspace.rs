//! Per-job workspace directories.
//!
//! Every job owns exactly one directory `<root>/<job id>`. Inputs are written
//! there as `input_<index>.<ext>`, the engine writes to
//! `output_<id>.partial.<ext>` and the finished artifact is renamed onto
//! `output_<id>.<ext>`. [`WorkspaceManager::reclaim`] removes everything but
//! the finished artifact.

use std::path::PathBuf;

use mf_core::config::StorageConfig;
use mf_core::{JobId, Result};

const INPUT_PREFIX: &str = "input_";
const PARTIAL_MARKER: &str = ".partial.";

/// Allocates and reclaims job workspaces under a shared root.
#[derive(Debug, Clone)]
pub struct WorkspaceManager {
    root: PathBuf,
    output_extension: String,
}

impl WorkspaceManager {
    pub fn new(root: impl Into<PathBuf>, output_extension: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            output_extension: output_extension.into(),
        }
    }

    pub fn from_config(config: &StorageConfig) -> Self {
        let ext = config.output_extension.trim().trim_start_matches('.');
        Self::new(&config.root, if ext.is_empty() { "mp4" } else { ext })
    }

    /// The directory for `id`. Does not create it.
    pub fn job_dir(&self, id: JobId) -> PathBuf {
        self.root.join(id.to_string())
    }

    /// Create the job directory if needed and return it.
    ///
    /// Calling this again for the same id returns the same directory.
    pub fn acquire(&self, id: JobId) -> Result<PathBuf> {
        let dir = self.job_dir(id);
        std::fs::create_dir_all(&dir)?;
        tracing::debug!(job_id = %id, dir = %dir.display(), "Workspace acquired");
        Ok(dir)
    }

    pub fn input_path(&self, id: JobId, index: usize, ext: &str) -> PathBuf {
        self.job_dir(id).join(format!("{INPUT_PREFIX}{index}.{ext}"))
    }

    /// Final location of the job's artifact.
    pub fn output_path(&self, id: JobId) -> PathBuf {
        self.job_dir(id)
            .join(format!("output_{id}.{}", self.output_extension))
    }

    /// Where the engine writes before the artifact is committed.
    ///
    /// Keeps the real extension last so the engine can infer the container.
    pub fn partial_output_path(&self, id: JobId) -> PathBuf {
        self.job_dir(id)
            .join(format!("output_{id}{PARTIAL_MARKER}{}", self.output_extension))
    }

    /// Delete the transient files of a job and return how many were removed.
    ///
    /// Inputs and partial outputs go; the committed artifact and the
    /// directory stay. A missing directory is not an error, and a file that
    /// cannot be removed is logged and skipped.
    pub fn reclaim(&self, id: JobId) -> usize {
        let dir = self.job_dir(id);
        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return 0,
            Err(e) => {
                tracing::warn!(job_id = %id, error = %e, "Failed to list workspace for cleanup");
                return 0;
            }
        };

        let mut removed = 0;
        for entry in entries.flatten() {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if !is_transient(&name) {
                continue;
            }
            let path = entry.path();
            match std::fs::remove_file(&path) {
                Ok(()) => {
                    tracing::debug!(job_id = %id, file = %path.display(), "Removed transient file");
                    removed += 1;
                }
                Err(e) => {
                    tracing::warn!(
                        job_id = %id,
                        file = %path.display(),
                        error = %e,
                        "Failed to remove transient file"
                    );
                }
            }
        }
        removed
    }

    /// A guard that reclaims the workspace of `id` when dropped.
    pub fn lease(&self, id: JobId) -> WorkspaceLease {
        WorkspaceLease {
            manager: self.clone(),
            id,
            armed: true,
        }
    }
}

fn is_transient(name: &str) -> bool {
    name.starts_with(INPUT_PREFIX) || name.contains(PARTIAL_MARKER)
}

/// Scoped ownership of a job workspace.
///
/// [`WorkspaceLease::release`] reclaims explicitly. If the lease is dropped
/// without being released (for example while a panic unwinds through the
/// run) it reclaims on drop.
#[derive(Debug)]
pub struct WorkspaceLease {
    manager: WorkspaceManager,
    id: JobId,
    armed: bool,
}

impl WorkspaceLease {
    /// Reclaim now and disarm the guard.
    pub fn release(mut self) -> usize {
        self.armed = false;
        self.manager.reclaim(self.id)
    }
}

impl Drop for WorkspaceLease {
    fn drop(&mut self) {
        if self.armed {
            let removed = self.manager.reclaim(self.id);
            tracing::warn!(job_id = %self.id, removed, "Workspace reclaimed by drop guard");
        }
    }
}

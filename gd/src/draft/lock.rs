//! Per-repository lifecycle lock

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use tracing::debug;

use super::DraftError;

pub const LOCK_FILE: &str = "draft.lock";

/// Exclusive advisory lock on `<git-dir>/draft.lock`, released on drop
#[derive(Debug)]
pub struct DraftLock {
    _file: File,
    path: PathBuf,
}

impl DraftLock {
    /// Non-blocking; fails if another git-draft process holds the lock
    pub fn acquire(git_dir: &Path) -> Result<Self, DraftError> {
        let path = git_dir.join(LOCK_FILE);
        debug!(?path, "DraftLock::acquire: called");
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(&path)
            .map_err(|e| DraftError::RepositoryState(format!("cannot open lock file {}: {}", path.display(), e)))?;

        file.try_lock_exclusive().map_err(|_| {
            debug!("DraftLock::acquire: already locked");
            DraftError::RepositoryState(format!(
                "another git-draft operation is running ({})",
                path.display()
            ))
        })?;

        Ok(Self { _file: file, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

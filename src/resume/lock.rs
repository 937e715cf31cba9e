//! Per-collection run lock
//!
//! Advisory exclusive lock (fd-lock) on `<collection>/.dump.lock`. Acquisition
//! never blocks: a second run against the same collection fails immediately.

use super::ResumeError;
use fd_lock::RwLock;
use std::fs::{File, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Held run lock. Released when dropped.
pub struct RunLock {
    // Keeps the file descriptor, and with it the lock, alive.
    _lock: RwLock<File>,
    path: PathBuf,
}

impl RunLock {
    /// Try to take the exclusive lock at `path` without blocking
    pub fn try_acquire(path: &Path) -> Result<Self, ResumeError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ResumeError::IoError(e.to_string()))?;
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .map_err(|e| ResumeError::LockError(format!("Failed to open lock file: {e}")))?;

        let mut lock = RwLock::new(file);
        match lock.try_write() {
            // The guard would unlock on drop; the lock must outlive this call
            // and is released when the file is closed instead.
            Ok(guard) => std::mem::forget(guard),
            Err(e) if e.kind() == ErrorKind::WouldBlock => {
                return Err(ResumeError::Locked(path.to_path_buf()));
            }
            Err(e) => {
                return Err(ResumeError::LockError(format!("Failed to acquire lock: {e}")));
            }
        }

        debug!(path = %path.display(), "Run lock acquired");
        Ok(Self {
            _lock: lock,
            path: path.to_path_buf(),
        })
    }

    /// Lock file path
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        debug!(path = %self.path.display(), "Run lock released");
    }
}

//! Incremental run state
//!
//! - [`watermark`] - Last processed date per collection
//! - [`lock`] - Exclusive run lock per collection

use std::path::PathBuf;

pub mod lock;
pub mod watermark;

pub use lock::RunLock;
pub use watermark::WatermarkTracker;

/// Watermark and lock errors
#[derive(Debug, thiserror::Error)]
pub enum ResumeError {
    /// IO error
    #[error("IO error: {0}")]
    IoError(String),

    /// Lock could not be taken
    #[error("lock error: {0}")]
    LockError(String),

    /// Another run holds the lock
    #[error("another run holds the lock at {}", .0.display())]
    Locked(PathBuf),
}

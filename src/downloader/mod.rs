//! Download pipeline
//!
//! Turns an ordered list of [`FetchTask`]s into files on disk with bounded
//! concurrency and cooperative cancellation.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use articlemeta_dump::downloader::{DownloadExecutor, FetchOptions, FetchTask, SilentProgress};
//! use articlemeta_dump::fetcher::articlemeta::ArticleMetaClient;
//! use articlemeta_dump::shutdown::ShutdownCoordinator;
//! use articlemeta_dump::{DocumentFormat, DocumentId};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = Arc::new(ArticleMetaClient::with_defaults()?);
//! let executor = DownloadExecutor::new(client, ShutdownCoordinator::shared()).with_concurrency(4);
//!
//! let task = FetchTask::new(
//!     DocumentId::new("scl", "S0102-67202000000100001")?,
//!     "./S0102-67202000000100001.json",
//!     DocumentFormat::json(),
//!     FetchOptions::default(),
//! );
//! let summary = executor.execute(vec![task], &SilentProgress).await?;
//! println!("{} written", summary.written);
//! # Ok(())
//! # }
//! ```
//!
//! # Components
//!
//! - [`executor`] - Windowed dispatch and per-document worker
//! - [`job`] - Tasks, options and run counters
//! - [`progress`] - Progress reporters
//! - [`config`] - Defaults and backoff calculation

pub mod config;
pub mod executor;
pub mod job;
pub mod progress;

pub use executor::DownloadExecutor;
pub use job::{DownloadSummary, FetchOptions, FetchTask, TaskOutcome};
pub use progress::{BarProgress, ProgressReporter, SilentProgress};

use crate::fetcher::FetcherError;
use crate::output::OutputError;

/// Download errors
#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    /// The run was cancelled through the shutdown flag
    #[error("download cancelled")]
    Cancelled,

    /// IO error
    #[error("IO error: {0}")]
    IoError(String),

    /// The download task panicked
    #[error("download task panicked: {0}")]
    TaskPanicked(String),

    /// Fetcher error
    #[error("fetcher error: {0}")]
    FetcherError(#[from] FetcherError),

    /// Output error
    #[error("output error: {0}")]
    OutputError(#[from] OutputError),
}

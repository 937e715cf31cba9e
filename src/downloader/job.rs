//! Fetch tasks and run accounting

use crate::{DocumentFormat, DocumentId};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Per-run download options
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchOptions {
    /// Replace files that already exist
    pub overwrite: bool,
    /// Store `null` payloads instead of discarding them
    pub preserve_null: bool,
}

/// One document to download
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTask {
    /// Document to fetch
    pub document: DocumentId,
    /// Final path of the payload
    pub destination: PathBuf,
    /// Remote format
    pub format: DocumentFormat,
    /// Download options
    pub options: FetchOptions,
    /// Processing date the catalog listed for this document. When set, a
    /// stored copy recording a different date is replaced.
    pub processing_date: Option<String>,
}

impl FetchTask {
    /// Create a new task
    pub fn new(
        document: DocumentId,
        destination: impl Into<PathBuf>,
        format: DocumentFormat,
        options: FetchOptions,
    ) -> Self {
        Self {
            document,
            destination: destination.into(),
            format,
            options,
            processing_date: None,
        }
    }

    /// Attach the processing date the catalog listed for this document
    pub fn with_processing_date(mut self, date: impl Into<String>) -> Self {
        self.processing_date = Some(date.into());
        self
    }
}

/// What a single task ended up doing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOutcome {
    /// Payload stored
    Written {
        /// Payload size
        bytes: u64,
    },
    /// Destination already present, nothing fetched or written
    SkippedExisting,
    /// The catalog answered `null` and nulls are not preserved
    SkippedNull,
    /// The run was cancelled before the task did any I/O
    Poisoned,
}

impl TaskOutcome {
    /// Metric label
    pub fn label(&self) -> &'static str {
        match self {
            Self::Written { .. } => "written",
            Self::SkippedExisting => "skipped_existing",
            Self::SkippedNull => "skipped_null",
            Self::Poisoned => "cancelled",
        }
    }
}

/// Counters of one pipeline run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadSummary {
    /// Tasks submitted to the pipeline
    pub total: u64,
    /// Payloads stored
    pub written: u64,
    /// Bytes stored
    pub bytes_written: u64,
    /// Tasks skipped because the destination existed
    pub skipped_existing: u64,
    /// Null payloads discarded
    pub skipped_null: u64,
    /// Tasks that failed
    pub failed: u64,
    /// Tasks dropped or short-circuited by cancellation
    pub cancelled: u64,
}

impl DownloadSummary {
    /// Account for one finished task
    pub fn record(&mut self, outcome: TaskOutcome) {
        match outcome {
            TaskOutcome::Written { bytes } => {
                self.written += 1;
                self.bytes_written += bytes;
            }
            TaskOutcome::SkippedExisting => self.skipped_existing += 1,
            TaskOutcome::SkippedNull => self.skipped_null += 1,
            TaskOutcome::Poisoned => self.cancelled += 1,
        }
    }

    /// Tasks that reached a final state
    pub fn completed(&self) -> u64 {
        self.written + self.skipped_existing + self.skipped_null + self.failed + self.cancelled
    }

    /// Every task ran and none failed
    pub fn is_clean(&self) -> bool {
        self.failed == 0 && self.cancelled == 0
    }
}

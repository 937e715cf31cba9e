//! # ArticleMeta Dump Library
//!
//! Incremental bulk download of scholarly document metadata from an
//! ArticleMeta catalog service, persisted as one file per document.
//!
//! ## Features
//!
//! - **Resilient HTTP**: retryable/non-retryable error classification with exponential backoff
//! - **Paginated enumeration**: lazy identifier streams filtered by collection and date
//! - **Bounded concurrency**: at most N documents in flight, dispatched in input order
//! - **Incremental runs**: a per-collection watermark so re-runs only fetch new documents
//! - **Graceful cancellation**: a shared poison flag checked by every task before I/O
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use articlemeta_dump::dumper::Dumper;
//! use articlemeta_dump::downloader::SilentProgress;
//! use articlemeta_dump::fetcher::articlemeta::ArticleMetaClient;
//! use articlemeta_dump::shutdown::ShutdownCoordinator;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = ArticleMetaClient::with_defaults()?;
//! let dumper = Dumper::new(Arc::new(client), "./workdir", ShutdownCoordinator::shared());
//! let summary = dumper.run_collection("scl", &SilentProgress).await?;
//! println!("{} documents written", summary.downloads.written);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`fetcher`] - HTTP client, retry policy and the ArticleMeta endpoints
//! - [`downloader`] - Bounded-concurrency download pipeline
//! - [`resume`] - Watermark tracking and run locking
//! - [`dumper`] - Incremental run orchestration
//! - [`output`] - File layout, identifier lists and CSV export
//! - [`document`] - Read access to stored documents

#![warn(missing_docs)]
#![warn(clippy::all)]

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// CLI command implementations
pub mod cli;

/// Stored document model
pub mod document;

/// Download pipeline
pub mod downloader;

/// Incremental run orchestration
pub mod dumper;

/// Remote catalog access
pub mod fetcher;

/// Document identifier parsing
pub mod identifier;

/// Observability metrics
pub mod metrics;

/// Local file layout and exports
pub mod output;

/// Watermark persistence and run locking
pub mod resume;

/// Cooperative cancellation shared across tasks
pub mod shutdown;

pub use identifier::DocumentId;

/// Date used as the watermark when a collection has never been dumped.
pub const EPOCH_DATE: &str = "1900-01-01";

/// One entry of the identifier listing: a document and its processing date.
///
/// `processing_date` is a zero-padded `YYYY-MM-DD` string. It is compared
/// lexicographically and never parsed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingRecord {
    /// Document identifier
    pub document: DocumentId,
    /// Date the catalog last processed the document
    pub processing_date: String,
}

impl ProcessingRecord {
    /// Create a new record
    pub fn new(document: DocumentId, processing_date: impl Into<String>) -> Self {
        Self {
            document,
            processing_date: processing_date.into(),
        }
    }
}

/// Collection metadata from the collection-listing endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionInfo {
    /// Collection code (e.g., "scl")
    pub code: String,
    /// Publication status (e.g., "certified", "diffusion", "development")
    #[serde(default)]
    pub status: Option<String>,
    /// Whether the collection is active
    #[serde(default)]
    pub is_active: bool,
}

impl CollectionInfo {
    /// Whether documents of this collection should be dumped when no
    /// collection is pinned.
    pub fn is_eligible(&self) -> bool {
        matches!(self.status.as_deref(), Some("certified") | Some("diffusion")) && self.is_active
    }
}

/// Remote document format (the `format` query parameter)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocumentFormat(String);

impl DocumentFormat {
    /// JSON, the default format
    pub fn json() -> Self {
        Self("json".to_string())
    }

    /// Format code sent to the remote service
    pub fn code(&self) -> &str {
        &self.0
    }

    /// File extension for stored payloads
    pub fn extension(&self) -> &'static str {
        if self.0 == "json" {
            "json"
        } else {
            "xml"
        }
    }
}

impl Default for DocumentFormat {
    fn default() -> Self {
        Self::json()
    }
}

impl FromStr for DocumentFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let code = s.trim().to_lowercase();
        if code.is_empty() || !code.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(format!("Invalid document format: {s}"));
        }
        Ok(Self(code))
    }
}

impl fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

//! CLI error types and conversions

use crate::downloader::DownloadError;
use crate::dumper::DumpError;
use crate::fetcher::FetcherError;
use crate::identifier::IdentifierError;
use crate::output::OutputError;
use crate::resume::ResumeError;

/// CLI errors
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Dump error
    #[error("dump error: {0}")]
    DumpError(#[from] DumpError),

    /// Download error
    #[error("download error: {0}")]
    DownloadError(#[from] DownloadError),

    /// Fetcher error
    #[error("fetcher error: {0}")]
    FetcherError(#[from] FetcherError),

    /// Identifier error
    #[error("identifier error: {0}")]
    IdentifierError(#[from] IdentifierError),

    /// Output error
    #[error("output error: {0}")]
    OutputError(#[from] OutputError),

    /// Resume error
    #[error("resume error: {0}")]
    ResumeError(#[from] ResumeError),

    /// Configuration error
    #[error("configuration error: {0}")]
    ConfigurationError(String),
}

impl CliError {
    /// Whether the command stopped because of a shutdown request
    pub fn is_cancelled(&self) -> bool {
        matches!(
            self,
            Self::DumpError(DumpError::Cancelled) | Self::DownloadError(DownloadError::Cancelled)
        )
    }
}

//! Remote catalog access
//!
//! - [`http`] - Resilient GET with error classification
//! - [`retry`] - Generic exponential backoff retry policy
//! - [`articlemeta`] - ArticleMeta endpoints built on top of the HTTP client

use crate::{CollectionInfo, DocumentFormat, DocumentId, ProcessingRecord};
use async_trait::async_trait;
use bytes::Bytes;
use futures_util::Stream;
use std::pin::Pin;

pub mod articlemeta;
pub mod http;
pub mod retry;

/// Fetcher errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum FetcherError {
    /// Transient failure: connection error, timeout or 5xx response
    #[error("retryable error: {0}")]
    Retryable(String),

    /// Permanent failure: malformed URL or 4xx response
    #[error("non-retryable error: {0}")]
    NonRetryable(String),

    /// Any other HTTP failure, surfaced as-is
    #[error("HTTP error: {0}")]
    HttpError(String),

    /// Response parse error
    #[error("parse error: {0}")]
    ParseError(String),
}

impl FetcherError {
    /// Whether the default retry policy retries this error
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Retryable(_))
    }
}

/// Result type for fetcher operations
pub type FetcherResult<T> = Result<T, FetcherError>;

/// Stream of processing records from the identifier listing
pub type IdentifierStream<'a> = Pin<Box<dyn Stream<Item = FetcherResult<ProcessingRecord>> + Send + 'a>>;

/// A single GET returning the raw body.
#[async_trait]
pub trait HttpGet: Send + Sync {
    /// Fetch `url` and return the response body
    async fn get(&self, url: &str) -> FetcherResult<Bytes>;
}

/// Catalog operations consumed by the download pipeline and the dumper
#[async_trait]
pub trait CatalogFetcher: Send + Sync {
    /// List every collection known to the catalog
    async fn list_collections(&self) -> FetcherResult<Vec<CollectionInfo>>;

    /// Lazily enumerate documents of `collection` processed since `from_date`.
    ///
    /// Each call starts from the first page.
    fn identifiers<'a>(&'a self, collection: &'a str, from_date: &'a str) -> IdentifierStream<'a>;

    /// Download the raw payload of one document
    async fn fetch_document(&self, document: &DocumentId, format: &DocumentFormat) -> FetcherResult<Bytes>;

    /// URL of a document, used in log messages
    fn document_url(&self, document: &DocumentId, format: &DocumentFormat) -> String;
}

/// Codes of collections whose status is "certified" or "diffusion" and that are active.
pub async fn eligible_collections(fetcher: &dyn CatalogFetcher) -> FetcherResult<Vec<String>> {
    let collections = fetcher.list_collections().await?;
    Ok(collections
        .into_iter()
        .filter(CollectionInfo::is_eligible)
        .map(|c| c.code)
        .collect())
}

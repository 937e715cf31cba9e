//! ArticleMeta catalog endpoints
//!
//! - `GET {base}/article/?collection=..&code=..&format=..` - one document
//! - `GET {base}/article/identifiers/?collection=..&from=..&limit=..&offset=..` - identifier pages
//! - `GET {base}/collection/identifiers/` - collection listing

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::{stream, TryStreamExt};
use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;

use crate::downloader::config::IDENTIFIER_PAGE_LIMIT;
use crate::fetcher::http::default_http_client;
use crate::fetcher::{CatalogFetcher, FetcherError, FetcherResult, HttpGet, IdentifierStream};
use crate::{CollectionInfo, DocumentFormat, DocumentId, ProcessingRecord};

/// Public ArticleMeta API
pub const DEFAULT_BASE_URL: &str = "http://articlemeta.scielo.org/api/v1";

/// Upper bound on identifier pages per enumeration, in case the server
/// keeps returning non-empty pages.
const MAX_PAGES: usize = 10_000;

#[derive(Debug, Deserialize)]
struct IdentifierPage {
    #[serde(default)]
    objects: Vec<IdentifierEntry>,
}

#[derive(Debug, Deserialize)]
struct IdentifierEntry {
    code: String,
    #[serde(default)]
    processing_date: String,
}

/// ArticleMeta client on top of any [`HttpGet`]
#[derive(Clone)]
pub struct ArticleMetaClient {
    http: Arc<dyn HttpGet>,
    base_url: String,
    page_limit: usize,
}

impl ArticleMetaClient {
    /// Create a client for the API rooted at `base_url`
    pub fn new(http: Arc<dyn HttpGet>, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            http,
            base_url,
            page_limit: IDENTIFIER_PAGE_LIMIT,
        }
    }

    /// Client for the public API with the default HTTP settings
    pub fn with_defaults() -> FetcherResult<Self> {
        Ok(Self::new(Arc::new(default_http_client()?), DEFAULT_BASE_URL))
    }

    /// Override the identifier page size
    pub fn with_page_limit(mut self, page_limit: usize) -> Self {
        self.page_limit = page_limit.max(1);
        self
    }

    /// API root
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn collections_url(&self) -> String {
        format!("{}/collection/identifiers/", self.base_url)
    }

    fn identifiers_url(&self, collection: &str, from_date: &str, offset: usize) -> String {
        format!(
            "{}/article/identifiers/?collection={}&from={}&limit={}&offset={}",
            self.base_url, collection, from_date, self.page_limit, offset
        )
    }

    /// Fetch one page of the identifier listing
    pub async fn fetch_identifier_page(
        &self,
        collection: &str,
        from_date: &str,
        offset: usize,
    ) -> FetcherResult<Vec<ProcessingRecord>> {
        let url = self.identifiers_url(collection, from_date, offset);
        let body = self.http.get(&url).await?;
        let page: IdentifierPage = serde_json::from_slice(&body)
            .map_err(|e| FetcherError::ParseError(format!("identifier page {url}: {e}")))?;

        page.objects
            .into_iter()
            .map(|entry| {
                let document = DocumentId::new(collection, entry.code)
                    .map_err(|e| FetcherError::ParseError(e.to_string()))?;
                Ok(ProcessingRecord::new(document, entry.processing_date))
            })
            .collect()
    }
}

#[async_trait]
impl CatalogFetcher for ArticleMetaClient {
    async fn list_collections(&self) -> FetcherResult<Vec<CollectionInfo>> {
        let url = self.collections_url();
        let body = self.http.get(&url).await?;
        serde_json::from_slice(&body)
            .map_err(|e| FetcherError::ParseError(format!("collection listing {url}: {e}")))
    }

    fn identifiers<'a>(&'a self, collection: &'a str, from_date: &'a str) -> IdentifierStream<'a> {
        let pages = stream::try_unfold(0usize, move |page_number| async move {
            if page_number >= MAX_PAGES {
                return Err(FetcherError::HttpError(format!(
                    "more than {MAX_PAGES} identifier pages for collection {collection}"
                )));
            }
            let offset = page_number * self.page_limit;
            let page = self
                .fetch_identifier_page(collection, from_date, offset)
                .await?;
            if page.is_empty() {
                debug!(
                    collection = %collection,
                    pages = page_number,
                    "Identifier listing exhausted"
                );
                return Ok(None);
            }
            debug!(collection = %collection, offset = offset, count = page.len(), "Identifier page received");
            Ok(Some((page, page_number + 1)))
        });

        Box::pin(
            pages
                .map_ok(|page| stream::iter(page.into_iter().map(Ok::<_, FetcherError>)))
                .try_flatten(),
        )
    }

    async fn fetch_document(&self, document: &DocumentId, format: &DocumentFormat) -> FetcherResult<Bytes> {
        self.http.get(&self.document_url(document, format)).await
    }

    fn document_url(&self, document: &DocumentId, format: &DocumentFormat) -> String {
        format!(
            "{}/article/?collection={}&code={}&format={}",
            self.base_url,
            document.collection(),
            document.pid(),
            format.code()
        )
    }
}

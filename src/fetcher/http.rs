//! Resilient HTTP GET
//!
//! Classifies failures before handing them to the [`RetryPolicy`]:
//! - connection errors, timeouts and 5xx responses are [`FetcherError::Retryable`]
//! - malformed URLs and 4xx responses are [`FetcherError::NonRetryable`]
//! - anything else is surfaced as [`FetcherError::HttpError`] and never retried
//!
//! Redirects are followed by the client, so the remaining non-success
//! statuses (304 and other 1xx/3xx answers that reach us) count as
//! "anything else".
//!
//! The timeout bounds connecting and each read of the response, not the
//! whole transfer, so large documents are not cut off while data keeps
//! arriving. A client built with [`HttpClient::with_shutdown`] stops retrying as
//! soon as the shutdown flag is set.

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, StatusCode, Url};
use std::time::{Duration, Instant};
use tracing::debug;

use crate::downloader::config::DEFAULT_REQUEST_TIMEOUT;
use crate::fetcher::retry::RetryPolicy;
use crate::fetcher::{FetcherError, FetcherResult, HttpGet};
use crate::metrics;
use crate::shutdown::SharedShutdown;

/// HTTP client applying error classification and retry to every GET
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    retry: RetryPolicy,
    shutdown: Option<SharedShutdown>,
}

impl HttpClient {
    /// Create a client with a connect and per-read timeout and a retry policy
    pub fn new(timeout: Duration, retry: RetryPolicy) -> FetcherResult<Self> {
        let client = Client::builder()
            .connect_timeout(timeout)
            .read_timeout(timeout)
            .user_agent(concat!("articlemeta-dump/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| FetcherError::HttpError(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            retry,
            shutdown: None,
        })
    }

    /// Stop retrying once `shutdown` is set
    pub fn with_shutdown(mut self, shutdown: SharedShutdown) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// Single attempt, no retry
    pub async fn get_once(&self, url: &str) -> FetcherResult<Bytes> {
        let parsed = parse_url(url)?;

        debug!(url = %url, "GET");
        let started = Instant::now();
        let response = match self.client.get(parsed).send().await {
            Ok(response) => response,
            Err(e) => {
                metrics::record_request("network_error", started.elapsed());
                return Err(classify_transport_error(url, e));
            }
        };
        metrics::record_request(response.status().as_str(), started.elapsed());

        if let Some(err) = classify_status(url, response.status()) {
            return Err(err);
        }

        response
            .bytes()
            .await
            .map_err(|e| classify_transport_error(url, e))
    }
}

#[async_trait]
impl HttpGet for HttpClient {
    async fn get(&self, url: &str) -> FetcherResult<Bytes> {
        match &self.shutdown {
            Some(shutdown) => {
                self.retry
                    .run_until_shutdown(url, || self.get_once(url), FetcherError::is_retryable, shutdown)
                    .await
            }
            None => self.retry.run(url, || self.get_once(url)).await,
        }
    }
}

/// Build a client with the default timeout and retry policy
pub fn default_http_client() -> FetcherResult<HttpClient> {
    HttpClient::new(DEFAULT_REQUEST_TIMEOUT, RetryPolicy::default())
}

fn parse_url(url: &str) -> FetcherResult<Url> {
    let parsed =
        Url::parse(url).map_err(|e| FetcherError::NonRetryable(format!("invalid URL '{url}': {e}")))?;
    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        scheme => Err(FetcherError::NonRetryable(format!(
            "unsupported URL scheme '{scheme}' in '{url}'"
        ))),
    }
}

fn classify_status(url: &str, status: StatusCode) -> Option<FetcherError> {
    if status.is_success() {
        None
    } else if status.is_client_error() {
        Some(FetcherError::NonRetryable(format!("client error {status} for {url}")))
    } else if status.is_server_error() {
        Some(FetcherError::Retryable(format!("server error {status} for {url}")))
    } else {
        Some(FetcherError::HttpError(format!("unexpected status {status} for {url}")))
    }
}

fn classify_transport_error(url: &str, e: reqwest::Error) -> FetcherError {
    if e.is_timeout() || e.is_connect() {
        FetcherError::Retryable(format!("{url}: {e}"))
    } else if e.is_builder() {
        FetcherError::NonRetryable(format!("{url}: {e}"))
    } else {
        FetcherError::HttpError(format!("{url}: {e}"))
    }
}

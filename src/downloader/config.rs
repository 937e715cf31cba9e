//! Download configuration constants

use std::time::Duration;

/// Maximum number of retries for a retryable HTTP failure.
pub const MAX_RETRIES: u32 = 4;

/// Base of the exponential backoff: retry `n` waits `BACKOFF_FACTOR^n` seconds.
/// With 4 retries the total wait is about 31 seconds.
pub const BACKOFF_FACTOR: f64 = 1.9;

/// Default number of concurrent document downloads.
pub const DEFAULT_CONCURRENCY: usize = 2;

/// Upper bound accepted for `--concurrency`.
pub const MAX_CONCURRENCY: usize = 32;

/// Page size requested from the identifier listing endpoint.
pub const IDENTIFIER_PAGE_LIMIT: usize = 500;

/// Connect and per-read timeout for catalog requests.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(2);

/// Body returned by the catalog for identifiers without a document.
pub const NULL_SENTINEL: &[u8] = b"null";

/// Calculate exponential backoff delay for a 1-based retry number
pub fn calculate_backoff(backoff_factor: f64, retry: u32) -> Duration {
    let exponent = i32::try_from(retry).unwrap_or(i32::MAX);
    Duration::try_from_secs_f64(backoff_factor.powi(exponent).max(0.0)).unwrap_or(Duration::MAX)
}

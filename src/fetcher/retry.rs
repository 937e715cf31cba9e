//! Exponential backoff retry for arbitrary async operations
//!
//! The wait before retry `n` (1-based) is `backoff_factor^n` seconds. It depends
//! only on the attempt number, never on the error. With
//! [`RetryPolicy::run_until_shutdown`] a pending backoff ends as soon as the
//! shutdown flag is set, and no further attempt is made.

use std::fmt;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info};

use crate::downloader::config::{calculate_backoff, BACKOFF_FACTOR, MAX_RETRIES};
use crate::fetcher::{FetcherError, FetcherResult};
use crate::shutdown::ShutdownCoordinator;

/// How many times to retry, and how long to wait in between
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    max_retries: u32,
    backoff_factor: f64,
}

impl RetryPolicy {
    /// Create a policy with `max_retries` retries after the first attempt
    pub fn new(max_retries: u32, backoff_factor: f64) -> Self {
        Self {
            max_retries,
            backoff_factor,
        }
    }

    /// Maximum number of retries
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Base of the exponential backoff
    pub fn backoff_factor(&self) -> f64 {
        self.backoff_factor
    }

    /// Wait applied before retry number `retry` (1-based)
    pub fn delay_for(&self, retry: u32) -> Duration {
        calculate_backoff(self.backoff_factor, retry)
    }

    /// Run `op`, retrying [`FetcherError::Retryable`] failures.
    pub async fn run<T, F, Fut>(&self, operation: &str, op: F) -> FetcherResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = FetcherResult<T>>,
    {
        self.run_if(operation, op, FetcherError::is_retryable).await
    }

    /// Run `op`, retrying only the errors selected by `should_retry`.
    pub async fn run_if<T, E, F, Fut, P>(&self, operation: &str, op: F, should_retry: P) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: fmt::Display,
        P: Fn(&E) -> bool,
    {
        self.run_with_sleep(operation, op, should_retry, tokio::time::sleep)
            .await
    }

    /// Same as [`RetryPolicy::run_if`], giving up once `shutdown` is set.
    ///
    /// The backoff sleep is interrupted by the shutdown request and the last
    /// error is returned without another attempt.
    pub async fn run_until_shutdown<T, E, F, Fut, P>(
        &self,
        operation: &str,
        op: F,
        should_retry: P,
        shutdown: &ShutdownCoordinator,
    ) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: fmt::Display,
        P: Fn(&E) -> bool,
    {
        self.retry_loop(
            operation,
            op,
            should_retry,
            move |wait| async move {
                tokio::select! {
                    _ = tokio::time::sleep(wait) => {}
                    _ = shutdown.wait_for_shutdown() => {}
                }
            },
            || shutdown.is_shutdown_requested(),
        )
        .await
    }

    /// Same as [`RetryPolicy::run_if`] with a caller-supplied sleep.
    ///
    /// Once retries are exhausted the last error is returned unchanged.
    pub async fn run_with_sleep<T, E, F, Fut, P, S, SFut>(
        &self,
        operation: &str,
        op: F,
        should_retry: P,
        sleep: S,
    ) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: fmt::Display,
        P: Fn(&E) -> bool,
        S: FnMut(Duration) -> SFut,
        SFut: Future<Output = ()>,
    {
        self.retry_loop(operation, op, should_retry, sleep, || false)
            .await
    }

    async fn retry_loop<T, E, F, Fut, P, S, SFut, C>(
        &self,
        operation: &str,
        mut op: F,
        should_retry: P,
        mut sleep: S,
        cancelled: C,
    ) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: fmt::Display,
        P: Fn(&E) -> bool,
        S: FnMut(Duration) -> SFut,
        SFut: Future<Output = ()>,
        C: Fn() -> bool,
    {
        let mut retry = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if should_retry(&e) && retry <= self.max_retries && !cancelled() => {
                    let wait = self.delay_for(retry);
                    info!(
                        operation = %operation,
                        retry = retry,
                        wait_secs = wait.as_secs_f64(),
                        error = %e,
                        "Could not get the result, retrying"
                    );
                    crate::metrics::record_retry(operation);
                    sleep(wait).await;
                    if cancelled() {
                        debug!(operation = %operation, "Shutdown requested, giving up retries");
                        return Err(e);
                    }
                    retry += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(MAX_RETRIES, BACKOFF_FACTOR)
    }
}

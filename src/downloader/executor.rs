//! Bounded-concurrency download executor
//!
//! Tasks are dispatched in input order through a window of `concurrency`
//! semaphore permits. Completions are consumed in completion order by the
//! same loop, which is the only place progress is reported and the summary
//! updated.

use crate::document::ArticleDocument;
use crate::downloader::config::{DEFAULT_CONCURRENCY, MAX_CONCURRENCY, NULL_SENTINEL};
use crate::downloader::job::{DownloadSummary, FetchTask, TaskOutcome};
use crate::downloader::progress::ProgressReporter;
use crate::downloader::DownloadError;
use crate::fetcher::CatalogFetcher;
use crate::metrics;
use crate::output::write_atomic_async;
use crate::shutdown::{SharedShutdown, ShutdownCoordinator};
use futures_util::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, error, info, warn};

type TaskResult = (PathBuf, Result<TaskOutcome, DownloadError>);

/// Runs fetch tasks against a catalog with at most N in flight
pub struct DownloadExecutor {
    source: Arc<dyn CatalogFetcher>,
    concurrency: usize,
    shutdown: SharedShutdown,
}

impl DownloadExecutor {
    /// Executor with the default concurrency
    pub fn new(source: Arc<dyn CatalogFetcher>, shutdown: SharedShutdown) -> Self {
        Self {
            source,
            concurrency: DEFAULT_CONCURRENCY,
            shutdown,
        }
    }

    /// Set the number of concurrent downloads, clamped to `1..=MAX_CONCURRENCY`
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.clamp(1, MAX_CONCURRENCY);
        self
    }

    /// Number of concurrent downloads
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Shutdown handle observed by every task
    pub fn shutdown(&self) -> &SharedShutdown {
        &self.shutdown
    }

    /// Run every task and wait for all of them.
    ///
    /// Per-task failures are logged and counted without affecting other
    /// tasks. If the shutdown flag is set, tasks not yet dispatched are
    /// dropped, in-flight tasks are awaited, and [`DownloadError::Cancelled`]
    /// is returned.
    pub async fn execute(
        &self,
        tasks: Vec<FetchTask>,
        progress: &dyn ProgressReporter,
    ) -> Result<DownloadSummary, DownloadError> {
        let mut summary = DownloadSummary {
            total: tasks.len() as u64,
            ..Default::default()
        };
        progress.start(summary.total);
        info!(
            tasks = summary.total,
            concurrency = self.concurrency,
            "Starting downloads"
        );

        let permits = Arc::new(Semaphore::new(self.concurrency));
        let mut in_flight: JoinSet<TaskResult> = JoinSet::new();
        let mut pending = tasks.into_iter();
        let mut next = pending.next();

        while let Some(task) = next.take() {
            if self.shutdown.is_shutdown_requested() {
                next = Some(task);
                break;
            }

            tokio::select! {
                biased;

                Some(joined) = in_flight.join_next() => {
                    record_completion(joined, &mut summary, progress);
                    next = Some(task);
                }
                permit = permits.clone().acquire_owned() => {
                    let permit = permit.map_err(|e| DownloadError::IoError(format!("download window closed: {e}")))?;
                    let source = Arc::clone(&self.source);
                    let shutdown = Arc::clone(&self.shutdown);
                    debug!(document = %task.document, "Dispatching");
                    in_flight.spawn(async move {
                        let _permit = permit;
                        let result = AssertUnwindSafe(download_document(source.as_ref(), &shutdown, &task))
                            .catch_unwind()
                            .await
                            .unwrap_or_else(|panic| Err(DownloadError::TaskPanicked(panic_message(panic.as_ref()))));
                        (task.destination, result)
                    });
                    next = pending.next();
                }
                _ = self.shutdown.wait_for_shutdown() => {
                    next = Some(task);
                }
            }
        }

        let dropped = next.into_iter().count() as u64 + pending.count() as u64;
        if dropped > 0 {
            info!(dropped = dropped, "Shutdown requested, dropping queued downloads");
            summary.cancelled += dropped;
        }

        while let Some(joined) = in_flight.join_next().await {
            record_completion(joined, &mut summary, progress);
        }
        progress.finish();

        if self.shutdown.is_shutdown_requested() {
            warn!(
                written = summary.written,
                failed = summary.failed,
                cancelled = summary.cancelled,
                "Downloads cancelled"
            );
            return Err(DownloadError::Cancelled);
        }

        info!(
            written = summary.written,
            skipped_existing = summary.skipped_existing,
            skipped_null = summary.skipped_null,
            failed = summary.failed,
            "Downloads finished"
        );
        Ok(summary)
    }
}

fn record_completion(
    joined: Result<TaskResult, JoinError>,
    summary: &mut DownloadSummary,
    progress: &dyn ProgressReporter,
) {
    match joined {
        Ok((_, Ok(outcome))) => {
            metrics::record_document(outcome.label());
            summary.record(outcome);
        }
        Ok((destination, Err(e))) => {
            error!(destination = %destination.display(), error = %e, "Could not download document");
            metrics::record_document("failed");
            summary.failed += 1;
        }
        // only reachable if the runtime aborts the task
        Err(e) => {
            error!(error = %e, "Download task aborted");
            metrics::record_document("failed");
            summary.failed += 1;
        }
    }
    progress.advance(1);
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

/// Download one document into its destination.
///
/// Checks the shutdown flag before any I/O. Without `overwrite`, an
/// existing destination is left untouched and nothing is fetched, unless
/// the task carries a processing date that the stored copy does not record.
pub async fn download_document(
    source: &dyn CatalogFetcher,
    shutdown: &ShutdownCoordinator,
    task: &FetchTask,
) -> Result<TaskOutcome, DownloadError> {
    if shutdown.is_shutdown_requested() {
        return Ok(TaskOutcome::Poisoned);
    }

    let destination = &task.destination;
    let mut replace = task.options.overwrite;
    if !replace && tokio::fs::try_exists(destination).await.unwrap_or(false) {
        if stored_copy_is_current(task).await {
            debug!(destination = %destination.display(), "File already exists, skipping");
            return Ok(TaskOutcome::SkippedExisting);
        }
        debug!(
            destination = %destination.display(),
            processing_date = ?task.processing_date,
            "Stored copy is out of date, refreshing"
        );
        replace = true;
    }

    if let Some(parent) = destination.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(|e| {
            DownloadError::IoError(format!("Failed to create {}: {e}", parent.display()))
        })?;
    }

    let payload = source.fetch_document(&task.document, &task.format).await?;

    if payload.as_ref() == NULL_SENTINEL && !task.options.preserve_null {
        debug!(
            url = %source.document_url(&task.document, &task.format),
            "Catalog returned null, nothing stored"
        );
        return Ok(TaskOutcome::SkippedNull);
    }

    let bytes = payload.len() as u64;
    let written = write_atomic_async(destination.clone(), payload, replace).await?;
    if !written {
        return Ok(TaskOutcome::SkippedExisting);
    }

    debug!(destination = %destination.display(), bytes = bytes, "Document stored");
    Ok(TaskOutcome::Written { bytes })
}

/// Whether the stored file already holds the version the catalog listed.
///
/// Tasks without a processing date accept any stored copy. Otherwise the
/// copy must be a JSON document whose `processing_date` matches.
async fn stored_copy_is_current(task: &FetchTask) -> bool {
    let Some(expected) = task.processing_date.as_deref() else {
        return true;
    };
    match tokio::fs::read(&task.destination).await {
        Ok(bytes) => ArticleDocument::from_slice(&bytes)
            .map(|document| document.processing_date() == Some(expected))
            .unwrap_or(false),
        Err(_) => false,
    }
}

//! Observability metrics
//!
//! Counters and histograms are emitted through the `metrics` facade. They are
//! no-ops until [`init_metrics`] installs the Prometheus exporter, which the
//! CLI does only when `--metrics-addr` is given.

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use metrics_exporter_prometheus::PrometheusBuilder;
use once_cell::sync::OnceCell;
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tracing::{debug, info};

static METRICS_INITIALIZED: OnceCell<SocketAddr> = OnceCell::new();

/// Install the Prometheus exporter on `addr`.
///
/// Idempotent: later calls are ignored.
pub fn init_metrics(addr: SocketAddr) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    if let Some(existing) = METRICS_INITIALIZED.get() {
        debug!(addr = %existing, "Metrics already initialized, skipping");
        return Ok(());
    }

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| format!("Failed to install Prometheus exporter: {e}"))?;

    describe_counter!(
        "http_requests_total",
        Unit::Count,
        "Total number of HTTP requests made to the catalog"
    );
    describe_histogram!(
        "http_request_duration_seconds",
        Unit::Seconds,
        "HTTP request duration in seconds"
    );
    describe_counter!("http_retries_total", Unit::Count, "Total number of retry attempts");
    describe_counter!(
        "documents_total",
        Unit::Count,
        "Documents processed, labelled by outcome"
    );
    describe_counter!(
        "collection_runs_total",
        Unit::Count,
        "Collection runs, labelled by result"
    );

    let _ = METRICS_INITIALIZED.set(addr);
    info!("Metrics system initialized on {}", addr);
    Ok(())
}

/// Record one HTTP attempt. `status` is the status code or `network_error`.
pub fn record_request(status: &str, duration: Duration) {
    counter!("http_requests_total", "status" => status.to_string()).increment(1);
    histogram!("http_request_duration_seconds").record(duration.as_secs_f64());
}

/// Record a retry of `operation`
pub fn record_retry(operation: &str) {
    counter!("http_retries_total").increment(1);
    debug!(operation = %operation, "Retry recorded");
}

/// Record the outcome of one document task
pub fn record_document(outcome: &'static str) {
    counter!("documents_total", "outcome" => outcome).increment(1);
}

/// Per-collection run metrics
pub struct DownloadMetrics {
    collection: String,
    start_time: Instant,
}

impl DownloadMetrics {
    /// Start tracking a collection run
    pub fn start(collection: impl Into<String>) -> Self {
        let collection = collection.into();
        info!(collection = %collection, "Collection run started");
        Self {
            collection,
            start_time: Instant::now(),
        }
    }

    /// Record a completed run
    pub fn record_success(&self, written: u64) {
        counter!(
            "collection_runs_total",
            "collection" => self.collection.clone(),
            "result" => "completed",
        )
        .increment(1);
        info!(
            collection = %self.collection,
            written = written,
            duration_secs = self.start_time.elapsed().as_secs(),
            "Collection run completed"
        );
    }

    /// Record a failed or cancelled run
    pub fn record_failure(&self, error: &str) {
        counter!(
            "collection_runs_total",
            "collection" => self.collection.clone(),
            "result" => "failed",
        )
        .increment(1);
        info!(
            collection = %self.collection,
            error = %error,
            duration_secs = self.start_time.elapsed().as_secs(),
            "Collection run failed"
        );
    }
}

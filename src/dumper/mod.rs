//! Incremental run orchestration
//!
//! A collection run: take the run lock, read the watermark, enumerate the
//! documents processed since, record the identifier list, download, and move
//! the watermark forward if every document was handled.

use crate::document::{DocumentError, StoredDocuments};
use crate::downloader::{
    DownloadError, DownloadExecutor, DownloadSummary, FetchOptions, FetchTask, ProgressReporter,
};
use crate::downloader::config::{DEFAULT_CONCURRENCY, MAX_CONCURRENCY};
use crate::fetcher::{eligible_collections, CatalogFetcher, FetcherError};
use crate::identifier::{read_identifier_file, IdentifierError};
use crate::metrics::DownloadMetrics;
use crate::output::csv::DatesCsvWriter;
use crate::output::{write_lines_atomic, OutputError, OutputLayout};
use crate::resume::{ResumeError, RunLock, WatermarkTracker};
use crate::shutdown::SharedShutdown;
use crate::{DocumentFormat, DocumentId, ProcessingRecord};
use futures_util::TryStreamExt;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

/// Orchestration errors
#[derive(Debug, thiserror::Error)]
pub enum DumpError {
    /// The run was cancelled
    #[error("run cancelled")]
    Cancelled,

    /// Catalog request failed
    #[error(transparent)]
    Fetcher(#[from] FetcherError),

    /// Download pipeline failed
    #[error(transparent)]
    Download(DownloadError),

    /// Watermark or lock failure
    #[error(transparent)]
    Resume(#[from] ResumeError),

    /// Output failure
    #[error(transparent)]
    Output(#[from] OutputError),

    /// Identifier file failure
    #[error(transparent)]
    Identifier(#[from] IdentifierError),

    /// Stored document failure
    #[error(transparent)]
    Document(#[from] DocumentError),
}

impl From<DownloadError> for DumpError {
    fn from(e: DownloadError) -> Self {
        match e {
            DownloadError::Cancelled => Self::Cancelled,
            other => Self::Download(other),
        }
    }
}

/// Result of one collection run
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    /// Collection code
    pub collection: String,
    /// Watermark the enumeration started from
    pub from_date: String,
    /// Identifiers enumerated
    pub identifiers: u64,
    /// Identifier list written for this run
    pub identifier_list: PathBuf,
    /// Download counters
    pub downloads: DownloadSummary,
    /// New watermark, if it moved
    pub watermark: Option<String>,
}

/// Result of a dates export
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct ExportSummary {
    /// Rows written
    pub rows: u64,
    /// Stored files that could not be read
    pub skipped: u64,
}

/// Runs dumps against one catalog into one workdir
pub struct Dumper {
    source: Arc<dyn CatalogFetcher>,
    layout: OutputLayout,
    shutdown: SharedShutdown,
    concurrency: usize,
    options: FetchOptions,
}

impl Dumper {
    /// Dumper writing JSON documents under `workdir`
    pub fn new(source: Arc<dyn CatalogFetcher>, workdir: impl Into<PathBuf>, shutdown: SharedShutdown) -> Self {
        Self {
            source,
            layout: OutputLayout::new(workdir, DocumentFormat::json()),
            shutdown,
            concurrency: DEFAULT_CONCURRENCY,
            options: FetchOptions::default(),
        }
    }

    /// Number of concurrent downloads, clamped to `1..=MAX_CONCURRENCY`
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.clamp(1, MAX_CONCURRENCY);
        self
    }

    /// Number of concurrent downloads
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Download options
    pub fn with_options(mut self, options: FetchOptions) -> Self {
        self.options = options;
        self
    }

    /// Remote document format
    pub fn with_format(mut self, format: DocumentFormat) -> Self {
        self.layout = OutputLayout::new(self.layout.workdir().to_path_buf(), format);
        self
    }

    /// Local layout
    pub fn layout(&self) -> &OutputLayout {
        &self.layout
    }

    fn executor(&self) -> DownloadExecutor {
        DownloadExecutor::new(Arc::clone(&self.source), Arc::clone(&self.shutdown))
            .with_concurrency(self.concurrency)
    }

    fn task_for(&self, document: DocumentId) -> FetchTask {
        let destination = self
            .layout
            .collection(document.collection())
            .document_path(&document);
        FetchTask::new(document, destination, self.layout.format().clone(), self.options)
    }

    /// Task for an enumerated record. A stored copy that does not record the
    /// listed processing date is fetched again.
    fn task_for_record(&self, record: ProcessingRecord) -> FetchTask {
        let task = self.task_for(record.document);
        if record.processing_date.is_empty() {
            task
        } else {
            task.with_processing_date(record.processing_date)
        }
    }

    fn ensure_running(&self) -> Result<(), DumpError> {
        if self.shutdown.is_shutdown_requested() {
            return Err(DumpError::Cancelled);
        }
        Ok(())
    }

    /// Pinned collection, or every eligible one
    async fn target_collections(&self, collection: Option<&str>) -> Result<Vec<String>, DumpError> {
        match collection {
            Some(code) => Ok(vec![code.to_string()]),
            None => {
                let codes = eligible_collections(self.source.as_ref()).await?;
                info!(collections = ?codes, "Eligible collections");
                Ok(codes)
            }
        }
    }

    /// Enumerate a collection from `from_date`, stopping early on shutdown
    async fn enumerate(&self, collection: &str, from_date: &str) -> Result<Vec<ProcessingRecord>, DumpError> {
        let mut records = Vec::new();
        let mut stream = self.source.identifiers(collection, from_date);
        while let Some(record) = stream.try_next().await? {
            self.ensure_running()?;
            records.push(record);
        }
        info!(collection = %collection, from = %from_date, count = records.len(), "Identifiers enumerated");
        Ok(records)
    }

    /// Incremental run of one collection
    pub async fn run_collection(
        &self,
        collection: &str,
        progress: &dyn ProgressReporter,
    ) -> Result<RunSummary, DumpError> {
        let metrics = DownloadMetrics::start(collection);
        let result = self.run_collection_inner(collection, progress).await;
        match &result {
            Ok(summary) => metrics.record_success(summary.downloads.written),
            Err(e) => metrics.record_failure(&e.to_string()),
        }
        result
    }

    async fn run_collection_inner(
        &self,
        collection: &str,
        progress: &dyn ProgressReporter,
    ) -> Result<RunSummary, DumpError> {
        self.ensure_running()?;
        let paths = self.layout.collection(collection);
        let _lock = RunLock::try_acquire(&paths.lock_path())?;

        let watermark = WatermarkTracker::new(paths.watermark_path());
        let from_date = watermark.read()?;
        info!(collection = %collection, from = %from_date, "Dumping collection");

        let records = self.enumerate(collection, &from_date).await?;

        let today = chrono::Local::now().format("%Y-%m-%d").to_string();
        let identifier_list = paths.identifier_list_path(&from_date, &today);
        write_lines_atomic(&identifier_list, records.iter().map(|r| r.document.to_string()))?;
        write_lines_atomic(&paths.dates_path(), records.iter().map(|r| r.processing_date.as_str()))?;

        let latest = records
            .iter()
            .map(|r| r.processing_date.as_str())
            .filter(|d| !d.is_empty())
            .max()
            .map(str::to_string);
        let identifiers = records.len() as u64;
        let tasks = records
            .into_iter()
            .map(|r| self.task_for_record(r))
            .collect();

        let downloads = self.executor().execute(tasks, progress).await?;

        let mut advanced = None;
        if downloads.is_clean() {
            if let Some(latest) = latest {
                if watermark.advance(&latest)? {
                    advanced = Some(latest);
                }
            }
        } else {
            warn!(
                collection = %collection,
                failed = downloads.failed,
                watermark = %from_date,
                "Some documents failed, watermark not advanced"
            );
        }

        Ok(RunSummary {
            collection: collection.to_string(),
            from_date,
            identifiers,
            identifier_list,
            downloads,
            watermark: advanced,
        })
    }

    /// Incremental run of the pinned collection, or of every eligible
    /// collection in turn. Cancellation stops the sequence.
    pub async fn run(
        &self,
        collection: Option<&str>,
        progress: &dyn ProgressReporter,
    ) -> Result<Vec<RunSummary>, DumpError> {
        let collections = self.target_collections(collection).await?;
        let mut summaries = Vec::with_capacity(collections.len());
        for code in &collections {
            self.ensure_running()?;
            summaries.push(self.run_collection(code, progress).await?);
        }
        Ok(summaries)
    }

    /// Write every identifier processed since `from_date` to `output`, one
    /// `"<collection> <pid>"` per line. Returns the number of identifiers.
    pub async fn write_identifier_list(
        &self,
        from_date: &str,
        collection: Option<&str>,
        output: &Path,
    ) -> Result<u64, DumpError> {
        let mut lines = Vec::new();
        for code in self.target_collections(collection).await? {
            let records = self.enumerate(&code, from_date).await?;
            lines.extend(records.into_iter().map(|r| r.document.to_string()));
        }
        if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| OutputError::IoError(e.to_string()))?;
        }
        write_lines_atomic(output, &lines)?;
        info!(path = %output.display(), count = lines.len(), "Identifier list written");
        Ok(lines.len() as u64)
    }

    /// Download every document listed in an identifier file into the
    /// standard layout. The watermark is not touched.
    pub async fn download_identifier_file(
        &self,
        path: &Path,
        progress: &dyn ProgressReporter,
    ) -> Result<DownloadSummary, DumpError> {
        let documents = read_identifier_file(path)?;
        info!(path = %path.display(), count = documents.len(), "Downloading identifier file");
        let tasks = documents.into_iter().map(|d| self.task_for(d)).collect();
        Ok(self.executor().execute(tasks, progress).await?)
    }

    /// Lazily read the stored documents of a collection
    pub fn documents(&self, collection: &str) -> Result<StoredDocuments, DumpError> {
        Ok(StoredDocuments::open(&self.layout.collection(collection).data_dir())?)
    }

    /// Export the dates of every stored document of `collection` as CSV
    pub fn export_dates(&self, collection: &str, output: &Path) -> Result<ExportSummary, DumpError> {
        let extraction_date = chrono::Local::now().format("%Y-%m-%d").to_string();
        let mut writer = DatesCsvWriter::create(output, extraction_date)?;
        let mut summary = ExportSummary::default();

        for (path, document) in self.documents(collection)? {
            match document {
                Ok(document) => {
                    writer.write_document(&document)?;
                    summary.rows += 1;
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Skipping unreadable document");
                    summary.skipped += 1;
                }
            }
        }
        writer.close()?;
        info!(
            collection = %collection,
            rows = summary.rows,
            skipped = summary.skipped,
            "Dates exported"
        );
        Ok(summary)
    }
}

//! Top-level CLI and the download-related commands

use crate::downloader::config::{
    BACKOFF_FACTOR, DEFAULT_CONCURRENCY, DEFAULT_REQUEST_TIMEOUT, MAX_CONCURRENCY, MAX_RETRIES,
};
use crate::downloader::{BarProgress, DownloadSummary, FetchOptions, ProgressReporter, SilentProgress};
use crate::dumper::{Dumper, RunSummary};
use crate::fetcher::articlemeta::{ArticleMetaClient, DEFAULT_BASE_URL};
use crate::fetcher::http::HttpClient;
use crate::fetcher::retry::RetryPolicy;
use crate::shutdown::SharedShutdown;
use crate::{DocumentFormat, EPOCH_DATE};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::error;

use super::CliError;

/// Parse and validate concurrency value
fn parse_concurrency(s: &str) -> Result<usize, String> {
    let value: usize = s
        .parse()
        .map_err(|_| format!("'{s}' is not a valid number"))?;

    if value == 0 {
        return Err("concurrency must be at least 1".to_string());
    }
    if value > MAX_CONCURRENCY {
        return Err(format!(
            "concurrency {value} exceeds maximum of {MAX_CONCURRENCY}"
        ));
    }
    Ok(value)
}

/// Parse a strictly positive number of seconds
fn parse_positive_secs(s: &str) -> Result<f64, String> {
    let value: f64 = s
        .parse()
        .map_err(|_| format!("'{s}' is not a valid number"))?;
    if !value.is_finite() || value <= 0.0 {
        return Err(format!("'{s}' must be a positive number"));
    }
    Ok(value)
}

/// Parse a `YYYY-MM-DD` date, keeping its textual form
fn parse_date(s: &str) -> Result<String, String> {
    chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map(|_| s.to_string())
        .map_err(|e| format!("'{s}' is not a YYYY-MM-DD date: {e}"))
}

/// How command results are printed
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable output
    Human,
    /// JSON output
    Json,
}

/// ArticleMeta dump CLI
#[derive(Parser, Debug)]
#[command(name = "articlemeta-dump")]
#[command(about = "Incrementally download document metadata from an ArticleMeta catalog", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Working directory holding `<format>/<collection>/...`
    #[arg(long, global = true, default_value = ".")]
    pub workdir: PathBuf,

    /// Number of concurrent downloads (max: 32)
    #[arg(long, global = true, default_value_t = DEFAULT_CONCURRENCY, value_parser = parse_concurrency)]
    pub concurrency: usize,

    /// Maximum number of retries for retryable request failures
    #[arg(long, global = true, default_value_t = MAX_RETRIES, value_parser = clap::value_parser!(u32).range(0..=20))]
    pub max_retries: u32,

    /// Retry `n` waits `backoff_factor^n` seconds
    #[arg(long, global = true, default_value_t = BACKOFF_FACTOR, value_parser = parse_positive_secs)]
    pub backoff_factor: f64,

    /// Connect and per-read timeout in seconds (a slow transfer is not cut off while data arrives)
    #[arg(long, global = true, default_value_t = DEFAULT_REQUEST_TIMEOUT.as_secs_f64(), value_parser = parse_positive_secs)]
    pub timeout: f64,

    /// ArticleMeta API root
    #[arg(long, global = true, env = "ARTICLEMETA_URL", default_value = DEFAULT_BASE_URL)]
    pub base_url: String,

    /// Remote document format (json, xmlwos, ...)
    #[arg(long, global = true, default_value = "json")]
    pub format: DocumentFormat,

    /// Show a progress bar
    #[arg(long, global = true, default_value_t = false)]
    pub progress: bool,

    /// Serve Prometheus metrics on this address
    #[arg(long, global = true)]
    pub metrics_addr: Option<SocketAddr>,

    /// Output format for command results
    #[arg(long, global = true, value_enum, default_value = "human")]
    pub output_format: OutputFormat,
}

impl Cli {
    /// ArticleMeta client configured from the global flags. Retries stop
    /// once `shutdown` is set.
    pub fn client(&self, shutdown: SharedShutdown) -> Result<ArticleMetaClient, CliError> {
        let retry = RetryPolicy::new(self.max_retries, self.backoff_factor);
        let http = HttpClient::new(Duration::from_secs_f64(self.timeout), retry)
            .map_err(|e| CliError::ConfigurationError(e.to_string()))?
            .with_shutdown(shutdown);
        Ok(ArticleMetaClient::new(Arc::new(http), self.base_url.clone()))
    }

    /// Dumper configured from the global flags
    pub fn dumper(&self, options: FetchOptions, shutdown: SharedShutdown) -> Result<Dumper, CliError> {
        Ok(Dumper::new(Arc::new(self.client(shutdown.clone())?), self.workdir.clone(), shutdown)
            .with_concurrency(self.concurrency)
            .with_format(self.format.clone())
            .with_options(options))
    }

    /// Progress reporter selected by `--progress`
    pub fn progress(&self, label: &str) -> Box<dyn ProgressReporter> {
        if self.progress {
            Box::new(BarProgress::new(label))
        } else {
            Box::new(SilentProgress)
        }
    }

    /// Print a serializable result according to `--output-format`
    pub(crate) fn emit<T: serde::Serialize>(&self, value: &T, human: impl FnOnce()) -> Result<(), CliError> {
        match self.output_format {
            OutputFormat::Json => {
                let json = serde_json::to_string(value)
                    .map_err(|e| CliError::ConfigurationError(format!("Failed to serialize result: {e}")))?;
                println!("{json}");
            }
            OutputFormat::Human => human(),
        }
        Ok(())
    }
}

/// CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Incrementally dump one collection, or every eligible collection
    Dump(DumpArgs),

    /// Download the documents listed in an identifier file
    Download(DownloadArgs),

    /// Write the identifiers processed since a date to a file
    Identifiers(IdentifiersArgs),

    /// List the catalog's collections
    Collections(super::CollectionsCommand),

    /// Export the dates of stored documents as CSV
    ExportDates(super::ExportDatesArgs),
}

impl Commands {
    /// Run the selected command
    pub async fn execute(&self, cli: &Cli, shutdown: SharedShutdown) -> Result<(), CliError> {
        match self {
            Self::Dump(args) => args.execute(cli, shutdown).await,
            Self::Download(args) => args.execute(cli, shutdown).await,
            Self::Identifiers(args) => args.execute(cli, shutdown).await,
            Self::Collections(cmd) => cmd.execute(cli, shutdown).await,
            Self::ExportDates(args) => args.execute(cli, shutdown),
        }
    }
}

/// Download behaviour flags shared by `dump` and `download`
#[derive(Args, Debug, Clone, Copy)]
pub struct FetchFlags {
    /// Replace documents that are already stored
    #[arg(long, default_value_t = false)]
    pub overwrite: bool,

    /// Store `null` payloads instead of discarding them
    #[arg(long, default_value_t = false)]
    pub preserve_null: bool,
}

impl From<FetchFlags> for FetchOptions {
    fn from(flags: FetchFlags) -> Self {
        Self {
            overwrite: flags.overwrite,
            preserve_null: flags.preserve_null,
        }
    }
}

/// `dump` arguments
#[derive(Args, Debug)]
pub struct DumpArgs {
    /// Collection code; all eligible collections when omitted
    #[arg(long, short = 'c')]
    pub collection: Option<String>,

    /// Download behaviour
    #[command(flatten)]
    pub fetch: FetchFlags,
}

impl DumpArgs {
    /// Execute the dump
    pub async fn execute(&self, cli: &Cli, shutdown: SharedShutdown) -> Result<(), CliError> {
        let dumper = cli.dumper(self.fetch.into(), shutdown)?;
        let progress = cli.progress(self.collection.as_deref().unwrap_or("all"));
        let summaries = dumper
            .run(self.collection.as_deref(), progress.as_ref())
            .await?;

        cli.emit(&summaries, || {
            for summary in &summaries {
                print_run_summary(summary);
            }
        })
    }
}

/// `download` arguments
#[derive(Args, Debug)]
pub struct DownloadArgs {
    /// File with one `<collection> <pid>` per line
    pub pids_file: PathBuf,

    /// Download behaviour
    #[command(flatten)]
    pub fetch: FetchFlags,
}

impl DownloadArgs {
    /// Execute the download
    pub async fn execute(&self, cli: &Cli, shutdown: SharedShutdown) -> Result<(), CliError> {
        let dumper = cli.dumper(self.fetch.into(), shutdown)?;
        let progress = cli.progress("documents");
        let summary = dumper
            .download_identifier_file(&self.pids_file, progress.as_ref())
            .await?;

        cli.emit(&summary, || print_download_summary(&summary))
    }
}

/// `identifiers` arguments
#[derive(Args, Debug)]
pub struct IdentifiersArgs {
    /// Only identifiers processed since this date (YYYY-MM-DD)
    #[arg(long, default_value = EPOCH_DATE, value_parser = parse_date)]
    pub from: String,

    /// Collection code; all eligible collections when omitted
    #[arg(long, short = 'c')]
    pub collection: Option<String>,

    /// Destination file
    #[arg(long, short = 'o')]
    pub output: PathBuf,
}

impl IdentifiersArgs {
    /// Execute the listing
    pub async fn execute(&self, cli: &Cli, shutdown: SharedShutdown) -> Result<(), CliError> {
        let dumper = cli.dumper(FetchOptions::default(), shutdown)?;
        let count = dumper
            .write_identifier_list(&self.from, self.collection.as_deref(), &self.output)
            .await?;

        let result = serde_json::json!({
            "output": self.output.display().to_string(),
            "from": self.from,
            "identifiers": count,
        });
        cli.emit(&result, || {
            println!("{count} identifiers written to {}", self.output.display());
        })
    }
}

fn print_download_summary(summary: &DownloadSummary) {
    println!("Documents: {}", summary.total);
    println!("  written:          {}", summary.written);
    println!("  already present:  {}", summary.skipped_existing);
    println!("  null:             {}", summary.skipped_null);
    if summary.failed > 0 {
        error!(failed = summary.failed, "Some documents could not be downloaded");
        println!("  failed:           {}", summary.failed);
    }
}

fn print_run_summary(summary: &RunSummary) {
    println!(
        "\nCollection {} (since {}): {} identifiers, list at {}",
        summary.collection,
        summary.from_date,
        summary.identifiers,
        summary.identifier_list.display()
    );
    print_download_summary(&summary.downloads);
    match &summary.watermark {
        Some(date) => println!("Watermark advanced to {date}"),
        None => println!("Watermark unchanged"),
    }
}

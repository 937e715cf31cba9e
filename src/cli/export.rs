//! CLI command for the dates export

use crate::downloader::FetchOptions;
use crate::shutdown::SharedShutdown;
use clap::Args;
use std::path::PathBuf;

use super::{Cli, CliError};

/// `export-dates` arguments
#[derive(Debug, Args)]
pub struct ExportDatesArgs {
    /// Collection whose stored documents are exported
    #[arg(long, short = 'c')]
    pub collection: String,

    /// Destination CSV file
    #[arg(long, short = 'o', default_value = "documents_dates.csv")]
    pub output: PathBuf,
}

impl ExportDatesArgs {
    /// Execute the export
    pub fn execute(&self, cli: &Cli, shutdown: SharedShutdown) -> Result<(), CliError> {
        let dumper = cli.dumper(FetchOptions::default(), shutdown)?;
        let summary = dumper.export_dates(&self.collection, &self.output)?;

        cli.emit(&summary, || {
            println!(
                "{} documents exported to {} ({} skipped)",
                summary.rows,
                self.output.display(),
                summary.skipped
            );
        })
    }
}

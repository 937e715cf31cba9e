//! Dates export
//!
//! One CSV row per stored document with the document's lifecycle dates, each
//! followed by its year, month and day columns.

use crate::document::ArticleDocument;
use csv::Writer;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::{debug, info};

use super::{OutputError, OutputResult};

const DEFAULT_BUFFER_SIZE: usize = 8192;

/// Labels of the date columns, in output order
const DATE_LABELS: [&str; 6] = [
    "document submitted at",
    "document accepted at",
    "document reviewed at",
    "document published as ahead of print at",
    "document published at",
    "document processed at",
];

/// Column names of the export
pub fn header() -> Vec<String> {
    let mut columns = vec![
        "extraction date".to_string(),
        "collection".to_string(),
        "document publishing ID (PID SciELO)".to_string(),
        "document publishing year".to_string(),
    ];
    for label in DATE_LABELS {
        columns.push(label.to_string());
        columns.push(format!("{label} year"));
        columns.push(format!("{label} month"));
        columns.push(format!("{label} day"));
    }
    columns
}

/// Split a `YYYY[-MM[-DD]]` date into year, month and day; missing parts are empty.
pub fn split_date(date: &str) -> [String; 3] {
    let mut parts = date.splitn(3, '-').map(str::to_string);
    [
        parts.next().unwrap_or_default(),
        parts.next().unwrap_or_default(),
        parts.next().unwrap_or_default(),
    ]
}

/// CSV writer for the dates export
pub struct DatesCsvWriter<W: Write> {
    writer: Writer<W>,
    extraction_date: String,
    rows_written: u64,
}

impl DatesCsvWriter<BufWriter<File>> {
    /// Create the export file at `path`, truncating any previous export
    pub fn create(path: &Path, extraction_date: impl Into<String>) -> OutputResult<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| OutputError::IoError(format!("Failed to create directory: {e}")))?;
        }
        let file = File::create(path)
            .map_err(|e| OutputError::IoError(format!("Failed to create {}: {e}", path.display())))?;
        debug!(path = %path.display(), "Created dates export");
        Self::from_writer(BufWriter::with_capacity(DEFAULT_BUFFER_SIZE, file), extraction_date)
    }
}

impl<W: Write> DatesCsvWriter<W> {
    /// Wrap any writer and emit the header
    pub fn from_writer(inner: W, extraction_date: impl Into<String>) -> OutputResult<Self> {
        let mut writer = Writer::from_writer(inner);
        writer
            .write_record(header())
            .map_err(|e| OutputError::CsvError(format!("Failed to write header: {e}")))?;
        Ok(Self {
            writer,
            extraction_date: extraction_date.into(),
            rows_written: 0,
        })
    }

    /// Append the row of one document
    pub fn write_document(&mut self, document: &ArticleDocument) -> OutputResult<()> {
        let mut row = vec![
            self.extraction_date.clone(),
            document.collection().unwrap_or_default().to_string(),
            document.code().unwrap_or_default().to_string(),
            document.publication_year().unwrap_or_default(),
        ];

        let dates = [
            document.receive_date(),
            document.acceptance_date(),
            document.review_date(),
            document.ahead_of_print_date(),
            document.publication_date(),
            document.processing_date().map(str::to_string),
        ];
        for date in dates {
            let date = date.unwrap_or_default();
            let [year, month, day] = split_date(&date);
            row.extend([date, year, month, day]);
        }

        self.writer
            .write_record(&row)
            .map_err(|e| OutputError::CsvError(format!("Failed to write row: {e}")))?;
        self.rows_written += 1;
        Ok(())
    }

    /// Rows written so far, header excluded
    pub fn rows_written(&self) -> u64 {
        self.rows_written
    }

    /// Flush and return the underlying writer
    pub fn close(self) -> OutputResult<W> {
        let rows = self.rows_written;
        let inner = self
            .writer
            .into_inner()
            .map_err(|e| OutputError::IoError(format!("Failed to flush export: {e}")))?;
        info!(rows = rows, "Dates export closed");
        Ok(inner)
    }
}

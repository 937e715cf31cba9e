//! Stored document access
//!
//! A downloaded JSON payload is kept as a [`serde_json::Value`] and read
//! through accessors. Dates held in ISIS fields (`article.vNNN[0]._`) are
//! `YYYYMMDD` strings where zero parts mean "unknown".

use serde_json::Value;
use std::fs::{self, ReadDir};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

/// ISIS tag of the date the document was received
const RECEIVED_TAG: &str = "v112";
/// ISIS tag of the acceptance date
const ACCEPTED_TAG: &str = "v114";
/// ISIS tag of the review date
const REVIEWED_TAG: &str = "v116";
/// ISIS tag of the ahead-of-print publication date
const AHEAD_OF_PRINT_TAG: &str = "v223";
/// ISIS tag of the publication date
const PUBLICATION_TAG: &str = "v65";

/// Stored document errors
#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    /// IO error
    #[error("IO error reading {path}: {message}")]
    Io {
        /// File being read
        path: PathBuf,
        /// Underlying error
        message: String,
    },

    /// The payload is not a JSON object
    #[error("invalid document {path}: {message}")]
    Invalid {
        /// File being parsed
        path: PathBuf,
        /// Parse error
        message: String,
    },
}

/// A downloaded document payload
#[derive(Debug, Clone)]
pub struct ArticleDocument {
    raw: Value,
}

impl ArticleDocument {
    /// Parse a JSON payload. Only JSON objects are accepted.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        let raw: Value = serde_json::from_slice(bytes)?;
        if !raw.is_object() {
            return Err(serde::de::Error::custom("document is not a JSON object"));
        }
        Ok(Self { raw })
    }

    /// Read and parse a stored file
    pub fn from_path(path: &Path) -> Result<Self, DocumentError> {
        let bytes = fs::read(path).map_err(|e| DocumentError::Io {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Self::from_slice(&bytes).map_err(|e| DocumentError::Invalid {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Raw JSON value
    pub fn raw(&self) -> &Value {
        &self.raw
    }

    /// Document PID
    pub fn code(&self) -> Option<&str> {
        self.raw.get("code").and_then(Value::as_str)
    }

    /// Collection acronym
    pub fn collection(&self) -> Option<&str> {
        self.raw.get("collection").and_then(Value::as_str)
    }

    /// Date the catalog last processed the document
    pub fn processing_date(&self) -> Option<&str> {
        self.raw.get("processing_date").and_then(Value::as_str)
    }

    /// Publication date, from the top-level field or the ISIS record
    pub fn publication_date(&self) -> Option<String> {
        self.raw
            .get("publication_date")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .or_else(|| self.isis_date(PUBLICATION_TAG))
    }

    /// Four-digit publication year
    pub fn publication_year(&self) -> Option<String> {
        self.publication_date()
            .and_then(|date| date.get(0..4).map(str::to_string))
    }

    /// Date the manuscript was received
    pub fn receive_date(&self) -> Option<String> {
        self.isis_date(RECEIVED_TAG)
    }

    /// Date the manuscript was accepted
    pub fn acceptance_date(&self) -> Option<String> {
        self.isis_date(ACCEPTED_TAG)
    }

    /// Date the manuscript was reviewed
    pub fn review_date(&self) -> Option<String> {
        self.isis_date(REVIEWED_TAG)
    }

    /// Date the document was published ahead of print
    pub fn ahead_of_print_date(&self) -> Option<String> {
        self.isis_date(AHEAD_OF_PRINT_TAG)
    }

    fn isis_field(&self, tag: &str) -> Option<&str> {
        self.raw
            .get("article")?
            .get(tag)?
            .get(0)?
            .get("_")?
            .as_str()
    }

    fn isis_date(&self, tag: &str) -> Option<String> {
        self.isis_field(tag).and_then(normalize_isis_date)
    }
}

/// Normalize an ISIS `YYYYMMDD` date to `YYYY-MM-DD`, `YYYY-MM` or `YYYY`.
///
/// A zero month drops month and day; a zero day drops the day. Returns `None`
/// when no year can be read.
pub fn normalize_isis_date(value: &str) -> Option<String> {
    let digits: String = value.chars().filter(char::is_ascii_digit).collect();
    let year = digits.get(0..4)?;
    if year == "0000" {
        return None;
    }

    let part = |range: std::ops::Range<usize>| digits.get(range).filter(|p| *p != "00");
    match (part(4..6), part(6..8)) {
        (Some(month), Some(day)) => Some(format!("{year}-{month}-{day}")),
        (Some(month), None) => Some(format!("{year}-{month}")),
        _ => Some(year.to_string()),
    }
}

/// Lazy iterator over the JSON files of a data directory.
///
/// Yields `(path, result)` so a caller can log and skip unreadable documents.
pub struct StoredDocuments {
    entries: Option<ReadDir>,
}

impl StoredDocuments {
    /// Iterate the `.json` files of `dir`. A missing directory yields nothing.
    pub fn open(dir: &Path) -> Result<Self, DocumentError> {
        match fs::read_dir(dir) {
            Ok(entries) => Ok(Self {
                entries: Some(entries),
            }),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(dir = %dir.display(), "No stored documents");
                Ok(Self { entries: None })
            }
            Err(e) => Err(DocumentError::Io {
                path: dir.to_path_buf(),
                message: e.to_string(),
            }),
        }
    }
}

impl Iterator for StoredDocuments {
    type Item = (PathBuf, Result<ArticleDocument, DocumentError>);

    fn next(&mut self) -> Option<Self::Item> {
        let entries = self.entries.as_mut()?;
        for entry in entries.by_ref() {
            let path = match entry {
                Ok(entry) => entry.path(),
                Err(e) => {
                    debug!(error = %e, "Skipping unreadable directory entry");
                    continue;
                }
            };
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let document = ArticleDocument::from_path(&path);
            return Some((path, document));
        }
        None
    }
}

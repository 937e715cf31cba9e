//! Workdir layout
//!
//! ```text
//! <workdir>/<format>/<collection>/
//!     data/<pid>.<ext>
//!     pids_<from>_<today>.txt
//!     dates.txt
//!     lastdate.txt
//!     .dump.lock
//! ```

use crate::{DocumentFormat, DocumentId};
use std::path::{Path, PathBuf};

const DATA_DIR: &str = "data";
const DATES_FILE: &str = "dates.txt";
const WATERMARK_FILE: &str = "lastdate.txt";
const LOCK_FILE: &str = ".dump.lock";

/// Root of the local layout for one document format
#[derive(Debug, Clone)]
pub struct OutputLayout {
    workdir: PathBuf,
    format: DocumentFormat,
}

impl OutputLayout {
    /// Layout rooted at `workdir` for documents in `format`
    pub fn new(workdir: impl Into<PathBuf>, format: DocumentFormat) -> Self {
        Self {
            workdir: workdir.into(),
            format,
        }
    }

    /// Working directory
    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    /// Document format
    pub fn format(&self) -> &DocumentFormat {
        &self.format
    }

    /// Paths of one collection
    pub fn collection(&self, collection: &str) -> CollectionLayout {
        CollectionLayout {
            root: self.workdir.join(self.format.code()).join(collection),
            extension: self.format.extension(),
        }
    }
}

/// Paths of one collection's artifacts
#[derive(Debug, Clone)]
pub struct CollectionLayout {
    root: PathBuf,
    extension: &'static str,
}

impl CollectionLayout {
    /// Collection directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding one file per document
    pub fn data_dir(&self) -> PathBuf {
        self.root.join(DATA_DIR)
    }

    /// Destination of a document payload
    pub fn document_path(&self, document: &DocumentId) -> PathBuf {
        self.data_dir()
            .join(format!("{}.{}", document.pid(), self.extension))
    }

    /// Identifier list written by a run enumerating from `from_date` on `today`
    pub fn identifier_list_path(&self, from_date: &str, today: &str) -> PathBuf {
        self.root.join(format!("pids_{from_date}_{today}.txt"))
    }

    /// Processing dates parallel to the identifier list
    pub fn dates_path(&self) -> PathBuf {
        self.root.join(DATES_FILE)
    }

    /// Watermark file
    pub fn watermark_path(&self) -> PathBuf {
        self.root.join(WATERMARK_FILE)
    }

    /// Run lock file
    pub fn lock_path(&self) -> PathBuf {
        self.root.join(LOCK_FILE)
    }
}

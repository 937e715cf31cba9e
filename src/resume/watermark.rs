//! Watermark persistence
//!
//! The watermark is the processing date below which every document of a
//! collection is assumed to be downloaded. It is stored as a bare
//! `YYYY-MM-DD` string and only ever moves forward.

use super::ResumeError;
use crate::output::write_atomic;
use crate::EPOCH_DATE;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Reads and advances one collection's watermark file
#[derive(Debug, Clone)]
pub struct WatermarkTracker {
    path: PathBuf,
}

impl WatermarkTracker {
    /// Tracker for the watermark file at `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Watermark file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current watermark, or [`EPOCH_DATE`] when none was recorded
    pub fn read(&self) -> Result<String, ResumeError> {
        match std::fs::read_to_string(&self.path) {
            Ok(contents) => {
                let date = contents.trim();
                if date.is_empty() {
                    Ok(EPOCH_DATE.to_string())
                } else {
                    Ok(date.to_string())
                }
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No watermark recorded");
                Ok(EPOCH_DATE.to_string())
            }
            Err(e) => Err(ResumeError::IoError(format!(
                "Failed to read watermark {}: {e}",
                self.path.display()
            ))),
        }
    }

    /// Replace the watermark atomically. The value is not validated.
    pub fn write(&self, date: &str) -> Result<(), ResumeError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ResumeError::IoError(e.to_string()))?;
        }
        write_atomic(&self.path, date.as_bytes(), true)
            .map_err(|e| ResumeError::IoError(e.to_string()))?;
        Ok(())
    }

    /// Write `candidate` only if it is later than the current watermark.
    ///
    /// Dates compare as strings. Returns whether the file changed.
    pub fn advance(&self, candidate: &str) -> Result<bool, ResumeError> {
        let current = self.read()?;
        if candidate <= current.as_str() {
            debug!(current = %current, candidate = %candidate, "Watermark unchanged");
            return Ok(false);
        }
        self.write(candidate)?;
        info!(from = %current, to = %candidate, "Watermark advanced");
        Ok(true)
    }
}

//! Local file output
//!
//! - [`layout`] - Where each artifact of a collection lives under the workdir
//! - [`csv`] - Dates export of stored documents
//!
//! Every file written here goes through [`write_atomic`]: the contents are
//! written to a temporary file in the destination directory and renamed into
//! place, so a reader never observes a partially written file.

use bytes::Bytes;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;

pub mod csv;
pub mod layout;

pub use layout::{CollectionLayout, OutputLayout};

/// Output errors
#[derive(Debug, thiserror::Error)]
pub enum OutputError {
    /// IO error
    #[error("IO error: {0}")]
    IoError(String),

    /// CSV write error
    #[error("CSV error: {0}")]
    CsvError(String),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// Write `contents` to `path` through a temporary file in the same directory.
///
/// With `overwrite == false` an existing destination is never replaced, even
/// one that appeared after the caller checked for it; `Ok(false)` is returned
/// and the temporary file is discarded. The parent directory must exist.
pub fn write_atomic(path: &Path, contents: &[u8], overwrite: bool) -> OutputResult<bool> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut temp_file = NamedTempFile::new_in(parent)
        .map_err(|e| OutputError::IoError(format!("Failed to create temp file in {}: {e}", parent.display())))?;
    temp_file
        .write_all(contents)
        .map_err(|e| OutputError::IoError(format!("Failed to write temp file: {e}")))?;
    temp_file
        .as_file()
        .sync_all()
        .map_err(|e| OutputError::IoError(format!("Failed to sync temp file: {e}")))?;

    if overwrite {
        temp_file
            .persist(path)
            .map_err(|e| OutputError::IoError(format!("Failed to persist {}: {}", path.display(), e.error)))?;
    } else {
        match temp_file.persist_noclobber(path) {
            Ok(_) => {}
            Err(e) if e.error.kind() == ErrorKind::AlreadyExists => {
                debug!(path = %path.display(), "Destination appeared meanwhile, keeping existing file");
                return Ok(false);
            }
            Err(e) => {
                return Err(OutputError::IoError(format!(
                    "Failed to persist {}: {}",
                    path.display(),
                    e.error
                )))
            }
        }
    }

    Ok(true)
}

/// [`write_atomic`] on the blocking thread pool
pub async fn write_atomic_async(path: PathBuf, contents: Bytes, overwrite: bool) -> OutputResult<bool> {
    tokio::task::spawn_blocking(move || write_atomic(&path, &contents, overwrite))
        .await
        .map_err(|e| OutputError::IoError(format!("write task failed: {e}")))?
}

/// Atomically write one line per item, each terminated by `\n`.
pub fn write_lines_atomic<I, S>(path: &Path, lines: I) -> OutputResult<()>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut buffer = String::new();
    for line in lines {
        buffer.push_str(line.as_ref());
        buffer.push('\n');
    }
    write_atomic(path, buffer.as_bytes(), true)?;
    Ok(())
}

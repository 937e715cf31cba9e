//! Document identifier parsing and validation
//!
//! Identifiers are written one per line as `COLLECTION PID`, the format used by
//! identifier list files.

use std::fmt;
use std::fs;
use std::path::Path;

/// A document in the remote catalog: a collection code plus a PID.
///
/// Both components are used as path segments on disk, so separators and
/// parent-directory references are rejected.
///
/// # Examples
///
/// ```
/// use articlemeta_dump::identifier::DocumentId;
///
/// let id = DocumentId::parse("scl S0102-67202000000100001").unwrap();
/// assert_eq!(id.collection(), "scl");
/// assert_eq!(id.pid(), "S0102-67202000000100001");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct DocumentId {
    collection: String,
    pid: String,
}

impl DocumentId {
    /// Build an identifier from its components.
    pub fn new(collection: impl Into<String>, pid: impl Into<String>) -> Result<Self, IdentifierError> {
        let collection = collection.into();
        let pid = pid.into();
        validate_component("collection", &collection)?;
        validate_component("pid", &pid)?;
        Ok(Self { collection, pid })
    }

    /// Parse a `COLLECTION PID` line.
    ///
    /// Surrounding whitespace is ignored; any other number of fields is an error.
    pub fn parse(line: &str) -> Result<Self, IdentifierError> {
        let mut fields = line.split_whitespace();
        match (fields.next(), fields.next(), fields.next()) {
            (Some(collection), Some(pid), None) => Self::new(collection, pid),
            _ => Err(IdentifierError::InvalidFormat(format!(
                "expected 'COLLECTION PID', got '{}'",
                line.trim()
            ))),
        }
    }

    /// Collection code
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Document PID
    pub fn pid(&self) -> &str {
        &self.pid
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.collection, self.pid)
    }
}

fn validate_component(name: &str, value: &str) -> Result<(), IdentifierError> {
    if value.is_empty() {
        return Err(IdentifierError::InvalidFormat(format!(
            "{name} component cannot be empty"
        )));
    }
    if value.chars().any(|c| c.is_whitespace() || c == '/' || c == '\\') || value == "." || value == ".." {
        return Err(IdentifierError::InvalidFormat(format!(
            "{name} component '{value}' is not a valid path segment"
        )));
    }
    Ok(())
}

/// Read an identifier list file, skipping blank lines.
pub fn read_identifier_file(path: &Path) -> Result<Vec<DocumentId>, IdentifierError> {
    let contents = fs::read_to_string(path)
        .map_err(|e| IdentifierError::Io(format!("{}: {e}", path.display())))?;
    parse_identifier_lines(&contents)
}

/// Parse the contents of an identifier list.
pub fn parse_identifier_lines(contents: &str) -> Result<Vec<DocumentId>, IdentifierError> {
    contents
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(index, line)| {
            DocumentId::parse(line).map_err(|e| IdentifierError::InvalidLine {
                line: index + 1,
                reason: e.to_string(),
            })
        })
        .collect()
}

/// Errors that can occur during identifier parsing
#[derive(Debug, thiserror::Error)]
pub enum IdentifierError {
    /// Invalid identifier format
    #[error("identifier error: {0}")]
    InvalidFormat(String),

    /// Invalid line in an identifier file
    #[error("line {line}: {reason}")]
    InvalidLine {
        /// 1-based line number
        line: usize,
        /// What was wrong with it
        reason: String,
    },

    /// Identifier file could not be read
    #[error("IO error: {0}")]
    Io(String),
}

// src/error.rs

use thiserror::Error;

/// Core error types for repomirror
#[derive(Error, Debug)]
pub enum Error {
    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// XML tokenizer errors from repository metadata
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Malformed metadata document
    #[error("Parse error: {0}")]
    ParseError(String),

    /// A record is missing a field it cannot be built without
    #[error("{record} record is missing required field '{field}'")]
    MissingField { record: String, field: String },

    /// A manifest line could not be turned into an entry
    #[error("Malformed manifest at line {line}: {reason}")]
    MalformedManifest { line: usize, reason: String },

    /// Checksum algorithm we cannot compute or do not recognize
    #[error("Unsupported checksum type: {0}")]
    UnsupportedChecksum(String),

    /// Computed digest does not match the declared one
    #[error("Checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch { expected: String, actual: String },

    /// Retention must keep at least one version
    #[error("Invalid retention count {0}: at least one version must be kept")]
    InvalidRetention(i64),

    /// Configuration could not be loaded
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Requested entity does not exist
    #[error("Not found: {0}")]
    NotFoundError(String),
}

impl Error {
    /// Shorthand for a missing required field
    pub fn missing(record: impl Into<String>, field: impl Into<String>) -> Self {
        Self::MissingField {
            record: record.into(),
            field: field.into(),
        }
    }
}

/// Result type alias using repomirror's Error type
pub type Result<T> = std::result::Result<T, Error>;

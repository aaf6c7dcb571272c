//! Error types for the slug index.
//!
//! Corpus read problems never surface here; they are logged and the partition
//! is skipped. Everything in this enum is either fatal to a build or reported
//! back to the caller of a fallible store operation.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for slugdex.
#[derive(Debug, Error)]
pub enum SlugdexError {
    // Database errors
    #[error("Database error: {message}")]
    Database {
        message: String,
        #[source]
        source: Option<rusqlite::Error>,
    },

    #[error("Schema error: {message}")]
    Schema { message: String },

    #[error("Full-text index holds {indexed} documents but {records} slugs were loaded")]
    IndexMismatch { records: usize, indexed: usize },

    #[error("Another build holds the lock at {0}")]
    BuildInProgress(PathBuf),

    // File system errors
    #[error("IO error at {path:?}: {message}")]
    Io {
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<std::io::Error>,
    },

    #[error("Source corpus not found: {0}")]
    CorpusNotFound(PathBuf),

    // Serialization errors
    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    // Request errors
    #[error("Invalid params: {message}")]
    InvalidParams { message: String },

    #[error("{0}")]
    Other(String),
}

/// Result type alias for slugdex operations.
pub type Result<T> = std::result::Result<T, SlugdexError>;

impl From<std::io::Error> for SlugdexError {
    fn from(err: std::io::Error) -> Self {
        SlugdexError::Io {
            message: err.to_string(),
            path: None,
            source: Some(err),
        }
    }
}

impl From<serde_json::Error> for SlugdexError {
    fn from(err: serde_json::Error) -> Self {
        SlugdexError::Json {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl From<rusqlite::Error> for SlugdexError {
    fn from(err: rusqlite::Error) -> Self {
        SlugdexError::Database {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl From<walkdir::Error> for SlugdexError {
    fn from(err: walkdir::Error) -> Self {
        let path = err.path().map(|p| p.to_path_buf());
        let message = err.to_string();
        SlugdexError::Io {
            message,
            path,
            source: err.into_io_error(),
        }
    }
}

impl SlugdexError {
    /// Create an IO error with path context.
    pub fn io_with_path(err: std::io::Error, path: impl Into<PathBuf>) -> Self {
        SlugdexError::Io {
            message: err.to_string(),
            path: Some(path.into()),
            source: Some(err),
        }
    }

    /// Convert to a JSON-RPC error code.
    ///
    /// Custom error codes (application-defined, -32000 to -32099):
    /// - -32001: Source corpus not found
    /// - -32003: Build failed or is already running
    pub fn to_rpc_error_code(&self) -> i32 {
        match self {
            SlugdexError::InvalidParams { .. } => -32602,

            SlugdexError::CorpusNotFound(_) => -32001,

            SlugdexError::Schema { .. }
            | SlugdexError::IndexMismatch { .. }
            | SlugdexError::BuildInProgress(_) => -32003,

            _ => -32603,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SlugdexError::IndexMismatch {
            records: 10,
            indexed: 9,
        };
        assert_eq!(
            err.to_string(),
            "Full-text index holds 9 documents but 10 slugs were loaded"
        );
    }

    #[test]
    fn test_rpc_error_codes() {
        assert_eq!(
            SlugdexError::CorpusNotFound(PathBuf::from("/missing")).to_rpc_error_code(),
            -32001
        );
        assert_eq!(
            SlugdexError::InvalidParams {
                message: "query".into()
            }
            .to_rpc_error_code(),
            -32602
        );
        assert_eq!(SlugdexError::Other("x".into()).to_rpc_error_code(), -32603);
    }

    #[test]
    fn test_rusqlite_conversion() {
        let err: SlugdexError = rusqlite::Error::QueryReturnedNoRows.into();
        assert!(matches!(err, SlugdexError::Database { source: Some(_), .. }));
    }
}

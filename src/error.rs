//! Error types for pike.
//!
//! All fallible operations in the crate return [`Result`], whose error side is
//! the [`PikeError`] enum. The variants follow the failure taxonomy of the
//! engine: schema compilation, document validation, query validation, storage
//! and replication consistency.
//!
//! # Examples
//!
//! ```
//! use pike::error::{PikeError, Result};
//!
//! fn example_operation() -> Result<()> {
//!     Err(PikeError::query("No field definition for the field: price"))
//! }
//!
//! match example_operation() {
//!     Ok(_) => println!("Success"),
//!     Err(e) => eprintln!("Error: {}", e),
//! }
//! ```

use std::io;

use thiserror::Error;

/// The main error type for pike operations.
#[derive(Error, Debug)]
pub enum PikeError {
    /// I/O errors (file operations, etc.)
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Schema compilation errors (unknown analyzer, unsupported template, ...)
    #[error("Schema error: {0}")]
    Schema(String),

    /// A document references an undeclared field or carries an invalid value.
    #[error("Document error: {0}")]
    Document(String),

    /// Malformed predicate or a collector referencing an unknown field.
    #[error("Query error: {0}")]
    Query(String),

    /// Storage errors (write, commit, read, decode)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Replication identity mismatch.
    #[error("Consistency error: {0}")]
    Consistency(String),

    /// Analysis-related errors (tokenization, filtering, etc.)
    #[error("Analysis error: {0}")]
    Analysis(String),

    /// Index lifecycle errors (closed engine, missing index, ...)
    #[error("Index error: {0}")]
    Index(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error for other cases
    #[error("Error: {0}")]
    Other(String),
}

/// Result type alias for operations that may fail with PikeError.
pub type Result<T> = std::result::Result<T, PikeError>;

impl PikeError {
    /// Create a new schema error.
    pub fn schema<S: Into<String>>(msg: S) -> Self {
        PikeError::Schema(msg.into())
    }

    /// Create a new document error.
    pub fn document<S: Into<String>>(msg: S) -> Self {
        PikeError::Document(msg.into())
    }

    /// Create a new query error.
    pub fn query<S: Into<String>>(msg: S) -> Self {
        PikeError::Query(msg.into())
    }

    /// Create a new storage error.
    pub fn storage<S: Into<String>>(msg: S) -> Self {
        PikeError::Storage(msg.into())
    }

    /// Create a new consistency error.
    pub fn consistency<S: Into<String>>(msg: S) -> Self {
        PikeError::Consistency(msg.into())
    }

    /// Create a new analysis error.
    pub fn analysis<S: Into<String>>(msg: S) -> Self {
        PikeError::Analysis(msg.into())
    }

    /// Create a new index error.
    pub fn index<S: Into<String>>(msg: S) -> Self {
        PikeError::Index(msg.into())
    }

    /// Create a new generic error.
    pub fn other<S: Into<String>>(msg: S) -> Self {
        PikeError::Other(msg.into())
    }

    /// Create a new invalid config error.
    pub fn invalid_config<S: Into<String>>(msg: S) -> Self {
        PikeError::Other(format!("Invalid configuration: {}", msg.into()))
    }

    /// Create a new not found error.
    pub fn not_found<S: Into<String>>(msg: S) -> Self {
        PikeError::Index(format!("Not found: {}", msg.into()))
    }
}

impl From<bincode::error::EncodeError> for PikeError {
    fn from(err: bincode::error::EncodeError) -> Self {
        PikeError::Storage(format!("Encode failed: {err}"))
    }
}

impl From<bincode::error::DecodeError> for PikeError {
    fn from(err: bincode::error::DecodeError) -> Self {
        PikeError::Storage(format!("Decode failed: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_construction() {
        let error = PikeError::schema("Unknown analyzer: foo");
        assert_eq!(error.to_string(), "Schema error: Unknown analyzer: foo");

        let error = PikeError::document("No field definition for the field: bar");
        assert_eq!(
            error.to_string(),
            "Document error: No field definition for the field: bar"
        );

        let error = PikeError::consistency("uuid mismatch");
        assert_eq!(error.to_string(), "Consistency error: uuid mismatch");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_error = io::Error::new(io::ErrorKind::NotFound, "File not found");
        let pike_error = PikeError::from(io_error);

        match pike_error {
            PikeError::Io(_) => {}
            _ => panic!("Expected IO error variant"),
        }
    }
}

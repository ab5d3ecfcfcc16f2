//! Error types for importing and comparing dumps.

use std::path::PathBuf;

use sqldump_core::{ParseError, ResolutionError};

/// Errors that abort an import or comparison.
///
/// Failures of single statements are not errors: they are collected as
/// [`FailedQuery`](sqldump_core::FailedQuery) values instead.
#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    /// Database error while connecting.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// IO error (reading dumps or configuration).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Table ordering hit an internal fault.
    #[error("Dependency resolution failed: {0}")]
    Resolution(#[from] ResolutionError),

    /// A statement needed by the importer could not be parsed.
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    /// Failed to load a configuration file.
    #[error("Failed to load configuration '{path}': {message}")]
    Config {
        /// Path to the configuration file.
        path: PathBuf,
        /// Error message.
        message: String,
    },

    /// A query the importer depends on failed.
    #[error("Query failed with error {code}: {msg}")]
    Query {
        /// Server or client error number.
        code: u32,
        /// Error message.
        msg: String,
    },
}

/// Result type for import operations.
pub type Result<T> = std::result::Result<T, ImportError>;

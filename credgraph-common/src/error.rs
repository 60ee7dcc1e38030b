//! Common error types for credgraph

use thiserror::Error;

/// Common result type for credgraph operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across the credgraph crates
#[derive(Error, Debug)]
pub enum Error {
    /// An applicable source lacks credentials or directory configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// A persisted document has an unexpected type or unknown version tag
    #[error("Compat error: expected {expected_type}, found {found_type} at version {found_version}")]
    Compat {
        expected_type: String,
        found_type: String,
        found_version: String,
    },

    /// Two sources produced overlapping addresses or conflicting weights
    #[error("Graph merge error: {0}")]
    GraphMerge(String),

    /// A source adapter's mirror or graph construction call failed
    #[error("Source {source_name} failed: {message}")]
    SourceIo {
        source_name: String,
        message: String,
    },

    /// Cache store operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parse error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Requested resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid input value
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Attribute an adapter failure to a source.
    ///
    /// Errors that already carry a source name are passed through unchanged.
    pub fn from_source(source_name: &str, err: Error) -> Self {
        match err {
            Error::SourceIo { .. } => err,
            other => Error::SourceIo {
                source_name: source_name.to_string(),
                message: other.to_string(),
            },
        }
    }
}

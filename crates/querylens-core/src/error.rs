//! Error types for QueryLens

use thiserror::Error;

/// Result type alias using QueryLens's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for QueryLens operations
#[derive(Error, Debug)]
pub enum Error {
    /// Not found error
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Kind of entity looked up
        entity: String,
        /// Requested identifier
        id: String,
    },

    /// A quality test exceeded its time budget
    #[error("Test {test_id} timed out after {timeout_ms}ms")]
    Timeout {
        /// Test that timed out
        test_id: String,
        /// Budget that was exceeded
        timeout_ms: u64,
    },

    /// The external answering function failed
    #[error("External failure: {0}")]
    External(String),

    /// Key-value storage error
    #[error("Storage error: {0}")]
    Storage(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// HTTP client error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Create a not found error
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Create a storage error
    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    /// Create an external failure error
    pub fn external(msg: impl Into<String>) -> Self {
        Self::External(msg.into())
    }

    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Whether this error came from the persistence layer
    pub fn is_persistence(&self) -> bool {
        matches!(self, Self::Storage(_) | Self::Io(_) | Self::Serialization(_))
    }
}

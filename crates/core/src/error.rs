//! Error types for shelfdb-core.

use thiserror::Error;

/// Errors produced by the storage and index layers.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Record or collection not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Embedding length differs from the collection's established dimension.
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Query asked for an index type that is not attached to the collection.
    #[error("no index of type '{0}' is attached")]
    UnknownIndex(String),

    /// Malformed payload, non-positive k, empty content, and similar.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Filesystem failure in the record store.
    #[error("storage I/O: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization failure.
    #[error("serialization: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Result type alias for shelfdb-core operations.
pub type Result<T> = std::result::Result<T, StoreError>;

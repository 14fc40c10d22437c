//! Error types for the log model and storage contract.

use thiserror::Error;

/// Errors that can occur in storage and engine operations.
#[derive(Debug, Error)]
pub enum LogError {
    /// A required field was not provided.
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    /// The storage backend failed to serve a request.
    #[error("storage backend error: {0}")]
    Backend(String),

    /// The log store is full and cannot accept more entries.
    #[error("log store capacity exceeded")]
    CapacityExceeded,

    /// A search or deletion request was malformed.
    #[error("invalid request: {0}")]
    InvalidSpec(String),
}

/// Result type alias for log operations.
pub type Result<T> = std::result::Result<T, LogError>;

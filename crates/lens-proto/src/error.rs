//! Error types for the lens-proto crate.

use thiserror::Error;

/// Errors that can occur during protocol operations.
#[derive(Debug, Error)]
pub enum ProtoError {
    /// Failed to decode a frame or payload.
    #[error("decoding error: {0}")]
    Decode(String),

    /// The frame names a method this service does not expose.
    #[error("unknown method: {0}")]
    UnknownMethod(String),

    /// The request decoded but cannot be served as given.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl From<prost::DecodeError> for ProtoError {
    fn from(err: prost::DecodeError) -> Self {
        Self::Decode(err.to_string())
    }
}

impl From<lens_logs::LogError> for ProtoError {
    fn from(err: lens_logs::LogError) -> Self {
        Self::InvalidRequest(err.to_string())
    }
}

/// Result type alias for protocol operations.
pub type Result<T> = std::result::Result<T, ProtoError>;

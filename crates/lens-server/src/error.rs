//! Error types for the log service.

use std::net::SocketAddr;

use lens_logs::LogError;
use lens_proto::ProtoError;
use thiserror::Error;

/// Errors that can occur in the log service.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Failed to bind to the specified address.
    #[error("failed to bind to {0}: {1}")]
    BindFailed(SocketAddr, std::io::Error),

    /// WebSocket error occurred.
    #[error("websocket error: {0}")]
    WebSocket(String),

    /// The peer broke the framing or call protocol.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// A frame exceeded the configured size limit.
    #[error("message of {size} bytes exceeds limit of {limit} bytes")]
    MessageTooLarge {
        /// Size of the offending frame.
        size: usize,
        /// Configured limit.
        limit: usize,
    },

    /// The storage backend rejected an operation.
    #[error("storage error: {0}")]
    Storage(#[from] LogError),

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Connection closed.
    #[error("connection closed")]
    ConnectionClosed,
}

impl From<tokio_tungstenite::tungstenite::Error> for ServerError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::WebSocket(err.to_string())
    }
}

impl From<ProtoError> for ServerError {
    fn from(err: ProtoError) -> Self {
        Self::Protocol(err.to_string())
    }
}

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

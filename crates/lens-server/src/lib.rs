//! # lens-server
//!
//! The LogLens RPC service over WebSocket.
//!
//! Each connection carries exactly one call, framed as binary
//! [`lens_proto::RpcFrame`] messages:
//!
//! - **streamLogs**: an opening frame, then one `LogRecord` per frame until
//!   a frame marked `end_of_stream`; the server answers once with a `LogResponse`
//! - **searchLogs**, **getLogById**, **getLogsByLevel**, **getLogsBySource**,
//!   **deleteLogs**: one request, one reply
//! - **getMostCommonPatterns**, **findLogsByPattern**, **getPatternCacheSize**,
//!   **clearPatternCache**: template mining over the stored corpus
//! - **getLogLevels**, **getLogSources**, **getLogCountByTimeSlots**: corpus summaries
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use lens_server::{LogServer, ServerConfig};
//!
//! # async fn run() -> Result<(), lens_server::ServerError> {
//! let config = ServerConfig::new("127.0.0.1:7070".parse().map_err(|_| {
//!     lens_server::ServerError::Config("bad address".to_string())
//! })?)
//! .with_max_connections(256);
//!
//! LogServer::new(config).serve().await
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod ingest;
pub mod server;
pub mod service;
pub mod session;

// Re-export main types
pub use config::{
    DEFAULT_MAX_CONNECTIONS, DEFAULT_MAX_ENTRIES, DEFAULT_MAX_MESSAGE_SIZE, DEFAULT_MAX_TIME_SLOTS,
    DEFAULT_PAGE_SIZE, DEFAULT_PATTERN_LIMIT, ServerConfig,
};
pub use error::{ServerError, ServerResult};
pub use ingest::{IngestSession, SessionState};
pub use server::LogServer;
pub use service::LogService;
pub use session::{decode_ws_message, frame_to_ws, record_stream, run_session, ws_message_size};

//! # lens-proto
//!
//! Wire protocol for the LogLens RPC service.
//!
//! - [`messages`] holds the prost request/response bodies and the [`RpcFrame`] envelope
//! - [`convert`] maps between wire bodies and the `lens-logs` model via [`ProtocolAdapter`]

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod convert;
pub mod error;
pub mod messages;

pub use convert::{DEFAULT_MAX_TIME_SLOTS, ProtocolAdapter, to_records};
pub use error::{ProtoError, Result};
pub use messages::{
    DeleteRequest, DeleteResponse, EmptyRequest, LogIdRequest, LogLevelRequest, LogRecord,
    LogResponse, LogSourceRequest, PatternCacheResponse, PatternCount, PatternLogsRequest,
    PatternLogsResponse, PatternRequest, PatternsResponse, RpcFrame, RpcMethod, SearchRequest,
    SearchResponse, TimeSlotCount, TimeSlotRequest, TimeSlotResponse, ValuesResponse,
};

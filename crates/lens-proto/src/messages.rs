//! Wire message definitions.
//!
//! Every request and response is a prost message with proto3 semantics: an
//! absent string is empty and an absent number is zero. Calls travel inside
//! an [`RpcFrame`] envelope naming the method.

use std::collections::HashMap;
use std::fmt;

use prost::Message;
use serde::{Deserialize, Serialize};

use crate::error::{ProtoError, Result};

// ============ Log Records ============

/// A log record as it crosses the wire.
#[derive(Clone, PartialEq, Message)]
pub struct LogRecord {
    /// Storage-assigned id, empty before the first save.
    #[prost(string, tag = "1")]
    pub id: String,
    /// Epoch milliseconds.
    #[prost(int64, tag = "2")]
    pub timestamp: i64,
    /// Severity label.
    #[prost(string, tag = "3")]
    pub level: String,
    /// Message body.
    #[prost(string, tag = "4")]
    pub message: String,
    /// Producing service or host.
    #[prost(string, tag = "5")]
    pub source: String,
    /// Free-form key/value pairs.
    #[prost(map = "string, string", tag = "6")]
    pub metadata: HashMap<String, String>,
    /// The original unparsed line.
    #[prost(string, tag = "7")]
    pub raw_content: String,
}

/// Terminal summary of an ingestion stream.
#[derive(Clone, PartialEq, Message)]
pub struct LogResponse {
    /// Records persisted before the stream ended.
    #[prost(int64, tag = "1")]
    pub processed_count: i64,
    /// False when the stream ended on an error.
    #[prost(bool, tag = "2")]
    pub success: bool,
    /// Human-readable summary.
    #[prost(string, tag = "3")]
    pub message: String,
}

// ============ Search and Delete ============

/// Paginated search request.
#[derive(Clone, PartialEq, Message)]
pub struct SearchRequest {
    /// Case-insensitive message substring.
    #[prost(string, tag = "1")]
    pub query: String,
    /// Range start, ignored unless both bounds are positive.
    #[prost(int64, tag = "2")]
    pub start_time: i64,
    /// Range end.
    #[prost(int64, tag = "3")]
    pub end_time: i64,
    /// One of `timestamp`, `level`, `message`, `source`; anything else leaves order as is.
    #[prost(string, tag = "4")]
    pub sort_field: String,
    /// Sort direction.
    #[prost(bool, tag = "5")]
    pub sort_ascending: bool,
    /// Zero-based page index.
    #[prost(int32, tag = "6")]
    pub page: i32,
    /// Page length; non-positive selects the server default.
    #[prost(int32, tag = "7")]
    pub size: i32,
}

/// One page of search results.
#[derive(Clone, PartialEq, Message)]
pub struct SearchResponse {
    /// Records on this page.
    #[prost(message, repeated, tag = "1")]
    pub logs: Vec<LogRecord>,
    /// Number of pages.
    #[prost(int32, tag = "2")]
    pub total_pages: i32,
    /// Page actually served.
    #[prost(int32, tag = "3")]
    pub current_page: i32,
    /// Matches across all pages.
    #[prost(int64, tag = "4")]
    pub total_results: i64,
}

/// Lookup of one record.
#[derive(Clone, PartialEq, Message)]
pub struct LogIdRequest {
    /// Record id.
    #[prost(string, tag = "1")]
    pub id: String,
}

/// Lookup of every record with one level, ignoring case.
#[derive(Clone, PartialEq, Message)]
pub struct LogLevelRequest {
    /// Severity label.
    #[prost(string, tag = "1")]
    pub level: String,
}

/// Lookup of every record from one source.
#[derive(Clone, PartialEq, Message)]
pub struct LogSourceRequest {
    /// Exact source name.
    #[prost(string, tag = "1")]
    pub source: String,
}

/// Bulk deletion request.
#[derive(Clone, PartialEq, Message)]
pub struct DeleteRequest {
    /// Case-insensitive message substring.
    #[prost(string, tag = "1")]
    pub query: String,
    /// Range start.
    #[prost(int64, tag = "2")]
    pub start_time: i64,
    /// Range end.
    #[prost(int64, tag = "3")]
    pub end_time: i64,
}

/// Bulk deletion summary.
#[derive(Clone, PartialEq, Message)]
pub struct DeleteResponse {
    /// Deletions the backend confirmed.
    #[prost(int64, tag = "1")]
    pub deleted_count: i64,
    /// False only when the match set could not be computed.
    #[prost(bool, tag = "2")]
    pub success: bool,
    /// Human-readable summary.
    #[prost(string, tag = "3")]
    pub message: String,
}

// ============ Patterns ============

/// Top-K template request.
#[derive(Clone, PartialEq, Message)]
pub struct PatternRequest {
    /// Range start.
    #[prost(int64, tag = "1")]
    pub start_time: i64,
    /// Range end.
    #[prost(int64, tag = "2")]
    pub end_time: i64,
    /// Maximum templates returned; non-positive selects the server default.
    #[prost(int32, tag = "3")]
    pub limit: i32,
}

/// A template with its frequency.
#[derive(Clone, PartialEq, Message)]
pub struct PatternCount {
    /// Template text.
    #[prost(string, tag = "1")]
    pub template: String,
    /// Occurrences.
    #[prost(int64, tag = "2")]
    pub count: i64,
}

/// Ranked templates, most frequent first.
#[derive(Clone, PartialEq, Message)]
pub struct PatternsResponse {
    /// Ranked templates.
    #[prost(message, repeated, tag = "1")]
    pub patterns: Vec<PatternCount>,
}

/// Records matching one template.
#[derive(Clone, PartialEq, Message)]
pub struct PatternLogsRequest {
    /// Exact template text.
    #[prost(string, tag = "1")]
    pub template: String,
    /// Range start.
    #[prost(int64, tag = "2")]
    pub start_time: i64,
    /// Range end.
    #[prost(int64, tag = "3")]
    pub end_time: i64,
}

/// Records whose message reduces to the requested template.
#[derive(Clone, PartialEq, Message)]
pub struct PatternLogsResponse {
    /// Matching records.
    #[prost(message, repeated, tag = "1")]
    pub logs: Vec<LogRecord>,
}

/// Pattern cache status.
#[derive(Clone, PartialEq, Message)]
pub struct PatternCacheResponse {
    /// Cached messages after the call.
    #[prost(int64, tag = "1")]
    pub size: i64,
    /// Human-readable summary.
    #[prost(string, tag = "2")]
    pub message: String,
}

// ============ Corpus Summaries ============

/// Request with no parameters.
#[derive(Clone, PartialEq, Message)]
pub struct EmptyRequest {}

/// A list of distinct values.
#[derive(Clone, PartialEq, Message)]
pub struct ValuesResponse {
    /// Values in first-seen order.
    #[prost(string, repeated, tag = "1")]
    pub values: Vec<String>,
}

/// Histogram request.
#[derive(Clone, PartialEq, Message)]
pub struct TimeSlotRequest {
    /// Case-insensitive message substring.
    #[prost(string, tag = "1")]
    pub query: String,
    /// Range start.
    #[prost(int64, tag = "2")]
    pub start_time: i64,
    /// Range end.
    #[prost(int64, tag = "3")]
    pub end_time: i64,
    /// Number of buckets.
    #[prost(int32, tag = "4")]
    pub slots: i32,
}

/// One histogram bucket.
#[derive(Clone, PartialEq, Message)]
pub struct TimeSlotCount {
    /// Bucket start, epoch milliseconds.
    #[prost(int64, tag = "1")]
    pub start: i64,
    /// Matches in the bucket.
    #[prost(int64, tag = "2")]
    pub count: i64,
}

/// Histogram over equal-width buckets.
#[derive(Clone, PartialEq, Message)]
pub struct TimeSlotResponse {
    /// Buckets in time order.
    #[prost(message, repeated, tag = "1")]
    pub slots: Vec<TimeSlotCount>,
}

// ============ RPC Envelope ============

/// Methods exposed by the log service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RpcMethod {
    /// Client-streaming ingestion.
    StreamLogs,
    /// Paginated search.
    SearchLogs,
    /// Single record lookup.
    GetLogById,
    /// Records with one level.
    GetLogsByLevel,
    /// Records from one source.
    GetLogsBySource,
    /// Bulk deletion.
    DeleteLogs,
    /// Top-K templates.
    GetMostCommonPatterns,
    /// Records by template.
    FindLogsByPattern,
    /// Pattern cache size.
    GetPatternCacheSize,
    /// Empty the pattern cache.
    ClearPatternCache,
    /// Distinct levels.
    GetLogLevels,
    /// Distinct sources.
    GetLogSources,
    /// Histogram of matches.
    GetLogCountByTimeSlots,
}

impl RpcMethod {
    /// Every method.
    pub const ALL: [Self; 13] = [
        Self::StreamLogs,
        Self::SearchLogs,
        Self::GetLogById,
        Self::GetLogsByLevel,
        Self::GetLogsBySource,
        Self::DeleteLogs,
        Self::GetMostCommonPatterns,
        Self::FindLogsByPattern,
        Self::GetPatternCacheSize,
        Self::ClearPatternCache,
        Self::GetLogLevels,
        Self::GetLogSources,
        Self::GetLogCountByTimeSlots,
    ];

    /// Wire name of the method.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::StreamLogs => "streamLogs",
            Self::SearchLogs => "searchLogs",
            Self::GetLogById => "getLogById",
            Self::GetLogsByLevel => "getLogsByLevel",
            Self::GetLogsBySource => "getLogsBySource",
            Self::DeleteLogs => "deleteLogs",
            Self::GetMostCommonPatterns => "getMostCommonPatterns",
            Self::FindLogsByPattern => "findLogsByPattern",
            Self::GetPatternCacheSize => "getPatternCacheSize",
            Self::ClearPatternCache => "clearPatternCache",
            Self::GetLogLevels => "getLogLevels",
            Self::GetLogSources => "getLogSources",
            Self::GetLogCountByTimeSlots => "getLogCountByTimeSlots",
        }
    }

    /// Parses a wire name.
    ///
    /// # Errors
    ///
    /// Returns [`ProtoError::UnknownMethod`] for names not in [`RpcMethod::ALL`].
    pub fn from_name(name: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|m| m.as_str() == name)
            .ok_or_else(|| ProtoError::UnknownMethod(name.to_string()))
    }

    /// Returns true for the client-streaming method.
    #[must_use]
    pub const fn is_streaming(&self) -> bool {
        matches!(self, Self::StreamLogs)
    }
}

impl fmt::Display for RpcMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Envelope carrying one request or response body.
#[derive(Clone, PartialEq, Message)]
pub struct RpcFrame {
    /// Wire name of the method.
    #[prost(string, tag = "1")]
    pub method: String,
    /// Encoded body message.
    #[prost(bytes = "vec", tag = "2")]
    pub payload: Vec<u8>,
    /// Set on the frame that ends a client stream; carries no body.
    #[prost(bool, tag = "3")]
    pub end_of_stream: bool,
}

impl RpcFrame {
    /// Wraps a body for the given method.
    #[must_use]
    pub fn wrap<M: Message>(method: RpcMethod, body: &M) -> Self {
        Self {
            method: method.as_str().to_string(),
            payload: body.encode_to_vec(),
            end_of_stream: false,
        }
    }

    /// The frame a client sends to end its input stream.
    #[must_use]
    pub fn end_of_stream(method: RpcMethod) -> Self {
        Self {
            method: method.as_str().to_string(),
            payload: Vec::new(),
            end_of_stream: true,
        }
    }

    /// Encodes the envelope.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        self.encode_to_vec()
    }

    /// Decodes an envelope.
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes are not a valid frame.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(Self::decode(bytes)?)
    }

    /// The method named by this frame.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is not a known method.
    pub fn rpc_method(&self) -> Result<RpcMethod> {
        RpcMethod::from_name(&self.method)
    }

    /// Decodes the body.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload is not a valid `M`.
    pub fn body<M: Message + Default>(&self) -> Result<M> {
        Ok(M::decode(self.payload.as_slice())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn sample_record() -> LogRecord {
        LogRecord {
            id: String::new(),
            timestamp: 1_700_000_000_000,
            level: "WARN".to_string(),
            message: "disk 91% full".to_string(),
            source: "node-3".to_string(),
            metadata: HashMap::from([("region".to_string(), "eu".to_string())]),
            raw_content: "WARN disk 91% full".to_string(),
        }
    }

    // ===== Method Tests =====

    #[test_case(RpcMethod::StreamLogs, "streamLogs")]
    #[test_case(RpcMethod::GetLogById, "getLogById")]
    #[test_case(RpcMethod::GetLogsByLevel, "getLogsByLevel")]
    #[test_case(RpcMethod::GetLogsBySource, "getLogsBySource")]
    #[test_case(RpcMethod::GetMostCommonPatterns, "getMostCommonPatterns")]
    #[test_case(RpcMethod::GetLogCountByTimeSlots, "getLogCountByTimeSlots")]
    fn method_names(method: RpcMethod, name: &str) {
        assert_eq!(method.as_str(), name);
        assert_eq!(RpcMethod::from_name(name).ok(), Some(method));
    }

    #[test]
    fn method_serde_matches_wire_name() {
        for method in RpcMethod::ALL {
            let json = serde_json::to_string(&method).expect("serialize");
            assert_eq!(json, format!("\"{method}\""));
        }
    }

    #[test]
    fn unknown_method_is_rejected() {
        let err = RpcMethod::from_name("tailLogs").expect_err("unknown");
        assert!(matches!(err, ProtoError::UnknownMethod(ref m) if m == "tailLogs"));
    }

    #[test]
    fn only_stream_logs_streams() {
        let streaming: Vec<_> = RpcMethod::ALL.into_iter().filter(RpcMethod::is_streaming).collect();
        assert_eq!(streaming, vec![RpcMethod::StreamLogs]);
    }

    // ===== Frame Tests =====

    #[test]
    fn frame_carries_body() {
        let frame = RpcFrame::wrap(RpcMethod::StreamLogs, &sample_record());
        let decoded = RpcFrame::from_bytes(&frame.to_bytes()).expect("frame");

        assert_eq!(decoded.rpc_method().ok(), Some(RpcMethod::StreamLogs));
        assert_eq!(decoded.body::<LogRecord>().expect("record"), sample_record());
    }

    #[test]
    fn end_of_stream_frame_is_marked() {
        let frame = RpcFrame::from_bytes(&RpcFrame::end_of_stream(RpcMethod::StreamLogs).to_bytes())
            .expect("frame");

        assert!(frame.end_of_stream);
        assert!(frame.payload.is_empty());
        assert!(!RpcFrame::wrap(RpcMethod::StreamLogs, &sample_record()).end_of_stream);
    }

    #[test]
    fn frame_rejects_garbage() {
        assert!(matches!(
            RpcFrame::from_bytes(b"\xff\xff\xff"),
            Err(ProtoError::Decode(_))
        ));
    }

    #[test]
    fn empty_body_decodes_to_defaults() {
        let frame = RpcFrame::wrap(RpcMethod::SearchLogs, &EmptyRequest {});
        let request: SearchRequest = frame.body().expect("defaults");

        assert!(request.query.is_empty());
        assert_eq!(request.size, 0);
        assert!(!request.sort_ascending);
    }
}

//! Core types for the log model.
//!
//! This module provides:
//! - [`LogId`]: Opaque, backend-assigned identifier for log entries
//! - [`LogEntry`]: Immutable structured log record
//! - [`TimeRange`]: Inclusive epoch-millisecond range
//! - [`SortField`]: Fields a search can be ordered by
//! - [`SearchSpec`] / [`DeleteSpec`]: Request shapes for the query and deletion engines

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

use crate::error::LogError;

/// Opaque identifier for a log entry, assigned by the storage backend on first save.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LogId(pub String);

impl LogId {
    /// Creates an identifier from any string.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a fresh random identifier.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true if no identifier has been assigned yet.
    #[must_use]
    pub fn is_unassigned(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for LogId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for LogId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// A structured log entry.
///
/// Entries are values: updates are full replacements performed by the storage
/// backend, never in-place mutation of a stored entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Backend-assigned identifier (empty until first save)
    #[serde(default)]
    pub id: LogId,
    /// Epoch milliseconds
    pub timestamp: i64,
    /// Severity label as reported by the producer
    pub level: Option<String>,
    /// The log message
    pub message: Option<String>,
    /// Producer of the entry
    pub source: Option<String>,
    /// Additional key/value pairs
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    /// The unparsed original line
    pub raw_content: Option<String>,
}

impl LogEntry {
    /// Creates a new log entry builder.
    #[must_use]
    pub fn builder() -> LogEntryBuilder {
        LogEntryBuilder::default()
    }

    /// Returns a copy of this entry carrying the given identifier.
    #[must_use]
    pub fn with_id(mut self, id: LogId) -> Self {
        self.id = id;
        self
    }

    /// Returns the message if it is present and non-empty.
    #[must_use]
    pub fn non_empty_message(&self) -> Option<&str> {
        self.message.as_deref().filter(|m| !m.is_empty())
    }

    /// Case-insensitive substring match against the message.
    ///
    /// `needle_lower` must already be lowercased. Entries without a message never match.
    #[must_use]
    pub fn message_contains(&self, needle_lower: &str) -> bool {
        self.message
            .as_deref()
            .is_some_and(|m| m.to_lowercase().contains(needle_lower))
    }
}

/// Inclusive time range in epoch milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeRange {
    /// Start of the range (inclusive)
    pub start: i64,
    /// End of the range (inclusive)
    pub end: i64,
}

impl TimeRange {
    /// Creates a range with the given bounds.
    #[must_use]
    pub const fn new(start: i64, end: i64) -> Self {
        Self { start, end }
    }

    /// Builds a range only when both bounds are positive.
    ///
    /// Zero or negative bounds mean "unrestricted" on the wire.
    #[must_use]
    pub const fn from_bounds(start: i64, end: i64) -> Option<Self> {
        if start > 0 && end > 0 {
            Some(Self { start, end })
        } else {
            None
        }
    }

    /// Checks if a timestamp falls within this range.
    #[must_use]
    pub const fn contains(&self, timestamp: i64) -> bool {
        timestamp >= self.start && timestamp <= self.end
    }

    /// Width of the range in milliseconds (zero for inverted ranges).
    #[must_use]
    pub const fn span(&self) -> i64 {
        if self.end > self.start {
            self.end - self.start
        } else {
            0
        }
    }
}

/// Field a search result can be ordered by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortField {
    /// Numeric order on the timestamp
    Timestamp,
    /// Lexicographic order on the level
    Level,
    /// Lexicographic order on the message
    Message,
    /// Lexicographic order on the source
    Source,
}

impl SortField {
    /// Parses a wire field name. Unknown names yield `None`, which means "unsorted".
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "timestamp" => Some(Self::Timestamp),
            "level" => Some(Self::Level),
            "message" => Some(Self::Message),
            "source" => Some(Self::Source),
            _ => None,
        }
    }

    /// Returns the wire name of this field.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Timestamp => "timestamp",
            Self::Level => "level",
            Self::Message => "message",
            Self::Source => "source",
        }
    }

    /// Compares two entries on this field in ascending order.
    ///
    /// Missing values sort before every present value.
    #[must_use]
    pub fn compare(&self, a: &LogEntry, b: &LogEntry) -> Ordering {
        match self {
            Self::Timestamp => a.timestamp.cmp(&b.timestamp),
            Self::Level => a.level.as_deref().cmp(&b.level.as_deref()),
            Self::Message => a.message.as_deref().cmp(&b.message.as_deref()),
            Self::Source => a.source.as_deref().cmp(&b.source.as_deref()),
        }
    }
}

/// Parameters of a paginated search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchSpec {
    /// Case-insensitive substring matched against the message (empty matches all)
    #[serde(default)]
    pub query: String,
    /// Range restriction, active only when both bounds are positive
    #[serde(default)]
    pub start_time: i64,
    /// See `start_time`
    #[serde(default)]
    pub end_time: i64,
    /// Optional ordering
    pub sort_field: Option<SortField>,
    /// Direction of the ordering
    #[serde(default)]
    pub sort_ascending: bool,
    /// Zero-based page index
    #[serde(default)]
    pub page: usize,
    /// Page length, always greater than zero
    pub size: usize,
}

impl SearchSpec {
    /// Creates a spec matching everything, first page of the given size.
    ///
    /// # Errors
    ///
    /// Returns an error if `size` is zero.
    pub fn new(size: usize) -> Result<Self, LogError> {
        if size == 0 {
            return Err(LogError::InvalidSpec("page size must be greater than 0".to_string()));
        }
        Ok(Self {
            query: String::new(),
            start_time: 0,
            end_time: 0,
            sort_field: None,
            sort_ascending: false,
            page: 0,
            size,
        })
    }

    /// Sets the message query.
    #[must_use]
    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = query.into();
        self
    }

    /// Sets the time bounds.
    #[must_use]
    pub const fn with_time_bounds(mut self, start_time: i64, end_time: i64) -> Self {
        self.start_time = start_time;
        self.end_time = end_time;
        self
    }

    /// Sets the ordering.
    #[must_use]
    pub const fn with_sort(mut self, field: Option<SortField>, ascending: bool) -> Self {
        self.sort_field = field;
        self.sort_ascending = ascending;
        self
    }

    /// Sets the requested page.
    #[must_use]
    pub const fn with_page(mut self, page: usize) -> Self {
        self.page = page;
        self
    }

    /// The active range restriction, if any.
    #[must_use]
    pub const fn time_range(&self) -> Option<TimeRange> {
        TimeRange::from_bounds(self.start_time, self.end_time)
    }
}

/// Parameters of a bulk deletion: the selection and filter steps of a search.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteSpec {
    /// Case-insensitive substring matched against the message (empty matches all)
    #[serde(default)]
    pub query: String,
    /// Range restriction, active only when both bounds are positive
    #[serde(default)]
    pub start_time: i64,
    /// See `start_time`
    #[serde(default)]
    pub end_time: i64,
}

impl DeleteSpec {
    /// Creates a deletion spec from its parts.
    #[must_use]
    pub fn new(query: impl Into<String>, start_time: i64, end_time: i64) -> Self {
        Self {
            query: query.into(),
            start_time,
            end_time,
        }
    }

    /// The active range restriction, if any.
    #[must_use]
    pub const fn time_range(&self) -> Option<TimeRange> {
        TimeRange::from_bounds(self.start_time, self.end_time)
    }
}

/// Builder for constructing log entries.
#[derive(Debug, Default)]
pub struct LogEntryBuilder {
    id: Option<LogId>,
    timestamp: Option<i64>,
    level: Option<String>,
    message: Option<String>,
    source: Option<String>,
    metadata: HashMap<String, String>,
    raw_content: Option<String>,
}

impl LogEntryBuilder {
    /// Sets the log ID.
    #[must_use]
    pub fn id(mut self, id: impl Into<LogId>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Sets the timestamp in epoch milliseconds.
    #[must_use]
    pub const fn timestamp(mut self, timestamp: i64) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Sets the level.
    #[must_use]
    pub fn level(mut self, level: impl Into<String>) -> Self {
        self.level = Some(level.into());
        self
    }

    /// Sets the message.
    #[must_use]
    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Sets the source.
    #[must_use]
    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Adds a metadata pair.
    #[must_use]
    pub fn metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Sets the raw content.
    #[must_use]
    pub fn raw_content(mut self, raw: impl Into<String>) -> Self {
        self.raw_content = Some(raw.into());
        self
    }

    /// Builds the log entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the timestamp is not set.
    pub fn build(self) -> Result<LogEntry, LogError> {
        let timestamp = self.timestamp.ok_or(LogError::MissingField("timestamp"))?;

        Ok(LogEntry {
            id: self.id.unwrap_or_default(),
            timestamp,
            level: self.level,
            message: self.message,
            source: self.source,
            metadata: self.metadata,
            raw_content: self.raw_content,
        })
    }
}

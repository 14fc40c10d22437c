//! Conversion between wire messages and the internal model.
//!
//! Strings that are empty on the wire become `None` internally, and `None`
//! goes back out as the empty string. Metadata is copied by value.

use lens_logs::{
    DeleteOutcome, DeleteSpec, LogEntry, LogId, SearchPage, SearchSpec, SortField, TimeRange,
    TimeSlot,
};
use lens_patterns::TemplateCount;

use crate::error::Result;
use crate::messages::{
    DeleteRequest, DeleteResponse, LogRecord, PatternCount, PatternsResponse, SearchRequest,
    SearchResponse, TimeSlotCount, TimeSlotResponse,
};

fn non_empty(value: String) -> Option<String> {
    if value.is_empty() { None } else { Some(value) }
}

impl From<LogRecord> for LogEntry {
    fn from(record: LogRecord) -> Self {
        Self {
            id: LogId::new(record.id),
            timestamp: record.timestamp,
            level: non_empty(record.level),
            message: non_empty(record.message),
            source: non_empty(record.source),
            metadata: record.metadata,
            raw_content: non_empty(record.raw_content),
        }
    }
}

impl From<LogEntry> for LogRecord {
    fn from(entry: LogEntry) -> Self {
        Self {
            id: entry.id.0,
            timestamp: entry.timestamp,
            level: entry.level.unwrap_or_default(),
            message: entry.message.unwrap_or_default(),
            source: entry.source.unwrap_or_default(),
            metadata: entry.metadata,
            raw_content: entry.raw_content.unwrap_or_default(),
        }
    }
}

/// Converts every entry to its wire form.
#[must_use]
pub fn to_records(entries: Vec<LogEntry>) -> Vec<LogRecord> {
    entries.into_iter().map(LogRecord::from).collect()
}

/// Applies server defaults while translating requests and responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProtocolAdapter {
    default_page_size: usize,
    pattern_limit: usize,
    max_time_slots: usize,
}

/// Histogram bucket count used when none is configured.
pub const DEFAULT_MAX_TIME_SLOTS: usize = 1_000;

impl Default for ProtocolAdapter {
    fn default() -> Self {
        Self::new(20, 10)
    }
}

impl ProtocolAdapter {
    /// Creates an adapter with the given defaults.
    #[must_use]
    pub const fn new(default_page_size: usize, pattern_limit: usize) -> Self {
        Self {
            default_page_size,
            pattern_limit,
            max_time_slots: DEFAULT_MAX_TIME_SLOTS,
        }
    }

    /// Set the largest histogram a single request may ask for.
    #[must_use]
    pub const fn with_max_time_slots(mut self, max: usize) -> Self {
        self.max_time_slots = max;
        self
    }

    /// Page size used when a request leaves it non-positive.
    #[must_use]
    pub const fn default_page_size(&self) -> usize {
        self.default_page_size
    }

    /// Template count used when a request leaves the limit non-positive.
    #[must_use]
    pub const fn pattern_limit(&self) -> usize {
        self.pattern_limit
    }

    /// Builds a search spec, substituting defaults for non-positive size and page.
    ///
    /// # Errors
    ///
    /// Returns an error if the effective page size is zero.
    pub fn search_spec(&self, request: SearchRequest) -> Result<SearchSpec> {
        let size = if request.size > 0 {
            request.size as usize
        } else {
            self.default_page_size
        };

        Ok(SearchSpec::new(size)?
            .with_query(request.query)
            .with_time_bounds(request.start_time, request.end_time)
            .with_sort(
                SortField::from_name(&request.sort_field),
                request.sort_ascending,
            )
            .with_page(request.page.max(0) as usize))
    }

    /// Builds a deletion spec.
    #[must_use]
    pub fn delete_spec(&self, request: DeleteRequest) -> DeleteSpec {
        DeleteSpec::new(request.query, request.start_time, request.end_time)
    }

    /// Top-K bound for a pattern request.
    #[must_use]
    pub fn pattern_limit_for(&self, limit: i32) -> usize {
        if limit > 0 {
            limit as usize
        } else {
            self.pattern_limit
        }
    }

    /// Largest histogram a single request may ask for.
    #[must_use]
    pub const fn max_time_slots(&self) -> usize {
        self.max_time_slots
    }

    /// Bucket count for a histogram request, clamped to `0..=max_time_slots`.
    #[must_use]
    pub fn time_slots_for(&self, slots: i32) -> usize {
        (slots.max(0) as usize).min(self.max_time_slots)
    }

    /// Range restriction for a pair of wire bounds.
    #[must_use]
    pub const fn time_range(&self, start_time: i64, end_time: i64) -> Option<TimeRange> {
        TimeRange::from_bounds(start_time, end_time)
    }

    /// Wire form of a search page.
    #[must_use]
    pub fn search_response(&self, page: SearchPage) -> SearchResponse {
        SearchResponse {
            logs: to_records(page.entries),
            total_pages: page.total_pages as i32,
            current_page: page.current_page as i32,
            total_results: page.total_results as i64,
        }
    }

    /// Wire form of an unpaginated lookup: all matches on a single page.
    #[must_use]
    pub fn logs_response(&self, entries: Vec<LogEntry>) -> SearchResponse {
        let total_results = entries.len() as i64;
        SearchResponse {
            total_pages: i32::from(total_results > 0),
            current_page: 0,
            total_results,
            logs: to_records(entries),
        }
    }

    /// Wire form of a deletion outcome.
    #[must_use]
    pub fn delete_response(&self, outcome: DeleteOutcome) -> DeleteResponse {
        DeleteResponse {
            deleted_count: outcome.deleted_count as i64,
            success: outcome.success,
            message: outcome.message,
        }
    }

    /// Wire form of ranked templates.
    #[must_use]
    pub fn patterns_response(&self, ranked: Vec<TemplateCount>) -> PatternsResponse {
        PatternsResponse {
            patterns: ranked
                .into_iter()
                .map(|c| PatternCount {
                    template: c.template,
                    count: c.count as i64,
                })
                .collect(),
        }
    }

    /// Wire form of a histogram.
    #[must_use]
    pub fn time_slot_response(&self, slots: Vec<TimeSlot>) -> TimeSlotResponse {
        TimeSlotResponse {
            slots: slots
                .into_iter()
                .map(|s| TimeSlotCount {
                    start: s.start,
                    count: s.count as i64,
                })
                .collect(),
        }
    }
}

//! Filtered, sorted, paginated search over a corpus.
//!
//! The pipeline runs strictly in this order:
//!
//! 1. **Select**: range-restricted retrieval when both bounds are positive,
//!    otherwise the full corpus
//! 2. **Filter**: case-insensitive substring match on the message
//! 3. **Sort**: optional, stable, by one [`SortField`]
//! 4. **Paginate**: clamp the requested page and slice
//!
//! No lock spans the pipeline: an ingest running concurrently with a search
//! may or may not be visible in its result.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::error::Result;
use crate::traits::LogRepository;
use crate::types::{LogEntry, SearchSpec, SortField, TimeRange};

/// One page of search results.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchPage {
    /// Entries on this page
    pub entries: Vec<LogEntry>,
    /// `ceil(total_results / size)`
    pub total_pages: usize,
    /// The requested page after clamping
    pub current_page: usize,
    /// Number of entries that passed the filter
    pub total_results: usize,
}

/// Count of matching entries in one histogram bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSlot {
    /// Bucket start in epoch milliseconds
    pub start: i64,
    /// Entries falling in this bucket
    pub count: usize,
}

/// Runs the select and filter steps shared by search and deletion.
///
/// # Errors
///
/// Returns the backend error if retrieval fails.
pub fn select_matching(
    repository: &dyn LogRepository,
    query: &str,
    range: Option<TimeRange>,
) -> Result<Vec<LogEntry>> {
    let mut entries = repository.find_in(range)?;

    if !query.is_empty() {
        let needle = query.to_lowercase();
        entries.retain(|e| e.message_contains(&needle));
    }

    Ok(entries)
}

/// Stable sort on `field`; `None` leaves the order untouched.
pub fn sort_entries(entries: &mut [LogEntry], field: Option<SortField>, ascending: bool) {
    let Some(field) = field else {
        return;
    };

    entries.sort_by(|a, b| {
        let ord = field.compare(a, b);
        if ascending { ord } else { ord.reverse() }
    });
}

/// Slices one page out of an ordered result set.
#[must_use]
pub fn paginate(entries: Vec<LogEntry>, page: usize, size: usize) -> SearchPage {
    let size = size.max(1);
    let total_results = entries.len();
    let total_pages = total_results.div_ceil(size);
    let current_page = page.min(total_pages.saturating_sub(1));

    let from = current_page * size;
    let to = (from + size).min(total_results);

    let entries = if from >= total_results {
        Vec::new()
    } else {
        let mut entries = entries;
        entries.truncate(to);
        entries.split_off(from)
    };

    SearchPage {
        entries,
        total_pages,
        current_page,
        total_results,
    }
}

/// Query engine over a storage backend.
#[derive(Clone)]
pub struct QueryEngine {
    repository: Arc<dyn LogRepository>,
}

impl QueryEngine {
    /// Creates a query engine reading from the given repository.
    #[must_use]
    pub fn new(repository: Arc<dyn LogRepository>) -> Self {
        Self { repository }
    }

    /// Runs a search.
    ///
    /// A retrieval failure degrades to an empty page and is logged.
    #[must_use]
    pub fn search(&self, spec: &SearchSpec) -> SearchPage {
        let mut entries = match select_matching(
            self.repository.as_ref(),
            &spec.query,
            spec.time_range(),
        ) {
            Ok(entries) => entries,
            Err(e) => {
                error!(error = %e, query = %spec.query, "Search retrieval failed");
                return SearchPage::default();
            }
        };

        sort_entries(&mut entries, spec.sort_field, spec.sort_ascending);
        let page = paginate(entries, spec.page, spec.size);

        debug!(
            query = %spec.query,
            total_results = page.total_results,
            current_page = page.current_page,
            "Search completed"
        );
        page
    }

    /// Distinct levels across the corpus, in first-seen order.
    #[must_use]
    pub fn levels(&self) -> Vec<String> {
        self.distinct(|e| e.level.as_deref())
    }

    /// Distinct sources across the corpus, in first-seen order.
    #[must_use]
    pub fn sources(&self) -> Vec<String> {
        self.distinct(|e| e.source.as_deref())
    }

    fn distinct(&self, field: impl Fn(&LogEntry) -> Option<&str>) -> Vec<String> {
        let entries = match self.repository.find_all() {
            Ok(entries) => entries,
            Err(e) => {
                error!(error = %e, "Corpus retrieval failed");
                return Vec::new();
            }
        };

        let mut seen = std::collections::HashSet::new();
        let mut values = Vec::new();
        for value in entries.iter().filter_map(&field) {
            if seen.insert(value.to_string()) {
                values.push(value.to_string());
            }
        }
        values
    }

    /// Histogram of matching entries over `slots` equal-width buckets of `range`.
    ///
    /// Every bucket is present even when empty. Entries past the end of the
    /// last whole bucket are not counted. `slots` is capped at the range span
    /// in milliseconds, so every bucket is at least 1ms wide; callers bound it
    /// further before it reaches this point. Zero slots, an empty range, or a
    /// retrieval failure yield no buckets.
    #[must_use]
    pub fn count_by_time_slots(&self, query: &str, range: TimeRange, slots: usize) -> Vec<TimeSlot> {
        let slots = slots.min(usize::try_from(range.span()).unwrap_or(usize::MAX));
        let slot_width = if slots == 0 { 0 } else { range.span() / slots as i64 };
        if slot_width == 0 {
            return Vec::new();
        }

        let entries = match select_matching(self.repository.as_ref(), query, Some(range)) {
            Ok(entries) => entries,
            Err(e) => {
                error!(error = %e, "Histogram retrieval failed");
                return Vec::new();
            }
        };

        let mut buckets: Vec<TimeSlot> = (0..slots)
            .map(|i| TimeSlot {
                start: range.start + i as i64 * slot_width,
                count: 0,
            })
            .collect();

        for entry in &entries {
            let index = ((entry.timestamp - range.start) / slot_width) as usize;
            if let Some(bucket) = buckets.get_mut(index) {
                bucket.count += 1;
            }
        }

        buckets
    }
}

impl std::fmt::Debug for QueryEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryEngine").finish_non_exhaustive()
    }
}

//! The storage contract consumed by the engines.
//!
//! This module provides the [`LogRepository`] trait for abstracting over
//! storage/search backends. The engines only ever read a corpus slice, save
//! entries, and delete by id; indexing is entirely the backend's concern.

use crate::error::Result;
use crate::types::{LogEntry, LogId, TimeRange};

/// Trait for log storage backends.
///
/// Implementors must be safe to share across ingestion streams and
/// search/delete calls running concurrently.
pub trait LogRepository: Send + Sync {
    /// Returns the full corpus.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot serve the read.
    fn find_all(&self) -> Result<Vec<LogEntry>>;

    /// Returns every entry whose timestamp falls within the inclusive range.
    fn find_by_time_range(&self, range: TimeRange) -> Result<Vec<LogEntry>>;

    /// Looks up a single entry.
    ///
    /// A missing entry is `Ok(None)`, never an error.
    fn find_by_id(&self, id: &LogId) -> Result<Option<LogEntry>>;

    /// Persists an entry, assigning an id when it has none.
    ///
    /// Returns the stored entry carrying its id.
    fn save(&self, entry: LogEntry) -> Result<LogEntry>;

    /// Removes an entry. Returns `Ok(false)` when nothing was deleted.
    fn delete_by_id(&self, id: &LogId) -> Result<bool>;

    /// Returns the corpus for an optional range restriction.
    fn find_in(&self, range: Option<TimeRange>) -> Result<Vec<LogEntry>> {
        match range {
            Some(range) => self.find_by_time_range(range),
            None => self.find_all(),
        }
    }

    /// Returns entries whose level matches, ignoring case.
    fn find_by_level(&self, level: &str) -> Result<Vec<LogEntry>> {
        let mut entries = self.find_all()?;
        entries.retain(|e| e.level.as_deref().is_some_and(|l| l.eq_ignore_ascii_case(level)));
        Ok(entries)
    }

    /// Returns entries produced by exactly the given source.
    fn find_by_source(&self, source: &str) -> Result<Vec<LogEntry>> {
        let mut entries = self.find_all()?;
        entries.retain(|e| e.source.as_deref() == Some(source));
        Ok(entries)
    }
}

//! In-memory log storage.
//!
//! This module provides:
//! - [`LogStore`]: Thread-safe, insertion-ordered storage with a capacity bound
//! - Implementation of [`LogRepository`] for use behind the engines

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use tracing::debug;

use crate::error::{LogError, Result};
use crate::traits::LogRepository;
use crate::types::{LogEntry, LogId, TimeRange};

/// Configuration for the log store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogStoreConfig {
    /// Maximum number of log entries to keep. The oldest entries are evicted first.
    pub max_entries: usize,
}

impl Default for LogStoreConfig {
    fn default() -> Self {
        Self {
            max_entries: 100_000,
        }
    }
}

#[derive(Debug, Default)]
struct Entries {
    /// Entries keyed by insertion sequence
    by_seq: BTreeMap<u64, LogEntry>,
    /// Fast lookup from id to insertion sequence
    by_id: HashMap<LogId, u64>,
}

/// Thread-safe in-memory log store.
#[derive(Debug)]
pub struct LogStore {
    config: LogStoreConfig,
    entries: RwLock<Entries>,
    next_seq: AtomicU64,
}

impl Default for LogStore {
    fn default() -> Self {
        Self::with_config(LogStoreConfig::default())
    }
}

impl LogStore {
    /// Creates a store holding at most `max_entries` entries.
    #[must_use]
    pub fn new(max_entries: usize) -> Self {
        Self::with_config(LogStoreConfig { max_entries })
    }

    /// Creates a store with full configuration.
    #[must_use]
    pub fn with_config(config: LogStoreConfig) -> Self {
        Self {
            config,
            entries: RwLock::new(Entries::default()),
            next_seq: AtomicU64::new(1),
        }
    }

    /// Saves an entry, assigning a fresh id when it has none.
    ///
    /// Saving an entry whose id is already stored replaces it in place.
    ///
    /// # Errors
    ///
    /// Returns an error if the store has no capacity at all.
    #[allow(clippy::significant_drop_tightening)]
    pub fn save(&self, mut entry: LogEntry) -> Result<LogEntry> {
        if self.config.max_entries == 0 {
            return Err(LogError::CapacityExceeded);
        }

        if entry.id.is_unassigned() {
            entry.id = LogId::generate();
        }

        let mut entries = self.entries.write();

        if let Some(seq) = entries.by_id.get(&entry.id).copied() {
            entries.by_seq.insert(seq, entry.clone());
            return Ok(entry);
        }

        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        entries.by_id.insert(entry.id.clone(), seq);
        entries.by_seq.insert(seq, entry.clone());

        while entries.by_seq.len() > self.config.max_entries {
            if let Some((_, evicted)) = entries.by_seq.pop_first() {
                debug!(id = %evicted.id, "Evicting oldest log entry");
                entries.by_id.remove(&evicted.id);
            }
        }

        Ok(entry)
    }

    /// Returns every entry in insertion order.
    #[must_use]
    pub fn all(&self) -> Vec<LogEntry> {
        self.entries.read().by_seq.values().cloned().collect()
    }

    /// Returns entries within the inclusive range, in insertion order.
    #[must_use]
    pub fn in_range(&self, range: TimeRange) -> Vec<LogEntry> {
        self.entries
            .read()
            .by_seq
            .values()
            .filter(|e| range.contains(e.timestamp))
            .cloned()
            .collect()
    }

    /// Gets a specific log entry by ID.
    #[must_use]
    pub fn get(&self, id: &LogId) -> Option<LogEntry> {
        let entries = self.entries.read();
        let seq = entries.by_id.get(id)?;
        entries.by_seq.get(seq).cloned()
    }

    /// Removes an entry, returning true if it existed.
    pub fn remove(&self, id: &LogId) -> bool {
        let mut entries = self.entries.write();
        match entries.by_id.remove(id) {
            Some(seq) => entries.by_seq.remove(&seq).is_some(),
            None => false,
        }
    }

    /// Returns the number of stored entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().by_seq.len()
    }

    /// Returns true if the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().by_seq.is_empty()
    }

    /// Clears all log entries.
    pub fn clear(&self) {
        let mut entries = self.entries.write();
        entries.by_seq.clear();
        entries.by_id.clear();
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &LogStoreConfig {
        &self.config
    }
}

/// Shared log store handle.
pub type SharedLogStore = Arc<LogStore>;

/// Creates a new shared log store.
#[must_use]
pub fn shared_store(max_entries: usize) -> SharedLogStore {
    Arc::new(LogStore::new(max_entries))
}

// ============================================================================
// Trait Implementations
// ============================================================================

impl LogRepository for LogStore {
    fn find_all(&self) -> Result<Vec<LogEntry>> {
        Ok(self.all())
    }

    fn find_by_time_range(&self, range: TimeRange) -> Result<Vec<LogEntry>> {
        Ok(self.in_range(range))
    }

    fn find_by_id(&self, id: &LogId) -> Result<Option<LogEntry>> {
        Ok(self.get(id))
    }

    fn save(&self, entry: LogEntry) -> Result<LogEntry> {
        LogStore::save(self, entry)
    }

    fn delete_by_id(&self, id: &LogId) -> Result<bool> {
        Ok(self.remove(id))
    }
}

//! # lens-logs
//!
//! Log entry model, storage contract, and the query/deletion engines for LogLens.
//!
//! This crate provides:
//!
//! - [`LogEntry`]: Immutable structured log record
//! - [`LogRepository`]: The storage contract the engines consume
//! - [`LogStore`]: Thread-safe in-memory backend
//! - [`QueryEngine`]: Select, filter, sort and paginate
//! - [`DeletionEngine`]: Select, filter and delete with per-record fault isolation
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use lens_logs::{LogEntry, LogStore, QueryEngine, SearchSpec, SortField};
//!
//! let store = Arc::new(LogStore::default());
//! store.save(
//!     LogEntry::builder()
//!         .timestamp(1_700_000_000_000)
//!         .level("ERROR")
//!         .message("Connection refused")
//!         .source("api")
//!         .build()?,
//! )?;
//!
//! let engine = QueryEngine::new(store);
//! let page = engine.search(
//!     &SearchSpec::new(20)?
//!         .with_query("refused")
//!         .with_sort(Some(SortField::Timestamp), true),
//! );
//! assert_eq!(page.total_results, 1);
//! # Ok::<(), lens_logs::LogError>(())
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod delete;
pub mod error;
pub mod query;
pub mod store;
pub mod traits;
pub mod types;

// Re-export main types
pub use delete::{DeleteOutcome, DeletionEngine};
pub use error::{LogError, Result};
pub use query::{QueryEngine, SearchPage, TimeSlot, paginate, select_matching, sort_entries};
pub use store::{LogStore, LogStoreConfig, SharedLogStore, shared_store};
pub use traits::LogRepository;
pub use types::{
    DeleteSpec, LogEntry, LogEntryBuilder, LogId, SearchSpec, SortField, TimeRange,
};

//! Client-streaming ingestion.
//!
//! One [`IngestSession`] per inbound stream. Records are saved strictly in
//! arrival order with no per-record acknowledgment; the session answers
//! exactly once, when the stream ends or fails. Records saved before a
//! failure stay saved.

use std::fmt;
use std::sync::Arc;

use futures::{Stream, StreamExt, pin_mut};
use lens_logs::{LogEntry, LogRepository};
use lens_proto::{LogRecord, LogResponse};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{ServerError, ServerResult};

/// Lifecycle of an ingestion session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Accepting records.
    Open,
    /// Input ended normally; summary sent.
    ClosedOk,
    /// Input ended on an error; summary sent.
    ClosedError,
}

impl SessionState {
    /// Check if the session still accepts records.
    #[must_use]
    pub const fn is_open(&self) -> bool {
        matches!(self, Self::Open)
    }
}

/// State machine for one inbound record stream.
pub struct IngestSession {
    id: Uuid,
    repository: Arc<dyn LogRepository>,
    state: SessionState,
    processed_count: usize,
}

impl IngestSession {
    /// Opens a session writing to the given repository.
    #[must_use]
    pub fn new(repository: Arc<dyn LogRepository>) -> Self {
        Self {
            id: Uuid::new_v4(),
            repository,
            state: SessionState::Open,
            processed_count: 0,
        }
    }

    /// Get the session ID.
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// Get the current state.
    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.state
    }

    /// Records persisted so far.
    #[must_use]
    pub const fn processed_count(&self) -> usize {
        self.processed_count
    }

    /// Converts and saves one record.
    ///
    /// # Errors
    ///
    /// Returns an error if the session is closed or the save fails. A failed
    /// save is not counted.
    pub fn accept(&mut self, record: LogRecord) -> ServerResult<()> {
        if !self.state.is_open() {
            return Err(ServerError::Protocol("ingest session is closed".to_string()));
        }

        let saved = self.repository.save(LogEntry::from(record))?;
        self.processed_count += 1;
        debug!(session = %self.id, id = %saved.id, "Ingested log entry");
        Ok(())
    }

    /// Ends the session normally. Returns `None` if it was already closed.
    pub fn finish(&mut self) -> Option<LogResponse> {
        if !self.state.is_open() {
            return None;
        }
        self.state = SessionState::ClosedOk;
        info!(
            session = %self.id,
            processed = self.processed_count,
            "Ingest stream completed"
        );
        Some(LogResponse {
            processed_count: self.processed_count as i64,
            success: true,
            message: format!("Successfully processed {} logs", self.processed_count),
        })
    }

    /// Ends the session on an error. Returns `None` if it was already closed.
    pub fn fail(&mut self, detail: &str) -> Option<LogResponse> {
        if !self.state.is_open() {
            return None;
        }
        self.state = SessionState::ClosedError;
        warn!(
            session = %self.id,
            processed = self.processed_count,
            error = detail,
            "Ingest stream failed"
        );
        Some(LogResponse {
            processed_count: self.processed_count as i64,
            success: false,
            message: format!("Error processing logs: {detail}"),
        })
    }

    /// Drains a record stream into storage and returns the one summary.
    ///
    /// An `Err` item ends the session as a transport failure. A failed save
    /// ends it the same way. A session that was already closed saves nothing
    /// and answers with a failure.
    pub async fn run<S, E>(mut self, records: S) -> LogResponse
    where
        S: Stream<Item = Result<LogRecord, E>>,
        E: fmt::Display,
    {
        pin_mut!(records);
        info!(session = %self.id, "Ingest stream opened");

        while let Some(item) = records.next().await {
            let outcome = match item {
                Ok(record) => self.accept(record),
                Err(e) => Err(ServerError::Protocol(e.to_string())),
            };

            if let Err(e) = outcome {
                let detail = match e {
                    ServerError::Protocol(detail) => detail,
                    other => other.to_string(),
                };
                return self.fail(&detail).unwrap_or_else(|| self.already_closed());
            }
        }

        self.finish().unwrap_or_else(|| self.already_closed())
    }

    fn already_closed(&self) -> LogResponse {
        warn!(session = %self.id, state = ?self.state, "Ingest stream on a closed session");
        LogResponse {
            processed_count: self.processed_count as i64,
            success: false,
            message: "Error processing logs: ingest session is closed".to_string(),
        }
    }
}

impl fmt::Debug for IngestSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IngestSession")
            .field("id", &self.id)
            .field("state", &self.state)
            .field("processed_count", &self.processed_count)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;
    use lens_logs::{LogError, LogId, LogStore, Result as LogResult, TimeRange};

    fn record(timestamp: i64, message: &str) -> LogRecord {
        LogRecord {
            timestamp,
            level: "INFO".to_string(),
            message: message.to_string(),
            source: "ingest-test".to_string(),
            ..LogRecord::default()
        }
    }

    /// Accepts a fixed number of saves, then fails.
    struct FullRepository {
        inner: LogStore,
        room: usize,
    }

    impl LogRepository for FullRepository {
        fn find_all(&self) -> LogResult<Vec<LogEntry>> {
            self.inner.find_all()
        }
        fn find_by_time_range(&self, range: TimeRange) -> LogResult<Vec<LogEntry>> {
            self.inner.find_by_time_range(range)
        }
        fn find_by_id(&self, id: &LogId) -> LogResult<Option<LogEntry>> {
            self.inner.find_by_id(id)
        }
        fn save(&self, entry: LogEntry) -> LogResult<LogEntry> {
            if self.inner.len() >= self.room {
                return Err(LogError::Backend("disk quota exceeded".to_string()));
            }
            LogStore::save(&self.inner, entry)
        }
        fn delete_by_id(&self, id: &LogId) -> LogResult<bool> {
            self.inner.delete_by_id(id)
        }
    }

    // ===== State Machine Tests =====

    #[test]
    fn session_starts_open() {
        let session = IngestSession::new(Arc::new(LogStore::default()));
        assert_eq!(session.state(), SessionState::Open);
        assert_eq!(session.processed_count(), 0);
    }

    #[test]
    fn session_emits_exactly_one_summary() {
        let mut session = IngestSession::new(Arc::new(LogStore::default()));
        session.accept(record(1, "a")).expect("accept");

        let summary = session.finish().expect("first summary");
        assert_eq!(summary.message, "Successfully processed 1 logs");
        assert_eq!(session.state(), SessionState::ClosedOk);

        assert!(session.finish().is_none());
        assert!(session.fail("late").is_none());
        assert!(session.accept(record(2, "b")).is_err());
        assert_eq!(session.processed_count(), 1);
    }

    #[test]
    fn session_fail_reports_partial_count() {
        let store = Arc::new(LogStore::default());
        let mut session = IngestSession::new(store.clone());
        session.accept(record(1, "a")).expect("accept");
        session.accept(record(2, "b")).expect("accept");

        let summary = session.fail("connection reset").expect("summary");

        assert!(!summary.success);
        assert_eq!(summary.processed_count, 2);
        assert_eq!(summary.message, "Error processing logs: connection reset");
        assert_eq!(session.state(), SessionState::ClosedError);
        assert_eq!(store.len(), 2);
    }

    // ===== Stream Tests =====

    #[tokio::test]
    async fn run_persists_in_arrival_order() {
        let store = Arc::new(LogStore::default());
        let records = stream::iter(
            [(30, "third-ts"), (10, "first-ts"), (20, "second-ts")]
                .into_iter()
                .map(|(ts, m)| Ok::<_, String>(record(ts, m))),
        );

        let summary = IngestSession::new(store.clone()).run(records).await;

        assert!(summary.success);
        assert_eq!(summary.processed_count, 3);
        assert_eq!(summary.message, "Successfully processed 3 logs");

        let messages: Vec<_> = store.all().into_iter().filter_map(|e| e.message).collect();
        assert_eq!(messages, vec!["third-ts", "first-ts", "second-ts"]);
        assert!(store.all().iter().all(|e| !e.id.is_unassigned()));
    }

    #[tokio::test]
    async fn run_empty_stream_succeeds() {
        let records = stream::empty::<Result<LogRecord, String>>();
        let summary = IngestSession::new(Arc::new(LogStore::default())).run(records).await;

        assert!(summary.success);
        assert_eq!(summary.processed_count, 0);
        assert_eq!(summary.message, "Successfully processed 0 logs");
    }

    #[tokio::test]
    async fn run_transport_error_keeps_saved_records() {
        let store = Arc::new(LogStore::default());
        let records = stream::iter(vec![
            Ok(record(1, "a")),
            Ok(record(2, "b")),
            Err("stream reset by peer".to_string()),
            Ok(record(3, "never read")),
        ]);

        let summary = IngestSession::new(store.clone()).run(records).await;

        assert!(!summary.success);
        assert_eq!(summary.processed_count, 2);
        assert_eq!(summary.message, "Error processing logs: stream reset by peer");
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn run_save_failure_ends_session() {
        let repo = Arc::new(FullRepository {
            inner: LogStore::default(),
            room: 1,
        });
        let records = stream::iter((1..=3).map(|i| Ok::<_, String>(record(i, "x"))));

        let summary = IngestSession::new(repo.clone()).run(records).await;

        assert!(!summary.success);
        assert_eq!(summary.processed_count, 1);
        assert!(summary.message.starts_with("Error processing logs: "));
        assert!(summary.message.contains("disk quota exceeded"));
        assert_eq!(repo.inner.len(), 1);
    }

    #[tokio::test]
    async fn run_on_closed_session_saves_nothing() {
        let store = Arc::new(LogStore::default());
        let mut session = IngestSession::new(store.clone());
        let _ = session.finish();

        let summary = session
            .run(stream::iter(vec![Ok::<_, String>(record(1, "late"))]))
            .await;

        assert!(!summary.success);
        assert_eq!(summary.processed_count, 0);
        assert_eq!(summary.message, "Error processing logs: ingest session is closed");
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn run_copies_metadata() {
        let store = Arc::new(LogStore::default());
        let mut rec = record(5, "with metadata");
        rec.metadata.insert("trace_id".to_string(), "t-1".to_string());

        let _ = IngestSession::new(store.clone())
            .run(stream::iter(vec![Ok::<_, String>(rec)]))
            .await;

        let stored = store.all();
        assert_eq!(stored[0].metadata.get("trace_id").map(String::as_str), Some("t-1"));
    }
}

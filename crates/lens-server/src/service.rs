//! RPC handlers.
//!
//! [`LogService`] wires the engines to the wire messages. Unary calls are
//! plain functions of a request; [`LogService::call`] routes a framed request
//! to the right one.

use std::fmt;
use std::sync::Arc;

use futures::Stream;
use lens_logs::{DeletionEngine, LogEntry, LogId, LogRepository, QueryEngine, shared_store};
use lens_patterns::{PatternRecognizer, TemplateAggregator};
use lens_proto::{
    DeleteRequest, DeleteResponse, LogIdRequest, LogLevelRequest, LogRecord, LogResponse,
    LogSourceRequest, PatternCacheResponse,
    PatternLogsRequest, PatternLogsResponse, PatternRequest, PatternsResponse, ProtocolAdapter,
    RpcFrame, RpcMethod, SearchRequest, SearchResponse, TimeSlotRequest, TimeSlotResponse,
    ValuesResponse, to_records,
};
use tracing::{debug, error};

use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::ingest::IngestSession;

/// The log service: ingestion, search, deletion and pattern mining.
#[derive(Clone)]
pub struct LogService {
    repository: Arc<dyn LogRepository>,
    query: QueryEngine,
    deletion: DeletionEngine,
    recognizer: Arc<PatternRecognizer>,
    aggregator: TemplateAggregator,
    adapter: ProtocolAdapter,
}

impl LogService {
    /// Creates a service over a repository.
    #[must_use]
    pub fn new(repository: Arc<dyn LogRepository>, adapter: ProtocolAdapter) -> Self {
        let recognizer = Arc::new(PatternRecognizer::new());
        Self {
            query: QueryEngine::new(repository.clone()),
            deletion: DeletionEngine::new(repository.clone()),
            aggregator: TemplateAggregator::new(recognizer.clone(), repository.clone()),
            recognizer,
            repository,
            adapter,
        }
    }

    /// Creates a service over a fresh in-memory store sized by the configuration.
    #[must_use]
    pub fn from_config(config: &ServerConfig) -> Self {
        Self::new(
            shared_store(config.max_entries),
            ProtocolAdapter::new(config.default_page_size, config.pattern_limit)
                .with_max_time_slots(config.max_time_slots),
        )
    }

    /// The repository backing this service.
    #[must_use]
    pub fn repository(&self) -> &Arc<dyn LogRepository> {
        &self.repository
    }

    /// The shared pattern recognizer.
    #[must_use]
    pub fn recognizer(&self) -> &Arc<PatternRecognizer> {
        &self.recognizer
    }

    // ===== Log RPCs =====

    /// Ingests a client stream and returns its single summary.
    pub async fn stream_logs<S, E>(&self, records: S) -> LogResponse
    where
        S: Stream<Item = Result<LogRecord, E>>,
        E: fmt::Display,
    {
        IngestSession::new(self.repository.clone()).run(records).await
    }

    /// Runs a paginated search.
    ///
    /// # Errors
    ///
    /// Returns an error only if the effective page size is zero.
    pub fn search_logs(&self, request: SearchRequest) -> ServerResult<SearchResponse> {
        let spec = self.adapter.search_spec(request)?;
        let page = self.query.search(&spec);
        Ok(self.adapter.search_response(page))
    }

    /// Looks up one record. Missing ids yield an all-default record.
    pub fn get_log_by_id(&self, request: &LogIdRequest) -> LogRecord {
        match self.repository.find_by_id(&LogId::new(request.id.as_str())) {
            Ok(Some(entry)) => LogRecord::from(entry),
            Ok(None) => {
                debug!(id = %request.id, "Log entry not found");
                LogRecord::default()
            }
            Err(e) => {
                error!(id = %request.id, error = %e, "Log lookup failed");
                LogRecord::default()
            }
        }
    }

    /// Every record whose level matches, ignoring case, on a single page.
    pub fn logs_by_level(&self, request: &LogLevelRequest) -> SearchResponse {
        let found = self.repository.find_by_level(&request.level);
        self.adapter
            .logs_response(lookup_outcome("level", &request.level, found))
    }

    /// Every record from exactly the given source, on a single page.
    pub fn logs_by_source(&self, request: &LogSourceRequest) -> SearchResponse {
        let found = self.repository.find_by_source(&request.source);
        self.adapter
            .logs_response(lookup_outcome("source", &request.source, found))
    }

    /// Deletes every record matching the request.
    pub fn delete_logs(&self, request: DeleteRequest) -> DeleteResponse {
        let outcome = self.deletion.delete(&self.adapter.delete_spec(request));
        self.adapter.delete_response(outcome)
    }

    // ===== Pattern RPCs =====

    /// Most frequent templates in the requested range.
    pub fn most_common_patterns(&self, request: &PatternRequest) -> PatternsResponse {
        let ranked = self.aggregator.most_common(
            self.adapter.time_range(request.start_time, request.end_time),
            self.adapter.pattern_limit_for(request.limit),
        );
        self.adapter.patterns_response(ranked)
    }

    /// Records whose message reduces to the requested template.
    pub fn find_logs_by_pattern(&self, request: &PatternLogsRequest) -> PatternLogsResponse {
        let entries = self.aggregator.find_by_template(
            &request.template,
            self.adapter.time_range(request.start_time, request.end_time),
        );
        PatternLogsResponse {
            logs: to_records(entries),
        }
    }

    /// Current pattern cache size.
    pub fn pattern_cache_size(&self) -> PatternCacheResponse {
        let size = self.recognizer.size();
        PatternCacheResponse {
            size: size as i64,
            message: format!("Pattern cache holds {size} entries"),
        }
    }

    /// Empties the pattern cache.
    pub fn clear_pattern_cache(&self) -> PatternCacheResponse {
        self.recognizer.clear();
        PatternCacheResponse {
            size: self.recognizer.size() as i64,
            message: "Pattern cache cleared".to_string(),
        }
    }

    // ===== Corpus Summary RPCs =====

    /// Distinct levels in first-seen order.
    pub fn log_levels(&self) -> ValuesResponse {
        ValuesResponse {
            values: self.query.levels(),
        }
    }

    /// Distinct sources in first-seen order.
    pub fn log_sources(&self) -> ValuesResponse {
        ValuesResponse {
            values: self.query.sources(),
        }
    }

    /// Histogram of matching records over the requested range.
    pub fn count_by_time_slots(&self, request: &TimeSlotRequest) -> TimeSlotResponse {
        let slots = self.adapter.time_range(request.start_time, request.end_time).map_or_else(
            Vec::new,
            |range| {
                self.query.count_by_time_slots(
                    &request.query,
                    range,
                    self.adapter.time_slots_for(request.slots),
                )
            },
        );
        self.adapter.time_slot_response(slots)
    }

    // ===== Dispatch =====

    /// Serves one framed unary request, answering with a frame for the same method.
    ///
    /// # Errors
    ///
    /// Returns an error for unknown methods, undecodable bodies, or the
    /// streaming method, which cannot be served from a single frame.
    pub fn call(&self, frame: &RpcFrame) -> ServerResult<RpcFrame> {
        let method = frame.rpc_method()?;
        debug!(%method, bytes = frame.payload.len(), "Dispatching call");

        let reply = match method {
            RpcMethod::StreamLogs => {
                return Err(ServerError::Protocol(
                    "streamLogs must be called as a stream".to_string(),
                ));
            }
            RpcMethod::SearchLogs => RpcFrame::wrap(method, &self.search_logs(frame.body()?)?),
            RpcMethod::GetLogById => RpcFrame::wrap(method, &self.get_log_by_id(&frame.body()?)),
            RpcMethod::GetLogsByLevel => RpcFrame::wrap(method, &self.logs_by_level(&frame.body()?)),
            RpcMethod::GetLogsBySource => {
                RpcFrame::wrap(method, &self.logs_by_source(&frame.body()?))
            }
            RpcMethod::DeleteLogs => RpcFrame::wrap(method, &self.delete_logs(frame.body()?)),
            RpcMethod::GetMostCommonPatterns => {
                RpcFrame::wrap(method, &self.most_common_patterns(&frame.body()?))
            }
            RpcMethod::FindLogsByPattern => {
                RpcFrame::wrap(method, &self.find_logs_by_pattern(&frame.body()?))
            }
            RpcMethod::GetPatternCacheSize => RpcFrame::wrap(method, &self.pattern_cache_size()),
            RpcMethod::ClearPatternCache => RpcFrame::wrap(method, &self.clear_pattern_cache()),
            RpcMethod::GetLogLevels => RpcFrame::wrap(method, &self.log_levels()),
            RpcMethod::GetLogSources => RpcFrame::wrap(method, &self.log_sources()),
            RpcMethod::GetLogCountByTimeSlots => {
                RpcFrame::wrap(method, &self.count_by_time_slots(&frame.body()?))
            }
        };
        Ok(reply)
    }
}

/// Degrades a failed field lookup to no matches.
fn lookup_outcome(field: &str, value: &str, found: lens_logs::Result<Vec<LogEntry>>) -> Vec<LogEntry> {
    match found {
        Ok(entries) => {
            debug!(field, value, matches = entries.len(), "Field lookup completed");
            entries
        }
        Err(e) => {
            error!(field, value, error = %e, "Field lookup failed");
            Vec::new()
        }
    }
}

impl fmt::Debug for LogService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogService")
            .field("adapter", &self.adapter)
            .field("pattern_cache_size", &self.recognizer.size())
            .finish_non_exhaustive()
    }
}

//! Template counting and ranking over a corpus.

use std::collections::HashMap;
use std::sync::Arc;

use lens_logs::{LogEntry, LogRepository, TimeRange};
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::recognizer::PatternRecognizer;

/// A template and how many messages reduced to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateCount {
    /// The template text
    pub template: String,
    /// Number of messages with this template
    pub count: usize,
}

/// Per-template counts, kept in the order templates were first seen.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TemplateCounts {
    ordered: Vec<TemplateCount>,
    index: HashMap<String, usize>,
}

impl TemplateCounts {
    /// Creates an empty tally.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one occurrence of a template.
    pub fn increment(&mut self, template: &str) {
        if let Some(&slot) = self.index.get(template) {
            self.ordered[slot].count += 1;
            return;
        }
        self.index.insert(template.to_string(), self.ordered.len());
        self.ordered.push(TemplateCount {
            template: template.to_string(),
            count: 1,
        });
    }

    /// Count for a template, zero if never seen.
    #[must_use]
    pub fn get(&self, template: &str) -> usize {
        self.index
            .get(template)
            .map_or(0, |&slot| self.ordered[slot].count)
    }

    /// Number of distinct templates.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ordered.len()
    }

    /// Returns true if nothing was counted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ordered.is_empty()
    }

    /// Sum of all counts.
    #[must_use]
    pub fn total(&self) -> usize {
        self.ordered.iter().map(|c| c.count).sum()
    }

    /// Iterates in first-seen order.
    pub fn iter(&self) -> impl Iterator<Item = &TemplateCount> {
        self.ordered.iter()
    }

    /// Top `limit` templates by count, descending.
    ///
    /// Equal counts keep their first-seen order.
    #[must_use]
    pub fn into_ranked(self, limit: usize) -> Vec<TemplateCount> {
        let mut ranked = self.ordered;
        ranked.sort_by(|a, b| b.count.cmp(&a.count));
        ranked.truncate(limit);
        ranked
    }
}

/// Counts and ranks templates across stored entries.
#[derive(Clone)]
pub struct TemplateAggregator {
    recognizer: Arc<PatternRecognizer>,
    repository: Arc<dyn LogRepository>,
}

impl TemplateAggregator {
    /// Creates an aggregator sharing the given recognizer.
    #[must_use]
    pub fn new(recognizer: Arc<PatternRecognizer>, repository: Arc<dyn LogRepository>) -> Self {
        Self {
            recognizer,
            repository,
        }
    }

    /// The recognizer this aggregator feeds.
    #[must_use]
    pub fn recognizer(&self) -> &Arc<PatternRecognizer> {
        &self.recognizer
    }

    /// Tallies templates for every entry with a non-empty message.
    #[must_use]
    pub fn analyze(&self, entries: &[LogEntry]) -> TemplateCounts {
        let mut counts = TemplateCounts::new();
        for message in entries.iter().filter_map(LogEntry::non_empty_message) {
            counts.increment(self.recognizer.recognize(message).template());
        }
        counts
    }

    /// The `limit` most frequent templates in the range (or the whole corpus).
    ///
    /// A retrieval failure is logged and yields no templates.
    #[must_use]
    pub fn most_common(&self, range: Option<TimeRange>, limit: usize) -> Vec<TemplateCount> {
        let entries = match self.repository.find_in(range) {
            Ok(entries) => entries,
            Err(e) => {
                error!(error = %e, "Pattern corpus retrieval failed");
                return Vec::new();
            }
        };

        let counts = self.analyze(&entries);
        debug!(
            entries = entries.len(),
            templates = counts.len(),
            limit,
            "Ranked message templates"
        );
        counts.into_ranked(limit)
    }

    /// Entries in the range whose message reduces to exactly `template`.
    ///
    /// A retrieval failure is logged and yields no entries.
    #[must_use]
    pub fn find_by_template(&self, template: &str, range: Option<TimeRange>) -> Vec<LogEntry> {
        let entries = match self.repository.find_in(range) {
            Ok(entries) => entries,
            Err(e) => {
                error!(error = %e, template, "Pattern lookup retrieval failed");
                return Vec::new();
            }
        };

        entries
            .into_iter()
            .filter(|entry| {
                entry
                    .non_empty_message()
                    .is_some_and(|m| self.recognizer.recognize(m).template() == template)
            })
            .collect()
    }
}

impl std::fmt::Debug for TemplateAggregator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TemplateAggregator")
            .field("recognizer", &self.recognizer)
            .finish_non_exhaustive()
    }
}

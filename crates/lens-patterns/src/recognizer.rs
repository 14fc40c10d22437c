//! Message templating.
//!
//! A message is reduced to its template by six extraction passes run in a
//! fixed priority order: UUID, IP address, email, URL, timestamp, number.
//! Each pass rewrites the output of the previous one, so by the time the
//! number pass runs every digit inside an earlier match is already
//! placeholder text.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Type of a variable span recognized inside a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VariableKind {
    /// RFC 4122 style UUID
    Uuid,
    /// Dotted-quad IPv4 address
    IpAddress,
    /// Email address
    Email,
    /// http, https, ftp or file URL
    Url,
    /// ISO-8601 style date-time
    Timestamp,
    /// Bare run of digits
    Number,
}

impl VariableKind {
    /// All kinds, in extraction priority order.
    pub const ALL: [Self; 6] = [
        Self::Uuid,
        Self::IpAddress,
        Self::Email,
        Self::Url,
        Self::Timestamp,
        Self::Number,
    ];

    /// The label used in placeholders and variable maps.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Uuid => "UUID",
            Self::IpAddress => "IP_ADDRESS",
            Self::Email => "EMAIL",
            Self::Url => "URL",
            Self::Timestamp => "TIMESTAMP",
            Self::Number => "NUMBER",
        }
    }

    /// The placeholder substituted for a matched span.
    #[must_use]
    pub const fn placeholder(&self) -> &'static str {
        match self {
            Self::Uuid => "{{UUID}}",
            Self::IpAddress => "{{IP_ADDRESS}}",
            Self::Email => "{{EMAIL}}",
            Self::Url => "{{URL}}",
            Self::Timestamp => "{{TIMESTAMP}}",
            Self::Number => "{{NUMBER}}",
        }
    }
}

impl fmt::Display for VariableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A message template and the literal spans extracted from it.
///
/// Two patterns are equal, and hash identically, when their templates are
/// equal. The captured variables do not take part in identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogPattern {
    template: String,
    variables: BTreeMap<VariableKind, Vec<String>>,
}

impl LogPattern {
    /// Creates a pattern from its parts.
    #[must_use]
    pub fn new(template: impl Into<String>, variables: BTreeMap<VariableKind, Vec<String>>) -> Self {
        Self {
            template: template.into(),
            variables,
        }
    }

    /// The message with variable spans replaced by placeholders.
    #[must_use]
    pub fn template(&self) -> &str {
        &self.template
    }

    /// Matched literals per kind, in left-to-right order. Kinds with no match are absent.
    #[must_use]
    pub const fn variables(&self) -> &BTreeMap<VariableKind, Vec<String>> {
        &self.variables
    }

    /// Matched literals of one kind (empty if none).
    #[must_use]
    pub fn variable(&self, kind: VariableKind) -> &[String] {
        self.variables.get(&kind).map(Vec::as_slice).unwrap_or_default()
    }
}

impl PartialEq for LogPattern {
    fn eq(&self, other: &Self) -> bool {
        self.template == other.template
    }
}

impl Eq for LogPattern {}

impl Hash for LogPattern {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.template.hash(state);
    }
}

struct Extractor {
    kind: VariableKind,
    regex: Regex,
}

impl Extractor {
    fn new(kind: VariableKind, pattern: &str) -> Self {
        Self {
            kind,
            regex: Regex::new(pattern).unwrap_or_else(|_| unreachable!()),
        }
    }

    /// Replaces every match with the placeholder, appending matched literals to `found`.
    fn apply(&self, input: &str, found: &mut Vec<String>) -> String {
        let mut output = String::with_capacity(input.len());
        let mut last = 0;

        for m in self.regex.find_iter(input) {
            output.push_str(&input[last..m.start()]);
            output.push_str(self.kind.placeholder());
            found.push(m.as_str().to_string());
            last = m.end();
        }
        output.push_str(&input[last..]);
        output
    }
}

/// Extraction passes in priority order, compiled once.
static EXTRACTORS: Lazy<[Extractor; 6]> = Lazy::new(|| {
    [
        Extractor::new(
            VariableKind::Uuid,
            r"(?i)[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}",
        ),
        Extractor::new(VariableKind::IpAddress, r"\b(?:[0-9]{1,3}\.){3}[0-9]{1,3}\b"),
        Extractor::new(
            VariableKind::Email,
            r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b",
        ),
        Extractor::new(
            VariableKind::Url,
            r"\b(?:https?|ftp|file)://[-a-zA-Z0-9+&@#/%?=~_|!:,.;]*[-a-zA-Z0-9+&@#/%=~_|]",
        ),
        Extractor::new(
            VariableKind::Timestamp,
            r"\b[0-9]{4}-[0-9]{2}-[0-9]{2}[T ][0-9]{2}:[0-9]{2}:[0-9]{2}(?:\.[0-9]{1,6})?(?:Z|[+-][0-9]{2}:?[0-9]{2})?\b",
        ),
        Extractor::new(VariableKind::Number, r"\b[0-9]+\b"),
    ]
});

/// Computes the pattern of a message without touching any cache.
#[must_use]
pub fn extract_pattern(message: &str) -> LogPattern {
    let mut template = message.to_string();
    let mut variables = BTreeMap::new();

    for extractor in EXTRACTORS.iter() {
        let mut found = Vec::new();
        template = extractor.apply(&template, &mut found);
        if !found.is_empty() {
            variables.insert(extractor.kind, found);
        }
    }

    LogPattern { template, variables }
}

/// Cache of recognized patterns keyed by the exact raw message.
///
/// Unbounded: it grows with the number of distinct messages and is only
/// emptied by [`PatternCache::clear`].
#[derive(Debug, Default)]
pub struct PatternCache {
    entries: RwLock<HashMap<String, Arc<LogPattern>>>,
}

impl PatternCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up a message.
    #[must_use]
    pub fn get(&self, message: &str) -> Option<Arc<LogPattern>> {
        self.entries.read().get(message).cloned()
    }

    /// Stores a pattern, keeping an entry another caller stored first.
    pub fn insert(&self, message: &str, pattern: LogPattern) -> Arc<LogPattern> {
        self.entries
            .write()
            .entry(message.to_string())
            .or_insert_with(|| Arc::new(pattern))
            .clone()
    }

    /// Drops every entry.
    pub fn clear(&self) {
        self.entries.write().clear();
    }

    /// Number of cached messages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns true if nothing is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

/// Recognizes message templates, memoizing results per raw message.
///
/// Constructed once per process and shared by reference.
#[derive(Debug, Default)]
pub struct PatternRecognizer {
    cache: PatternCache,
}

impl PatternRecognizer {
    /// Creates a recognizer with an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the pattern of a non-empty message.
    ///
    /// Concurrent misses on the same message may compute twice; the result is
    /// deterministic so either computation is equivalent.
    pub fn recognize(&self, message: &str) -> Arc<LogPattern> {
        if let Some(pattern) = self.cache.get(message) {
            return pattern;
        }
        self.cache.insert(message, extract_pattern(message))
    }

    /// The cache backing this recognizer.
    #[must_use]
    pub const fn cache(&self) -> &PatternCache {
        &self.cache
    }

    /// Drops every cached pattern.
    pub fn clear(&self) {
        let dropped = self.cache.len();
        self.cache.clear();
        info!(dropped, "Pattern cache cleared");
    }

    /// Number of cached patterns.
    #[must_use]
    pub fn size(&self) -> usize {
        self.cache.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use test_case::test_case;

    const SAMPLE_UUID: &str = "123e4567-e89b-12d3-a456-426614174000";

    #[test]
    fn recognize_login_example() {
        let recognizer = PatternRecognizer::new();
        let pattern = recognizer.recognize(&format!(
            "User {SAMPLE_UUID} logged in from 10.0.0.1 at 2024-01-02T03:04:05Z"
        ));

        assert_eq!(
            pattern.template(),
            "User {{UUID}} logged in from {{IP_ADDRESS}} at {{TIMESTAMP}}"
        );
        assert_eq!(pattern.variable(VariableKind::Uuid), [SAMPLE_UUID]);
        assert_eq!(pattern.variable(VariableKind::IpAddress), ["10.0.0.1"]);
        assert_eq!(pattern.variable(VariableKind::Timestamp), ["2024-01-02T03:04:05Z"]);
        assert!(pattern.variable(VariableKind::Number).is_empty());
        assert_eq!(pattern.variables().len(), 3);
    }

    #[test]
    fn uuid_digits_are_never_numbers() {
        let pattern = extract_pattern(&format!("request {SAMPLE_UUID} done"));
        assert_eq!(pattern.template(), "request {{UUID}} done");
        assert!(!pattern.variables().contains_key(&VariableKind::Number));
    }

    #[test]
    fn uuid_is_case_insensitive() {
        let pattern = extract_pattern("id 123E4567-E89B-12D3-A456-426614174000");
        assert_eq!(pattern.template(), "id {{UUID}}");
    }

    #[test_case("user 42 login", "user {{NUMBER}} login" ; "number")]
    #[test_case("mail bob.smith@example.com now", "mail {{EMAIL}} now" ; "email")]
    #[test_case("GET https://example.com/a?b=1 ok", "GET {{URL}} ok" ; "url")]
    #[test_case("at 2024-05-06 07:08:09.123+02:00 end", "at {{TIMESTAMP}} end" ; "timestamp with offset")]
    #[test_case("peer 192.168.1.20:8080 closed", "peer {{IP_ADDRESS}}:{{NUMBER}} closed" ; "ip and port")]
    #[test_case("no variables here", "no variables here" ; "plain")]
    #[test_case("build v2 ready", "build v2 ready" ; "digits inside word")]
    fn template_cases(message: &str, expected: &str) {
        assert_eq!(extract_pattern(message).template(), expected);
    }

    #[test]
    fn numbers_keep_order_and_duplicates() {
        let pattern = extract_pattern("retry 3 of 5 after 3 seconds");
        assert_eq!(pattern.template(), "retry {{NUMBER}} of {{NUMBER}} after {{NUMBER}} seconds");
        assert_eq!(pattern.variable(VariableKind::Number), ["3", "5", "3"]);
    }

    #[test]
    fn same_shape_same_template() {
        let a = extract_pattern("user 42 login");
        let b = extract_pattern("user 99 login");
        assert_eq!(a, b);
        assert_ne!(a.variables(), b.variables());

        let mut set = HashSet::new();
        set.insert(a);
        set.insert(b);
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn recognize_caches_by_raw_message() {
        let recognizer = PatternRecognizer::new();
        let first = recognizer.recognize("user 1 login");
        let second = recognizer.recognize("user 1 login");
        let _ = recognizer.recognize("user 2 login");

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(recognizer.size(), 2);
    }

    #[test]
    fn recognize_is_stable_across_clear() {
        let recognizer = PatternRecognizer::new();
        let before = recognizer.recognize("disk 91% full on 10.1.1.1");
        recognizer.clear();
        assert_eq!(recognizer.size(), 0);
        assert!(recognizer.cache().is_empty());

        let after = recognizer.recognize("disk 91% full on 10.1.1.1");
        assert_eq!(before, after);
        assert_eq!(after.template(), "disk {{NUMBER}}% full on {{IP_ADDRESS}}");
    }

    #[test]
    fn cache_insert_keeps_first_entry() {
        let cache = PatternCache::new();
        let first = cache.insert("m", LogPattern::new("first", BTreeMap::new()));
        let second = cache.insert("m", LogPattern::new("second", BTreeMap::new()));

        assert_eq!(first.template(), "first");
        assert_eq!(second.template(), "first");
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn concurrent_recognition_shares_cache() {
        let recognizer = Arc::new(PatternRecognizer::new());
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let recognizer = Arc::clone(&recognizer);
                std::thread::spawn(move || {
                    for i in 0..100 {
                        let pattern = recognizer.recognize(&format!("worker {} step {i}", t % 2));
                        assert_eq!(pattern.template(), "worker {{NUMBER}} step {{NUMBER}}");
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().expect("worker panicked");
        }
        assert_eq!(recognizer.size(), 200);
    }

    #[test]
    fn variable_kind_labels() {
        for kind in VariableKind::ALL {
            assert_eq!(kind.placeholder(), format!("{{{{{}}}}}", kind.label()));
            assert_eq!(kind.to_string(), kind.label());
        }
    }

    #[test]
    fn variable_kind_serializes_as_label() {
        let json = serde_json::to_string(&VariableKind::IpAddress).expect("serialize");
        assert_eq!(json, "\"IP_ADDRESS\"");
    }
}

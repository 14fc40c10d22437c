//! # lens-patterns
//!
//! Message template mining for LogLens.
//!
//! - [`PatternRecognizer`] reduces a message to its template, caching per raw message
//! - [`TemplateAggregator`] counts and ranks templates across stored entries
//!
//! ```rust
//! use lens_patterns::{PatternRecognizer, VariableKind};
//!
//! let recognizer = PatternRecognizer::new();
//! let pattern = recognizer.recognize("GET /orders/17 from 192.168.0.4");
//!
//! assert_eq!(pattern.template(), "GET /orders/{{NUMBER}} from {{IP_ADDRESS}}");
//! assert_eq!(pattern.variable(VariableKind::Number), ["17"]);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod aggregator;
pub mod recognizer;

pub use aggregator::{TemplateAggregator, TemplateCount, TemplateCounts};
pub use recognizer::{LogPattern, PatternCache, PatternRecognizer, VariableKind, extract_pattern};

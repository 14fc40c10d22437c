//! Server configuration.
//!
//! Loaded from an optional TOML file, where every key may be omitted, then
//! overridden by command-line flags.

use std::net::SocketAddr;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ServerError, ServerResult};

/// Default maximum WebSocket message size: 1MB.
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 1024 * 1024;

/// Default maximum number of concurrent connections.
pub const DEFAULT_MAX_CONNECTIONS: usize = 1000;

/// Default capacity of the in-memory store.
pub const DEFAULT_MAX_ENTRIES: usize = 100_000;

/// Default page size for searches that leave it unset.
pub const DEFAULT_PAGE_SIZE: usize = 20;

/// Default number of templates for pattern requests that leave it unset.
pub const DEFAULT_PATTERN_LIMIT: usize = 10;

/// Default cap on histogram buckets per request.
pub const DEFAULT_MAX_TIME_SLOTS: usize = lens_proto::DEFAULT_MAX_TIME_SLOTS;

/// Configuration for the log service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind the WebSocket server to.
    pub bind_addr: SocketAddr,
    /// Maximum number of concurrent connections.
    pub max_connections: usize,
    /// Maximum size of one inbound frame in bytes.
    pub max_message_size: usize,
    /// Capacity of the in-memory store; the oldest entries are evicted beyond it.
    pub max_entries: usize,
    /// Page size used when a search leaves it non-positive.
    pub default_page_size: usize,
    /// Template count used when a pattern request leaves it non-positive.
    pub pattern_limit: usize,
    /// Most histogram buckets one request may ask for; larger requests are clamped.
    pub max_time_slots: usize,
}

impl ServerConfig {
    /// Create a new server configuration with the specified bind address.
    #[must_use]
    pub const fn new(bind_addr: SocketAddr) -> Self {
        Self {
            bind_addr,
            max_connections: DEFAULT_MAX_CONNECTIONS,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            max_entries: DEFAULT_MAX_ENTRIES,
            default_page_size: DEFAULT_PAGE_SIZE,
            pattern_limit: DEFAULT_PATTERN_LIMIT,
            max_time_slots: DEFAULT_MAX_TIME_SLOTS,
        }
    }

    /// Set the bind address.
    #[must_use]
    pub const fn with_bind_addr(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Set the maximum number of connections.
    #[must_use]
    pub const fn with_max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    /// Set the maximum message size.
    #[must_use]
    pub const fn with_max_message_size(mut self, size: usize) -> Self {
        self.max_message_size = size;
        self
    }

    /// Set the store capacity.
    #[must_use]
    pub const fn with_max_entries(mut self, max: usize) -> Self {
        self.max_entries = max;
        self
    }

    /// Set the default page size.
    #[must_use]
    pub const fn with_default_page_size(mut self, size: usize) -> Self {
        self.default_page_size = size;
        self
    }

    /// Set the default pattern limit.
    #[must_use]
    pub const fn with_pattern_limit(mut self, limit: usize) -> Self {
        self.pattern_limit = limit;
        self
    }

    /// Set the histogram bucket cap.
    #[must_use]
    pub const fn with_max_time_slots(mut self, max: usize) -> Self {
        self.max_time_slots = max;
        self
    }

    /// Check if a message size is within the allowed limit.
    #[must_use]
    pub const fn is_message_size_valid(&self, size: usize) -> bool {
        size <= self.max_message_size
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed, or validated.
    pub fn from_file(path: impl AsRef<Path>) -> ServerResult<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            ServerError::Config(format!(
                "failed to read config file '{}': {}",
                path.as_ref().display(),
                e
            ))
        })?;

        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is invalid or fails validation.
    pub fn from_toml(content: &str) -> ServerResult<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| ServerError::Config(format!("invalid TOML: {e}")))?;

        config.validate()?;
        Ok(config)
    }

    /// Render the configuration as TOML.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_toml(&self) -> ServerResult<String> {
        toml::to_string_pretty(self)
            .map_err(|e| ServerError::Config(format!("failed to render TOML: {e}")))
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any limit is zero.
    pub fn validate(&self) -> ServerResult<()> {
        let limits = [
            ("max_connections", self.max_connections),
            ("max_message_size", self.max_message_size),
            ("max_entries", self.max_entries),
            ("default_page_size", self.default_page_size),
            ("pattern_limit", self.pattern_limit),
            ("max_time_slots", self.max_time_slots),
        ];

        for (name, value) in limits {
            if value == 0 {
                return Err(ServerError::Config(format!("{name} must be greater than 0")));
            }
        }
        Ok(())
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new(([0, 0, 0, 0], 7070).into())
    }
}

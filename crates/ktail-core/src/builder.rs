//! Fluent builder API for tail sessions.
//!
//! # Example
//!
//! ```rust
//! use ktail_core::{GroupFilter, TailBuilder};
//!
//! let config = TailBuilder::new("app-logs")
//!     .logs(GroupFilter::default().include("/aws/lambda/").exclude("staging"))
//!     .poll_interval_ms(1_000)
//!     .timeout_ms(60_000)
//!     .build_config()
//!     .unwrap();
//! assert_eq!(config.stream, "app-logs");
//! ```

use chrono::{DateTime, Utc};

use crate::config::{FailurePolicy, TailConfig, TailMode};
use crate::error::TailError;
use crate::format::LineFormat;
use crate::matcher::GroupFilter;
use crate::types::StartPosition;

/// Fluent builder for `TailConfig`.
#[derive(Debug, Clone, Default)]
pub struct TailBuilder {
    config: TailConfig,
}

impl TailBuilder {
    pub fn new(stream: impl Into<String>) -> Self {
        Self {
            config: TailConfig {
                stream: stream.into(),
                ..TailConfig::default()
            },
        }
    }

    /// Decode CloudWatch Logs payloads, keeping groups admitted by `filter`.
    pub fn logs(mut self, filter: GroupFilter) -> Self {
        self.config.mode = TailMode::Logs { filter };
        self
    }

    /// Print payloads as text.
    pub fn raw(mut self) -> Self {
        self.config.mode = TailMode::Raw;
        self
    }

    /// Start at the first record at or after `ts`.
    pub fn anchor(mut self, ts: DateTime<Utc>) -> Self {
        self.config.start = StartPosition::AtTimestamp(ts);
        self
    }

    pub fn start(mut self, position: StartPosition) -> Self {
        self.config.start = position;
        self
    }

    /// Time between two fetches of one shard.
    pub fn poll_interval_ms(mut self, ms: u64) -> Self {
        self.config.poll_interval_ms = ms;
        self
    }

    /// Pushes per reordering window (default: shard count).
    pub fn window(mut self, pushes: usize) -> Self {
        self.config.window = Some(pushes);
        self
    }

    pub fn channel_capacity(mut self, capacity: usize) -> Self {
        self.config.channel_capacity = Some(capacity);
        self
    }

    pub fn timeout_ms(mut self, ms: u64) -> Self {
        self.config.timeout_ms = Some(ms);
        self
    }

    /// Stop after `n` records (0 = no limit).
    pub fn count(mut self, n: usize) -> Self {
        self.config.count = n;
        self
    }

    pub fn failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.config.failure_policy = policy;
        self
    }

    pub fn format(mut self, format: LineFormat) -> Self {
        self.config.format = format;
        self
    }

    /// Validate and return the `TailConfig`.
    pub fn build_config(self) -> Result<TailConfig, TailError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

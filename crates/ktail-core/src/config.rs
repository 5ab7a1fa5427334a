//! Tail session configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::decode::{LogsDecoder, RawDecoder, RecordDecoder};
use crate::error::TailError;
use crate::format::LineFormat;
use crate::matcher::GroupFilter;
use crate::poller::PollerConfig;
use crate::types::StartPosition;

/// How records are decoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum TailMode {
    /// gzip + JSON CloudWatch Logs subscription payloads.
    Logs {
        #[serde(default)]
        filter: GroupFilter,
    },
    /// Payload printed as text.
    Raw,
}

impl Default for TailMode {
    fn default() -> Self {
        Self::Logs {
            filter: GroupFilter::default(),
        }
    }
}

impl TailMode {
    pub fn decoder(&self) -> Box<dyn RecordDecoder> {
        match self {
            Self::Logs { filter } => Box::new(LogsDecoder::new(filter.clone())),
            Self::Raw => Box::new(RawDecoder),
        }
    }
}

/// What the session does when a shard's fetch fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Any shard's fetch error ends the whole session.
    #[default]
    Abort,
    /// Log the error and keep going; the shard retries on its next tick.
    Isolate,
}

/// Configuration for a [`TailSession`](crate::session::TailSession).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TailConfig {
    /// Stream to tail.
    pub stream: String,
    #[serde(default)]
    pub mode: TailMode,
    /// Where each shard's starting cursor points.
    #[serde(default)]
    pub start: StartPosition,
    /// Time between two fetches of the same shard (milliseconds).
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Pushes per reordering window; `None` uses the shard count.
    #[serde(default)]
    pub window: Option<usize>,
    /// Fan-in channel capacity; `None` uses the shard count.
    #[serde(default)]
    pub channel_capacity: Option<usize>,
    /// Stop after this long (milliseconds); `None` runs until stopped.
    #[serde(default)]
    pub timeout_ms: Option<u64>,
    /// Stop once this many records were received; 0 = no limit.
    #[serde(default)]
    pub count: usize,
    #[serde(default)]
    pub failure_policy: FailurePolicy,
    #[serde(default)]
    pub format: LineFormat,
}

fn default_poll_interval_ms() -> u64 {
    5_000
}

impl Default for TailConfig {
    fn default() -> Self {
        Self {
            stream: String::new(),
            mode: TailMode::default(),
            start: StartPosition::Latest,
            poll_interval_ms: default_poll_interval_ms(),
            window: None,
            channel_capacity: None,
            timeout_ms: None,
            count: 0,
            failure_policy: FailurePolicy::Abort,
            format: LineFormat::Plain,
        }
    }
}

impl TailConfig {
    /// Reject settings the engine cannot run with.
    pub fn validate(&self) -> Result<(), TailError> {
        if self.stream.trim().is_empty() {
            return Err(TailError::Config("stream name is empty".into()));
        }
        if self.poll_interval_ms == 0 {
            return Err(TailError::Config("poll interval must be positive".into()));
        }
        if self.window == Some(0) {
            return Err(TailError::Config("window must be at least one push".into()));
        }
        if self.channel_capacity == Some(0) {
            return Err(TailError::Config("channel capacity must be positive".into()));
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }

    pub fn poller_config(&self) -> PollerConfig {
        PollerConfig {
            poll_interval: self.poll_interval(),
            channel_capacity: self.channel_capacity,
        }
    }

    /// Window size for a stream with `shards` shards.
    pub fn window_for(&self, shards: usize) -> usize {
        self.window.unwrap_or(shards).max(1)
    }
}

//! Shared types for the tailing pipeline.

use std::fmt;

use chrono::{DateTime, SecondsFormat, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::error::TailError;

// ─── Cursor ───────────────────────────────────────────────────────────────────

/// Opaque position token used to resume reading a shard.
///
/// For Kinesis this is a shard iterator. A shard with no cursor is closed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Cursor(String);

impl Cursor {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Iterators are long and useless in logs; show a prefix only.
        let end = self.0.char_indices().nth(16).map_or(self.0.len(), |(i, _)| i);
        if end < self.0.len() {
            write!(f, "{}…", &self.0[..end])
        } else {
            f.write_str(&self.0)
        }
    }
}

// ─── ShardDescriptor ──────────────────────────────────────────────────────────

/// A shard of a stream. No parent/child relationships are tracked.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ShardDescriptor {
    pub shard_id: String,
}

impl ShardDescriptor {
    pub fn new(shard_id: impl Into<String>) -> Self {
        Self {
            shard_id: shard_id.into(),
        }
    }
}

// ─── StartPosition ────────────────────────────────────────────────────────────

/// Where a freshly acquired cursor points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StartPosition {
    /// Just after the most recent record (tip of the stream).
    #[default]
    Latest,
    /// The first record at or after the given instant.
    AtTimestamp(DateTime<Utc>),
    /// The oldest record still retained by the stream.
    TrimHorizon,
}

impl StartPosition {
    /// `Some(ts)` anchors at `ts`, `None` starts at the tip.
    pub fn from_anchor(anchor: Option<DateTime<Utc>>) -> Self {
        anchor.map_or(Self::Latest, Self::AtTimestamp)
    }
}

impl fmt::Display for StartPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Latest => write!(f, "latest"),
            Self::AtTimestamp(ts) => write!(f, "at-timestamp({})", format_timestamp(ts)),
            Self::TrimHorizon => write!(f, "trim-horizon"),
        }
    }
}

// ─── Records ──────────────────────────────────────────────────────────────────

/// A record as returned by the stream source, before decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRecord {
    /// Approximate time the record arrived in the stream.
    pub arrival: DateTime<Utc>,
    /// Record payload.
    pub payload: Vec<u8>,
    /// Source-assigned sequence number (debugging only).
    pub sequence_number: String,
}

impl RawRecord {
    pub fn new(arrival: DateTime<Utc>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            arrival,
            payload: payload.into(),
            sequence_number: String::new(),
        }
    }

    pub fn with_sequence_number(mut self, seq: impl Into<String>) -> Self {
        self.sequence_number = seq.into();
        self
    }
}

/// The result of a single fetch against a shard's current cursor.
#[derive(Debug, Clone, Default)]
pub struct FetchOutput {
    pub records: Vec<RawRecord>,
    /// Cursor for the next fetch; `None` means the shard is closed.
    pub next_cursor: Option<Cursor>,
    /// How far behind the tip of the shard this batch was, if reported.
    pub millis_behind: Option<i64>,
}

/// Output of one poll tick for one shard, sent on the fan-in channel.
#[derive(Debug)]
pub struct PollResult {
    /// Time the tick fired.
    pub created_at: DateTime<Utc>,
    pub shard_id: String,
    /// Fetched records, or the fetch error.
    pub outcome: Result<Vec<RawRecord>, TailError>,
}

impl PollResult {
    pub fn records(&self) -> &[RawRecord] {
        match &self.outcome {
            Ok(records) => records,
            Err(_) => &[],
        }
    }

    pub fn error(&self) -> Option<&TailError> {
        self.outcome.as_ref().err()
    }

    pub fn is_err(&self) -> bool {
        self.outcome.is_err()
    }
}

// ─── Message ──────────────────────────────────────────────────────────────────

/// A decoded, printable message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// CloudWatch log group (structured mode only).
    pub log_group: Option<String>,
    /// RFC3339 UTC timestamp with second precision, e.g. `2020-01-01T00:00:01Z`.
    ///
    /// All fields are fixed width, so string order equals time order.
    pub timestamp: String,
    pub text: String,
}

impl Message {
    pub fn new(timestamp: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            log_group: None,
            timestamp: timestamp.into(),
            text: text.into(),
        }
    }

    pub fn with_log_group(mut self, group: impl Into<String>) -> Self {
        self.log_group = Some(group.into());
        self
    }
}

// ─── Timestamps ───────────────────────────────────────────────────────────────

/// Convert epoch milliseconds into an instant. `0` means "now".
pub fn build_timestamp(millis: i64) -> Result<DateTime<Utc>, TailError> {
    if millis == 0 {
        return Ok(Utc::now());
    }
    Utc.timestamp_millis_opt(millis)
        .single()
        .ok_or_else(|| TailError::Config(format!("timestamp {millis} is out of range")))
}

/// Format an instant the way messages carry it: RFC3339, UTC, whole seconds.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

// ─── Tests ────────────────────────────────────────────────────────────────────

//! Record decoders: CloudWatch Logs subscription payloads and raw payloads.

use std::io::Read;

use flate2::read::GzDecoder;
use serde::{Deserialize, Serialize};

use crate::error::TailError;
use crate::matcher::GroupFilter;
use crate::types::{format_timestamp, Message, RawRecord};

/// Turns one raw record into zero or more messages.
pub trait RecordDecoder: Send + Sync {
    fn decode(&self, record: &RawRecord) -> Result<Vec<Message>, TailError>;
}

fn strip_newline(s: &str) -> &str {
    s.strip_suffix('\n').unwrap_or(s)
}

// ─── Raw ──────────────────────────────────────────────────────────────────────

/// One message per record: the payload as text, minus one trailing newline.
#[derive(Debug, Clone, Copy, Default)]
pub struct RawDecoder;

impl RawDecoder {
    pub fn decode_one(record: &RawRecord) -> Message {
        let text = String::from_utf8_lossy(&record.payload);
        Message::new(format_timestamp(&record.arrival), strip_newline(&text))
    }
}

impl RecordDecoder for RawDecoder {
    fn decode(&self, record: &RawRecord) -> Result<Vec<Message>, TailError> {
        Ok(vec![Self::decode_one(record)])
    }
}

// ─── CloudWatch Logs ──────────────────────────────────────────────────────────

/// A single log event inside a subscription payload.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LogEntry {
    pub id: String,
    /// Event time in epoch milliseconds.
    pub timestamp: i64,
    pub message: String,
}

/// The gzip-compressed JSON envelope CloudWatch Logs writes to a stream.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LogBatch {
    pub message_type: String,
    pub owner: String,
    pub log_group: String,
    pub log_stream: String,
    pub subscription_filters: Vec<String>,
    pub log_events: Vec<LogEntry>,
}

impl LogBatch {
    /// Connectivity checks sent when a subscription is created.
    pub fn is_control_message(&self) -> bool {
        self.message_type == "CONTROL_MESSAGE"
    }
}

/// Decompress and parse a subscription payload.
pub fn uncompress_batch(payload: &[u8]) -> Result<LogBatch, TailError> {
    let mut json = Vec::new();
    GzDecoder::new(payload)
        .read_to_end(&mut json)
        .map_err(|e| TailError::Decode(format!("un-gzip data failed: {e}")))?;
    Ok(serde_json::from_slice(&json)?)
}

/// Decodes CloudWatch Logs subscription records, filtering on log group.
///
/// Every event gets the record's arrival time, so ordering is by arrival in
/// the stream, not by event time.
#[derive(Debug, Clone, Default)]
pub struct LogsDecoder {
    filter: GroupFilter,
}

impl LogsDecoder {
    pub fn new(filter: GroupFilter) -> Self {
        Self { filter }
    }

    pub fn filter(&self) -> &GroupFilter {
        &self.filter
    }
}

impl RecordDecoder for LogsDecoder {
    fn decode(&self, record: &RawRecord) -> Result<Vec<Message>, TailError> {
        let batch = uncompress_batch(&record.payload)?;

        if batch.is_control_message() || !self.filter.admits(&batch.log_group) {
            return Ok(vec![]);
        }

        let timestamp = format_timestamp(&record.arrival);
        Ok(batch
            .log_events
            .iter()
            .map(|e| {
                Message::new(timestamp.clone(), strip_newline(&e.message))
                    .with_log_group(batch.log_group.clone())
            })
            .collect())
    }
}

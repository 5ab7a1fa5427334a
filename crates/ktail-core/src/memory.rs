//! In-memory stream source.
//!
//! Serves scripted pages of records per shard. Useful for tests and for
//! exercising the engine without AWS credentials.
//!
//! Every shard starts at its first page whatever the requested
//! [`StartPosition`]: the scripted pages stand for records that arrive after
//! the cursor was taken. Requested positions are recorded for inspection.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use crate::error::TailError;
use crate::source::StreamSource;
use crate::types::{Cursor, FetchOutput, RawRecord, ShardDescriptor, StartPosition};

#[derive(Debug, Default)]
struct MemoryShard {
    pages: Vec<Vec<RawRecord>>,
    /// After the last page, return no next cursor instead of idling at the tip.
    closes: bool,
    cursor_error: Option<String>,
    fetch_error: Option<String>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Scripted, in-memory [`StreamSource`].
#[derive(Debug, Default)]
pub struct MemorySource {
    shards: Mutex<BTreeMap<String, MemoryShard>>,
    describe_error: Option<String>,
    fetch_counts: Mutex<HashMap<String, usize>>,
    positions: Mutex<Vec<(String, StartPosition)>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a shard that serves `pages` and then idles at the tip forever.
    pub fn with_shard(self, shard: impl Into<String>, pages: Vec<Vec<RawRecord>>) -> Self {
        lock(&self.shards).insert(
            shard.into(),
            MemoryShard {
                pages,
                ..Default::default()
            },
        );
        self
    }

    /// Add a shard that serves `pages` and then reports no next cursor.
    pub fn with_closing_shard(self, shard: impl Into<String>, pages: Vec<Vec<RawRecord>>) -> Self {
        lock(&self.shards).insert(
            shard.into(),
            MemoryShard {
                pages,
                closes: true,
                ..Default::default()
            },
        );
        self
    }

    /// Make `list_shards` fail.
    pub fn fail_describe(mut self, reason: impl Into<String>) -> Self {
        self.describe_error = Some(reason.into());
        self
    }

    /// Make `shard_cursor` fail for `shard`.
    pub fn fail_cursor(self, shard: &str, reason: impl Into<String>) -> Self {
        lock(&self.shards)
            .entry(shard.to_string())
            .or_default()
            .cursor_error = Some(reason.into());
        self
    }

    /// Make every subsequent `fetch` on `shard` fail.
    pub fn fail_fetch(&self, shard: &str, reason: impl Into<String>) {
        lock(&self.shards)
            .entry(shard.to_string())
            .or_default()
            .fetch_error = Some(reason.into());
    }

    /// Append a page to `shard` while it is being polled.
    pub fn push_page(&self, shard: &str, page: Vec<RawRecord>) {
        lock(&self.shards)
            .entry(shard.to_string())
            .or_default()
            .pages
            .push(page);
    }

    /// Number of fetches issued against `shard`.
    pub fn fetch_count(&self, shard: &str) -> usize {
        lock(&self.fetch_counts).get(shard).copied().unwrap_or(0)
    }

    /// Every `(shard, position)` a cursor was requested for, in call order.
    pub fn positions(&self) -> Vec<(String, StartPosition)> {
        lock(&self.positions).clone()
    }

    fn cursor_at(shard: &str, index: usize) -> Cursor {
        Cursor::new(format!("{shard}/{index}"))
    }

    fn parse_cursor(shard: &str, cursor: &Cursor) -> Result<usize, TailError> {
        cursor
            .as_str()
            .rsplit_once('/')
            .and_then(|(_, idx)| idx.parse().ok())
            .ok_or_else(|| TailError::Fetch {
                shard: shard.to_string(),
                reason: format!("invalid cursor '{cursor}'"),
            })
    }
}

#[async_trait]
impl StreamSource for MemorySource {
    async fn list_shards(&self, stream: &str) -> Result<Vec<ShardDescriptor>, TailError> {
        if let Some(reason) = &self.describe_error {
            return Err(TailError::Describe {
                stream: stream.to_string(),
                reason: reason.clone(),
            });
        }
        Ok(lock(&self.shards).keys().map(ShardDescriptor::new).collect())
    }

    async fn shard_cursor(
        &self,
        _stream: &str,
        shard: &str,
        position: StartPosition,
    ) -> Result<Option<Cursor>, TailError> {
        lock(&self.positions).push((shard.to_string(), position));
        let shards = lock(&self.shards);
        let state = shards.get(shard).ok_or_else(|| TailError::Cursor {
            shard: shard.to_string(),
            reason: "shard not found".into(),
        })?;
        if let Some(reason) = &state.cursor_error {
            return Err(TailError::Cursor {
                shard: shard.to_string(),
                reason: reason.clone(),
            });
        }
        Ok(Some(Self::cursor_at(shard, 0)))
    }

    async fn fetch(&self, shard: &str, cursor: &Cursor) -> Result<FetchOutput, TailError> {
        *lock(&self.fetch_counts).entry(shard.to_string()).or_insert(0) += 1;

        let index = Self::parse_cursor(shard, cursor)?;
        let shards = lock(&self.shards);
        let state = shards.get(shard).ok_or_else(|| TailError::Fetch {
            shard: shard.to_string(),
            reason: "shard not found".into(),
        })?;
        if let Some(reason) = &state.fetch_error {
            return Err(TailError::Fetch {
                shard: shard.to_string(),
                reason: reason.clone(),
            });
        }

        let Some(page) = state.pages.get(index) else {
            // At the tip: nothing new, same position.
            return Ok(FetchOutput {
                records: vec![],
                next_cursor: (!state.closes).then(|| Self::cursor_at(shard, index)),
                millis_behind: Some(0),
            });
        };

        let next = index + 1;
        let next_cursor = if state.closes && next >= state.pages.len() {
            None
        } else {
            Some(Self::cursor_at(shard, next))
        };
        Ok(FetchOutput {
            records: page.clone(),
            next_cursor,
            millis_behind: Some(0),
        })
    }

    fn name(&self) -> &str {
        "memory"
    }
}

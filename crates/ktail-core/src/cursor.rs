//! Cursor table — the current read position of every shard.
//!
//! One entry per shard, keyed by shard id. A shard is `Open` while it has a
//! cursor and `Closed` once a fetch returned no next cursor. `Closed` is
//! terminal.
//!
//! Only a shard's own poller writes its key, so writes never race across
//! shards. The lock exists so that reads (the session, diagnostics) see a
//! consistent map.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::types::Cursor;

/// Lifecycle state of a single shard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShardState {
    Open(Cursor),
    Closed,
}

impl ShardState {
    fn from_cursor(cursor: Option<Cursor>) -> Self {
        cursor.map_or(Self::Closed, Self::Open)
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Closed)
    }

    pub fn cursor(&self) -> Option<&Cursor> {
        match self {
            Self::Open(c) => Some(c),
            Self::Closed => None,
        }
    }
}

/// Shared, cloneable handle to the shard → cursor map.
#[derive(Debug, Clone, Default)]
pub struct CursorTable {
    inner: Arc<Mutex<HashMap<String, ShardState>>>,
}

impl CursorTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a table from resolved starting cursors.
    pub fn from_cursors(cursors: impl IntoIterator<Item = (String, Option<Cursor>)>) -> Self {
        let map = cursors
            .into_iter()
            .map(|(shard, cursor)| (shard, ShardState::from_cursor(cursor)))
            .collect();
        Self {
            inner: Arc::new(Mutex::new(map)),
        }
    }

    // The map only holds plain data, so a panic while holding the lock cannot
    // leave it half-updated.
    fn lock(&self) -> MutexGuard<'_, HashMap<String, ShardState>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current cursor for `shard`; `None` if the shard is closed or unknown.
    pub fn cursor(&self, shard: &str) -> Option<Cursor> {
        self.lock().get(shard).and_then(|s| s.cursor().cloned())
    }

    /// Current state for `shard`; `None` if the shard is unknown.
    pub fn state(&self, shard: &str) -> Option<ShardState> {
        self.lock().get(shard).cloned()
    }

    /// Record the cursor returned by a successful fetch.
    ///
    /// `None` closes the shard. A closed shard stays closed even if a later
    /// call passes a cursor. Returns the resulting state.
    pub fn advance(&self, shard: &str, next: Option<Cursor>) -> ShardState {
        let mut map = self.lock();
        let entry = map
            .entry(shard.to_string())
            .or_insert(ShardState::Closed);
        if !entry.is_closed() {
            *entry = ShardState::from_cursor(next);
        }
        entry.clone()
    }

    /// Sorted shard ids.
    pub fn shard_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.lock().keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Number of shards that still have a cursor.
    pub fn open_count(&self) -> usize {
        self.lock().values().filter(|s| !s.is_closed()).count()
    }

    /// Point-in-time copy of the whole table.
    pub fn snapshot(&self) -> HashMap<String, ShardState> {
        self.lock().clone()
    }
}

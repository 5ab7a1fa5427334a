//! Shard poller pool — one long-lived task per shard, fanned into one channel.
//!
//! Per tick, each worker:
//! 1. skips the tick if its shard is closed (no fetch, no emission),
//! 2. fetches the next batch with the shard's current cursor,
//! 3. on error, emits a [`PollResult`] carrying the error and keeps the cursor,
//! 4. on success, emits the records and then writes the next cursor into the
//!    [`CursorTable`]. A missing next cursor closes the shard for good.
//!
//! A closed shard's worker keeps ticking idle until the pool shuts down.
//!
//! # Backpressure
//!
//! The fan-in channel is bounded. A worker whose send finds the channel full
//! waits (records are never dropped), which delays its next tick. Missed
//! ticks are delayed rather than bursted, so a slow consumer throttles the
//! fetch rate.
//!
//! # Shutdown
//!
//! All workers observe one [`CancellationToken`]. [`PollerPool::shutdown`]
//! cancels it and waits for every worker to return. Dropping the pool cancels
//! too. A worker also exits on its own once the receiver is dropped.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::mpsc;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, trace, warn};

use crate::cursor::CursorTable;
use crate::source::StreamSource;
use crate::types::PollResult;

/// Default time between two fetches of the same shard.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(5_000);

/// Poller pool settings.
#[derive(Debug, Clone)]
pub struct PollerConfig {
    /// Time between two ticks of the same shard.
    pub poll_interval: Duration,
    /// Fan-in channel capacity; `None` uses one slot per shard.
    pub channel_capacity: Option<usize>,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            channel_capacity: None,
        }
    }
}

/// Supervisor owning every shard worker.
pub struct PollerPool {
    shards: Vec<String>,
    tracker: TaskTracker,
    cancel: CancellationToken,
}

impl PollerPool {
    /// Spawn one worker per shard in `table`.
    ///
    /// Returns the pool and the receiving end of the fan-in channel.
    pub fn spawn<S: StreamSource>(
        source: Arc<S>,
        table: CursorTable,
        config: PollerConfig,
    ) -> (Self, mpsc::Receiver<PollResult>) {
        Self::spawn_with_token(source, table, config, CancellationToken::new())
    }

    /// Like [`spawn`](Self::spawn), with workers also stopping when `cancel`
    /// (or any parent of it) is cancelled.
    pub fn spawn_with_token<S: StreamSource>(
        source: Arc<S>,
        table: CursorTable,
        config: PollerConfig,
        cancel: CancellationToken,
    ) -> (Self, mpsc::Receiver<PollResult>) {
        let shards = table.shard_ids();
        let capacity = config.channel_capacity.unwrap_or(shards.len()).max(1);
        let (tx, rx) = mpsc::channel(capacity);
        let tracker = TaskTracker::new();

        for shard in &shards {
            let worker = ShardWorker {
                source: Arc::clone(&source),
                table: table.clone(),
                shard: shard.clone(),
                tx: tx.clone(),
                cancel: cancel.clone(),
            };
            tracker.spawn(worker.run(config.poll_interval));
        }
        tracker.close();

        info!(
            shards = shards.len(),
            poll_interval_ms = config.poll_interval.as_millis() as u64,
            capacity,
            "started shard pollers"
        );

        let pool = Self {
            shards,
            tracker,
            cancel,
        };
        (pool, rx)
    }

    /// Shard ids being polled, sorted.
    pub fn shards(&self) -> &[String] {
        &self.shards
    }

    /// Number of workers that have not returned yet.
    pub fn active_workers(&self) -> usize {
        self.tracker.len()
    }

    /// Token observed by every worker.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Signal every worker to stop and wait until all have returned.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        self.tracker.wait().await;
        debug!(shards = self.shards.len(), "shard pollers stopped");
    }
}

impl Drop for PollerPool {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

struct ShardWorker<S> {
    source: Arc<S>,
    table: CursorTable,
    shard: String,
    tx: mpsc::Sender<PollResult>,
    cancel: CancellationToken,
}

impl<S: StreamSource> ShardWorker<S> {
    async fn run(self, period: Duration) {
        let mut ticker = time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            if !self.tick().await {
                break;
            }
        }
        debug!(shard = %self.shard, "shard poller exiting");
    }

    /// One poll tick. Returns `false` when the worker should stop.
    async fn tick(&self) -> bool {
        let Some(cursor) = self.table.cursor(&self.shard) else {
            trace!(shard = %self.shard, "shard closed, skipping tick");
            return true;
        };

        let created_at = Utc::now();
        let fetched = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return false,
            r = self.source.fetch(&self.shard, &cursor) => r,
        };

        match fetched {
            Err(e) => {
                warn!(shard = %self.shard, error = %e, "get records failed");
                self.emit(PollResult {
                    created_at,
                    shard_id: self.shard.clone(),
                    outcome: Err(e),
                })
                .await
            }
            Ok(out) => {
                trace!(
                    shard = %self.shard,
                    records = out.records.len(),
                    millis_behind = out.millis_behind,
                    "fetched records"
                );
                let sent = self
                    .emit(PollResult {
                        created_at,
                        shard_id: self.shard.clone(),
                        outcome: Ok(out.records),
                    })
                    .await;
                if sent && self.table.advance(&self.shard, out.next_cursor).is_closed() {
                    info!(shard = %self.shard, "shard closed, poller now idle");
                }
                sent
            }
        }
    }

    /// Blocking send onto the fan-in channel; `false` if cancelled or the
    /// receiver is gone.
    async fn emit(&self, result: PollResult) -> bool {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => false,
            r = self.tx.send(result) => {
                if r.is_err() {
                    debug!(shard = %self.shard, "result receiver dropped");
                }
                r.is_ok()
            }
        }
    }
}

//! Tail session — the consumer loop tying every stage together.
//!
//! 1. resolve starting cursors (startup errors abort here),
//! 2. start one poller per shard,
//! 3. drain the fan-in channel: decode each batch, push it into the order
//!    buffer, count records,
//! 4. stop on target count, timeout, cancellation, or a fatal error,
//!    flushing whatever is buffered on a clean stop.

use std::fmt;
use std::io::{self, Write};
use std::sync::Arc;

use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{FailurePolicy, TailConfig};
use crate::decode::RecordDecoder;
use crate::error::TailError;
use crate::inspector::StreamInspector;
use crate::poller::PollerPool;
use crate::sorter::OrderBuffer;
use crate::source::StreamSource;
use crate::types::{Message, PollResult};

/// Why a session ended without error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The configured record count was reached.
    CountReached,
    /// The configured timeout elapsed.
    Timeout,
    /// The session's cancellation token fired.
    Cancelled,
    /// Every poller stopped (e.g. the stream had no shards).
    StreamClosed,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CountReached => write!(f, "count-reached"),
            Self::Timeout => write!(f, "timeout"),
            Self::Cancelled => write!(f, "cancelled"),
            Self::StreamClosed => write!(f, "stream-closed"),
        }
    }
}

/// Totals reported when a session ends cleanly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSummary {
    pub shards: usize,
    /// Raw records received.
    pub records: usize,
    /// Messages written to the sink.
    pub messages: u64,
    pub flushes: u64,
    /// Fetch errors tolerated under [`FailurePolicy::Isolate`].
    pub fetch_errors: usize,
    pub stop: StopReason,
}

#[derive(Default)]
struct Counters {
    records: usize,
    fetch_errors: usize,
}

/// One run of the tailer against a stream.
pub struct TailSession<S: StreamSource> {
    source: Arc<S>,
    config: TailConfig,
    cancel: CancellationToken,
}

impl<S: StreamSource> TailSession<S> {
    pub fn new(source: Arc<S>, config: TailConfig) -> Self {
        Self {
            source,
            config,
            cancel: CancellationToken::new(),
        }
    }

    /// Use an externally owned cancellation token (e.g. wired to Ctrl-C).
    pub fn with_cancel_token(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Token that stops the session gracefully when cancelled.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn config(&self) -> &TailConfig {
        &self.config
    }

    /// Run with the configured line format.
    pub async fn run<W: Write>(&self, sink: W) -> Result<SessionSummary, TailError> {
        let format = self.config.format;
        self.run_with_format(sink, move |w: &mut W, m: &Message| format.write(w, m))
            .await
    }

    /// Run, writing every flushed message through `format`.
    pub async fn run_with_format<W, F>(&self, sink: W, format: F) -> Result<SessionSummary, TailError>
    where
        W: Write,
        F: FnMut(&mut W, &Message) -> io::Result<()>,
    {
        self.config.validate()?;
        let stream = self.config.stream.as_str();

        let table = StreamInspector::new(Arc::clone(&self.source))
            .resolve_from(stream, self.config.start)
            .await?;

        let window = self.config.window_for(table.len());
        let mut buffer = OrderBuffer::new(sink, window, format);
        let decoder = self.config.mode.decoder();

        let (pool, mut rx) = PollerPool::spawn_with_token(
            Arc::clone(&self.source),
            table.clone(),
            self.config.poller_config(),
            self.cancel.child_token(),
        );

        if self.config.count > 0 {
            debug!(count = self.config.count, "waiting for records");
        }

        let timeout = self.config.timeout();
        let timer = async move {
            match timeout {
                Some(t) => time::sleep(t).await,
                None => std::future::pending().await,
            }
        };
        tokio::pin!(timer);

        let mut counters = Counters::default();
        let outcome = loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    info!("cancelled, stopping");
                    break Ok(StopReason::Cancelled);
                }
                _ = &mut timer => {
                    info!("timer expired, stopping");
                    break Ok(StopReason::Timeout);
                }
                next = rx.recv() => {
                    let Some(result) = next else {
                        info!("all shard pollers stopped");
                        break Ok(StopReason::StreamClosed);
                    };
                    match self.consume(result, decoder.as_ref(), &mut buffer, &mut counters) {
                        Ok(None) => {}
                        Ok(Some(stop)) => break Ok(stop),
                        Err(e) => break Err(e),
                    }
                }
            }
        };

        let stop = match outcome {
            Ok(stop) => stop,
            Err(e) => {
                pool.shutdown().await;
                return Err(e);
            }
        };

        let flushed = buffer.flush();
        pool.shutdown().await;
        flushed?;

        let summary = SessionSummary {
            shards: table.len(),
            records: counters.records,
            messages: buffer.written(),
            flushes: buffer.flushes(),
            fetch_errors: counters.fetch_errors,
            stop,
        };
        info!(
            stop = %summary.stop,
            records = summary.records,
            messages = summary.messages,
            "tail session finished"
        );
        Ok(summary)
    }

    /// Handle one poll result. `Ok(Some(_))` ends the session.
    fn consume<W, F>(
        &self,
        result: PollResult,
        decoder: &dyn RecordDecoder,
        buffer: &mut OrderBuffer<W, F>,
        counters: &mut Counters,
    ) -> Result<Option<StopReason>, TailError>
    where
        W: Write,
        F: FnMut(&mut W, &Message) -> io::Result<()>,
    {
        let records = match result.outcome {
            Ok(records) => records,
            Err(e) => match self.config.failure_policy {
                FailurePolicy::Abort => return Err(e),
                FailurePolicy::Isolate => {
                    counters.fetch_errors += 1;
                    warn!(shard = %result.shard_id, error = %e, "shard fetch failed, continuing");
                    return Ok(None);
                }
            },
        };

        debug!(
            shard = %result.shard_id,
            count = records.len(),
            total = counters.records,
            "received records"
        );

        let mut messages = Vec::new();
        for record in &records {
            messages.extend(decoder.decode(record)?);
        }
        buffer.push_batch(messages)?;
        counters.records += records.len();

        let target = self.config.count;
        if target > 0 && counters.records >= target {
            info!(records = counters.records, "reached count, stopping");
            return Ok(Some(StopReason::CountReached));
        }
        Ok(None)
    }
}

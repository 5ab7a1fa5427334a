//! Order buffer — approximate chronological ordering across shards.
//!
//! Messages are accumulated over a fixed number of pushes (one push per poll
//! batch, not per message). On the N-th push the whole set is stable-sorted
//! by timestamp, written to the sink and cleared.
//!
//! Order is total inside one window only. A message pushed right after a
//! flush can be older than one already written.

use std::io::{self, Write};

use tracing::trace;

use crate::types::Message;

/// Bounded-window reordering buffer in front of an output sink.
pub struct OrderBuffer<W, F> {
    capacity: usize,
    pushes: usize,
    cache: Vec<Message>,
    sink: W,
    format: F,
    flushes: u64,
    written: u64,
}

impl<W, F> OrderBuffer<W, F>
where
    W: Write,
    F: FnMut(&mut W, &Message) -> io::Result<()>,
{
    /// A buffer that flushes every `capacity` pushes (0 is treated as 1).
    pub fn new(sink: W, capacity: usize, format: F) -> Self {
        Self {
            capacity: capacity.max(1),
            pushes: 0,
            cache: Vec::new(),
            sink,
            format,
            flushes: 0,
            written: 0,
        }
    }

    /// Append one poll batch. Returns `true` if this push completed a window
    /// and triggered a flush.
    pub fn push_batch(&mut self, batch: impl IntoIterator<Item = Message>) -> io::Result<bool> {
        self.cache.extend(batch);
        self.pushes += 1;

        if self.pushes < self.capacity {
            return Ok(false);
        }
        self.flush()?;
        Ok(true)
    }

    /// Sort and write everything buffered, regardless of the push counter.
    ///
    /// Returns the number of messages written.
    pub fn flush(&mut self) -> io::Result<usize> {
        let mut batch = std::mem::take(&mut self.cache);
        self.pushes = 0;
        self.flushes += 1;

        // `sort_by` is stable: equal timestamps keep arrival order.
        batch.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
        for msg in &batch {
            (self.format)(&mut self.sink, msg)?;
        }
        self.sink.flush()?;

        self.written += batch.len() as u64;
        trace!(messages = batch.len(), flushes = self.flushes, "flushed order buffer");
        Ok(batch.len())
    }

    /// Pushes per window.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Pushes since the last flush; always in `[0, capacity)` between calls.
    pub fn pending(&self) -> usize {
        self.pushes
    }

    /// Messages waiting for the next flush.
    pub fn buffered(&self) -> usize {
        self.cache.len()
    }

    /// Flushes performed so far, including forced ones.
    pub fn flushes(&self) -> u64 {
        self.flushes
    }

    /// Messages written so far.
    pub fn written(&self) -> u64 {
        self.written
    }

    pub fn get_ref(&self) -> &W {
        &self.sink
    }

    /// Give back the sink. Buffered messages are discarded.
    pub fn into_inner(self) -> W {
        self.sink
    }
}

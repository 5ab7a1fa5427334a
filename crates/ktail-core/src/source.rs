//! The `StreamSource` trait — the stream API the engine consumes.

use async_trait::async_trait;

use crate::error::TailError;
use crate::types::{Cursor, FetchOutput, ShardDescriptor, StartPosition};

/// Abstracts the three stream calls the tailer needs.
///
/// Implementations must be `Send + Sync` so one instance can be shared by
/// every shard poller as `Arc<S>`.
#[async_trait]
pub trait StreamSource: Send + Sync + 'static {
    /// Enumerate the shards of `stream`.
    ///
    /// Fails with [`TailError::Describe`].
    async fn list_shards(&self, stream: &str) -> Result<Vec<ShardDescriptor>, TailError>;

    /// Acquire a starting cursor for `shard`.
    ///
    /// `Ok(None)` means the shard has nothing left to read. Fails with
    /// [`TailError::Cursor`].
    async fn shard_cursor(
        &self,
        stream: &str,
        shard: &str,
        position: StartPosition,
    ) -> Result<Option<Cursor>, TailError>;

    /// Fetch the batch at `cursor` for `shard`.
    ///
    /// Fails with [`TailError::Fetch`].
    async fn fetch(&self, shard: &str, cursor: &Cursor) -> Result<FetchOutput, TailError>;

    /// Human-readable name for logs.
    fn name(&self) -> &str {
        "stream"
    }
}

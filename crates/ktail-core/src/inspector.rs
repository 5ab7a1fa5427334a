//! Stream inspector — turns a stream name into a table of starting cursors.
//!
//! The shard set is described once, then one cursor request per shard runs
//! concurrently. Results are collected on a channel sized to the shard count
//! and the call returns only once every shard has answered. Any failure
//! aborts the whole resolution; no partial table is returned.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::cursor::CursorTable;
use crate::error::TailError;
use crate::source::StreamSource;
use crate::types::{Cursor, StartPosition};

type CursorReply = (String, Result<Option<Cursor>, TailError>);

/// Resolves per-shard starting cursors for a stream.
pub struct StreamInspector<S: StreamSource> {
    source: Arc<S>,
}

impl<S: StreamSource> StreamInspector<S> {
    pub fn new(source: Arc<S>) -> Self {
        Self { source }
    }

    /// Resolve cursors anchored at `anchor`, or at the tip if `None`.
    pub async fn resolve(
        &self,
        stream: &str,
        anchor: Option<DateTime<Utc>>,
    ) -> Result<CursorTable, TailError> {
        self.resolve_from(stream, StartPosition::from_anchor(anchor))
            .await
    }

    /// Resolve cursors for every shard of `stream` at `position`.
    pub async fn resolve_from(
        &self,
        stream: &str,
        position: StartPosition,
    ) -> Result<CursorTable, TailError> {
        let shards = self.source.list_shards(stream).await?;
        debug!(stream, shards = shards.len(), source = self.source.name(), "described stream");

        if shards.is_empty() {
            info!(stream, "stream has no shards");
            return Ok(CursorTable::new());
        }

        let (tx, mut rx) = mpsc::channel::<CursorReply>(shards.len());
        for shard in &shards {
            let source = Arc::clone(&self.source);
            let stream = stream.to_string();
            let shard_id = shard.shard_id.clone();
            let tx = tx.clone();
            tokio::spawn(async move {
                debug!(shard = %shard_id, %position, "get shard cursor");
                let result = source.shard_cursor(&stream, &shard_id, position).await;
                // The receiver is gone only if another shard already failed.
                let _ = tx.send((shard_id, result)).await;
            });
        }
        drop(tx);

        let mut cursors = Vec::with_capacity(shards.len());
        while cursors.len() < shards.len() {
            let Some((shard_id, result)) = rx.recv().await else {
                // A request task died without replying.
                return Err(TailError::Cursor {
                    shard: "<unknown>".into(),
                    reason: "cursor request task aborted".into(),
                });
            };
            cursors.push((shard_id, result?));
        }

        let table = CursorTable::from_cursors(cursors);
        info!(
            stream,
            shards = table.len(),
            open = table.open_count(),
            %position,
            "resolved shard cursors"
        );
        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cursor::ShardState;
    use crate::memory::MemorySource;

    fn source() -> MemorySource {
        MemorySource::new()
            .with_shard("shardId-000", vec![])
            .with_shard("shardId-001", vec![])
            .with_shard("shardId-002", vec![])
    }

    #[tokio::test]
    async fn resolves_every_shard() {
        let inspector = StreamInspector::new(Arc::new(source()));
        let table = inspector.resolve("logs", None).await.unwrap();
        assert_eq!(
            table.shard_ids(),
            vec!["shardId-000", "shardId-001", "shardId-002"]
        );
        assert_eq!(table.open_count(), 3);
        assert!(matches!(table.state("shardId-001"), Some(ShardState::Open(_))));
    }

    #[tokio::test]
    async fn anchor_is_forwarded() {
        let src = Arc::new(source());
        let inspector = StreamInspector::new(Arc::clone(&src));
        let anchor = crate::types::build_timestamp(1_526_626_158_315).unwrap();
        inspector.resolve("logs", Some(anchor)).await.unwrap();

        let positions = src.positions();
        assert_eq!(positions.len(), 3);
        assert!(positions
            .iter()
            .all(|(_, p)| *p == StartPosition::AtTimestamp(anchor)));
    }

    #[tokio::test]
    async fn no_anchor_means_latest() {
        let src = Arc::new(source());
        StreamInspector::new(Arc::clone(&src))
            .resolve("logs", None)
            .await
            .unwrap();
        assert!(src.positions().iter().all(|(_, p)| *p == StartPosition::Latest));
    }

    #[tokio::test]
    async fn describe_failure_is_fatal() {
        let src = MemorySource::new().fail_describe("ResourceNotFoundException");
        let err = StreamInspector::new(Arc::new(src))
            .resolve("missing", None)
            .await
            .unwrap_err();
        assert!(matches!(err, TailError::Describe { ref stream, .. } if stream == "missing"));
    }

    #[tokio::test]
    async fn one_cursor_failure_fails_everything() {
        let src = source().fail_cursor("shardId-001", "throttled");
        let err = StreamInspector::new(Arc::new(src))
            .resolve("logs", None)
            .await
            .unwrap_err();
        assert!(matches!(err, TailError::Cursor { ref shard, .. } if shard == "shardId-001"));
    }

    #[tokio::test]
    async fn empty_stream_resolves_to_empty_table() {
        let table = StreamInspector::new(Arc::new(MemorySource::new()))
            .resolve("empty", None)
            .await
            .unwrap();
        assert!(table.is_empty());
    }
}

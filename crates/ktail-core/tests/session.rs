//! End-to-end tail sessions against the in-memory source.

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use flate2::write::GzEncoder;
use flate2::Compression;
use ktail_core::{
    FailurePolicy, GroupFilter, LineFormat, MemorySource, RawRecord, StopReason, TailBuilder,
    TailError, TailSession,
};

fn at(secs: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, secs).unwrap()
}

fn raw(secs: u32, text: &str) -> RawRecord {
    RawRecord::new(at(secs), format!("{text}\n").into_bytes())
}

fn logs(secs: u32, group: &str, messages: &[&str]) -> RawRecord {
    let events: Vec<_> = messages
        .iter()
        .map(|m| serde_json::json!({ "id": "1", "timestamp": 0, "message": m }))
        .collect();
    let body = serde_json::json!({
        "messageType": "DATA_MESSAGE",
        "logGroup": group,
        "logStream": "s",
        "logEvents": events,
    });
    let mut enc = GzEncoder::new(Vec::new(), Compression::default());
    enc.write_all(body.to_string().as_bytes()).unwrap();
    RawRecord::new(at(secs), enc.finish().unwrap())
}

fn text(out: Vec<u8>) -> String {
    String::from_utf8(out).unwrap()
}

#[tokio::test(start_paused = true)]
async fn raw_session_orders_each_window() {
    let src = MemorySource::new()
        .with_shard("shard-a", vec![vec![raw(3, "a3")], vec![raw(5, "a5")]])
        .with_shard("shard-b", vec![vec![raw(2, "b2")], vec![raw(4, "b4")]]);
    let config = TailBuilder::new("raw-stream")
        .raw()
        .count(4)
        .build_config()
        .unwrap();

    let mut out = Vec::new();
    let summary = TailSession::new(Arc::new(src), config)
        .run(&mut out)
        .await
        .unwrap();

    assert_eq!(summary.stop, StopReason::CountReached);
    assert_eq!(summary.shards, 2);
    assert_eq!(summary.records, 4);
    assert_eq!(summary.messages, 4);
    assert_eq!(text(out), "b2\na3\nb4\na5\n");
}

#[tokio::test(start_paused = true)]
async fn logs_session_filters_and_annotates() {
    let src = MemorySource::new().with_shard(
        "shard-0",
        vec![vec![
            logs(2, "/aws/lambda/prod-api", &["request done\n"]),
            logs(1, "/aws/lambda/staging-api", &["ignored"]),
            logs(1, "/ecs/prod-worker", &["job started"]),
        ]],
    );
    let config = TailBuilder::new("cwlogs")
        .logs(GroupFilter::default().include("prod"))
        .format(LineFormat::Annotated)
        .count(1)
        .build_config()
        .unwrap();

    let mut out = Vec::new();
    let summary = TailSession::new(Arc::new(src), config)
        .run(&mut out)
        .await
        .unwrap();

    assert_eq!(summary.records, 3);
    assert_eq!(summary.messages, 2);
    assert_eq!(
        text(out),
        "[2020-01-01T00:00:01Z /ecs/prod-worker] job started\n\
         [2020-01-01T00:00:02Z /aws/lambda/prod-api] request done\n"
    );
}

#[tokio::test(start_paused = true)]
async fn fetch_error_aborts_by_default() {
    let src = Arc::new(
        MemorySource::new()
            .with_shard("healthy", vec![vec![raw(1, "ok")]])
            .with_shard("broken", vec![]),
    );
    src.fail_fetch("broken", "ExpiredIteratorException");
    let config = TailBuilder::new("s").raw().build_config().unwrap();

    let err = TailSession::new(src, config)
        .run(Vec::new())
        .await
        .unwrap_err();
    assert!(matches!(err, TailError::Fetch { ref shard, .. } if shard == "broken"));
}

#[tokio::test(start_paused = true)]
async fn isolate_policy_keeps_healthy_shards_going() {
    let src = Arc::new(
        MemorySource::new()
            .with_shard("healthy", vec![vec![raw(1, "one")], vec![raw(2, "two")]])
            .with_shard("broken", vec![]),
    );
    src.fail_fetch("broken", "ProvisionedThroughputExceededException");
    let config = TailBuilder::new("s")
        .raw()
        .count(2)
        .failure_policy(FailurePolicy::Isolate)
        .build_config()
        .unwrap();

    let mut out = Vec::new();
    let summary = TailSession::new(src, config).run(&mut out).await.unwrap();

    assert_eq!(summary.stop, StopReason::CountReached);
    assert!(summary.fetch_errors >= 1);
    assert_eq!(text(out), "one\ntwo\n");
}

#[tokio::test(start_paused = true)]
async fn timeout_flushes_partial_window() {
    let src = MemorySource::new().with_shard("s0", vec![vec![raw(2, "b"), raw(1, "a")]]);
    let config = TailBuilder::new("s")
        .raw()
        .window(100)
        .timeout_ms(12_000)
        .build_config()
        .unwrap();

    let mut out = Vec::new();
    let started = tokio::time::Instant::now();
    let summary = TailSession::new(Arc::new(src), config)
        .run(&mut out)
        .await
        .unwrap();

    assert_eq!(summary.stop, StopReason::Timeout);
    assert!(started.elapsed() >= Duration::from_millis(12_000));
    assert_eq!(summary.flushes, 1);
    assert_eq!(text(out), "a\nb\n");
}

#[tokio::test(start_paused = true)]
async fn closed_shards_idle_until_timeout() {
    let src = Arc::new(
        MemorySource::new()
            .with_closing_shard("old-a", vec![vec![raw(1, "a")]])
            .with_closing_shard("old-b", vec![vec![raw(2, "b")]]),
    );
    let config = TailBuilder::new("s")
        .raw()
        .timeout_ms(60_000)
        .build_config()
        .unwrap();

    let mut out = Vec::new();
    let summary = TailSession::new(Arc::clone(&src), config)
        .run(&mut out)
        .await
        .unwrap();

    assert_eq!(summary.stop, StopReason::Timeout);
    assert_eq!(summary.records, 2);
    assert_eq!(src.fetch_count("old-a"), 1);
    assert_eq!(src.fetch_count("old-b"), 1);
    assert_eq!(text(out), "a\nb\n");
}

#[tokio::test(start_paused = true)]
async fn describe_error_stops_before_polling() {
    let src = Arc::new(MemorySource::new().fail_describe("ResourceNotFoundException"));
    let config = TailBuilder::new("missing").raw().build_config().unwrap();

    let err = TailSession::new(src, config)
        .run(Vec::new())
        .await
        .unwrap_err();
    assert!(err.is_startup());
}

#[tokio::test(start_paused = true)]
async fn cursor_error_stops_before_polling() {
    let src = Arc::new(
        MemorySource::new()
            .with_shard("s0", vec![vec![raw(1, "never")]])
            .fail_cursor("s0", "AccessDenied"),
    );
    let config = TailBuilder::new("s").raw().build_config().unwrap();

    let err = TailSession::new(Arc::clone(&src), config)
        .run(Vec::new())
        .await
        .unwrap_err();
    assert!(matches!(err, TailError::Cursor { .. }));
    assert_eq!(src.fetch_count("s0"), 0);
}

#[tokio::test(start_paused = true)]
async fn cancellation_flushes_and_stops() {
    let src = MemorySource::new().with_shard("s0", vec![vec![raw(1, "kept")]]);
    let config = TailBuilder::new("s")
        .raw()
        .window(10)
        .build_config()
        .unwrap();

    let session = TailSession::new(Arc::new(src), config);
    let cancel = session.cancel_token();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(7)).await;
        cancel.cancel();
    });

    let mut out = Vec::new();
    let summary = session.run(&mut out).await.unwrap();
    assert_eq!(summary.stop, StopReason::Cancelled);
    assert_eq!(text(out), "kept\n");
}

#[tokio::test(start_paused = true)]
async fn empty_stream_closes_immediately() {
    let config = TailBuilder::new("s").raw().build_config().unwrap();
    let summary = TailSession::new(Arc::new(MemorySource::new()), config)
        .run(Vec::new())
        .await
        .unwrap();
    assert_eq!(summary.stop, StopReason::StreamClosed);
    assert_eq!(summary.shards, 0);
}

#[tokio::test(start_paused = true)]
async fn decode_error_is_fatal() {
    let src = MemorySource::new().with_shard(
        "s0",
        vec![vec![RawRecord::new(at(1), b"not gzip".to_vec())]],
    );
    let config = TailBuilder::new("s")
        .logs(GroupFilter::default())
        .build_config()
        .unwrap();

    let err = TailSession::new(Arc::new(src), config)
        .run(Vec::new())
        .await
        .unwrap_err();
    assert!(matches!(err, TailError::Decode(_)));
}

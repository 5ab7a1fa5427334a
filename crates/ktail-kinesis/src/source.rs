//! Kinesis-backed stream source.
//!
//! - shard enumeration: `ListShards`, following `NextToken`
//! - starting cursors: `GetShardIterator` (`LATEST`, `AT_TIMESTAMP`, `TRIM_HORIZON`)
//! - fetch: `GetRecords`
//!
//! SDK errors are rendered with their whole source chain so the service
//! error code reaches the user.

use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_kinesis::error::DisplayErrorContext;
use aws_sdk_kinesis::primitives::DateTime as AwsDateTime;
use aws_sdk_kinesis::types::{Record, ShardIteratorType};
use aws_sdk_kinesis::Client;
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use ktail_core::{Cursor, FetchOutput, RawRecord, ShardDescriptor, StartPosition, StreamSource, TailError};

/// How to build the Kinesis client.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KinesisSourceConfig {
    /// AWS region; `None` uses the default provider chain.
    #[serde(default)]
    pub region: Option<String>,
    /// Named profile from the shared config/credentials files.
    #[serde(default)]
    pub profile: Option<String>,
    /// Max records per `GetRecords` call; `None` uses the service default.
    #[serde(default)]
    pub get_records_limit: Option<i32>,
}

/// [`StreamSource`] backed by the AWS Kinesis API.
#[derive(Debug, Clone)]
pub struct KinesisSource {
    client: Client,
    get_records_limit: Option<i32>,
}

impl KinesisSource {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            get_records_limit: None,
        }
    }

    /// Load AWS configuration (region, profile, credentials) and build a client.
    pub async fn connect(config: &KinesisSourceConfig) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = &config.region {
            loader = loader.region(Region::new(region.clone()));
        }
        if let Some(profile) = &config.profile {
            loader = loader.profile_name(profile);
        }
        let sdk_config = loader.load().await;
        debug!(
            region = ?sdk_config.region().map(|r| r.as_ref().to_string()),
            profile = ?config.profile,
            "built kinesis client"
        );

        Self {
            client: Client::new(&sdk_config),
            get_records_limit: config.get_records_limit,
        }
    }

    pub fn client(&self) -> &Client {
        &self.client
    }
}

/// Map a start position onto the iterator type and optional timestamp.
pub(crate) fn iterator_type(position: StartPosition) -> (ShardIteratorType, Option<AwsDateTime>) {
    match position {
        StartPosition::Latest => (ShardIteratorType::Latest, None),
        StartPosition::TrimHorizon => (ShardIteratorType::TrimHorizon, None),
        StartPosition::AtTimestamp(ts) => (
            ShardIteratorType::AtTimestamp,
            Some(AwsDateTime::from_millis(ts.timestamp_millis())),
        ),
    }
}

fn arrival(ts: Option<&AwsDateTime>) -> DateTime<Utc> {
    ts.and_then(|t| t.to_millis().ok())
        .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
        .unwrap_or_else(Utc::now)
}

/// Convert an SDK record. Records without an arrival time get "now".
pub(crate) fn to_raw_record(record: &Record) -> RawRecord {
    RawRecord::new(
        arrival(record.approximate_arrival_timestamp()),
        record.data().as_ref().to_vec(),
    )
    .with_sequence_number(record.sequence_number())
}

#[async_trait]
impl StreamSource for KinesisSource {
    async fn list_shards(&self, stream: &str) -> Result<Vec<ShardDescriptor>, TailError> {
        let describe_err = |reason: String| TailError::Describe {
            stream: stream.to_string(),
            reason,
        };

        let mut shards = Vec::new();
        let mut next_token: Option<String> = None;
        loop {
            // StreamName and NextToken are mutually exclusive.
            let req = match &next_token {
                Some(token) => self.client.list_shards().next_token(token),
                None => self.client.list_shards().stream_name(stream),
            };
            let resp = req
                .send()
                .await
                .map_err(|e| describe_err(DisplayErrorContext(&e).to_string()))?;

            shards.extend(resp.shards().iter().map(|s| ShardDescriptor::new(s.shard_id())));

            match resp.next_token() {
                Some(token) => next_token = Some(token.to_string()),
                None => break,
            }
        }

        debug!(stream, shards = shards.len(), "listed shards");
        Ok(shards)
    }

    async fn shard_cursor(
        &self,
        stream: &str,
        shard: &str,
        position: StartPosition,
    ) -> Result<Option<Cursor>, TailError> {
        let (kind, timestamp) = iterator_type(position);
        let resp = self
            .client
            .get_shard_iterator()
            .stream_name(stream)
            .shard_id(shard)
            .shard_iterator_type(kind)
            .set_timestamp(timestamp)
            .send()
            .await
            .map_err(|e| TailError::Cursor {
                shard: shard.to_string(),
                reason: DisplayErrorContext(&e).to_string(),
            })?;

        Ok(resp.shard_iterator().map(Cursor::new))
    }

    async fn fetch(&self, shard: &str, cursor: &Cursor) -> Result<FetchOutput, TailError> {
        let resp = self
            .client
            .get_records()
            .shard_iterator(cursor.as_str())
            .set_limit(self.get_records_limit)
            .send()
            .await
            .map_err(|e| TailError::Fetch {
                shard: shard.to_string(),
                reason: DisplayErrorContext(&e).to_string(),
            })?;

        Ok(FetchOutput {
            records: resp.records().iter().map(to_raw_record).collect(),
            next_cursor: resp.next_shard_iterator().map(Cursor::new),
            millis_behind: resp.millis_behind_latest(),
        })
    }

    fn name(&self) -> &str {
        "kinesis"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_sdk_kinesis::primitives::Blob;

    #[test]
    fn latest_and_trim_horizon_have_no_timestamp() {
        assert_eq!(
            iterator_type(StartPosition::Latest),
            (ShardIteratorType::Latest, None)
        );
        assert_eq!(
            iterator_type(StartPosition::TrimHorizon),
            (ShardIteratorType::TrimHorizon, None)
        );
    }

    #[test]
    fn at_timestamp_keeps_millis() {
        let ts = ktail_core::build_timestamp(1_526_626_158_315).unwrap();
        let (kind, aws_ts) = iterator_type(StartPosition::AtTimestamp(ts));
        assert_eq!(kind, ShardIteratorType::AtTimestamp);
        assert_eq!(aws_ts.unwrap().to_millis().unwrap(), 1_526_626_158_315);
    }

    #[test]
    fn record_conversion() {
        let record = Record::builder()
            .sequence_number("4959")
            .partition_key("pk")
            .data(Blob::new(b"hello\n".to_vec()))
            .approximate_arrival_timestamp(AwsDateTime::from_millis(1_577_836_801_000))
            .build()
            .unwrap();

        let raw = to_raw_record(&record);
        assert_eq!(raw.payload, b"hello\n");
        assert_eq!(raw.sequence_number, "4959");
        assert_eq!(ktail_core::format_timestamp(&raw.arrival), "2020-01-01T00:00:01Z");
    }

    #[test]
    fn missing_arrival_falls_back_to_now() {
        let before = Utc::now();
        let ts = arrival(None);
        assert!(ts >= before);
    }

    #[test]
    fn config_from_json() {
        let cfg: KinesisSourceConfig =
            serde_json::from_str(r#"{"region":"us-east-1","get_records_limit":500}"#).unwrap();
        assert_eq!(cfg.region.as_deref(), Some("us-east-1"));
        assert_eq!(cfg.profile, None);
        assert_eq!(cfg.get_records_limit, Some(500));
    }
}

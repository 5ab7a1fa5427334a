//! ktail-core — the multi-shard tailing engine behind `kinesis-tail`.
//!
//! # Architecture
//!
//! ```text
//! StreamInspector ──► CursorTable ◄──┐
//!                          │         │ advance
//!                          ▼         │
//!                     PollerPool (one task per shard)
//!                          │
//!                          ▼
//!                 mpsc::Receiver<PollResult>   (fan-in, unordered)
//!                          │
//!                          ▼
//!                 TailSession ── RecordDecoder ──► OrderBuffer ──► io::Write
//! ```
//!
//! The [`OrderBuffer`] only restores chronological order inside one flush
//! window of N pushes; there is no ordering across windows.

pub mod builder;
pub mod config;
pub mod cursor;
pub mod decode;
pub mod error;
pub mod format;
pub mod inspector;
pub mod matcher;
pub mod memory;
pub mod poller;
pub mod session;
pub mod sorter;
pub mod source;
pub mod types;

pub use builder::TailBuilder;
pub use config::{FailurePolicy, TailConfig, TailMode};
pub use cursor::{CursorTable, ShardState};
pub use decode::{LogsDecoder, RawDecoder, RecordDecoder};
pub use error::TailError;
pub use format::LineFormat;
pub use inspector::StreamInspector;
pub use matcher::{matches_tokens, GroupFilter};
pub use memory::MemorySource;
pub use poller::{PollerConfig, PollerPool};
pub use session::{SessionSummary, StopReason, TailSession};
pub use sorter::OrderBuffer;
pub use source::StreamSource;
pub use types::{
    build_timestamp, format_timestamp, Cursor, FetchOutput, Message, PollResult, RawRecord,
    ShardDescriptor, StartPosition,
};

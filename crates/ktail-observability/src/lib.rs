//! # ktail-observability
//!
//! Structured logging for kinesis-tail.
//!
//! Logs always go to stderr so stdout carries nothing but tailed records.
//! Levels are configurable globally and per component; `RUST_LOG`, when set,
//! takes precedence over both.

pub mod tracing_setup;

pub use tracing_setup::{init_tracing, LogConfig};

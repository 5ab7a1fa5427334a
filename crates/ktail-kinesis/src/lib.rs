//! ktail-kinesis — [`StreamSource`](ktail_core::StreamSource) over AWS Kinesis.
//!
//! ```rust,no_run
//! # async fn example() -> Result<(), ktail_core::TailError> {
//! use std::sync::Arc;
//! use ktail_core::{TailBuilder, TailSession};
//! use ktail_kinesis::{KinesisSource, KinesisSourceConfig};
//!
//! let source = KinesisSource::connect(&KinesisSourceConfig {
//!     region: Some("ap-southeast-2".into()),
//!     ..Default::default()
//! })
//! .await;
//! let config = TailBuilder::new("app-logs").raw().build_config()?;
//! TailSession::new(Arc::new(source), config)
//!     .run(std::io::stdout())
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod source;

pub use source::{KinesisSource, KinesisSourceConfig};

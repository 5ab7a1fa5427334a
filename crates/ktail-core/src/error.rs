//! Error types for the tailing pipeline.

use thiserror::Error;

/// Errors that can occur while tailing a stream.
#[derive(Debug, Error)]
pub enum TailError {
    /// The stream's shard set could not be enumerated.
    #[error("describe stream '{stream}' failed: {reason}")]
    Describe { stream: String, reason: String },

    /// A starting cursor could not be acquired for a shard.
    #[error("get cursor for shard '{shard}' failed: {reason}")]
    Cursor { shard: String, reason: String },

    /// The next batch could not be fetched with a shard's current cursor.
    #[error("get records for shard '{shard}' failed: {reason}")]
    Fetch { shard: String, reason: String },

    /// A record payload was malformed.
    #[error("decode failed: {0}")]
    Decode(String),

    /// Writing to the output sink failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid configuration.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl TailError {
    /// Returns `true` if this error aborts startup (before any polling).
    pub fn is_startup(&self) -> bool {
        matches!(self, Self::Describe { .. } | Self::Cursor { .. })
    }

    /// The shard this error is attributed to, if any.
    pub fn shard(&self) -> Option<&str> {
        match self {
            Self::Cursor { shard, .. } | Self::Fetch { shard, .. } => Some(shard),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for TailError {
    fn from(e: serde_json::Error) -> Self {
        Self::Decode(format!("json decode failed: {e}"))
    }
}

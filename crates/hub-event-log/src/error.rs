//! Event log errors

use thiserror::Error;

/// Result type for log operations
pub type LogResult<T> = Result<T, LogError>;

/// Errors that can occur when talking to the event log
#[derive(Debug, Error)]
pub enum LogError {
    #[error("{0} is closed")]
    Closed(&'static str),

    #[error("offset commit failed for group '{group}': {reason}")]
    Commit { group: String, reason: String },

    #[error("undecodable record at {topic}/{partition}@{offset}: {source}")]
    Decode {
        topic: String,
        partition: u32,
        offset: u64,
        #[source]
        source: serde_json::Error,
    },

    #[error("record encoding failed: {0}")]
    Encode(#[from] serde_json::Error),
}

//! Log records and the JSON record codec

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{LogError, LogResult};

/// A record read from the log
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub topic: String,
    pub partition: u32,
    pub offset: u64,
    pub key: String,
    pub payload: Vec<u8>,
}

impl Record {
    /// Decode the JSON payload
    pub fn decode<T: DeserializeOwned>(&self) -> LogResult<T> {
        serde_json::from_slice(&self.payload).map_err(|source| LogError::Decode {
            topic: self.topic.clone(),
            partition: self.partition,
            offset: self.offset,
            source,
        })
    }
}

/// A record waiting to be appended
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundRecord {
    pub topic: String,
    pub key: String,
    pub payload: Vec<u8>,
}

impl OutboundRecord {
    /// Create a record from raw bytes
    pub fn new(topic: impl Into<String>, key: impl Into<String>, payload: Vec<u8>) -> Self {
        Self {
            topic: topic.into(),
            key: key.into(),
            payload,
        }
    }

    /// Create a record with a JSON-encoded payload
    pub fn json<T: Serialize>(
        topic: impl Into<String>,
        key: impl Into<String>,
        value: &T,
    ) -> LogResult<Self> {
        Ok(Self::new(topic, key, serde_json::to_vec(value)?))
    }
}

/// Outcome of a poll
#[derive(Debug)]
pub enum Polled {
    /// Records in partition order, possibly empty on timeout
    Records(Vec<Record>),
    /// Shutdown was requested while (or before) waiting
    Cancelled,
}

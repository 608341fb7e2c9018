//! Partitioned event log for the hub pipeline
//!
//! This crate provides the contract every pipeline stage uses to talk to the
//! append-only log ([`EventConsumer`], [`EventProducer`]), an in-process
//! implementation with consumer-group offsets ([`MemoryLog`]), the
//! cooperative [`Shutdown`] signal and the generic [`ConsumerLoop`] that
//! drives poll → handle → flush → commit.

mod error;
mod memory;
mod record;
mod shutdown;
mod worker;

pub use error::{LogError, LogResult};
pub use memory::{MemoryConsumer, MemoryLog, MemoryProducer};
pub use record::{OutboundRecord, Polled, Record};
pub use shutdown::Shutdown;
pub use worker::{
    ConsumerLoop, HandlerError, LoopError, LoopState, LoopStats, RecordHandler,
};

use async_trait::async_trait;
use std::time::Duration;

/// Reading side of a topic, bound to one consumer group
#[async_trait]
pub trait EventConsumer: Send {
    /// Topic this consumer reads
    fn topic(&self) -> &str;

    /// Pull the next batch
    ///
    /// Blocks for at most `timeout`. Returns [`Polled::Cancelled`] promptly
    /// once `shutdown` is requested, and an empty batch on timeout.
    async fn poll(&mut self, timeout: Duration, shutdown: &Shutdown) -> LogResult<Polled>;

    /// Commit the positions of everything returned by `poll` so far
    async fn commit(&mut self) -> LogResult<()>;

    /// Release the consumer
    async fn close(&mut self) -> LogResult<()>;
}

/// Writing side of the log
#[async_trait]
pub trait EventProducer: Send + Sync {
    /// Queue a record for delivery
    async fn send(&self, record: OutboundRecord) -> LogResult<()>;

    /// Deliver every queued record
    async fn flush(&self) -> LogResult<()>;

    /// Flush and release the producer
    async fn close(&self) -> LogResult<()>;
}

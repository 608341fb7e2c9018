//! Consumer loop runner
//!
//! Every pipeline stage is a long-lived loop over one topic:
//!
//! ```text
//! Running:  poll → decode + handle each record → flush handler → commit
//! Stopping: finish current batch → flush → commit → close
//! Stopped
//! ```
//!
//! Outbound publishes are flushed before offsets are committed, so a crash
//! between the two replays records instead of losing a publish. A failing
//! record is logged and skipped; a failing poll, flush or commit ends the
//! loop with a [`LoopError`].

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::error::{LogError, LogResult};
use crate::record::{Polled, Record};
use crate::shutdown::Shutdown;
use crate::EventConsumer;

/// Error returned by a record handler for one record
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Processes decoded records for one consumer loop
#[async_trait]
pub trait RecordHandler: Send + Sync {
    /// Type decoded from each record payload
    type Event: DeserializeOwned + Send;

    /// Name used in logs
    fn name(&self) -> &str;

    /// Handle one decoded record
    async fn handle(&self, event: Self::Event, record: &Record) -> Result<(), HandlerError>;

    /// Deliver any buffered output; called before every commit
    async fn flush(&self) -> LogResult<()> {
        Ok(())
    }

    /// Release handler resources when the loop stops
    async fn close(&self) -> LogResult<()> {
        Ok(())
    }
}

/// Lifecycle state of a consumer loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Running,
    Stopping,
    Stopped,
}

/// Counters reported when a loop stops
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopStats {
    /// Non-empty batches processed
    pub batches: u64,
    /// Records handled successfully
    pub processed: u64,
    /// Records skipped because they failed to decode or handle
    pub failed: u64,
}

/// Fatal consumer loop failure
#[derive(Debug, Error)]
pub enum LoopError {
    #[error("{name}: poll failed: {source}")]
    Poll {
        name: String,
        #[source]
        source: LogError,
    },

    #[error("{name}: flush failed: {source}")]
    Flush {
        name: String,
        #[source]
        source: LogError,
    },

    #[error("{name}: offset commit failed: {source}")]
    Commit {
        name: String,
        #[source]
        source: LogError,
    },
}

/// Drives one [`EventConsumer`] through a [`RecordHandler`]
pub struct ConsumerLoop<C, H> {
    consumer: C,
    handler: H,
    shutdown: Shutdown,
    poll_timeout: Duration,
    state: watch::Sender<LoopState>,
    stats: LoopStats,
}

impl<C, H> ConsumerLoop<C, H>
where
    C: EventConsumer,
    H: RecordHandler,
{
    pub fn new(consumer: C, handler: H, shutdown: Shutdown, poll_timeout: Duration) -> Self {
        let (state, _) = watch::channel(LoopState::Running);
        Self {
            consumer,
            handler,
            shutdown,
            poll_timeout,
            state,
            stats: LoopStats::default(),
        }
    }

    /// Observe lifecycle transitions
    pub fn subscribe_state(&self) -> watch::Receiver<LoopState> {
        self.state.subscribe()
    }

    /// Run until shutdown is requested or a fatal error occurs
    pub async fn run(mut self) -> Result<LoopStats, LoopError> {
        let name = self.handler.name().to_string();
        info!(consumer = %name, topic = %self.consumer.topic(), "Consumer loop started");

        let mut outcome = self.run_batches(&name).await;

        self.set_state(LoopState::Stopping);
        info!(consumer = %name, "Consumer loop stopping");

        if outcome.is_ok() {
            outcome = self.flush_and_commit(&name).await;
        }

        if let Err(e) = self.handler.close().await {
            warn!(consumer = %name, error = %e, "Failed to close handler");
        }
        if let Err(e) = self.consumer.close().await {
            warn!(consumer = %name, error = %e, "Failed to close consumer");
        }

        self.set_state(LoopState::Stopped);

        match outcome {
            Ok(()) => {
                info!(
                    consumer = %name,
                    batches = self.stats.batches,
                    processed = self.stats.processed,
                    failed = self.stats.failed,
                    "Consumer loop stopped"
                );
                Ok(self.stats)
            }
            Err(e) => {
                error!(consumer = %name, error = %e, "Consumer loop terminated");
                Err(e)
            }
        }
    }

    async fn run_batches(&mut self, name: &str) -> Result<(), LoopError> {
        loop {
            let polled = self
                .consumer
                .poll(self.poll_timeout, &self.shutdown)
                .await
                .map_err(|source| LoopError::Poll {
                    name: name.to_string(),
                    source,
                })?;

            let batch = match polled {
                Polled::Cancelled => return Ok(()),
                Polled::Records(batch) if batch.is_empty() => continue,
                Polled::Records(batch) => batch,
            };

            debug!(consumer = %name, records = batch.len(), "Processing batch");
            for record in &batch {
                self.process(name, record).await;
            }
            self.stats.batches += 1;

            self.flush_and_commit(name).await?;
        }
    }

    async fn process(&mut self, name: &str, record: &Record) {
        let event = match record.decode::<H::Event>() {
            Ok(event) => event,
            Err(e) => {
                warn!(consumer = %name, error = %e, "Skipping malformed record");
                self.stats.failed += 1;
                return;
            }
        };

        match self.handler.handle(event, record).await {
            Ok(()) => self.stats.processed += 1,
            Err(e) => {
                warn!(
                    consumer = %name,
                    key = %record.key,
                    partition = record.partition,
                    offset = record.offset,
                    error = %e,
                    "Failed to process record"
                );
                self.stats.failed += 1;
            }
        }
    }

    async fn flush_and_commit(&mut self, name: &str) -> Result<(), LoopError> {
        self.handler
            .flush()
            .await
            .map_err(|source| LoopError::Flush {
                name: name.to_string(),
                source,
            })?;
        self.consumer
            .commit()
            .await
            .map_err(|source| LoopError::Commit {
                name: name.to_string(),
                source,
            })
    }

    fn set_state(&self, state: LoopState) {
        self.state.send_replace(state);
    }
}

//! In-process partitioned log
//!
//! Topics are created on first use with a fixed partition count. Records are
//! routed to a partition by a stable hash of their key, so all records for
//! one key keep their relative order. Consumer groups track a committed
//! offset per partition; a new consumer resumes from it (or from the start
//! of the partition when nothing was committed).

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::{debug, trace};

use crate::error::{LogError, LogResult};
use crate::record::{OutboundRecord, Polled, Record};
use crate::shutdown::Shutdown;
use crate::{EventConsumer, EventProducer};

/// Default number of partitions per topic
pub const DEFAULT_PARTITIONS: u32 = 4;

#[derive(Debug, Clone)]
struct StoredRecord {
    key: String,
    payload: Vec<u8>,
}

struct Topic {
    partitions: Vec<RwLock<Vec<StoredRecord>>>,
    /// Woken on every append
    appended: Notify,
}

impl Topic {
    fn new(partitions: u32) -> Self {
        Self {
            partitions: (0..partitions).map(|_| RwLock::new(Vec::new())).collect(),
            appended: Notify::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct GroupPartition {
    group: String,
    topic: String,
    partition: u32,
}

/// An in-process, append-only, partitioned log
pub struct MemoryLog {
    partitions: u32,
    topics: DashMap<String, Arc<Topic>>,
    committed: DashMap<GroupPartition, u64>,
}

impl MemoryLog {
    /// Create a log with [`DEFAULT_PARTITIONS`] partitions per topic
    pub fn new() -> Self {
        Self::with_partitions(DEFAULT_PARTITIONS)
    }

    /// Create a log with the given number of partitions per topic
    pub fn with_partitions(partitions: u32) -> Self {
        Self {
            partitions: partitions.max(1),
            topics: DashMap::new(),
            committed: DashMap::new(),
        }
    }

    /// Number of partitions per topic
    pub fn partitions(&self) -> u32 {
        self.partitions
    }

    fn topic(&self, name: &str) -> Arc<Topic> {
        self.topics
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(Topic::new(self.partitions)))
            .clone()
    }

    /// Partition a key is routed to
    pub fn partition_for(&self, key: &str) -> u32 {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        (hasher.finish() % u64::from(self.partitions)) as u32
    }

    /// Append a record, returning its partition and offset
    pub fn append(&self, record: OutboundRecord) -> (u32, u64) {
        let topic = self.topic(&record.topic);
        let partition = self.partition_for(&record.key);
        let offset = {
            let mut log = topic.partitions[partition as usize].write();
            log.push(StoredRecord {
                key: record.key,
                payload: record.payload,
            });
            (log.len() - 1) as u64
        };
        trace!(topic = %record.topic, partition, offset, "Appended record");
        topic.appended.notify_waiters();
        (partition, offset)
    }

    /// Total number of records in a topic
    pub fn len(&self, topic: &str) -> usize {
        self.topics
            .get(topic)
            .map(|t| t.partitions.iter().map(|p| p.read().len()).sum())
            .unwrap_or(0)
    }

    /// Whether a topic holds no records
    pub fn is_empty(&self, topic: &str) -> bool {
        self.len(topic) == 0
    }

    /// Decoded copy of every record in a topic, partition by partition
    pub fn records(&self, topic: &str) -> Vec<Record> {
        let Some(t) = self.topics.get(topic).map(|t| t.clone()) else {
            return Vec::new();
        };
        let mut out = Vec::new();
        for (partition, records) in t.partitions.iter().enumerate() {
            for (offset, stored) in records.read().iter().enumerate() {
                out.push(Record {
                    topic: topic.to_string(),
                    partition: partition as u32,
                    offset: offset as u64,
                    key: stored.key.clone(),
                    payload: stored.payload.clone(),
                });
            }
        }
        out
    }

    /// Committed offset of a group on one partition
    pub fn committed(&self, group: &str, topic: &str, partition: u32) -> Option<u64> {
        self.committed
            .get(&GroupPartition {
                group: group.to_string(),
                topic: topic.to_string(),
                partition,
            })
            .map(|o| *o)
    }

    /// Create a consumer for `topic` in consumer group `group`
    pub fn consumer(
        self: &Arc<Self>,
        group: impl Into<String>,
        topic: impl Into<String>,
        max_batch: usize,
    ) -> MemoryConsumer {
        let group = group.into();
        let topic_name = topic.into();
        let positions = (0..self.partitions)
            .map(|p| self.committed(&group, &topic_name, p).unwrap_or(0))
            .collect();
        debug!(%group, topic = %topic_name, ?positions, "Created consumer");

        MemoryConsumer {
            topic: self.topic(&topic_name),
            log: self.clone(),
            group,
            topic_name,
            positions,
            max_batch: max_batch.max(1),
            closed: false,
        }
    }

    /// Create a buffering producer
    pub fn producer(self: &Arc<Self>) -> MemoryProducer {
        MemoryProducer {
            log: self.clone(),
            buffer: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
        }
    }
}

impl Default for MemoryLog {
    fn default() -> Self {
        Self::new()
    }
}

/// Consumer over one topic of a [`MemoryLog`]
pub struct MemoryConsumer {
    log: Arc<MemoryLog>,
    topic: Arc<Topic>,
    group: String,
    topic_name: String,
    /// Next offset to read, per partition
    positions: Vec<u64>,
    max_batch: usize,
    closed: bool,
}

impl MemoryConsumer {
    fn read_batch(&mut self) -> Vec<Record> {
        let mut batch = Vec::new();
        for (partition, records) in self.topic.partitions.iter().enumerate() {
            if batch.len() >= self.max_batch {
                break;
            }
            let records = records.read();
            let position = &mut self.positions[partition];
            while (*position as usize) < records.len() && batch.len() < self.max_batch {
                let stored = &records[*position as usize];
                batch.push(Record {
                    topic: self.topic_name.clone(),
                    partition: partition as u32,
                    offset: *position,
                    key: stored.key.clone(),
                    payload: stored.payload.clone(),
                });
                *position += 1;
            }
        }
        batch
    }
}

#[async_trait]
impl EventConsumer for MemoryConsumer {
    fn topic(&self) -> &str {
        &self.topic_name
    }

    async fn poll(&mut self, timeout: Duration, shutdown: &Shutdown) -> LogResult<Polled> {
        if self.closed {
            return Err(LogError::Closed("consumer"));
        }

        let deadline = Instant::now() + timeout;
        let topic = self.topic.clone();
        loop {
            if shutdown.is_requested() {
                return Ok(Polled::Cancelled);
            }

            // Register for appends before reading so none slips in between
            let appended = topic.appended.notified();
            let batch = self.read_batch();
            if !batch.is_empty() {
                trace!(topic = %self.topic_name, records = batch.len(), "Polled batch");
                return Ok(Polled::Records(batch));
            }

            tokio::select! {
                _ = shutdown.requested() => return Ok(Polled::Cancelled),
                _ = appended => continue,
                _ = tokio::time::sleep_until(deadline) => return Ok(Polled::Records(Vec::new())),
            }
        }
    }

    async fn commit(&mut self) -> LogResult<()> {
        if self.closed {
            return Err(LogError::Closed("consumer"));
        }
        for (partition, position) in self.positions.iter().enumerate() {
            self.log.committed.insert(
                GroupPartition {
                    group: self.group.clone(),
                    topic: self.topic_name.clone(),
                    partition: partition as u32,
                },
                *position,
            );
        }
        trace!(
            group = %self.group,
            topic = %self.topic_name,
            positions = ?self.positions,
            "Committed offsets"
        );
        Ok(())
    }

    async fn close(&mut self) -> LogResult<()> {
        if !self.closed {
            self.closed = true;
            debug!(group = %self.group, topic = %self.topic_name, "Closed consumer");
        }
        Ok(())
    }
}

/// Producer that buffers sends until [`EventProducer::flush`]
pub struct MemoryProducer {
    log: Arc<MemoryLog>,
    buffer: Mutex<Vec<OutboundRecord>>,
    closed: AtomicBool,
}

impl MemoryProducer {
    /// Number of records waiting for a flush
    pub fn pending(&self) -> usize {
        self.buffer.lock().len()
    }
}

#[async_trait]
impl EventProducer for MemoryProducer {
    async fn send(&self, record: OutboundRecord) -> LogResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(LogError::Closed("producer"));
        }
        self.buffer.lock().push(record);
        Ok(())
    }

    async fn flush(&self) -> LogResult<()> {
        let pending = std::mem::take(&mut *self.buffer.lock());
        if !pending.is_empty() {
            debug!(records = pending.len(), "Flushing producer");
        }
        for record in pending {
            self.log.append(record);
        }
        Ok(())
    }

    async fn close(&self) -> LogResult<()> {
        self.flush().await?;
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

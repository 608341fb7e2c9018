//! Sensor event consumer: merge and publish

use std::sync::Arc;

use async_trait::async_trait;
use hub_core::SensorEvent;
use hub_event_log::{EventProducer, HandlerError, LogResult, OutboundRecord, Record, RecordHandler};
use tracing::debug;

use crate::aggregator::SnapshotAggregator;

/// Feeds sensor readings into the aggregator and publishes changed snapshots
///
/// Snapshots are keyed by hub id. Publishing goes through a buffering
/// producer; the consumer loop flushes it before committing offsets.
pub struct SensorEventHandler {
    aggregator: Arc<SnapshotAggregator>,
    producer: Arc<dyn EventProducer>,
    snapshots_topic: String,
}

impl SensorEventHandler {
    pub fn new(
        aggregator: Arc<SnapshotAggregator>,
        producer: Arc<dyn EventProducer>,
        snapshots_topic: impl Into<String>,
    ) -> Self {
        Self {
            aggregator,
            producer,
            snapshots_topic: snapshots_topic.into(),
        }
    }
}

#[async_trait]
impl RecordHandler for SensorEventHandler {
    type Event = SensorEvent;

    fn name(&self) -> &str {
        "aggregator"
    }

    async fn handle(&self, event: SensorEvent, _record: &Record) -> Result<(), HandlerError> {
        let Some(snapshot) = self.aggregator.merge(&event) else {
            return Ok(());
        };

        debug!(
            hub_id = %snapshot.hub_id,
            sensors = snapshot.sensor_count(),
            "Publishing updated snapshot"
        );
        let record = OutboundRecord::json(&self.snapshots_topic, &snapshot.hub_id, &snapshot)?;
        self.producer.send(record).await?;
        Ok(())
    }

    async fn flush(&self) -> LogResult<()> {
        self.producer.flush().await
    }

    async fn close(&self) -> LogResult<()> {
        self.producer.close().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;
    use hub_core::{ClimateReading, HubSnapshot, SensorPayload};
    use hub_event_log::{ConsumerLoop, MemoryLog, Shutdown};
    use std::time::Duration;

    fn climate_at(secs: i64) -> SensorEvent {
        SensorEvent::new(
            "s3",
            "H1",
            DateTime::from_timestamp(secs, 0).unwrap(),
            SensorPayload::Climate(ClimateReading {
                temperature_c: 22,
                humidity: 40,
                co2_level: 500,
            }),
        )
    }

    fn record_for(event: &SensorEvent) -> Record {
        Record {
            topic: "sensors".to_string(),
            partition: 0,
            offset: 0,
            key: event.sensor_id.clone(),
            payload: serde_json::to_vec(event).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_identical_payload_not_republished() {
        let log = Arc::new(MemoryLog::new());
        let producer = Arc::new(log.producer());
        let handler = SensorEventHandler::new(
            Arc::new(SnapshotAggregator::new()),
            producer.clone(),
            "snapshots",
        );

        for event in [climate_at(10), climate_at(20)] {
            let record = record_for(&event);
            handler.handle(event, &record).await.unwrap();
        }
        assert_eq!(producer.pending(), 1);

        handler.flush().await.unwrap();
        let published = log.records("snapshots");
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].key, "H1");

        let snapshot: HubSnapshot = published[0].decode().unwrap();
        assert_eq!(snapshot.sensor("s3").unwrap().timestamp.timestamp(), 10);
    }

    #[tokio::test]
    async fn test_loop_publishes_before_commit() {
        let log = Arc::new(MemoryLog::with_partitions(2));
        let source = log.producer();
        for event in [climate_at(10), climate_at(5), climate_at(20)] {
            source
                .send(OutboundRecord::json("sensors", &event.sensor_id, &event).unwrap())
                .await
                .unwrap();
        }
        source
            .send(OutboundRecord::new("sensors", "s9", b"not an event".to_vec()))
            .await
            .unwrap();
        source.flush().await.unwrap();

        let shutdown = Shutdown::new();
        let handler = SensorEventHandler::new(
            Arc::new(SnapshotAggregator::new()),
            Arc::new(log.producer()),
            "snapshots",
        );
        let worker = ConsumerLoop::new(
            log.consumer("aggregator", "sensors", 100),
            handler,
            shutdown.clone(),
            Duration::from_millis(20),
        );
        let handle = tokio::spawn(worker.run());

        tokio::time::sleep(Duration::from_millis(100)).await;
        shutdown.request();
        let stats = handle.await.unwrap().unwrap();

        assert_eq!(stats.processed, 3);
        assert_eq!(stats.failed, 1);
        assert_eq!(log.len("snapshots"), 1);
    }
}

//! Snapshot merge engine
//!
//! The aggregator owns one [`HubSnapshot`] per hub. Snapshots are created
//! empty on first use, live as long as the aggregator and are never
//! persisted; after a restart they are rebuilt by replaying the sensor topic.
//!
//! Conflict resolution for an incoming reading:
//! - unknown sensor: accept
//! - timestamp not strictly after the stored one: reject (stale or duplicate)
//! - payload equal to the stored one: reject (heartbeat)
//! - otherwise: accept

use std::sync::Arc;

use dashmap::DashMap;
use hub_core::{HubSnapshot, SensorEvent, SensorState};
use parking_lot::Mutex;
use tracing::{debug, info, instrument, trace};

/// Result of merging one reading into its hub snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// First reading for this sensor
    Inserted,
    /// Newer reading with a different payload
    Updated,
    /// Reading not newer than the stored one
    Stale,
    /// Newer reading with an identical payload
    Unchanged,
}

impl MergeOutcome {
    /// Whether the snapshot changed
    pub fn changed(self) -> bool {
        matches!(self, MergeOutcome::Inserted | MergeOutcome::Updated)
    }
}

/// Per-hub snapshot store with merge semantics
///
/// Each hub's snapshot sits behind its own lock; the map only guards
/// get-or-insert, so merges for different hubs never wait on each other.
#[derive(Default)]
pub struct SnapshotAggregator {
    snapshots: DashMap<String, Arc<Mutex<HubSnapshot>>>,
}

impl SnapshotAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge a reading, returning the updated snapshot only if it changed
    pub fn merge(&self, event: &SensorEvent) -> Option<HubSnapshot> {
        let (outcome, snapshot) = self.merge_with_outcome(event);
        outcome.changed().then_some(snapshot)
    }

    /// Merge a reading and report what happened
    ///
    /// The returned snapshot is a copy taken inside the hub's critical
    /// section, whatever the outcome.
    #[instrument(skip(self, event), fields(hub_id = %event.hub_id, sensor_id = %event.sensor_id))]
    pub fn merge_with_outcome(&self, event: &SensorEvent) -> (MergeOutcome, HubSnapshot) {
        let hub = self.hub(&event.hub_id);
        let mut snapshot = hub.lock();

        let outcome = match snapshot.sensors_state.get(&event.sensor_id) {
            None => MergeOutcome::Inserted,
            Some(prior) if event.timestamp <= prior.timestamp => MergeOutcome::Stale,
            Some(prior) if prior.payload == event.payload => MergeOutcome::Unchanged,
            Some(_) => MergeOutcome::Updated,
        };

        if outcome.changed() {
            snapshot.sensors_state.insert(
                event.sensor_id.clone(),
                SensorState {
                    timestamp: event.timestamp,
                    payload: event.payload.clone(),
                },
            );
            if event.timestamp > snapshot.timestamp {
                snapshot.timestamp = event.timestamp;
            }
            debug!(
                ?outcome,
                kind = event.payload.kind(),
                timestamp = %event.timestamp,
                "Merged sensor reading"
            );
        } else {
            trace!(?outcome, timestamp = %event.timestamp, "Ignored sensor reading");
        }

        (outcome, snapshot.clone())
    }

    /// Get-or-insert the snapshot cell for a hub
    fn hub(&self, hub_id: &str) -> Arc<Mutex<HubSnapshot>> {
        if let Some(existing) = self.snapshots.get(hub_id) {
            return existing.clone();
        }
        self.snapshots
            .entry(hub_id.to_string())
            .or_insert_with(|| {
                info!(hub_id, "Creating snapshot for new hub");
                Arc::new(Mutex::new(HubSnapshot::empty(hub_id)))
            })
            .clone()
    }

    /// Copy of the current snapshot of a hub
    pub fn snapshot(&self, hub_id: &str) -> Option<HubSnapshot> {
        self.snapshots.get(hub_id).map(|cell| cell.lock().clone())
    }

    /// Ids of all hubs seen so far
    pub fn hub_ids(&self) -> Vec<String> {
        self.snapshots.iter().map(|r| r.key().clone()).collect()
    }

    /// Number of hubs with a snapshot
    pub fn hub_count(&self) -> usize {
        self.snapshots.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};
    use hub_core::{ClimateReading, SensorPayload, SwitchReading};

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    fn switch(sensor: &str, hub: &str, state: bool, secs: i64) -> SensorEvent {
        SensorEvent::new(
            sensor,
            hub,
            at(secs),
            SensorPayload::Switch(SwitchReading { state }),
        )
    }

    fn climate(sensor: &str, secs: i64) -> SensorEvent {
        SensorEvent::new(
            sensor,
            "H1",
            at(secs),
            SensorPayload::Climate(ClimateReading {
                temperature_c: 22,
                humidity: 40,
                co2_level: 500,
            }),
        )
    }

    #[test]
    fn test_first_reading_creates_snapshot() {
        let aggregator = SnapshotAggregator::new();
        let snapshot = aggregator.merge(&switch("s1", "H1", true, 100)).unwrap();

        assert_eq!(snapshot.hub_id, "H1");
        assert_eq!(snapshot.timestamp, at(100));
        assert_eq!(snapshot.sensor("s1").unwrap().timestamp, at(100));
        assert_eq!(aggregator.hub_count(), 1);
    }

    #[test]
    fn test_merge_is_idempotent() {
        let once = SnapshotAggregator::new();
        let twice = SnapshotAggregator::new();
        let event = switch("s1", "H1", true, 100);

        once.merge(&event);
        twice.merge(&event);
        assert!(twice.merge(&event).is_none());

        assert_eq!(once.snapshot("H1"), twice.snapshot("H1"));
    }

    #[test]
    fn test_stale_reading_is_rejected() {
        let aggregator = SnapshotAggregator::new();
        aggregator.merge(&switch("s1", "H1", true, 100));

        let (outcome, snapshot) = aggregator.merge_with_outcome(&switch("s1", "H1", false, 50));
        assert_eq!(outcome, MergeOutcome::Stale);

        let state = snapshot.sensor("s1").unwrap();
        assert_eq!(state.timestamp, at(100));
        assert_eq!(state.payload, SensorPayload::Switch(SwitchReading { state: true }));
    }

    #[test]
    fn test_equal_timestamp_is_rejected() {
        let aggregator = SnapshotAggregator::new();
        aggregator.merge(&switch("s1", "H1", true, 100));
        assert!(aggregator.merge(&switch("s1", "H1", false, 100)).is_none());
    }

    #[test]
    fn test_unchanged_payload_is_suppressed() {
        let aggregator = SnapshotAggregator::new();
        assert!(aggregator.merge(&climate("s3", 10)).is_some());

        let (outcome, snapshot) = aggregator.merge_with_outcome(&climate("s3", 20));
        assert_eq!(outcome, MergeOutcome::Unchanged);
        assert_eq!(snapshot.sensor("s3").unwrap().timestamp, at(10));
    }

    #[test]
    fn test_timestamps_monotonic_regardless_of_order() {
        let aggregator = SnapshotAggregator::new();
        let arrivals = [(30, true), (10, false), (50, false), (40, true), (20, true), (60, true)];

        let mut last = DateTime::<Utc>::UNIX_EPOCH;
        for (secs, state) in arrivals {
            aggregator.merge(&switch("s1", "H1", state, secs));
            let current = aggregator.snapshot("H1").unwrap().sensor("s1").unwrap().timestamp;
            assert!(current >= last);
            last = current;
        }
        assert_eq!(last, at(60));
    }

    #[test]
    fn test_snapshot_timestamp_is_max_of_sensors() {
        let aggregator = SnapshotAggregator::new();
        aggregator.merge(&switch("s1", "H1", true, 100));
        let snapshot = aggregator.merge(&switch("s2", "H1", true, 40)).unwrap();

        assert_eq!(snapshot.timestamp, at(100));
        assert_eq!(snapshot.sensor_count(), 2);
    }

    #[test]
    fn test_hubs_are_isolated() {
        let aggregator = SnapshotAggregator::new();
        aggregator.merge(&switch("s1", "H1", true, 100));
        aggregator.merge(&switch("s1", "H2", false, 5));

        assert_eq!(aggregator.hub_count(), 2);
        assert_eq!(aggregator.snapshot("H1").unwrap().sensor_count(), 1);
        assert_eq!(
            aggregator.snapshot("H2").unwrap().sensor("s1").unwrap().timestamp,
            at(5)
        );
    }

    #[test]
    fn test_concurrent_merges() {
        let aggregator = Arc::new(SnapshotAggregator::new());
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let aggregator = aggregator.clone();
                std::thread::spawn(move || {
                    for i in 0..200 {
                        let hub = format!("H{}", t % 2);
                        let sensor = format!("s{}", i % 10);
                        aggregator.merge(&switch(&sensor, &hub, i % 2 == 0, i));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(aggregator.hub_count(), 2);
        for hub in aggregator.hub_ids() {
            let snapshot = aggregator.snapshot(&hub).unwrap();
            assert_eq!(snapshot.sensor_count(), 10);
            // Each sensor ends on its newest reading
            for i in 190..200 {
                let state = snapshot.sensor(&format!("s{}", i % 10)).unwrap();
                assert_eq!(state.timestamp, at(i));
            }
        }
    }
}

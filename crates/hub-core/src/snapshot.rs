//! Per-hub snapshot of latest sensor state

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::sensor::SensorPayload;

/// The latest accepted reading for one sensor within a hub snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorState {
    /// Timestamp of the accepted reading
    pub timestamp: DateTime<Utc>,

    /// Payload of the accepted reading
    pub payload: SensorPayload,
}

/// The most recently merged state of all sensors on one hub
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HubSnapshot {
    /// Hub the snapshot describes
    pub hub_id: String,

    /// Newest timestamp among the contained sensor states
    pub timestamp: DateTime<Utc>,

    /// Latest state per sensor id
    #[serde(default)]
    pub sensors_state: HashMap<String, SensorState>,
}

impl HubSnapshot {
    /// Create an empty snapshot with a zero (epoch) timestamp
    pub fn empty(hub_id: impl Into<String>) -> Self {
        Self {
            hub_id: hub_id.into(),
            timestamp: DateTime::<Utc>::UNIX_EPOCH,
            sensors_state: HashMap::new(),
        }
    }

    /// Get the state of a sensor, if the hub has seen it
    pub fn sensor(&self, sensor_id: &str) -> Option<&SensorState> {
        self.sensors_state.get(sensor_id)
    }

    /// Number of sensors with a known state
    pub fn sensor_count(&self) -> usize {
        self.sensors_state.len()
    }
}

//! Hub topology and scenario definition events

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::scenario::{DeviceType, ScenarioAction, ScenarioCondition};

/// An event published by a hub about its devices or scenarios
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HubEvent {
    pub hub_id: String,
    pub timestamp: DateTime<Utc>,
    pub payload: HubEventPayload,
}

impl HubEvent {
    pub fn new(
        hub_id: impl Into<String>,
        timestamp: DateTime<Utc>,
        payload: HubEventPayload,
    ) -> Self {
        Self {
            hub_id: hub_id.into(),
            timestamp,
            payload,
        }
    }
}

/// Closed set of hub event kinds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HubEventPayload {
    /// A device joined the hub
    #[serde(rename_all = "camelCase")]
    DeviceAdded { id: String, device_type: DeviceType },

    /// A device left the hub
    DeviceRemoved { id: String },

    /// A scenario was defined or redefined
    ScenarioAdded {
        name: String,
        #[serde(default)]
        conditions: Vec<ScenarioCondition>,
        #[serde(default)]
        actions: Vec<ScenarioAction>,
    },

    /// A scenario was deleted
    ScenarioRemoved { name: String },
}

impl HubEventPayload {
    /// Short name of the event kind, used in logs
    pub fn kind(&self) -> &'static str {
        match self {
            HubEventPayload::DeviceAdded { .. } => "device_added",
            HubEventPayload::DeviceRemoved { .. } => "device_removed",
            HubEventPayload::ScenarioAdded { .. } => "scenario_added",
            HubEventPayload::ScenarioRemoved { .. } => "scenario_removed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_device_added_deserialize() {
        let json = json!({
            "hubId": "H1",
            "timestamp": "2024-01-01T00:00:00Z",
            "payload": {"type": "DEVICE_ADDED", "id": "s1", "deviceType": "SWITCH_SENSOR"}
        });

        let event: HubEvent = serde_json::from_value(json).unwrap();
        assert_eq!(
            event.payload,
            HubEventPayload::DeviceAdded {
                id: "s1".to_string(),
                device_type: DeviceType::SwitchSensor,
            }
        );
        assert_eq!(event.payload.kind(), "device_added");
    }

    #[test]
    fn test_unknown_hub_event_rejected() {
        let json = json!({
            "hubId": "H1",
            "timestamp": "2024-01-01T00:00:00Z",
            "payload": {"type": "HUB_REBOOTED"}
        });

        assert!(serde_json::from_value::<HubEvent>(json).is_err());
    }
}

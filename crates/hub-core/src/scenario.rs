//! Scenario definitions and sensor registry records
//!
//! A scenario is a named rule on one hub: a conjunction of conditions over
//! sensor readings that triggers a list of device actions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Reading a condition inspects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConditionType {
    Temperature,
    Humidity,
    #[serde(rename = "CO2LEVEL", alias = "CO2_LEVEL")]
    Co2Level,
    Luminosity,
    Motion,
    Switch,
}

/// Comparison between the observed reading and the condition value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConditionOperation {
    Equals,
    GreaterThan,
    #[serde(alias = "LOWER_THAN")]
    LessThan,
}

impl ConditionOperation {
    /// Apply the comparison `observed <op> expected`
    pub fn compare(self, observed: i32, expected: i32) -> bool {
        match self {
            ConditionOperation::Equals => observed == expected,
            ConditionOperation::GreaterThan => observed > expected,
            ConditionOperation::LessThan => observed < expected,
        }
    }
}

/// Command sent to an actuator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionType {
    Activate,
    Deactivate,
    Inverse,
    SetValue,
}

/// Kind of device registered on a hub
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeviceType {
    MotionSensor,
    TemperatureSensor,
    LightSensor,
    ClimateSensor,
    SwitchSensor,
}

/// Typed predicate over one sensor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioCondition {
    pub sensor_id: String,
    #[serde(rename = "type")]
    pub condition_type: ConditionType,
    pub operation: ConditionOperation,
    pub value: i32,
}

impl ScenarioCondition {
    pub fn new(
        sensor_id: impl Into<String>,
        condition_type: ConditionType,
        operation: ConditionOperation,
        value: i32,
    ) -> Self {
        Self {
            sensor_id: sensor_id.into(),
            condition_type,
            operation,
            value,
        }
    }
}

/// Command to one sensor / actuator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioAction {
    pub sensor_id: String,
    #[serde(rename = "type")]
    pub action_type: ActionType,
    #[serde(default)]
    pub value: i32,
}

impl ScenarioAction {
    pub fn new(sensor_id: impl Into<String>, action_type: ActionType, value: i32) -> Self {
        Self {
            sensor_id: sensor_id.into(),
            action_type,
            value,
        }
    }
}

/// A named automation rule, unique by (hub id, name)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scenario {
    pub hub_id: String,
    pub name: String,
    #[serde(default)]
    pub conditions: Vec<ScenarioCondition>,
    #[serde(default)]
    pub actions: Vec<ScenarioAction>,
}

impl Scenario {
    pub fn new(hub_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            hub_id: hub_id.into(),
            name: name.into(),
            conditions: Vec::new(),
            actions: Vec::new(),
        }
    }

    /// Add a condition
    pub fn with_condition(mut self, condition: ScenarioCondition) -> Self {
        self.conditions.push(condition);
        self
    }

    /// Add an action
    pub fn with_action(mut self, action: ScenarioAction) -> Self {
        self.actions.push(action);
        self
    }

    /// Every sensor id referenced by a condition or an action
    pub fn referenced_sensors(&self) -> impl Iterator<Item = &str> {
        self.conditions
            .iter()
            .map(|c| c.sensor_id.as_str())
            .chain(self.actions.iter().map(|a| a.sensor_id.as_str()))
    }
}

/// Membership record of a sensor on a hub
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorRegistryEntry {
    pub id: String,
    pub hub_id: String,
    pub device_type: DeviceType,
}

/// Command issued to the actuation endpoint for one scenario action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceActionRequest {
    pub hub_id: String,
    pub scenario_name: String,
    pub action: ScenarioAction,
    pub timestamp: DateTime<Utc>,
}

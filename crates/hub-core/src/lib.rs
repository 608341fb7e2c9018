//! Core types for the smart-home hub pipeline
//!
//! This crate provides the fundamental types shared by every stage of the
//! pipeline: sensor readings, per-hub snapshots, hub topology events and
//! scenario definitions. It also hosts the raw ingestion boundary that turns
//! untyped device JSON into the closed set of event types.

mod error;
mod hub_event;
pub mod raw;
mod scenario;
mod sensor;
mod snapshot;

pub use error::{CoreError, CoreResult};
pub use hub_event::{HubEvent, HubEventPayload};
pub use scenario::{
    ActionType, ConditionOperation, ConditionType, DeviceActionRequest, DeviceType, Scenario,
    ScenarioAction, ScenarioCondition, SensorRegistryEntry,
};
pub use sensor::{
    ClimateReading, LightReading, MotionReading, SensorEvent, SensorPayload, SwitchReading,
    TemperatureReading,
};
pub use snapshot::{HubSnapshot, SensorState};


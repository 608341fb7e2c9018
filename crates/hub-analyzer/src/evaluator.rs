//! Condition evaluation
//!
//! A scenario fires iff every condition is satisfied by the snapshot. A
//! condition over a sensor the snapshot has not seen, or over a reading the
//! sensor's payload does not carry, is simply not satisfied.

use hub_core::{ConditionType, HubSnapshot, Scenario, ScenarioCondition, SensorPayload};
use tracing::{debug, trace};

/// Result of evaluating one condition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConditionOutcome {
    Satisfied { observed: i32 },
    NotSatisfied { observed: i32 },
    /// The snapshot holds no state for the sensor
    MissingSensor,
    /// The sensor's payload has no reading of the requested type
    VariantMismatch { payload: &'static str },
}

impl ConditionOutcome {
    pub fn is_satisfied(&self) -> bool {
        matches!(self, ConditionOutcome::Satisfied { .. })
    }
}

/// Extract the integer reading `condition_type` selects from `payload`
///
/// Boolean readings map to 1/0. Returns `None` when the payload variant does
/// not carry that reading.
pub fn observe(payload: &SensorPayload, condition_type: ConditionType) -> Option<i32> {
    match (payload, condition_type) {
        (SensorPayload::Temperature(r), ConditionType::Temperature) => Some(r.temperature_c),
        (SensorPayload::Climate(r), ConditionType::Temperature) => Some(r.temperature_c),
        (SensorPayload::Climate(r), ConditionType::Humidity) => Some(r.humidity),
        (SensorPayload::Climate(r), ConditionType::Co2Level) => Some(r.co2_level),
        (SensorPayload::Light(r), ConditionType::Luminosity) => Some(r.luminosity),
        (SensorPayload::Motion(r), ConditionType::Motion) => Some(i32::from(r.motion)),
        (SensorPayload::Switch(r), ConditionType::Switch) => Some(i32::from(r.state)),
        (
            SensorPayload::Temperature(_)
            | SensorPayload::Climate(_)
            | SensorPayload::Motion(_)
            | SensorPayload::Switch(_)
            | SensorPayload::Light(_),
            _,
        ) => None,
    }
}

/// Evaluate one condition against a snapshot
pub fn evaluate_condition(
    condition: &ScenarioCondition,
    snapshot: &HubSnapshot,
) -> ConditionOutcome {
    let Some(state) = snapshot.sensor(&condition.sensor_id) else {
        return ConditionOutcome::MissingSensor;
    };
    match observe(&state.payload, condition.condition_type) {
        Some(observed) if condition.operation.compare(observed, condition.value) => {
            ConditionOutcome::Satisfied { observed }
        }
        Some(observed) => ConditionOutcome::NotSatisfied { observed },
        None => ConditionOutcome::VariantMismatch {
            payload: state.payload.kind(),
        },
    }
}

/// Whether every condition of `scenario` holds in `snapshot`
///
/// Stops at the first condition that does not hold. A scenario without
/// conditions fires on every snapshot of its hub.
pub fn scenario_fires(scenario: &Scenario, snapshot: &HubSnapshot) -> bool {
    for condition in &scenario.conditions {
        match evaluate_condition(condition, snapshot) {
            ConditionOutcome::Satisfied { observed } => {
                trace!(
                    scenario = %scenario.name,
                    sensor_id = %condition.sensor_id,
                    observed,
                    "Condition satisfied"
                );
            }
            ConditionOutcome::NotSatisfied { observed } => {
                trace!(
                    scenario = %scenario.name,
                    sensor_id = %condition.sensor_id,
                    observed,
                    expected = condition.value,
                    "Condition not satisfied"
                );
                return false;
            }
            ConditionOutcome::MissingSensor => {
                debug!(
                    scenario = %scenario.name,
                    sensor_id = %condition.sensor_id,
                    "No reading for sensor in snapshot, scenario not fired"
                );
                return false;
            }
            ConditionOutcome::VariantMismatch { payload } => {
                debug!(
                    scenario = %scenario.name,
                    sensor_id = %condition.sensor_id,
                    condition_type = ?condition.condition_type,
                    payload,
                    "Sensor does not report the condition's reading, scenario not fired"
                );
                return false;
            }
        }
    }
    true
}

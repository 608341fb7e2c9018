//! Raw ingestion boundary
//!
//! Devices report loosely shaped JSON. This module converts such maps into
//! the closed [`SensorEvent`] / [`HubEvent`] types before anything reaches
//! the pipeline. An explicit `type` tag is honoured; otherwise the sensor
//! kind is inferred from which reading fields are present.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::trace;

use crate::error::{CoreError, CoreResult};
use crate::hub_event::{HubEvent, HubEventPayload};
use crate::scenario::{ScenarioAction, ScenarioCondition};
use crate::sensor::{
    celsius_to_fahrenheit, ClimateReading, LightReading, MotionReading, SensorEvent,
    SensorPayload, SwitchReading, TemperatureReading,
};

/// Untyped JSON object as received from a device
pub type RawEvent = Map<String, Value>;

/// Sensor kind resolved from a raw event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SensorKind {
    Climate,
    Light,
    Motion,
    Switch,
    Temperature,
}

impl SensorKind {
    fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "CLIMATE_SENSOR_EVENT" | "CLIMATE_SENSOR" => Some(SensorKind::Climate),
            "LIGHT_SENSOR_EVENT" | "LIGHT_SENSOR" => Some(SensorKind::Light),
            "MOTION_SENSOR_EVENT" | "MOTION_SENSOR" => Some(SensorKind::Motion),
            "SWITCH_SENSOR_EVENT" | "SMART_SWITCH_EVENT" | "SWITCH_SENSOR" => {
                Some(SensorKind::Switch)
            }
            "TEMPERATURE_SENSOR_EVENT" | "TEMPERATURE_SENSOR" => Some(SensorKind::Temperature),
            _ => None,
        }
    }

    /// Field-presence inference, checked in a fixed order
    fn infer(raw: &RawEvent) -> Option<Self> {
        let has = |k: &str| raw.contains_key(k);
        if (has("temperature") || has("temperatureC")) && has("humidity") {
            Some(SensorKind::Climate)
        } else if has("luminosity") {
            Some(SensorKind::Light)
        } else if has("motion") {
            Some(SensorKind::Motion)
        } else if has("state") {
            Some(SensorKind::Switch)
        } else if has("temperatureC") && !has("humidity") {
            Some(SensorKind::Temperature)
        } else {
            None
        }
    }
}

/// Convert a raw device map into a [`SensorEvent`]
pub fn sensor_event_from_raw(raw: &RawEvent) -> CoreResult<SensorEvent> {
    let kind = match raw.get("type").and_then(Value::as_str) {
        Some(tag) => SensorKind::from_tag(tag).ok_or_else(|| CoreError::UnknownEnum {
            kind: "sensor event type",
            value: tag.to_string(),
        })?,
        None => SensorKind::infer(raw).ok_or_else(|| CoreError::UnknownSensorEvent {
            fields: raw.keys().cloned().collect::<Vec<_>>().join(","),
        })?,
    };
    trace!(?kind, "Resolved raw sensor event kind");

    let payload = match kind {
        SensorKind::Climate => SensorPayload::Climate(ClimateReading {
            temperature_c: match raw.get("temperatureC") {
                Some(_) => int_field(raw, "temperatureC")?,
                None => int_field(raw, "temperature")?,
            },
            humidity: int_field(raw, "humidity")?,
            co2_level: opt_int_field(raw, "co2Level")?.unwrap_or_default(),
        }),
        SensorKind::Light => SensorPayload::Light(LightReading {
            luminosity: int_field(raw, "luminosity")?,
            link_quality: opt_int_field(raw, "linkQuality")?.unwrap_or_default(),
        }),
        SensorKind::Motion => SensorPayload::Motion(MotionReading {
            motion: bool_field(raw, "motion")?,
            link_quality: opt_int_field(raw, "linkQuality")?.unwrap_or_default(),
            voltage: opt_int_field(raw, "voltage")?.unwrap_or_default(),
        }),
        SensorKind::Switch => SensorPayload::Switch(SwitchReading {
            state: bool_field(raw, "state")?,
        }),
        SensorKind::Temperature => {
            let temperature_c = int_field(raw, "temperatureC")?;
            let temperature_f = opt_int_field(raw, "temperatureF")?
                .unwrap_or_else(|| celsius_to_fahrenheit(temperature_c));
            SensorPayload::Temperature(TemperatureReading {
                temperature_c,
                temperature_f,
            })
        }
    };

    Ok(SensorEvent {
        sensor_id: required_str(raw, "id")?,
        hub_id: required_str(raw, "hubId")?,
        timestamp: timestamp_field(raw)?,
        payload,
    })
}

/// Convert a raw hub map into a [`HubEvent`]
pub fn hub_event_from_raw(raw: &RawEvent) -> CoreResult<HubEvent> {
    let tag = raw
        .get("type")
        .or_else(|| raw.get("eventType"))
        .and_then(Value::as_str)
        .ok_or(CoreError::MissingField("type"))?;

    let payload = match tag {
        "DEVICE_ADDED" => HubEventPayload::DeviceAdded {
            id: required_str(raw, "id")?,
            device_type: enum_field(raw, "deviceType", "device type")?,
        },
        "DEVICE_REMOVED" => HubEventPayload::DeviceRemoved {
            id: required_str(raw, "id")?,
        },
        "SCENARIO_ADDED" => HubEventPayload::ScenarioAdded {
            name: required_str(raw, "name")?,
            conditions: list_field(raw, "conditions", condition_from_raw)?,
            actions: list_field(raw, "actions", action_from_raw)?,
        },
        "SCENARIO_REMOVED" => HubEventPayload::ScenarioRemoved {
            name: required_str(raw, "name")?,
        },
        other => return Err(CoreError::UnknownHubEvent(other.to_string())),
    };

    Ok(HubEvent {
        hub_id: required_str(raw, "hubId")?,
        timestamp: timestamp_field(raw)?,
        payload,
    })
}

fn condition_from_raw(raw: &RawEvent) -> CoreResult<ScenarioCondition> {
    Ok(ScenarioCondition {
        sensor_id: required_str(raw, "sensorId")?,
        condition_type: enum_field(raw, "type", "condition type")?,
        operation: enum_field(raw, "operation", "condition operation")?,
        value: match raw.get("value") {
            Some(v) => coerce_int("value", v)?,
            None => return Err(CoreError::MissingField("value")),
        },
    })
}

fn action_from_raw(raw: &RawEvent) -> CoreResult<ScenarioAction> {
    Ok(ScenarioAction {
        sensor_id: required_str(raw, "sensorId")?,
        action_type: enum_field(raw, "type", "action type")?,
        value: match raw.get("value") {
            Some(Value::Null) | None => 0,
            Some(v) => coerce_int("value", v)?,
        },
    })
}

// --- Field helpers ---

fn required_str(raw: &RawEvent, field: &'static str) -> CoreResult<String> {
    match raw.get(field).and_then(Value::as_str) {
        Some(s) if !s.trim().is_empty() => Ok(s.to_string()),
        _ => Err(CoreError::MissingField(field)),
    }
}

fn int_field(raw: &RawEvent, field: &'static str) -> CoreResult<i32> {
    opt_int_field(raw, field)?.ok_or(CoreError::MissingField(field))
}

fn opt_int_field(raw: &RawEvent, field: &'static str) -> CoreResult<Option<i32>> {
    match raw.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => coerce_int(field, v).map(Some),
    }
}

fn bool_field(raw: &RawEvent, field: &'static str) -> CoreResult<bool> {
    match raw.get(field) {
        Some(Value::Bool(b)) => Ok(*b),
        Some(other) => Err(CoreError::InvalidValue {
            field: field.to_string(),
            reason: format!("expected boolean, got {other}"),
        }),
        None => Err(CoreError::MissingField(field)),
    }
}

fn enum_field<T: DeserializeOwned>(
    raw: &RawEvent,
    field: &'static str,
    kind: &'static str,
) -> CoreResult<T> {
    let value = raw.get(field).ok_or(CoreError::MissingField(field))?;
    serde_json::from_value(value.clone()).map_err(|_| CoreError::UnknownEnum {
        kind,
        value: value.as_str().map(str::to_string).unwrap_or_else(|| value.to_string()),
    })
}

fn list_field<T>(
    raw: &RawEvent,
    field: &'static str,
    convert: fn(&RawEvent) -> CoreResult<T>,
) -> CoreResult<Vec<T>> {
    match raw.get(field) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| match item {
                Value::Object(map) => convert(map),
                other => Err(CoreError::InvalidValue {
                    field: field.to_string(),
                    reason: format!("expected object, got {other}"),
                }),
            })
            .collect(),
        Some(other) => Err(CoreError::InvalidValue {
            field: field.to_string(),
            reason: format!("expected array, got {other}"),
        }),
    }
}

/// Integers, booleans (true = 1) and numeric strings are accepted
fn coerce_int(field: &str, value: &Value) -> CoreResult<i32> {
    let invalid = |reason: String| CoreError::InvalidValue {
        field: field.to_string(),
        reason,
    };

    match value {
        Value::Bool(b) => Ok(i32::from(*b)),
        Value::Number(n) => n
            .as_i64()
            .and_then(|i| i32::try_from(i).ok())
            .ok_or_else(|| invalid(format!("{n} is not a 32-bit integer"))),
        Value::String(s) => s
            .trim()
            .parse::<i32>()
            .map_err(|e| invalid(format!("'{s}': {e}"))),
        other => Err(invalid(format!("unsupported value {other}"))),
    }
}

/// RFC 3339 string or epoch milliseconds; absent means now
fn timestamp_field(raw: &RawEvent) -> CoreResult<DateTime<Utc>> {
    match raw.get("timestamp") {
        None | Some(Value::Null) => Ok(Utc::now()),
        Some(Value::Number(n)) => n
            .as_i64()
            .and_then(DateTime::from_timestamp_millis)
            .ok_or_else(|| CoreError::InvalidValue {
                field: "timestamp".to_string(),
                reason: format!("{n} is out of range"),
            }),
        Some(v) => serde_json::from_value(v.clone()).map_err(|e| CoreError::InvalidValue {
            field: "timestamp".to_string(),
            reason: e.to_string(),
        }),
    }
}

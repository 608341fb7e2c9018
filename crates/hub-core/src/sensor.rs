//! Sensor readings
//!
//! A [`SensorEvent`] is produced once per device reading and never mutated.
//! The payload is a closed set of variants, one per supported device kind.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single reading reported by one sensor of one hub
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorEvent {
    /// Sensor that produced the reading
    pub sensor_id: String,

    /// Hub the sensor belongs to
    pub hub_id: String,

    /// Device-side time of the reading
    pub timestamp: DateTime<Utc>,

    /// Typed reading
    pub payload: SensorPayload,
}

impl SensorEvent {
    /// Create a new sensor event
    pub fn new(
        sensor_id: impl Into<String>,
        hub_id: impl Into<String>,
        timestamp: DateTime<Utc>,
        payload: SensorPayload,
    ) -> Self {
        Self {
            sensor_id: sensor_id.into(),
            hub_id: hub_id.into(),
            timestamp,
            payload,
        }
    }
}

/// Reading payload, one variant per device kind
///
/// Equality is structural: two payloads of the same variant with identical
/// fields compare equal, which is what the snapshot merge relies on to
/// suppress heartbeat re-publishes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SensorPayload {
    /// Plain thermometer
    Temperature(TemperatureReading),
    /// Temperature, humidity and CO2 in one device
    Climate(ClimateReading),
    /// Presence detector
    Motion(MotionReading),
    /// Smart switch / relay
    Switch(SwitchReading),
    /// Illuminance sensor
    Light(LightReading),
}

impl SensorPayload {
    /// Short name of the variant, used in logs
    pub fn kind(&self) -> &'static str {
        match self {
            SensorPayload::Temperature(_) => "temperature",
            SensorPayload::Climate(_) => "climate",
            SensorPayload::Motion(_) => "motion",
            SensorPayload::Switch(_) => "switch",
            SensorPayload::Light(_) => "light",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemperatureReading {
    pub temperature_c: i32,
    pub temperature_f: i32,
}

impl TemperatureReading {
    /// Build a reading from Celsius, deriving Fahrenheit
    pub fn from_celsius(temperature_c: i32) -> Self {
        Self {
            temperature_c,
            temperature_f: celsius_to_fahrenheit(temperature_c),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClimateReading {
    pub temperature_c: i32,
    pub humidity: i32,
    pub co2_level: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MotionReading {
    pub motion: bool,
    pub link_quality: i32,
    pub voltage: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwitchReading {
    pub state: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LightReading {
    pub luminosity: i32,
    pub link_quality: i32,
}

/// Integer Fahrenheit conversion, rounded half away from zero
pub(crate) fn celsius_to_fahrenheit(celsius: i32) -> i32 {
    (f64::from(celsius) * 9.0 / 5.0 + 32.0).round() as i32
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_payload_structural_equality() {
        let a = SensorPayload::Climate(ClimateReading {
            temperature_c: 22,
            humidity: 40,
            co2_level: 500,
        });
        let b = SensorPayload::Climate(ClimateReading {
            temperature_c: 22,
            humidity: 40,
            co2_level: 500,
        });
        let c = SensorPayload::Climate(ClimateReading {
            temperature_c: 22,
            humidity: 41,
            co2_level: 500,
        });

        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_different_variants_never_equal() {
        let switch = SensorPayload::Switch(SwitchReading { state: true });
        let motion = SensorPayload::Motion(MotionReading {
            motion: true,
            link_quality: 0,
            voltage: 0,
        });
        assert_ne!(switch, motion);
    }

    #[test]
    fn test_sensor_event_wire_format() {
        let json = json!({
            "sensorId": "s1",
            "hubId": "H1",
            "timestamp": "2024-01-01T00:00:00Z",
            "payload": {"type": "LIGHT", "luminosity": 300, "linkQuality": 80}
        });

        let event: SensorEvent = serde_json::from_value(json).unwrap();
        assert_eq!(event.sensor_id, "s1");
        assert_eq!(
            event.payload,
            SensorPayload::Light(LightReading {
                luminosity: 300,
                link_quality: 80
            })
        );
        assert_eq!(event.payload.kind(), "light");
    }

    #[test]
    fn test_fahrenheit_derivation() {
        assert_eq!(TemperatureReading::from_celsius(0).temperature_f, 32);
        assert_eq!(TemperatureReading::from_celsius(100).temperature_f, 212);
        assert_eq!(TemperatureReading::from_celsius(-40).temperature_f, -40);
        assert_eq!(TemperatureReading::from_celsius(21).temperature_f, 70);
    }
}

use serde::{Deserialize, Serialize};

use crate::interface::domain::Position;
use crate::prelude::{StageError, StageResult};

/// Seconds since the Unix epoch.
pub type Timestamp = f64;

/// One validated sensor reading placed inside the domain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamplePoint {
    pub id: String,
    pub position: Position,
    pub value: f64,
    pub observed_at: Timestamp,
}

impl SamplePoint {
    pub fn new(id: impl Into<String>, x: f64, y: f64, value: f64, observed_at: Timestamp) -> Self {
        Self {
            id: id.into(),
            position: Position::new(x, y),
            value,
            observed_at,
        }
    }
}

/// Sensor identifiers arrive either as strings (`"E1"`) or bare numbers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawSensorId {
    Text(String),
    Number(i64),
}

impl RawSensorId {
    pub fn into_string(self) -> String {
        match self {
            RawSensorId::Text(text) => text,
            RawSensorId::Number(number) => number.to_string(),
        }
    }
}

/// Reading as it comes off the wire; every field may be missing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawSensorReading {
    #[serde(default, alias = "micro_id")]
    pub id: Option<RawSensorId>,
    #[serde(default)]
    pub value: Option<f64>,
    #[serde(default)]
    pub x: Option<f64>,
    #[serde(default)]
    pub y: Option<f64>,
    #[serde(default)]
    pub observed_at: Option<Timestamp>,
}

impl RawSensorReading {
    pub fn located(id: &str, value: f64, x: f64, y: f64, observed_at: Timestamp) -> Self {
        Self {
            id: Some(RawSensorId::Text(id.to_string())),
            value: Some(value),
            x: Some(x),
            y: Some(y),
            observed_at: Some(observed_at),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SensorUpdateWire {
    List(Vec<RawSensorReading>),
    Wrapped { sensors: Vec<RawSensorReading> },
}

/// Full-replace batch of sensor readings.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SensorUpdate {
    pub readings: Vec<RawSensorReading>,
}

impl SensorUpdate {
    pub fn new(readings: Vec<RawSensorReading>) -> Self {
        Self { readings }
    }

    /// Accepts either a bare JSON array or an object with a `sensors` array.
    pub fn from_json(payload: &str) -> StageResult<Self> {
        let wire: SensorUpdateWire = serde_json::from_str(payload)
            .map_err(|err| StageError::InvalidInput(format!("sensor update: {}", err)))?;
        let readings = match wire {
            SensorUpdateWire::List(readings) => readings,
            SensorUpdateWire::Wrapped { sensors } => sensors,
        };
        Ok(Self { readings })
    }
}

/// Coarse loudness bands used in summaries and sensor markers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum NoiseLevel {
    Low,
    Moderate,
    High,
    Critical,
}

impl NoiseLevel {
    pub fn classify(value: f64) -> Self {
        if value >= 85.0 {
            NoiseLevel::Critical
        } else if value >= 70.0 {
            NoiseLevel::High
        } else if value >= 50.0 {
            NoiseLevel::Moderate
        } else {
            NoiseLevel::Low
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            NoiseLevel::Low => "low",
            NoiseLevel::Moderate => "moderate",
            NoiseLevel::High => "high",
            NoiseLevel::Critical => "critical",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sensor_update_accepts_bare_and_wrapped_lists() {
        let bare = SensorUpdate::from_json(r#"[{"id":"E1","value":55.0,"x":1.0,"y":2.0}]"#)
            .unwrap();
        assert_eq!(bare.readings.len(), 1);

        let wrapped = SensorUpdate::from_json(
            r#"{"message_id": 7, "sensors": [{"micro_id": 3, "value": 61.5}, {"value": 40.0}]}"#,
        )
        .unwrap();
        assert_eq!(wrapped.readings.len(), 2);
        assert_eq!(
            wrapped.readings[0].id.clone().map(RawSensorId::into_string),
            Some("3".to_string())
        );
        assert!(wrapped.readings[1].id.is_none());
    }

    #[test]
    fn sensor_update_rejects_garbage() {
        assert!(SensorUpdate::from_json("not json").is_err());
    }

    #[test]
    fn noise_level_bands() {
        assert_eq!(NoiseLevel::classify(42.0), NoiseLevel::Low);
        assert_eq!(NoiseLevel::classify(50.0), NoiseLevel::Moderate);
        assert_eq!(NoiseLevel::classify(84.9), NoiseLevel::High);
        assert_eq!(NoiseLevel::classify(85.0), NoiseLevel::Critical);
    }
}

use serde::{Deserialize, Serialize};

use crate::interface::domain::Position;
use crate::interface::sample::Timestamp;
use crate::prelude::{StageError, StageResult};

/// Origin of an epicenter estimate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EpicenterSource {
    Authoritative,
    CachedAuthoritative,
    FieldPeak,
    SensorWeighted,
}

impl EpicenterSource {
    pub fn tag(&self) -> &'static str {
        match self {
            EpicenterSource::Authoritative => "authoritative",
            EpicenterSource::CachedAuthoritative => "cached_authoritative",
            EpicenterSource::FieldPeak => "field_peak",
            EpicenterSource::SensorWeighted => "sensor_weighted",
        }
    }
}

/// An epicenter estimate from one source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpicenterCandidate {
    pub position: Position,
    pub source: EpicenterSource,
    pub computed_at: Timestamp,
    /// Sensor the estimate was pinned to, when it came from a single reading.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_sensor: Option<String>,
}

impl EpicenterCandidate {
    pub fn new(position: Position, source: EpicenterSource, computed_at: Timestamp) -> Self {
        Self {
            position,
            source,
            computed_at,
            reference_sensor: None,
        }
    }

    pub fn with_reference(mut self, sensor: impl Into<String>) -> Self {
        self.reference_sensor = Some(sensor.into());
        self
    }

    pub fn retagged(&self, source: EpicenterSource) -> Self {
        Self {
            source,
            ..self.clone()
        }
    }
}

/// Externally supplied epicenter as pushed by the upstream estimator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AuthoritativeMessage {
    pub x: f64,
    pub y: f64,
    pub computed_at: Timestamp,
}

impl AuthoritativeMessage {
    pub fn new(x: f64, y: f64, computed_at: Timestamp) -> Self {
        Self { x, y, computed_at }
    }

    /// `null` decodes to `None`; the upstream sends it when it has nothing.
    pub fn from_json(payload: &str) -> StageResult<Option<Self>> {
        serde_json::from_str::<Option<Self>>(payload)
            .map_err(|err| StageError::InvalidInput(format!("authoritative candidate: {}", err)))
    }

    pub fn position(&self) -> Position {
        Position::new(self.x, self.y)
    }

    pub fn to_candidate(&self) -> EpicenterCandidate {
        EpicenterCandidate::new(
            self.position(),
            EpicenterSource::Authoritative,
            self.computed_at,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn authoritative_decodes_null_as_absent() {
        assert_eq!(AuthoritativeMessage::from_json("null").unwrap(), None);
        let msg = AuthoritativeMessage::from_json(r#"{"x":2.0,"y":3.5,"computed_at":10.0}"#)
            .unwrap()
            .unwrap();
        assert_eq!(msg.position(), Position::new(2.0, 3.5));
    }

    #[test]
    fn source_tags_are_snake_case() {
        let json = serde_json::to_string(&EpicenterSource::CachedAuthoritative).unwrap();
        assert_eq!(json, "\"cached_authoritative\"");
        assert_eq!(EpicenterSource::FieldPeak.tag(), "field_peak");
    }
}

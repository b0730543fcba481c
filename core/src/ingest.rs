//! Turns raw sensor batches into validated sample sets.
//!
//! Readings that cannot be placed or valued are dropped one at a time with a
//! warning; a bad reading never rejects the rest of its batch.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::interface::{Domain, Position, RawSensorId, SamplePoint, SensorUpdate, Timestamp};
use crate::telemetry::log::LogManager;

const LAYOUT_KEY_PREFIX: &str = "micro_";

/// Fixed mounting point of one sensor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorSite {
    pub location: [f64; 2],
    #[serde(default)]
    pub room: Option<String>,
}

/// Known sensor positions, keyed by sensor id.
///
/// Keys may carry the `micro_` prefix used by deployment files; lookups accept
/// either form.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SensorLayout {
    sites: BTreeMap<String, SensorSite>,
}

impl SensorLayout {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: impl Into<String>, x: f64, y: f64, room: Option<String>) {
        self.sites.insert(
            id.into(),
            SensorSite {
                location: [x, y],
                room,
            },
        );
    }

    pub fn len(&self) -> usize {
        self.sites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }

    pub fn site(&self, id: &str) -> Option<&SensorSite> {
        let bare = id.strip_prefix(LAYOUT_KEY_PREFIX).unwrap_or(id);
        self.sites
            .get(bare)
            .or_else(|| self.sites.get(&format!("{}{}", LAYOUT_KEY_PREFIX, bare)))
    }

    pub fn position(&self, id: &str) -> Option<Position> {
        self.site(id)
            .map(|site| Position::new(site.location[0], site.location[1]))
    }
}

/// Why a reading was left out of the sample set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    MissingId,
    MissingValue,
    NonFiniteValue,
    UnknownPosition,
    OutOfBounds,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct IngestOutcome {
    pub samples: Vec<SamplePoint>,
    pub dropped: Vec<(usize, DropReason)>,
}

/// Validates and places every reading of a full-replace batch.
///
/// Readings without coordinates are placed from `layout`; readings without
/// a timestamp take `received_at`.
pub fn ingest_update(
    update: &SensorUpdate,
    layout: &SensorLayout,
    domain: &Domain,
    tolerance: f64,
    received_at: Timestamp,
) -> IngestOutcome {
    let logger = LogManager::new("ingest");
    let mut outcome = IngestOutcome::default();

    for (slot, reading) in update.readings.iter().enumerate() {
        let id = match reading.id.clone().map(RawSensorId::into_string) {
            Some(id) if !id.trim().is_empty() => id,
            _ => {
                logger.warn(&format!("reading #{} has no sensor id, dropped", slot));
                outcome.dropped.push((slot, DropReason::MissingId));
                continue;
            }
        };
        let value = match reading.value {
            Some(value) if value.is_finite() => value,
            Some(value) => {
                logger.warn(&format!("sensor {} reported {}, dropped", id, value));
                outcome.dropped.push((slot, DropReason::NonFiniteValue));
                continue;
            }
            None => {
                logger.warn(&format!("sensor {} has no value, dropped", id));
                outcome.dropped.push((slot, DropReason::MissingValue));
                continue;
            }
        };
        let position = match (reading.x, reading.y) {
            (Some(x), Some(y)) => Some(Position::new(x, y)),
            _ => layout.position(&id),
        };
        let Some(position) = position.filter(Position::is_finite) else {
            logger.warn(&format!("sensor {} has no known position, dropped", id));
            outcome.dropped.push((slot, DropReason::UnknownPosition));
            continue;
        };
        if !domain.contains(&position, tolerance) {
            logger.warn(&format!(
                "sensor {} at ({:.3}, {:.3}) lies outside the domain, dropped",
                id, position.x, position.y
            ));
            outcome.dropped.push((slot, DropReason::OutOfBounds));
            continue;
        }

        outcome.samples.push(SamplePoint {
            id,
            position,
            value,
            observed_at: reading.observed_at.unwrap_or(received_at),
        });
    }

    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interface::RawSensorReading;

    fn layout() -> SensorLayout {
        let mut layout = SensorLayout::new();
        layout.insert("micro_E1", 1.0, 2.0, Some("Lab".into()));
        layout.insert("E2", 4.0, 12.0, None);
        layout
    }

    #[test]
    fn incomplete_readings_are_dropped_individually() {
        let update = SensorUpdate::new(vec![
            RawSensorReading::located("E7", 55.0, 2.0, 3.0, 100.0),
            RawSensorReading {
                value: Some(60.0),
                ..RawSensorReading::default()
            },
            RawSensorReading {
                id: Some(RawSensorId::Text("E8".into())),
                ..RawSensorReading::default()
            },
            RawSensorReading::located("E9", f64::NAN, 2.0, 3.0, 100.0),
        ]);
        let outcome = ingest_update(&update, &layout(), &Domain::default(), 1e-4, 200.0);
        assert_eq!(outcome.samples.len(), 1);
        assert_eq!(outcome.samples[0].observed_at, 100.0);
        assert_eq!(
            outcome.dropped,
            vec![
                (1, DropReason::MissingId),
                (2, DropReason::MissingValue),
                (3, DropReason::NonFiniteValue)
            ]
        );
    }

    #[test]
    fn positions_fall_back_to_layout() {
        let update = SensorUpdate::from_json(
            r#"{"sensors": [{"micro_id": "E1", "value": 61.0}, {"id": "E2", "value": 48.0}, {"id": "E3", "value": 70.0}]}"#,
        )
        .unwrap();
        let outcome = ingest_update(&update, &layout(), &Domain::default(), 1e-4, 42.0);
        assert_eq!(outcome.samples.len(), 2);
        assert_eq!(outcome.samples[0].position, Position::new(1.0, 2.0));
        assert_eq!(outcome.samples[1].position, Position::new(4.0, 12.0));
        assert_eq!(outcome.samples[1].observed_at, 42.0);
        assert_eq!(outcome.dropped, vec![(2, DropReason::UnknownPosition)]);
    }

    #[test]
    fn out_of_domain_readings_are_dropped() {
        let update = SensorUpdate::new(vec![RawSensorReading::located("E1", 50.0, 6.0, 1.0, 0.0)]);
        let outcome = ingest_update(&update, &SensorLayout::new(), &Domain::default(), 1e-4, 0.0);
        assert!(outcome.samples.is_empty());
        assert_eq!(outcome.dropped, vec![(0, DropReason::OutOfBounds)]);
    }

    #[test]
    fn layout_loads_from_json_map() {
        let layout: SensorLayout = serde_json::from_str(
            r#"{"micro_E4": {"location": [2.5, 7.0], "room": "Hall"}}"#,
        )
        .unwrap();
        assert_eq!(layout.position("E4"), Some(Position::new(2.5, 7.0)));
        assert_eq!(layout.site("micro_E4").unwrap().room.as_deref(), Some("Hall"));
    }
}

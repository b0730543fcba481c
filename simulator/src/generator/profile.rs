use anyhow::Context;
use noisecore::ingest::SensorLayout;
use noisecore::interface::{
    AuthoritativeMessage, Domain, Position, RawSensorId, RawSensorReading, SensorUpdate, Timestamp,
};
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Synthetic noise scene: one hotspot over an ambient floor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    pub sensors: usize,
    pub hotspot: [f64; 2],
    pub ambient_db: f64,
    pub peak_db: f64,
    /// Gaussian falloff radius of the hotspot, in domain units.
    pub falloff: f64,
    pub noise_db: f64,
    pub seed: u64,
    /// Emit authoritative epicenter messages next to the sensor batches.
    pub authoritative: bool,
    /// After this many messages the authoritative source freezes on its last position.
    pub stall_after: Option<usize>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            sensors: 12,
            hotspot: [3.5, 4.0],
            ambient_db: 42.0,
            peak_db: 92.0,
            falloff: 2.5,
            noise_db: 1.5,
            seed: 0,
            authoritative: true,
            stall_after: None,
        }
    }
}

impl GeneratorConfig {
    pub fn hotspot(&self) -> Position {
        Position::new(self.hotspot[0], self.hotspot[1])
    }

    /// Level a perfect sensor at `position` would read.
    pub fn level_at(&self, position: &Position) -> f64 {
        let spread = 2.0 * self.falloff.max(f64::EPSILON).powi(2);
        let gain = (-position.distance_sq(&self.hotspot()) / spread).exp();
        self.ambient_db + (self.peak_db - self.ambient_db) * gain
    }
}

/// Spreads `config.sensors` mounting points over the domain in a regular grid.
pub fn build_layout(config: &GeneratorConfig, domain: &Domain) -> SensorLayout {
    let mut layout = SensorLayout::new();
    let count = config.sensors;
    if count == 0 {
        return layout;
    }
    let per_row = ((count as f64 * domain.width / domain.height).sqrt().round() as usize).max(1);
    let rows = count.div_ceil(per_row);
    for index in 0..count {
        let (row, col) = (index / per_row, index % per_row);
        let x = (col as f64 + 0.5) * domain.width / per_row as f64;
        let y = (row as f64 + 0.5) * domain.height / rows as f64;
        let room = if y < domain.height / 2.0 { "north" } else { "south" };
        layout.insert(format!("micro_E{}", index + 1), x, y, Some(room.to_string()));
    }
    layout
}

/// Seeded source of sensor batches and authoritative estimates.
pub struct SceneGenerator {
    config: GeneratorConfig,
    layout: SensorLayout,
    rng: StdRng,
    emitted: usize,
    frozen: Option<AuthoritativeMessage>,
}

impl SceneGenerator {
    pub fn new(config: GeneratorConfig, domain: &Domain) -> Self {
        let layout = build_layout(&config, domain);
        let rng = StdRng::seed_from_u64(config.seed);
        Self {
            config,
            layout,
            rng,
            emitted: 0,
            frozen: None,
        }
    }

    /// One full batch. Readings carry only id and value; positions come from the layout.
    pub fn sensor_update(&mut self, now: Timestamp) -> anyhow::Result<SensorUpdate> {
        let mut readings = Vec::with_capacity(self.config.sensors);
        for index in 0..self.config.sensors {
            let id = format!("E{}", index + 1);
            let position = self
                .layout
                .position(&id)
                .with_context(|| format!("sensor {} missing from generated layout", id))?;
            let jitter = if self.config.noise_db > 0.0 {
                self.rng.gen_range(-self.config.noise_db..self.config.noise_db)
            } else {
                0.0
            };
            readings.push(RawSensorReading {
                id: Some(RawSensorId::Text(id)),
                value: Some(self.config.level_at(&position) + jitter),
                observed_at: Some(now),
                ..RawSensorReading::default()
            });
        }
        Ok(SensorUpdate::new(readings))
    }

    /// Next authoritative estimate, or `None` when emulation is off.
    pub fn authoritative(&mut self, now: Timestamp) -> Option<AuthoritativeMessage> {
        if !self.config.authoritative {
            return None;
        }
        if let Some(frozen) = self.frozen {
            return Some(frozen);
        }

        let hotspot = self.config.hotspot();
        let x = hotspot.x + self.rng.gen_range(-0.05..0.05);
        let y = hotspot.y + self.rng.gen_range(-0.05..0.05);
        let message = AuthoritativeMessage::new(x, y, now);
        self.emitted += 1;
        if self.config.stall_after.is_some_and(|limit| self.emitted >= limit) {
            log::info!("authoritative source stalls at ({:.3}, {:.3})", x, y);
            self.frozen = Some(message);
        }
        Some(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_covers_every_sensor_inside_the_domain() {
        let domain = Domain::default();
        let layout = build_layout(&GeneratorConfig::default(), &domain);
        assert_eq!(layout.len(), 12);
        for index in 1..=12 {
            let position = layout.position(&format!("E{}", index)).unwrap();
            assert!(domain.contains(&position, 0.0));
        }
    }

    #[test]
    fn batches_are_reproducible_per_seed() {
        let domain = Domain::default();
        let config = GeneratorConfig {
            seed: 7,
            ..GeneratorConfig::default()
        };
        let mut first = SceneGenerator::new(config.clone(), &domain);
        let mut second = SceneGenerator::new(config, &domain);
        assert_eq!(first.sensor_update(1.0).unwrap(), second.sensor_update(1.0).unwrap());
    }

    #[test]
    fn readings_peak_near_the_hotspot() {
        let config = GeneratorConfig {
            noise_db: 0.0,
            ..GeneratorConfig::default()
        };
        assert_eq!(config.level_at(&config.hotspot()), config.peak_db);
        assert!(config.level_at(&Position::new(0.0, 14.0)) < 45.0);
    }

    #[test]
    fn stalled_source_repeats_its_last_position() {
        let config = GeneratorConfig {
            stall_after: Some(2),
            ..GeneratorConfig::default()
        };
        let mut generator = SceneGenerator::new(config, &Domain::default());
        let first = generator.authoritative(0.0).unwrap();
        let second = generator.authoritative(1.0).unwrap();
        let third = generator.authoritative(2.0).unwrap();
        assert_ne!(first, second);
        assert_eq!(second, third);

        let mut silent = SceneGenerator::new(
            GeneratorConfig {
                authoritative: false,
                ..GeneratorConfig::default()
            },
            &Domain::default(),
        );
        assert!(silent.authoritative(0.0).is_none());
    }
}

use crate::epicenter::schedule::RefreshSchedule;
use crate::epicenter::sources;
use crate::interface::{
    AuthoritativeMessage, DenseField, Domain, EpicenterCandidate, EpicenterSource, Position,
    SamplePoint, Timestamp,
};
use crate::prelude::{FallbackPolicy, ResolverConfig, StageResult};
use crate::telemetry::log::LogManager;

#[derive(Debug, Clone, PartialEq)]
struct AcceptedAuthoritative {
    candidate: EpicenterCandidate,
    accepted_at: Timestamp,
}

/// Picks one epicenter out of the authoritative, cached, field-peak and
/// sensor-weighted sources, in that order of preference.
///
/// Sources are re-evaluated on every [`resolve`](Self::resolve). The
/// authoritative source is demoted when it keeps repeating the same position,
/// and is remembered for `cache_ttl_secs` after it goes missing.
pub struct EpicenterResolver {
    config: ResolverConfig,
    domain: Domain,
    enabled: bool,
    current: Option<EpicenterCandidate>,
    cached: Option<AcceptedAuthoritative>,
    last_key: Option<(i64, i64)>,
    staleness: u32,
    sensor_weighted: Option<EpicenterCandidate>,
    schedule: RefreshSchedule,
    last_source: Option<EpicenterSource>,
    logger: LogManager,
}

impl EpicenterResolver {
    /// Starts disabled; call [`set_enabled`](Self::set_enabled) to begin.
    pub fn new(config: ResolverConfig, domain: Domain) -> StageResult<Self> {
        config.validate()?;
        domain.validate()?;
        let schedule = RefreshSchedule::new(config.refresh_period_secs);
        Ok(Self {
            config,
            domain,
            enabled: false,
            current: None,
            cached: None,
            last_key: None,
            staleness: 0,
            sensor_weighted: None,
            schedule,
            last_source: None,
            logger: LogManager::new("epicenter"),
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Enabling arms the sensor-weighted refresh; disabling cancels it and drops
    /// every transient candidate. The cached authoritative survives both.
    pub fn set_enabled(&mut self, enabled: bool, now: Timestamp) {
        if enabled == self.enabled {
            return;
        }
        self.enabled = enabled;
        if enabled {
            self.schedule.arm(now);
            self.logger.record("epicenter tracking enabled");
        } else {
            self.schedule.cancel();
            self.current = None;
            self.last_key = None;
            self.staleness = 0;
            self.sensor_weighted = None;
            self.last_source = None;
            self.logger.record("epicenter tracking disabled");
        }
    }

    pub fn staleness(&self) -> u32 {
        self.staleness
    }

    pub fn is_stale(&self) -> bool {
        self.config.staleness_threshold > 0 && self.staleness >= self.config.staleness_threshold
    }

    pub fn sensor_weighted(&self) -> Option<&EpicenterCandidate> {
        self.sensor_weighted.as_ref()
    }

    pub fn next_refresh_due(&self) -> Option<Timestamp> {
        self.schedule.next_due()
    }

    fn position_key(&self, position: &Position) -> (i64, i64) {
        let scale = 10f64.powi(self.config.position_precision as i32);
        (
            (position.x * scale).round() as i64,
            (position.y * scale).round() as i64,
        )
    }

    /// Records the latest authoritative push, or its absence.
    ///
    /// A valid push is also remembered with `now` as its acceptance time.
    pub fn observe_authoritative(&mut self, message: Option<&AuthoritativeMessage>, now: Timestamp) {
        if !self.enabled {
            return;
        }
        let Some(message) = message else {
            self.current = None;
            return;
        };

        let candidate = message.to_candidate();
        if !self
            .domain
            .contains(&candidate.position, self.config.bounds_tolerance)
        {
            self.logger.warn(&format!(
                "authoritative epicenter ({:.4}, {:.4}) outside domain, rejected",
                message.x, message.y
            ));
            self.current = None;
            return;
        }

        let key = self.position_key(&candidate.position);
        if self.last_key == Some(key) {
            self.staleness = self.staleness.saturating_add(1);
            if self.is_stale() {
                self.logger.debug(&format!(
                    "authoritative epicenter repeated {} times",
                    self.staleness
                ));
            }
        } else {
            self.staleness = 0;
            self.last_key = Some(key);
        }

        self.cached = Some(AcceptedAuthoritative {
            candidate: candidate.clone(),
            accepted_at: now,
        });
        self.current = Some(candidate);
    }

    /// Runs the sensor-weighted recompute if its period has elapsed.
    pub fn poll_refresh(&mut self, samples: &[SamplePoint], now: Timestamp) -> bool {
        if !self.enabled || !self.schedule.take_due(now) {
            return false;
        }
        self.refresh_sensor_weighted(samples, now);
        true
    }

    pub fn refresh_sensor_weighted(&mut self, samples: &[SamplePoint], now: Timestamp) {
        if !self.enabled {
            return;
        }
        self.sensor_weighted = sources::sensor_weighted(
            samples,
            &self.domain,
            self.config.baseline,
            self.config.bounds_tolerance,
            now,
        );
    }

    fn cached_within_ttl(&self, now: Timestamp) -> Option<EpicenterCandidate> {
        let cached = self.cached.as_ref()?;
        let age = now - cached.accepted_at;
        (age <= self.config.cache_ttl_secs)
            .then(|| cached.candidate.retagged(EpicenterSource::CachedAuthoritative))
    }

    fn derived(&self, field: Option<&DenseField>, now: Timestamp) -> Option<EpicenterCandidate> {
        let peak = || {
            field.and_then(|field| {
                sources::field_peak(field, &self.domain, self.config.bounds_tolerance, now)
            })
        };
        let weighted = || self.sensor_weighted.clone();
        match self.config.policy {
            FallbackPolicy::FieldPeakFirst => peak().or_else(weighted),
            FallbackPolicy::SensorWeightedFirst => weighted().or_else(peak),
        }
    }

    /// Current best epicenter, or `None` when nothing trustworthy is available.
    ///
    /// `field` should only be passed while the heatmap is enabled and rendered.
    pub fn resolve(&mut self, field: Option<&DenseField>, now: Timestamp) -> Option<EpicenterCandidate> {
        if !self.enabled {
            return None;
        }

        let resolved = match &self.current {
            Some(_) if self.is_stale() && self.sensor_weighted.is_some() => {
                self.sensor_weighted.clone()
            }
            Some(current) => Some(current.clone()),
            None => self
                .cached_within_ttl(now)
                .or_else(|| self.derived(field, now)),
        };

        let source = resolved.as_ref().map(|candidate| candidate.source);
        if source != self.last_source {
            match source {
                Some(source) => self
                    .logger
                    .record(&format!("epicenter now from {}", source.tag())),
                None => self.logger.record("no epicenter available"),
            }
            self.last_source = source;
        }
        resolved
    }
}

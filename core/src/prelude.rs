use serde::{Deserialize, Serialize};

use crate::color::PaletteName;
use crate::interface::Domain;

pub const MIN_IDW_POWER: f64 = 0.5;
pub const MAX_IDW_POWER: f64 = 5.0;
/// Shortest sensor-weighted refresh period accepted.
pub const MIN_REFRESH_PERIOD_SECS: f64 = 1e-3;

/// Shared configuration for the rendering stages and the resolver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub domain: Domain,
    /// Physical clamp applied to every interpolated value.
    pub clamp_min: f64,
    pub clamp_max: f64,
    pub power: f64,
    /// Nearest samples blended per target cell.
    pub neighbors: usize,
    /// Cap on the linear scan used when the index block is too sparse.
    pub fallback_scan: usize,
    /// Index cell size as a fraction of the smaller domain dimension.
    pub cell_fraction: f64,
    pub min_samples: usize,
    pub upsample: usize,
    pub palette: PaletteName,
    pub opacity: f64,
    pub heatmap_enabled: bool,
    pub epicenter_enabled: bool,
    pub epicenter: ResolverConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            domain: Domain::default(),
            clamp_min: 30.0,
            clamp_max: 120.0,
            power: 2.0,
            neighbors: 4,
            fallback_scan: 50,
            cell_fraction: 0.1,
            min_samples: 3,
            upsample: 4,
            palette: PaletteName::default(),
            opacity: 0.6,
            heatmap_enabled: true,
            epicenter_enabled: true,
            epicenter: ResolverConfig::default(),
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> StageResult<()> {
        self.domain.validate()?;
        if !(self.clamp_min.is_finite() && self.clamp_max.is_finite())
            || self.clamp_min > self.clamp_max
        {
            return Err(StageError::InvalidConfig(format!(
                "clamp range [{}, {}] is not ordered",
                self.clamp_min, self.clamp_max
            )));
        }
        validate_power(self.power)?;
        validate_opacity(self.opacity)?;
        if self.neighbors == 0 {
            return Err(StageError::InvalidConfig("neighbors must be at least 1".into()));
        }
        if !(self.cell_fraction.is_finite() && self.cell_fraction > 0.0) {
            return Err(StageError::InvalidConfig(format!(
                "cell fraction must be positive, got {}",
                self.cell_fraction
            )));
        }
        if self.upsample == 0 {
            return Err(StageError::InvalidConfig("upsample factor must be at least 1".into()));
        }
        self.epicenter.validate()
    }
}

pub fn validate_power(power: f64) -> StageResult<()> {
    if !(MIN_IDW_POWER..=MAX_IDW_POWER).contains(&power) {
        return Err(StageError::InvalidConfig(format!(
            "IDW power {} outside [{}, {}]",
            power, MIN_IDW_POWER, MAX_IDW_POWER
        )));
    }
    Ok(())
}

pub fn validate_opacity(opacity: f64) -> StageResult<()> {
    if !(0.0..=1.0).contains(&opacity) {
        return Err(StageError::InvalidConfig(format!(
            "opacity {} outside [0, 1]",
            opacity
        )));
    }
    Ok(())
}

/// Which derived source is consulted first once the authoritative ones fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackPolicy {
    #[default]
    FieldPeakFirst,
    SensorWeightedFirst,
}

/// Tuning for the epicenter resolver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Ambient floor subtracted before sensor weighting.
    pub baseline: f64,
    pub cache_ttl_secs: f64,
    /// Consecutive identical authoritative updates before it is considered stalled.
    pub staleness_threshold: u32,
    pub refresh_period_secs: f64,
    pub bounds_tolerance: f64,
    /// Decimal places kept when comparing authoritative positions.
    pub position_precision: u32,
    pub policy: FallbackPolicy,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            baseline: 40.0,
            cache_ttl_secs: 60.0,
            staleness_threshold: 3,
            refresh_period_secs: 5.0,
            bounds_tolerance: 1e-4,
            position_precision: 4,
            policy: FallbackPolicy::default(),
        }
    }
}

impl ResolverConfig {
    pub fn validate(&self) -> StageResult<()> {
        if !(self.refresh_period_secs.is_finite()
            && self.refresh_period_secs >= MIN_REFRESH_PERIOD_SECS)
        {
            return Err(StageError::InvalidConfig(format!(
                "refresh period must be at least {} s, got {}",
                MIN_REFRESH_PERIOD_SECS, self.refresh_period_secs
            )));
        }
        if !(self.cache_ttl_secs.is_finite() && self.cache_ttl_secs >= 0.0) {
            return Err(StageError::InvalidConfig(format!(
                "cache TTL must be non-negative, got {}",
                self.cache_ttl_secs
            )));
        }
        if !(self.bounds_tolerance.is_finite() && self.bounds_tolerance >= 0.0) {
            return Err(StageError::InvalidConfig("bounds tolerance must be non-negative".into()));
        }
        if self.position_precision > 12 {
            return Err(StageError::InvalidConfig(format!(
                "position precision {} too fine",
                self.position_precision
            )));
        }
        Ok(())
    }
}

/// Common error type for stage execution.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum StageError {
    #[error("buffer exhaustion: {0}")]
    BufferExhaustion(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("invalid config: {0}")]
    InvalidConfig(String),
    #[error("internal failure: {0}")]
    Internal(String),
}

pub type StageResult<T> = Result<T, StageError>;

/// A rendering stage with an explicit configure / run / release lifecycle.
pub trait ProcessingStage {
    type Input;
    type Output;

    fn initialize(&mut self, config: &PipelineConfig) -> StageResult<()>;
    fn execute(&mut self, input: Self::Input) -> StageResult<Self::Output>;
    fn cleanup(&mut self);
}

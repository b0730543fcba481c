//! Explicit pipeline state, advanced one inbound event at a time.
//!
//! Every event runs synchronously to completion: the rendering chain
//! (interpolate, smooth, colorize) and the epicenter resolver are re-run as
//! needed and the results replace the previous ones wholesale.

use std::sync::Arc;

use serde::Serialize;

use crate::color::PaletteName;
use crate::epicenter::EpicenterResolver;
use crate::ingest::{ingest_update, SensorLayout};
use crate::interface::{
    AuthoritativeMessage, DenseField, EpicenterCandidate, RenderableRaster, SamplePoint,
    SensorUpdate, SmoothedRaster, Timestamp,
};
use crate::prelude::{validate_opacity, PipelineConfig, ProcessingStage, StageResult};
use crate::processing::{ColorizeJob, Colorizer, FieldInterpolator, FieldSmoother};
use crate::telemetry::{LogManager, MetricsRecorder, MetricsSnapshot};

const SMOOTHER_POOL_SIZE: usize = 2;

/// Inbound signals understood by [`PipelineState::apply`].
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineEvent {
    /// Full replacement of the sample set.
    SensorUpdate(SensorUpdate),
    /// Latest authoritative push; `None` when the source reported nothing.
    Authoritative(Option<AuthoritativeMessage>),
    HeatmapEnabled(bool),
    EpicenterEnabled(bool),
    Palette(PaletteName),
    Opacity(f64),
    Power(f64),
    /// The sensor-weighted refresh deadline has passed.
    RefreshTimer,
}

impl PipelineEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineEvent::SensorUpdate(_) => "sensor_update",
            PipelineEvent::Authoritative(_) => "authoritative",
            PipelineEvent::HeatmapEnabled(_) => "heatmap_enabled",
            PipelineEvent::EpicenterEnabled(_) => "epicenter_enabled",
            PipelineEvent::Palette(_) => "palette",
            PipelineEvent::Opacity(_) => "opacity",
            PipelineEvent::Power(_) => "power",
            PipelineEvent::RefreshTimer => "refresh_timer",
        }
    }
}

/// What a host renders after an event.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PipelineSnapshot {
    pub generation: u64,
    #[serde(skip)]
    pub raster: Option<Arc<RenderableRaster>>,
    pub epicenter: Option<EpicenterCandidate>,
    pub metrics: MetricsSnapshot,
}

pub struct PipelineState {
    config: PipelineConfig,
    layout: SensorLayout,
    samples: Arc<[SamplePoint]>,
    generation: u64,
    interpolator: FieldInterpolator,
    smoother: FieldSmoother,
    colorizer: Colorizer,
    field: Option<Arc<DenseField>>,
    smoothed: Option<SmoothedRaster>,
    raster: Option<Arc<RenderableRaster>>,
    resolver: EpicenterResolver,
    epicenter: Option<EpicenterCandidate>,
    metrics: Arc<MetricsRecorder>,
    logger: LogManager,
}

impl PipelineState {
    pub fn new(config: PipelineConfig, layout: SensorLayout, now: Timestamp) -> StageResult<Self> {
        config.validate()?;

        let mut interpolator = FieldInterpolator::new();
        interpolator.initialize(&config)?;
        let mut smoother = FieldSmoother::new(SMOOTHER_POOL_SIZE);
        smoother.initialize(&config)?;
        let mut colorizer = Colorizer::new();
        colorizer.initialize(&config)?;

        let mut resolver = EpicenterResolver::new(config.epicenter.clone(), config.domain)?;
        resolver.set_enabled(config.epicenter_enabled, now);

        let mut state = Self {
            config,
            layout,
            samples: Arc::from(Vec::new()),
            generation: 0,
            interpolator,
            smoother,
            colorizer,
            field: None,
            smoothed: None,
            raster: None,
            resolver,
            epicenter: None,
            metrics: Arc::new(MetricsRecorder::new()),
            logger: LogManager::new("pipeline"),
        };
        state.refresh_sensor_weighted(now);
        state.resolve_epicenter(now);
        Ok(state)
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn samples(&self) -> &Arc<[SamplePoint]> {
        &self.samples
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn field(&self) -> Option<&DenseField> {
        self.field.as_deref()
    }

    pub fn raster(&self) -> Option<&Arc<RenderableRaster>> {
        self.raster.as_ref()
    }

    pub fn epicenter(&self) -> Option<&EpicenterCandidate> {
        self.epicenter.as_ref()
    }

    pub fn resolver(&self) -> &EpicenterResolver {
        &self.resolver
    }

    pub fn metrics(&self) -> Arc<MetricsRecorder> {
        Arc::clone(&self.metrics)
    }

    pub fn next_refresh_due(&self) -> Option<Timestamp> {
        self.resolver.next_refresh_due()
    }

    pub fn snapshot(&self) -> PipelineSnapshot {
        PipelineSnapshot {
            generation: self.generation,
            raster: self.raster.clone(),
            epicenter: self.epicenter.clone(),
            metrics: self.metrics.snapshot(),
        }
    }

    /// Applies one event at wall-clock time `now`.
    ///
    /// Rejected parameter changes leave the previous value in place. Rendering
    /// failures clear the raster and are returned; the state stays usable.
    pub fn apply(&mut self, event: PipelineEvent, now: Timestamp) -> StageResult<()> {
        self.metrics.record_cycle();
        let result = match event {
            PipelineEvent::SensorUpdate(update) => self.on_sensor_update(&update, now),
            PipelineEvent::Authoritative(message) => {
                self.on_authoritative(message.as_ref(), now);
                Ok(())
            }
            PipelineEvent::HeatmapEnabled(enabled) => self.on_heatmap_enabled(enabled, now),
            PipelineEvent::EpicenterEnabled(enabled) => {
                self.on_epicenter_enabled(enabled, now);
                Ok(())
            }
            PipelineEvent::Palette(palette) => self.on_palette(palette),
            PipelineEvent::Opacity(opacity) => self.on_opacity(opacity),
            PipelineEvent::Power(power) => self.on_power(power, now),
            PipelineEvent::RefreshTimer => {
                self.on_refresh_timer(now);
                Ok(())
            }
        };
        if let Err(err) = &result {
            self.logger.warn(&format!("event rejected: {}", err));
        }
        result
    }

    fn on_sensor_update(&mut self, update: &SensorUpdate, now: Timestamp) -> StageResult<()> {
        let outcome = ingest_update(
            update,
            &self.layout,
            &self.config.domain,
            self.config.epicenter.bounds_tolerance,
            now,
        );
        if !outcome.dropped.is_empty() {
            self.metrics.record_dropped(outcome.dropped.len());
        }
        self.samples = Arc::from(outcome.samples);
        self.generation += 1;

        let rendered = self.render_heatmap();
        self.resolve_epicenter(now);
        rendered
    }

    fn on_authoritative(&mut self, message: Option<&AuthoritativeMessage>, now: Timestamp) {
        self.resolver.observe_authoritative(message, now);
        self.resolve_epicenter(now);
    }

    fn on_heatmap_enabled(&mut self, enabled: bool, now: Timestamp) -> StageResult<()> {
        if enabled == self.config.heatmap_enabled {
            return Ok(());
        }
        self.config.heatmap_enabled = enabled;
        let rendered = if enabled {
            self.render_heatmap()
        } else {
            self.clear_heatmap();
            Ok(())
        };
        self.resolve_epicenter(now);
        rendered
    }

    fn on_epicenter_enabled(&mut self, enabled: bool, now: Timestamp) {
        self.config.epicenter_enabled = enabled;
        self.resolver.set_enabled(enabled, now);
        self.refresh_sensor_weighted(now);
        self.resolve_epicenter(now);
    }

    fn on_palette(&mut self, palette: PaletteName) -> StageResult<()> {
        self.colorizer.set_palette(palette)?;
        self.config.palette = palette;
        self.recolor()
    }

    fn on_opacity(&mut self, opacity: f64) -> StageResult<()> {
        validate_opacity(opacity)?;
        self.colorizer.set_opacity(opacity)?;
        self.config.opacity = opacity;
        self.recolor()
    }

    fn on_power(&mut self, power: f64, now: Timestamp) -> StageResult<()> {
        self.interpolator.set_power(power)?;
        self.config.power = power;
        let rendered = self.render_heatmap();
        self.resolve_epicenter(now);
        rendered
    }

    fn on_refresh_timer(&mut self, now: Timestamp) {
        if self.refresh_sensor_weighted(now) {
            self.resolve_epicenter(now);
        }
    }

    fn refresh_sensor_weighted(&mut self, now: Timestamp) -> bool {
        self.resolver.poll_refresh(&self.samples, now)
    }

    fn clear_heatmap(&mut self) {
        self.field = None;
        self.smoothed = None;
        self.raster = None;
    }

    /// Re-runs the full rendering chain on the current sample set.
    fn render_heatmap(&mut self) -> StageResult<()> {
        self.clear_heatmap();
        if !self.config.heatmap_enabled {
            return Ok(());
        }

        let Some(field) = self.interpolator.execute(Arc::clone(&self.samples))? else {
            self.metrics.record_empty_field();
            return Ok(());
        };
        let field = Arc::new(field);
        let smoothed = self.smoother.execute(Arc::clone(&field))?;
        self.field = Some(field);
        self.smoothed = Some(smoothed);
        self.recolor()
    }

    /// Re-colors the last smoothed grid without recomputing the field.
    fn recolor(&mut self) -> StageResult<()> {
        let Some(smoothed) = self.smoothed.clone() else {
            return Ok(());
        };
        let raster = self.colorizer.execute(ColorizeJob {
            raster: smoothed,
            generation: self.generation,
        })?;
        if raster.is_some() {
            self.metrics.record_rendered();
        }
        self.raster = raster.map(Arc::new);
        Ok(())
    }

    fn resolve_epicenter(&mut self, now: Timestamp) {
        let field = if self.config.heatmap_enabled && self.raster.is_some() {
            self.field.as_deref()
        } else {
            None
        };
        self.epicenter = self.resolver.resolve(field, now);
    }
}

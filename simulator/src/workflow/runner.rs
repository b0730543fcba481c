use crate::generator::profile::SceneGenerator;
use crate::workflow::config::WorkflowConfig;
use anyhow::Context;
use noisecore::driver::{self, DriverClock};
use noisecore::interface::{AuthoritativeMessage, EpicenterCandidate, NoiseLevel, SensorUpdate};
use noisecore::math::StatsHelper;
use noisecore::telemetry::MetricsSnapshot;
use noisecore::{PipelineEvent, PipelineSnapshot, PipelineState};
use std::future::Future;
use std::time::Duration;

const EVENT_QUEUE: usize = 64;

pub struct HottestSensor {
    pub id: String,
    pub value: f64,
    pub level: NoiseLevel,
}

pub struct WorkflowResult {
    /// Raw readings in the batch, before validation.
    pub readings: usize,
    pub samples: usize,
    pub raster_dims: Option<(usize, usize)>,
    pub value_range: Option<(f64, f64)>,
    pub epicenter: Option<EpicenterCandidate>,
    pub hottest: Option<HottestSensor>,
    pub mean_db: Option<f64>,
    pub metrics: MetricsSnapshot,
}

#[derive(Clone)]
pub struct Runner {
    config: WorkflowConfig,
}

impl Runner {
    pub fn new(config: WorkflowConfig) -> Self {
        Self { config }
    }

    pub fn generator(&self) -> SceneGenerator {
        SceneGenerator::new(self.config.generator.clone(), &self.config.pipeline.domain)
    }

    /// One synchronous pass: ingest, render, resolve, then a sensor-weighted refresh.
    pub fn execute(
        &self,
        update: &SensorUpdate,
        authoritative: Option<AuthoritativeMessage>,
    ) -> anyhow::Result<WorkflowResult> {
        let pipeline_config = self.config.to_pipeline_config()?;
        let refresh_at = pipeline_config.epicenter.refresh_period_secs;
        let mut state = PipelineState::new(pipeline_config, self.config.sensor_layout(), 0.0)
            .context("initializing pipeline")?;

        state
            .apply(PipelineEvent::SensorUpdate(update.clone()), 0.0)
            .context("applying sensor update")?;
        state
            .apply(PipelineEvent::Authoritative(authoritative), 0.0)
            .context("applying authoritative estimate")?;
        state
            .apply(PipelineEvent::RefreshTimer, refresh_at)
            .context("refreshing sensor-weighted estimate")?;

        let hottest = StatsHelper::loudest(state.samples()).map(|sample| HottestSensor {
            id: sample.id.clone(),
            value: sample.value,
            level: NoiseLevel::classify(sample.value),
        });
        let mean_db = StatsHelper::mean(state.samples().iter().map(|sample| sample.value));
        let raster = state.raster();
        Ok(WorkflowResult {
            readings: update.readings.len(),
            samples: state.samples().len(),
            raster_dims: raster.map(|raster| (raster.cols, raster.rows)),
            value_range: raster.map(|raster| raster.value_range),
            epicenter: state.epicenter().cloned(),
            hottest,
            mean_db,
            metrics: state.metrics().snapshot(),
        })
    }

    /// Feeds synthetic batches to the async driver until `shutdown` resolves.
    pub async fn serve<F>(&self, clock: DriverClock, shutdown: F) -> anyhow::Result<PipelineSnapshot>
    where
        F: Future<Output = ()>,
    {
        let pipeline_config = self.config.to_pipeline_config()?;
        let state = PipelineState::new(pipeline_config, self.config.sensor_layout(), clock.now())
            .context("initializing pipeline")?;
        let handle = driver::spawn(state, clock, EVENT_QUEUE);
        let mut generator = self.generator();
        let mut ticker = tokio::time::interval(Duration::from_secs_f64(self.config.tick_secs.max(0.01)));
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = ticker.tick() => {
                    let now = clock.now();
                    let update = generator.sensor_update(now)?;
                    handle
                        .send(PipelineEvent::SensorUpdate(update))
                        .await
                        .context("sending sensor batch")?;
                    if let Some(message) = generator.authoritative(now) {
                        handle
                            .send(PipelineEvent::Authoritative(Some(message)))
                            .await
                            .context("sending authoritative estimate")?;
                    }
                    let latest = handle.latest();
                    if let Some(epicenter) = &latest.epicenter {
                        log::info!(
                            "generation {} epicenter ({:.2}, {:.2}) from {}",
                            latest.generation,
                            epicenter.position.x,
                            epicenter.position.y,
                            epicenter.source.tag()
                        );
                    }
                }
            }
        }

        handle.shutdown().await.context("stopping pipeline driver")
    }
}

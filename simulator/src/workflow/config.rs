use crate::generator::profile::{build_layout, GeneratorConfig};
use anyhow::Context;
use noisecore::color::PaletteName;
use noisecore::ingest::SensorLayout;
use noisecore::prelude::PipelineConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

fn default_tick_secs() -> f64 {
    1.0
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WorkflowConfig {
    #[serde(default)]
    pub pipeline: PipelineConfig,
    /// Sensor mounting points; generated from `generator` when absent.
    #[serde(default)]
    pub layout: Option<SensorLayout>,
    #[serde(default)]
    pub generator: GeneratorConfig,
    /// Seconds between synthetic batches in live mode.
    #[serde(default = "default_tick_secs")]
    pub tick_secs: f64,
}

impl WorkflowConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path_ref = path.as_ref();
        let contents = fs::read_to_string(path_ref)
            .with_context(|| format!("reading workflow config {}", path_ref.display()))?;
        let config: WorkflowConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("parsing workflow config {}", path_ref.display()))?;
        Ok(config)
    }

    pub fn from_args(cols: usize, rows: usize, power: f64, palette: PaletteName, seed: u64) -> Self {
        let mut pipeline = PipelineConfig::default();
        pipeline.domain.cols = cols;
        pipeline.domain.rows = rows;
        pipeline.power = power;
        pipeline.palette = palette;
        Self {
            pipeline,
            layout: None,
            generator: GeneratorConfig {
                seed,
                ..GeneratorConfig::default()
            },
            tick_secs: default_tick_secs(),
        }
    }

    pub fn to_pipeline_config(&self) -> anyhow::Result<PipelineConfig> {
        self.pipeline
            .validate()
            .context("validating pipeline section")?;
        Ok(self.pipeline.clone())
    }

    pub fn sensor_layout(&self) -> SensorLayout {
        self.layout
            .clone()
            .unwrap_or_else(|| build_layout(&self.generator, &self.pipeline.domain))
    }
}

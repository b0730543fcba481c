use std::sync::Arc;

use ndarray::Array2;

use crate::interface::{DenseField, Domain, Position, SamplePoint};
use crate::prelude::{
    validate_power, PipelineConfig, ProcessingStage, StageError, StageResult,
};
use crate::processing::spatial_index::{compare_samples, SpatialIndex};
use crate::telemetry::log::LogManager;

/// Distances are floored here so a target sitting on a sensor stays finite.
pub const MIN_DISTANCE: f64 = 0.01;

/// Index block searched around each target before falling back to a scan.
const QUERY_RADIUS_CELLS: u32 = 1;

/// Parameters for one inverse-distance-weighting pass.
#[derive(Debug, Clone, PartialEq)]
pub struct IdwParams {
    pub domain: Domain,
    pub power: f64,
    pub neighbors: usize,
    pub fallback_scan: usize,
    pub cell_fraction: f64,
    pub min_samples: usize,
    pub clamp: (f64, f64),
}

impl IdwParams {
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            domain: config.domain,
            power: config.power,
            neighbors: config.neighbors,
            fallback_scan: config.fallback_scan,
            cell_fraction: config.cell_fraction,
            min_samples: config.min_samples,
            clamp: (config.clamp_min, config.clamp_max),
        }
    }

    fn cell_size(&self) -> f64 {
        self.domain.min_dimension() * self.cell_fraction
    }
}

/// Inverse-distance weight for one neighbor; non-finite weights count as zero.
#[inline]
pub fn idw_weight(distance: f64, power: f64) -> f64 {
    if distance.is_nan() {
        return 0.0;
    }
    let weight = 1.0 / distance.max(MIN_DISTANCE).powf(power);
    if weight.is_finite() {
        weight
    } else {
        0.0
    }
}

/// Up to `k` samples nearest to `target`, nearest first.
///
/// Ties are broken on sample content so the selection never depends on the
/// order the samples arrived in.
pub fn nearest_neighbors(
    index: &SpatialIndex<'_>,
    target: &Position,
    k: usize,
    fallback_scan: usize,
) -> Vec<(usize, f64)> {
    let samples = index.samples();
    let mut candidates = index.query(target, QUERY_RADIUS_CELLS);
    if candidates.len() < k {
        candidates.extend_from_slice(index.scan_prefix(fallback_scan));
        candidates.sort_unstable();
        candidates.dedup();
    }

    let mut ranked: Vec<(usize, f64)> = candidates
        .into_iter()
        .map(|idx| (idx, samples[idx].position.distance(target)))
        .collect();
    ranked.sort_by(|a, b| {
        a.1.total_cmp(&b.1)
            .then_with(|| compare_samples(&samples[a.0], &samples[b.0]))
    });
    ranked.truncate(k);
    ranked
}

/// Weighted mean of the neighbors' values, or `None` when no weight survives.
///
/// Accumulates deviations from the first neighbor, which keeps a uniform
/// neighborhood exact.
fn blend(samples: &[SamplePoint], neighbors: &[(usize, f64)], power: f64) -> Option<f64> {
    let (first, _) = neighbors.first()?;
    let anchor = samples[*first].value;
    let mut weight_sum = 0.0;
    let mut deviation_sum = 0.0;
    for &(idx, distance) in neighbors {
        let weight = idw_weight(distance, power);
        let deviation = samples[idx].value - anchor;
        if weight == 0.0 || !deviation.is_finite() {
            continue;
        }
        weight_sum += weight;
        deviation_sum += weight * deviation;
    }
    if weight_sum > 0.0 && weight_sum.is_finite() {
        Some(anchor + deviation_sum / weight_sum)
    } else {
        None
    }
}

/// Interpolate the sample set onto the domain raster.
///
/// Returns `Ok(None)` when there are too few samples or a cell ends up with no
/// usable weight; callers must not render in that case.
pub fn interpolate(samples: &[SamplePoint], params: &IdwParams) -> StageResult<Option<DenseField>> {
    if samples.is_empty() || samples.len() < params.min_samples {
        return Ok(None);
    }

    let index = SpatialIndex::build(samples, params.cell_size());
    let xs = params.domain.x_axis();
    let ys = params.domain.y_axis();
    let (clamp_min, clamp_max) = params.clamp;

    let mut values = Vec::with_capacity(xs.len() * ys.len());
    for &y in &ys {
        for &x in &xs {
            let target = Position::new(x, y);
            let neighbors =
                nearest_neighbors(&index, &target, params.neighbors, params.fallback_scan);
            match blend(samples, &neighbors, params.power) {
                Some(value) => values.push(value.clamp(clamp_min, clamp_max)),
                None => return Ok(None),
            }
        }
    }

    let values = Array2::from_shape_vec((ys.len(), xs.len()), values)
        .map_err(|err| StageError::Internal(format!("field shape: {}", err)))?;
    Ok(Some(DenseField { xs, ys, values }))
}

/// Stage wrapper holding the live-tunable IDW parameters.
pub struct FieldInterpolator {
    params: Option<IdwParams>,
    logger: LogManager,
}

impl FieldInterpolator {
    pub fn new() -> Self {
        Self {
            params: None,
            logger: LogManager::new("interpolate"),
        }
    }

    pub fn set_power(&mut self, power: f64) -> StageResult<()> {
        validate_power(power)?;
        let params = self
            .params
            .as_mut()
            .ok_or_else(|| StageError::Internal("stage not initialized".into()))?;
        params.power = power;
        Ok(())
    }

    pub fn power(&self) -> Option<f64> {
        self.params.as_ref().map(|params| params.power)
    }
}

impl Default for FieldInterpolator {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessingStage for FieldInterpolator {
    type Input = Arc<[SamplePoint]>;
    type Output = Option<DenseField>;

    fn initialize(&mut self, config: &PipelineConfig) -> StageResult<()> {
        validate_power(config.power)?;
        self.params = Some(IdwParams::from_config(config));
        Ok(())
    }

    fn execute(&mut self, input: Self::Input) -> StageResult<Self::Output> {
        let params = self
            .params
            .as_ref()
            .ok_or_else(|| StageError::Internal("stage not initialized".into()))?;

        let field = interpolate(&input, params)?;
        match &field {
            Some(field) => self.logger.debug(&format!(
                "interpolated {} samples onto {}x{} at power {:.2}",
                input.len(),
                field.cols(),
                field.rows(),
                params.power
            )),
            None => self.logger.record(&format!(
                "no field from {} samples (minimum {})",
                input.len(),
                params.min_samples
            )),
        }
        Ok(field)
    }

    fn cleanup(&mut self) {
        self.params = None;
    }
}

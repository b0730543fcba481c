use std::sync::Arc;

use ndarray::{Array2, ArrayView2};

use crate::interface::{DenseField, SmoothedRaster};
use crate::math::stats::StatsHelper;
use crate::prelude::{PipelineConfig, ProcessingStage, StageError, StageResult};
use crate::processing::buffer_pool::BufferPool;
use crate::telemetry::log::LogManager;

const KERNEL: [[f64; 3]; 3] = [[1.0, 2.0, 1.0], [2.0, 4.0, 2.0], [1.0, 2.0, 1.0]];

/// Maps fine index `i` of `fine` onto the coarse axis of length `coarse`.
///
/// Returns the lower coarse index and the fractional offset toward the next one.
/// A fine cell landing exactly on a coarse line belongs to the lower-index cell.
#[inline]
fn coarse_coordinate(i: usize, fine: usize, coarse: usize) -> (usize, f64) {
    if coarse < 2 || fine < 2 {
        return (0, 0.0);
    }
    let source = i as f64 * (coarse - 1) as f64 / (fine - 1) as f64;
    let lower = (source.ceil() as usize).saturating_sub(1).min(coarse - 2);
    (lower, source - lower as f64)
}

/// Bilinear resample of `coarse` into a row-major `fine_rows × fine_cols` buffer.
pub fn upsample_bilinear(
    coarse: ArrayView2<'_, f64>,
    fine_rows: usize,
    fine_cols: usize,
    out: &mut [f64],
) -> StageResult<()> {
    let (rows, cols) = coarse.dim();
    if rows == 0 || cols == 0 {
        return Err(StageError::InvalidInput("cannot upsample an empty field".into()));
    }
    if out.len() != fine_rows * fine_cols {
        return Err(StageError::Internal(format!(
            "upsample buffer holds {} cells, expected {}",
            out.len(),
            fine_rows * fine_cols
        )));
    }

    let at = |r: usize, c: usize| coarse[[r.min(rows - 1), c.min(cols - 1)]];
    for fr in 0..fine_rows {
        let (r0, fy) = coarse_coordinate(fr, fine_rows, rows);
        for fc in 0..fine_cols {
            let (c0, fx) = coarse_coordinate(fc, fine_cols, cols);
            let top = at(r0, c0) * (1.0 - fx) + at(r0, c0 + 1) * fx;
            let bottom = at(r0 + 1, c0) * (1.0 - fx) + at(r0 + 1, c0 + 1) * fx;
            out[fr * fine_cols + fc] = top * (1.0 - fy) + bottom * fy;
        }
    }
    Ok(())
}

/// 3×3 binomial blur. Border cells renormalize over the taps that exist.
pub fn smooth_kernel(input: &[f64], rows: usize, cols: usize) -> Array2<f64> {
    Array2::from_shape_fn((rows, cols), |(r, c)| {
        let mut acc = 0.0;
        let mut weight = 0.0;
        for (dr, kernel_row) in KERNEL.iter().enumerate() {
            let Some(rr) = (r + dr).checked_sub(1).filter(|&rr| rr < rows) else {
                continue;
            };
            for (dc, &w) in kernel_row.iter().enumerate() {
                let Some(cc) = (c + dc).checked_sub(1).filter(|&cc| cc < cols) else {
                    continue;
                };
                acc += w * input[rr * cols + cc];
                weight += w;
            }
        }
        acc / weight
    })
}

/// Upsampling + smoothing stage producing the pixel-level grid.
pub struct FieldSmoother {
    pool: BufferPool<f64>,
    factor: Option<usize>,
    logger: LogManager,
}

impl FieldSmoother {
    pub fn new(pool_size: usize) -> Self {
        Self {
            pool: BufferPool::with_capacity(pool_size),
            factor: None,
            logger: LogManager::new("smooth"),
        }
    }
}

impl ProcessingStage for FieldSmoother {
    type Input = Arc<DenseField>;
    type Output = SmoothedRaster;

    fn initialize(&mut self, config: &PipelineConfig) -> StageResult<()> {
        if config.upsample == 0 {
            return Err(StageError::InvalidConfig("upsample factor must be at least 1".into()));
        }
        self.factor = Some(config.upsample);
        Ok(())
    }

    fn execute(&mut self, input: Self::Input) -> StageResult<Self::Output> {
        let factor = self
            .factor
            .ok_or_else(|| StageError::Internal("stage not initialized".into()))?;

        let fine_rows = input.rows() * factor;
        let fine_cols = input.cols() * factor;
        let mut scratch = self.pool.checkout(fine_rows * fine_cols)?;
        let upsampled = upsample_bilinear(input.values.view(), fine_rows, fine_cols, &mut scratch);
        let values = upsampled.map(|_| smooth_kernel(&scratch, fine_rows, fine_cols));
        self.pool.release(scratch);
        let values = values?;

        let (min, max) =
            StatsHelper::min_max(values.iter().copied()).unwrap_or((f64::NAN, f64::NAN));
        let raster = SmoothedRaster { values, min, max };
        if !raster.is_renderable() {
            self.logger
                .record(&format!("flat field at {:.2}, nothing to render", min));
        }
        Ok(raster)
    }

    fn cleanup(&mut self) {
        self.pool.reset();
        self.factor = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn field(values: Array2<f64>) -> Arc<DenseField> {
        let (rows, cols) = values.dim();
        Arc::new(DenseField {
            xs: (0..cols).map(|c| c as f64).collect(),
            ys: (0..rows).map(|r| r as f64).collect(),
            values,
        })
    }

    #[test]
    fn upsample_reproduces_corners_and_midpoints() {
        let coarse = array![[0.0, 10.0], [20.0, 30.0]];
        let mut out = vec![0.0; 9];
        upsample_bilinear(coarse.view(), 3, 3, &mut out).unwrap();
        assert_eq!(out[0], 0.0);
        assert_eq!(out[2], 10.0);
        assert_eq!(out[6], 20.0);
        assert_eq!(out[8], 30.0);
        assert_eq!(out[1], 5.0);
        assert_eq!(out[4], 15.0);
    }

    #[test]
    fn exact_coarse_lines_resolve_to_the_lower_cell() {
        assert_eq!(coarse_coordinate(0, 5, 3), (0, 0.0));
        assert_eq!(coarse_coordinate(1, 5, 3), (0, 0.5));
        assert_eq!(coarse_coordinate(2, 5, 3), (0, 1.0));
        assert_eq!(coarse_coordinate(3, 5, 3), (1, 0.5));
        assert_eq!(coarse_coordinate(4, 5, 3), (1, 1.0));

        let coarse = array![[0.0, 10.0, 20.0], [30.0, 40.0, 50.0], [60.0, 70.0, 80.0]];
        let mut out = vec![0.0; 25];
        upsample_bilinear(coarse.view(), 5, 5, &mut out).unwrap();
        assert_eq!(out[2 * 5 + 2], 40.0);
        assert_eq!(out[2 * 5 + 1], 35.0);
        assert_eq!(out[2 * 5 + 4], 50.0);
        assert_eq!(out[4 * 5 + 2], 70.0);
    }

    #[test]
    fn kernel_preserves_constant_grid_including_borders() {
        let input = vec![55.0; 12];
        let smoothed = smooth_kernel(&input, 3, 4);
        assert!(smoothed.iter().all(|&v| (v - 55.0).abs() < 1e-12));
    }

    #[test]
    fn kernel_weights_center_over_neighbors() {
        let mut input = vec![0.0; 9];
        input[4] = 16.0;
        let smoothed = smooth_kernel(&input, 3, 3);
        assert_eq!(smoothed[[1, 1]], 4.0);
        // Corner (0,0) sees taps (0,0),(0,1),(1,0),(1,1) with weights 4,2,2,1.
        assert_eq!(smoothed[[0, 0]], 16.0 / 9.0);
        assert_eq!(smoothed[[0, 1]], 2.0 * 16.0 / 12.0);
    }

    #[test]
    fn smoother_reports_range_and_flat_fields() {
        let mut stage = FieldSmoother::new(2);
        stage.initialize(&PipelineConfig::default()).unwrap();

        let raster = stage
            .execute(field(array![[40.0, 80.0], [60.0, 100.0]]))
            .unwrap();
        assert_eq!(raster.values.dim(), (8, 8));
        assert!(raster.is_renderable());
        assert!(raster.min >= 40.0 - 1e-9 && raster.max <= 100.0 + 1e-9);

        let flat = stage.execute(field(array![[70.0, 70.0], [70.0, 70.0]])).unwrap();
        assert!(!flat.is_renderable());
        stage.cleanup();
    }

    #[test]
    fn single_cell_field_upsamples_to_constant() {
        let mut stage = FieldSmoother::new(1);
        stage.initialize(&PipelineConfig::default()).unwrap();
        let raster = stage.execute(field(array![[64.0]])).unwrap();
        assert_eq!(raster.values.dim(), (4, 4));
        assert!(raster.values.iter().all(|&v| v == 64.0));
    }
}

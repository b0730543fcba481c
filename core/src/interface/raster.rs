use ndarray::Array2;
use serde::Serialize;

use crate::interface::domain::Position;

/// Straight (non-premultiplied) 8-bit RGBA.
pub type Rgba = [u8; 4];

/// Interpolated scalar grid covering the whole domain.
///
/// `values` is indexed `[row, col]`; row `r` sits at `ys[r]` and column `c`
/// at `xs[c]`.
#[derive(Debug, Clone, PartialEq)]
pub struct DenseField {
    pub xs: Vec<f64>,
    pub ys: Vec<f64>,
    pub values: Array2<f64>,
}

impl DenseField {
    pub fn cols(&self) -> usize {
        self.xs.len()
    }

    pub fn rows(&self) -> usize {
        self.ys.len()
    }

    pub fn value(&self, row: usize, col: usize) -> Option<f64> {
        self.values.get((row, col)).copied()
    }

    pub fn position(&self, row: usize, col: usize) -> Option<Position> {
        Some(Position::new(*self.xs.get(col)?, *self.ys.get(row)?))
    }

    /// Maximum cell, first in row-major order on ties.
    pub fn peak(&self) -> Option<(Position, f64)> {
        let mut best: Option<((usize, usize), f64)> = None;
        for ((row, col), &value) in self.values.indexed_iter() {
            if !value.is_finite() {
                continue;
            }
            match best {
                Some((_, current)) if value <= current => {}
                _ => best = Some(((row, col), value)),
            }
        }
        let ((row, col), value) = best?;
        Some((self.position(row, col)?, value))
    }
}

/// Spreads below this are float noise from resampling, not contrast.
pub const FLAT_TOLERANCE: f64 = 1e-9;

/// Upsampled and smoothed grid ready for normalization.
#[derive(Debug, Clone, PartialEq)]
pub struct SmoothedRaster {
    pub values: Array2<f64>,
    pub min: f64,
    pub max: f64,
}

impl SmoothedRaster {
    pub fn cols(&self) -> usize {
        self.values.ncols()
    }

    pub fn rows(&self) -> usize {
        self.values.nrows()
    }

    /// A flat field carries no contrast to map onto a palette.
    pub fn is_renderable(&self) -> bool {
        self.min.is_finite() && self.max.is_finite() && self.max - self.min > FLAT_TOLERANCE
    }

    pub fn normalize(&self, value: f64) -> f64 {
        (value - self.min) / (self.max - self.min)
    }
}

/// Colored raster handed to the presentation layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderableRaster {
    pub cols: usize,
    pub rows: usize,
    pub value_range: (f64, f64),
    /// Sample-set generation this raster was derived from.
    pub generation: u64,
    pixels: Vec<Rgba>,
}

impl RenderableRaster {
    pub fn new(
        cols: usize,
        rows: usize,
        value_range: (f64, f64),
        generation: u64,
        pixels: Vec<Rgba>,
    ) -> Self {
        debug_assert_eq!(pixels.len(), cols * rows);
        Self {
            cols,
            rows,
            value_range,
            generation,
            pixels,
        }
    }

    pub fn rgba_at(&self, row: usize, col: usize) -> Option<Rgba> {
        if row >= self.rows || col >= self.cols {
            return None;
        }
        self.pixels.get(row * self.cols + col).copied()
    }

    pub fn pixels(&self) -> &[Rgba] {
        &self.pixels
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn peak_prefers_first_maximum() {
        let field = DenseField {
            xs: vec![0.0, 1.0, 2.0],
            ys: vec![0.0, 5.0],
            values: array![[40.0, 70.0, 50.0], [70.0, 45.0, 41.0]],
        };
        let (position, value) = field.peak().unwrap();
        assert_eq!(position, Position::new(1.0, 0.0));
        assert_eq!(value, 70.0);
    }

    #[test]
    fn raster_lookup_is_bounds_checked() {
        let raster = RenderableRaster::new(2, 1, (40.0, 60.0), 3, vec![[0, 0, 0, 255], [9, 9, 9, 255]]);
        assert_eq!(raster.rgba_at(0, 1), Some([9, 9, 9, 255]));
        assert_eq!(raster.rgba_at(1, 0), None);
        assert_eq!(raster.pixels().len(), 2);
    }
}

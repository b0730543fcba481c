use serde::{Deserialize, Serialize};

use crate::prelude::{StageError, StageResult};

/// A point in physical domain units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    #[inline]
    pub fn distance_sq(&self, other: &Position) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }

    #[inline]
    pub fn distance(&self, other: &Position) -> f64 {
        self.distance_sq(other).sqrt()
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// Fixed monitored rectangle plus the coarse raster laid over it.
///
/// The origin sits at `(0, 0)` and the far corner at `(width, height)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Domain {
    pub width: f64,
    pub height: f64,
    pub cols: usize,
    pub rows: usize,
}

impl Default for Domain {
    fn default() -> Self {
        Self {
            width: 5.0,
            height: 14.0,
            cols: 50,
            rows: 50,
        }
    }
}

impl Domain {
    pub fn validate(&self) -> StageResult<()> {
        if !(self.width.is_finite() && self.width > 0.0) {
            return Err(StageError::InvalidConfig(format!(
                "domain width must be positive, got {}",
                self.width
            )));
        }
        if !(self.height.is_finite() && self.height > 0.0) {
            return Err(StageError::InvalidConfig(format!(
                "domain height must be positive, got {}",
                self.height
            )));
        }
        if self.cols == 0 || self.rows == 0 {
            return Err(StageError::InvalidConfig(format!(
                "raster must have at least one cell, got {}x{}",
                self.cols, self.rows
            )));
        }
        Ok(())
    }

    /// Bounds check that tolerates `tolerance` of drift past each edge.
    pub fn contains(&self, position: &Position, tolerance: f64) -> bool {
        position.is_finite()
            && position.x >= -tolerance
            && position.x <= self.width + tolerance
            && position.y >= -tolerance
            && position.y <= self.height + tolerance
    }

    pub fn clamp(&self, position: &Position) -> Position {
        Position {
            x: position.x.clamp(0.0, self.width),
            y: position.y.clamp(0.0, self.height),
        }
    }

    pub fn center(&self) -> Position {
        Position::new(self.width / 2.0, self.height / 2.0)
    }

    pub fn min_dimension(&self) -> f64 {
        self.width.min(self.height)
    }

    /// Inclusive, evenly spaced sample positions along `[0, extent]`.
    ///
    /// A single sample sits at the middle of the axis.
    pub fn axis(extent: f64, count: usize) -> Vec<f64> {
        match count {
            0 => Vec::new(),
            1 => vec![extent / 2.0],
            _ => {
                let step = extent / (count - 1) as f64;
                (0..count)
                    .map(|i| if i == count - 1 { extent } else { i as f64 * step })
                    .collect()
            }
        }
    }

    pub fn x_axis(&self) -> Vec<f64> {
        Self::axis(self.width, self.cols)
    }

    pub fn y_axis(&self) -> Vec<f64> {
        Self::axis(self.height, self.rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contains_absorbs_tolerance_at_edges() {
        let domain = Domain::default();
        assert!(domain.contains(&Position::new(5.00005, 14.0), 1e-4));
        assert!(!domain.contains(&Position::new(5.001, 7.0), 1e-4));
        assert!(!domain.contains(&Position::new(f64::NAN, 7.0), 1e-4));
    }

    #[test]
    fn axis_spans_full_extent() {
        let axis = Domain::axis(14.0, 8);
        assert_eq!(axis.len(), 8);
        assert_eq!(axis[0], 0.0);
        assert_eq!(axis[7], 14.0);
        assert_eq!(Domain::axis(5.0, 1), vec![2.5]);
    }

    #[test]
    fn validate_rejects_empty_raster() {
        let domain = Domain {
            cols: 0,
            ..Domain::default()
        };
        assert!(domain.validate().is_err());
    }
}

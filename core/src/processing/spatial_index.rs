use std::cmp::Ordering;
use std::collections::HashMap;

use crate::interface::{Position, SamplePoint};

/// Uniform bucket grid over a borrowed sample set.
///
/// Rebuilt from scratch for every sample set; never updated in place.
pub struct SpatialIndex<'a> {
    samples: &'a [SamplePoint],
    cell_size: f64,
    cells: HashMap<(i64, i64), Vec<usize>>,
    by_x: Vec<usize>,
}

impl<'a> SpatialIndex<'a> {
    pub fn build(samples: &'a [SamplePoint], cell_size: f64) -> Self {
        let cell_size = if cell_size.is_finite() && cell_size > 0.0 {
            cell_size
        } else {
            1.0
        };

        let mut cells: HashMap<(i64, i64), Vec<usize>> = HashMap::new();
        for (idx, sample) in samples.iter().enumerate() {
            cells
                .entry(cell_of(&sample.position, cell_size))
                .or_default()
                .push(idx);
        }

        let mut by_x: Vec<usize> = (0..samples.len()).collect();
        by_x.sort_by(|&a, &b| compare_samples(&samples[a], &samples[b]));

        Self {
            samples,
            cell_size,
            cells,
            by_x,
        }
    }

    pub fn samples(&self) -> &'a [SamplePoint] {
        self.samples
    }

    /// Indices of every sample in the `(2r+1)²` block around `position`'s cell.
    pub fn query(&self, position: &Position, radius_cells: u32) -> Vec<usize> {
        let (cx, cy) = cell_of(position, self.cell_size);
        let radius = radius_cells as i64;
        let mut found = Vec::new();
        for dy in -radius..=radius {
            for dx in -radius..=radius {
                if let Some(bucket) = self.cells.get(&(cx + dx, cy + dy)) {
                    found.extend_from_slice(bucket);
                }
            }
        }
        found
    }

    /// The first `limit` samples in ascending x order.
    pub fn scan_prefix(&self, limit: usize) -> &[usize] {
        &self.by_x[..limit.min(self.by_x.len())]
    }
}

fn cell_of(position: &Position, cell_size: f64) -> (i64, i64) {
    (
        (position.x / cell_size).floor() as i64,
        (position.y / cell_size).floor() as i64,
    )
}

/// Total order on samples by content, so ties never depend on input order.
pub(crate) fn compare_samples(a: &SamplePoint, b: &SamplePoint) -> Ordering {
    a.position
        .x
        .total_cmp(&b.position.x)
        .then_with(|| a.position.y.total_cmp(&b.position.y))
        .then_with(|| a.value.total_cmp(&b.value))
        .then_with(|| a.id.cmp(&b.id))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn samples() -> Vec<SamplePoint> {
        vec![
            SamplePoint::new("a", 0.2, 0.2, 40.0, 0.0),
            SamplePoint::new("b", 0.7, 0.3, 50.0, 0.0),
            SamplePoint::new("c", 4.8, 13.9, 60.0, 0.0),
            SamplePoint::new("d", 1.2, 0.1, 70.0, 0.0),
        ]
    }

    #[test]
    fn query_returns_block_around_cell() {
        let samples = samples();
        let index = SpatialIndex::build(&samples, 0.5);
        let mut near = index.query(&Position::new(0.1, 0.1), 1);
        near.sort_unstable();
        assert_eq!(near, vec![0, 1]);

        let mut wider = index.query(&Position::new(0.1, 0.1), 2);
        wider.sort_unstable();
        assert_eq!(wider, vec![0, 1, 3]);
    }

    #[test]
    fn scan_prefix_is_ordered_by_x_and_capped() {
        let samples = samples();
        let index = SpatialIndex::build(&samples, 0.5);
        assert_eq!(index.scan_prefix(2), &[0, 1]);
        assert_eq!(index.scan_prefix(10), &[0, 1, 3, 2]);
    }

    #[test]
    fn empty_index_answers_nothing() {
        let index = SpatialIndex::build(&[], 0.5);
        assert!(index.query(&Position::new(1.0, 1.0), 3).is_empty());
        assert!(index.scan_prefix(50).is_empty());
    }
}

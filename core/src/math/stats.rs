use crate::interface::{Position, SamplePoint};
use crate::processing::spatial_index::compare_samples;

pub struct StatsHelper;

impl StatsHelper {
    /// Smallest and largest finite value, or `None` if there are none.
    pub fn min_max(values: impl IntoIterator<Item = f64>) -> Option<(f64, f64)> {
        values
            .into_iter()
            .filter(|v| v.is_finite())
            .fold(None, |range, v| match range {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })
    }

    /// `Σ(w·p) / Σw`; `None` when the total weight is zero or not finite.
    pub fn weighted_centroid(points: impl IntoIterator<Item = (Position, f64)>) -> Option<Position> {
        let (mut sx, mut sy, mut total) = (0.0, 0.0, 0.0);
        for (position, weight) in points {
            if !(weight.is_finite() && weight > 0.0) || !position.is_finite() {
                continue;
            }
            sx += weight * position.x;
            sy += weight * position.y;
            total += weight;
        }
        if total > 0.0 && total.is_finite() {
            Some(Position::new(sx / total, sy / total))
        } else {
            None
        }
    }

    /// Arithmetic mean of the finite values.
    pub fn mean(values: impl IntoIterator<Item = f64>) -> Option<f64> {
        let (sum, count) = values
            .into_iter()
            .filter(|v| v.is_finite())
            .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
        (count > 0).then(|| sum / count as f64)
    }

    pub fn mean_position(points: impl IntoIterator<Item = Position>) -> Option<Position> {
        let (mut sx, mut sy, mut count) = (0.0, 0.0, 0usize);
        for position in points {
            sx += position.x;
            sy += position.y;
            count += 1;
        }
        (count > 0).then(|| Position::new(sx / count as f64, sy / count as f64))
    }

    /// Sample with the highest value; equal values resolve on content, not order.
    pub fn loudest(samples: &[SamplePoint]) -> Option<&SamplePoint> {
        samples
            .iter()
            .filter(|sample| !sample.value.is_nan())
            .max_by(|a, b| {
                a.value
                    .total_cmp(&b.value)
                    .then_with(|| compare_samples(b, a))
            })
    }
}

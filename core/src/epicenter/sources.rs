//! Epicenter estimates derived locally from the field and the raw samples.

use crate::interface::{
    DenseField, Domain, EpicenterCandidate, EpicenterSource, Position, SamplePoint, Timestamp,
};
use crate::math::stats::StatsHelper;

/// Loudest interpolated cell, if it lies inside the domain.
pub fn field_peak(
    field: &DenseField,
    domain: &Domain,
    tolerance: f64,
    now: Timestamp,
) -> Option<EpicenterCandidate> {
    let (position, _) = field.peak()?;
    domain
        .contains(&position, tolerance)
        .then(|| EpicenterCandidate::new(position, EpicenterSource::FieldPeak, now))
}

/// Excess-over-baseline weight; every sample keeps at least unit weight.
#[inline]
pub fn excess_weight(value: f64, baseline: f64) -> f64 {
    if value.is_nan() {
        return 0.0;
    }
    let weight = (value - baseline).max(1.0).powi(2);
    if weight.is_finite() {
        weight
    } else {
        0.0
    }
}

/// Centroid of the samples weighted by squared excess over `baseline`.
///
/// Falls back to the loudest sample, then to the mean position clamped into
/// the domain.
pub fn sensor_weighted(
    samples: &[SamplePoint],
    domain: &Domain,
    baseline: f64,
    tolerance: f64,
    now: Timestamp,
) -> Option<EpicenterCandidate> {
    if samples.is_empty() {
        return None;
    }

    let weighted = samples
        .iter()
        .map(|sample| (sample.position, excess_weight(sample.value, baseline)));
    if let Some(centroid) = StatsHelper::weighted_centroid(weighted) {
        if domain.contains(&centroid, tolerance) {
            return Some(EpicenterCandidate::new(
                centroid,
                EpicenterSource::SensorWeighted,
                now,
            ));
        }
    }

    if let Some(loudest) = StatsHelper::loudest(samples) {
        if domain.contains(&loudest.position, tolerance) {
            return Some(
                EpicenterCandidate::new(loudest.position, EpicenterSource::SensorWeighted, now)
                    .with_reference(loudest.id.clone()),
            );
        }
    }

    let mean = StatsHelper::mean_position(samples.iter().map(|sample| sample.position))?;
    let clamped: Position = domain.clamp(&mean);
    clamped
        .is_finite()
        .then(|| EpicenterCandidate::new(clamped, EpicenterSource::SensorWeighted, now))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn floor_plan() -> Domain {
        Domain {
            width: 5.0,
            height: 14.0,
            cols: 10,
            rows: 10,
        }
    }

    #[test]
    fn loud_outlier_dominates_the_centroid() {
        let samples = vec![
            SamplePoint::new("E1", 1.0, 1.0, 40.0, 0.0),
            SamplePoint::new("E2", 4.0, 1.0, 90.0, 0.0),
            SamplePoint::new("E3", 1.0, 13.0, 40.0, 0.0),
            SamplePoint::new("E4", 4.0, 13.0, 40.0, 0.0),
        ];
        let candidate = sensor_weighted(&samples, &floor_plan(), 40.0, 1e-4, 5.0).unwrap();
        assert_eq!(candidate.source, EpicenterSource::SensorWeighted);
        assert!((candidate.position.x - 4.0).abs() < 0.01);
        assert!((candidate.position.y - 1.0).abs() < 0.02);
        assert_eq!(candidate.computed_at, 5.0);
    }

    #[test]
    fn quiet_samples_weigh_equally() {
        let samples = vec![
            SamplePoint::new("a", 1.0, 2.0, 30.0, 0.0),
            SamplePoint::new("b", 3.0, 4.0, 35.0, 0.0),
        ];
        let candidate = sensor_weighted(&samples, &floor_plan(), 40.0, 1e-4, 0.0).unwrap();
        assert_eq!(candidate.position, Position::new(2.0, 3.0));
    }

    #[test]
    fn out_of_bounds_centroid_falls_back_to_loudest_then_mean() {
        let domain = floor_plan();
        // Unvalidated points outside the domain push the centroid out.
        let samples = vec![
            SamplePoint::new("far", 40.0, 1.0, 95.0, 0.0),
            SamplePoint::new("near", 2.0, 2.0, 60.0, 0.0),
        ];
        let candidate = sensor_weighted(&samples, &domain, 40.0, 1e-4, 0.0).unwrap();
        // Loudest is also outside, so the clamped mean wins.
        assert_eq!(candidate.position, Position::new(5.0, 1.5));
        assert_eq!(candidate.reference_sensor, None);

        let samples = vec![
            SamplePoint::new("far", 40.0, 1.0, 60.0, 0.0),
            SamplePoint::new("near", 2.0, 2.0, 95.0, 0.0),
            SamplePoint::new("farther", 60.0, 2.0, 94.0, 0.0),
        ];
        let candidate = sensor_weighted(&samples, &domain, 40.0, 1e-4, 0.0).unwrap();
        assert_eq!(candidate.position, Position::new(2.0, 2.0));
        assert_eq!(candidate.reference_sensor.as_deref(), Some("near"));
    }

    #[test]
    fn no_samples_no_candidate() {
        assert!(sensor_weighted(&[], &floor_plan(), 40.0, 1e-4, 0.0).is_none());
    }

    #[test]
    fn field_peak_uses_cell_coordinates() {
        let field = DenseField {
            xs: vec![0.0, 2.5, 5.0],
            ys: vec![0.0, 14.0],
            values: array![[40.0, 41.0, 42.0], [43.0, 88.0, 44.0]],
        };
        let candidate = field_peak(&field, &floor_plan(), 1e-4, 9.0).unwrap();
        assert_eq!(candidate.position, Position::new(2.5, 14.0));
        assert_eq!(candidate.source, EpicenterSource::FieldPeak);
    }

    #[test]
    fn excess_weight_floors_at_one() {
        assert_eq!(excess_weight(20.0, 40.0), 1.0);
        assert_eq!(excess_weight(50.0, 40.0), 100.0);
        assert_eq!(excess_weight(f64::NAN, 40.0), 0.0);
    }
}

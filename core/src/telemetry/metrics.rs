use std::sync::Mutex;

use serde::Serialize;

/// Point-in-time copy of the pipeline counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub cycles: usize,
    pub rendered: usize,
    pub empty_fields: usize,
    pub dropped_samples: usize,
    pub superseded_updates: usize,
}

/// Counters shared with the host, which may read them from another thread.
pub struct MetricsRecorder {
    inner: Mutex<MetricsSnapshot>,
}

impl MetricsRecorder {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(MetricsSnapshot::default()),
        }
    }

    fn update(&self, apply: impl FnOnce(&mut MetricsSnapshot)) {
        if let Ok(mut metrics) = self.inner.lock() {
            apply(&mut metrics);
        }
    }

    pub fn record_cycle(&self) {
        self.update(|m| m.cycles += 1);
    }

    pub fn record_rendered(&self) {
        self.update(|m| m.rendered += 1);
    }

    pub fn record_empty_field(&self) {
        self.update(|m| m.empty_fields += 1);
    }

    pub fn record_dropped(&self, count: usize) {
        self.update(|m| m.dropped_samples += count);
    }

    pub fn record_superseded(&self, count: usize) {
        self.update(|m| m.superseded_updates += count);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        self.inner.lock().map(|m| *m).unwrap_or_default()
    }
}

impl Default for MetricsRecorder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate() {
        let metrics = MetricsRecorder::new();
        metrics.record_cycle();
        metrics.record_cycle();
        metrics.record_dropped(3);
        metrics.record_superseded(1);
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.cycles, 2);
        assert_eq!(snapshot.dropped_samples, 3);
        assert_eq!(snapshot.superseded_updates, 1);
        assert_eq!(snapshot.rendered, 0);
    }
}

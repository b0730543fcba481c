use crate::interface::Timestamp;

/// Fixed-period recurring deadline that can be armed and cancelled.
///
/// The schedule does no waiting itself: whoever drives the pipeline asks for
/// [`next_due`](Self::next_due) and calls [`take_due`](Self::take_due) once that
/// time has passed.
#[derive(Debug, Clone, PartialEq)]
pub struct RefreshSchedule {
    period: f64,
    next_due: Option<Timestamp>,
}

impl RefreshSchedule {
    pub fn new(period: f64) -> Self {
        Self {
            period,
            next_due: None,
        }
    }

    /// Starts the schedule with its first firing due immediately.
    pub fn arm(&mut self, now: Timestamp) {
        if self.next_due.is_none() {
            self.next_due = Some(now);
        }
    }

    pub fn cancel(&mut self) {
        self.next_due = None;
    }

    pub fn is_armed(&self) -> bool {
        self.next_due.is_some()
    }

    pub fn next_due(&self) -> Option<Timestamp> {
        self.next_due
    }

    /// Consumes the pending firing if it is due, skipping any missed periods.
    pub fn take_due(&mut self, now: Timestamp) -> bool {
        let Some(due) = self.next_due else {
            return false;
        };
        if now < due {
            return false;
        }
        let missed = ((now - due) / self.period).floor() + 1.0;
        let mut next = due + missed * self.period;
        if next <= now {
            // Rounding at large timestamps can land on or before `now`.
            next = now + self.period.max(now.abs() * f64::EPSILON);
        }
        self.next_due = Some(next);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fires_immediately_then_every_period() {
        let mut schedule = RefreshSchedule::new(5.0);
        assert!(!schedule.take_due(0.0));

        schedule.arm(10.0);
        assert!(schedule.take_due(10.0));
        assert!(!schedule.take_due(14.9));
        assert!(schedule.take_due(15.0));
        assert_eq!(schedule.next_due(), Some(20.0));
    }

    #[test]
    fn missed_periods_collapse_into_one_firing() {
        let mut schedule = RefreshSchedule::new(5.0);
        schedule.arm(0.0);
        assert!(schedule.take_due(0.0));
        assert!(schedule.take_due(23.0));
        assert_eq!(schedule.next_due(), Some(25.0));
    }

    #[test]
    fn wall_clock_timestamps_advance_in_one_step() {
        let now = 1.76e9;
        let mut schedule = RefreshSchedule::new(1e-8);
        schedule.arm(now);
        assert!(schedule.take_due(now));
        assert!(schedule.next_due().unwrap() > now);

        let mut schedule = RefreshSchedule::new(1e-3);
        schedule.arm(0.0);
        assert!(schedule.take_due(0.0));
        assert!(schedule.take_due(86_400.0));
        let next = schedule.next_due().unwrap();
        assert!(next > 86_400.0 && next <= 86_400.0 + 1e-3 + 1e-9);
    }

    #[test]
    fn cancel_releases_the_deadline() {
        let mut schedule = RefreshSchedule::new(5.0);
        schedule.arm(0.0);
        schedule.cancel();
        assert!(!schedule.is_armed());
        assert!(!schedule.take_due(100.0));

        // Re-arming while armed keeps the pending deadline.
        schedule.arm(100.0);
        schedule.arm(103.0);
        assert_eq!(schedule.next_due(), Some(100.0));
    }
}

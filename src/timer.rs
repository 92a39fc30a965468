// src/timer.rs
//
// Coarse timers for the cooperative driver loop.
//
// Nothing here sleeps or spawns. The owner polls with the current clock time
// and the timer answers whether its work is due. Precision is whatever the
// polling cadence gives; sample accuracy is the renderer's job.

/// A repeating timer with a fixed period.
#[derive(Debug, Clone)]
pub struct Interval {
    period: f64,
    next_due: Option<f64>,
}

impl Interval {
    pub fn new(period: f64) -> Self {
        Self {
            period,
            next_due: None,
        }
    }

    #[inline]
    pub fn period(&self) -> f64 {
        self.period
    }

    #[inline]
    pub fn is_running(&self) -> bool {
        self.next_due.is_some()
    }

    /// Start firing. The first poll at or after `now` is due immediately.
    pub fn start(&mut self, now: f64) {
        self.next_due = Some(now);
    }

    pub fn stop(&mut self) {
        self.next_due = None;
    }

    /// Returns true once per elapsed period.
    ///
    /// A late poll fires once and re-arms relative to `now`; missed periods
    /// are not replayed.
    pub fn poll(&mut self, now: f64) -> bool {
        match self.next_due {
            Some(due) if now >= due => {
                let next = due + self.period;
                self.next_due = Some(if next <= now { now + self.period } else { next });
                true
            }
            _ => false,
        }
    }

    /// Time of the next firing, if running.
    #[inline]
    pub fn next_due(&self) -> Option<f64> {
        self.next_due
    }
}

/// A cancellable one-shot timer.
///
/// Arming an armed deadline replaces it rather than extending it.
#[derive(Debug, Clone, Default)]
pub struct Deadline {
    at: Option<f64>,
}

impl Deadline {
    pub fn new() -> Self {
        Self { at: None }
    }

    pub fn arm(&mut self, at: f64) {
        self.at = Some(at);
    }

    pub fn cancel(&mut self) {
        self.at = None;
    }

    #[inline]
    pub fn is_armed(&self) -> bool {
        self.at.is_some()
    }

    /// Whether `now` is strictly past the deadline, without consuming it.
    #[inline]
    pub fn has_expired(&self, now: f64) -> bool {
        matches!(self.at, Some(at) if now > at)
    }

    /// Returns true exactly once when `now` passes the deadline.
    pub fn poll(&mut self, now: f64) -> bool {
        if self.has_expired(now) {
            self.at = None;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interval_fires_once_per_period() {
        let mut interval = Interval::new(0.025);
        assert!(!interval.poll(0.0));

        interval.start(0.0);
        assert!(interval.poll(0.0));
        assert!(!interval.poll(0.01));
        assert!(interval.poll(0.025));
        assert!(!interval.poll(0.03));
        assert!(interval.poll(0.05));
    }

    #[test]
    fn test_interval_skips_missed_periods() {
        let mut interval = Interval::new(1.0);
        interval.start(0.0);
        assert!(interval.poll(0.0));
        assert!(interval.poll(5.5));
        assert!(!interval.poll(6.0));
        assert!(interval.poll(6.5));
    }

    #[test]
    fn test_interval_stop() {
        let mut interval = Interval::new(1.0);
        interval.start(0.0);
        interval.stop();
        assert!(!interval.poll(10.0));
    }

    #[test]
    fn test_deadline_rearm_replaces() {
        let mut deadline = Deadline::new();
        deadline.arm(5.0);
        deadline.arm(8.0);
        assert!(!deadline.poll(6.0));
        assert!(!deadline.poll(8.0));
        assert!(deadline.poll(8.001));
        assert!(!deadline.poll(9.0));
    }

    #[test]
    fn test_deadline_cancel() {
        let mut deadline = Deadline::new();
        deadline.arm(1.0);
        deadline.cancel();
        assert!(!deadline.poll(2.0));
    }
}

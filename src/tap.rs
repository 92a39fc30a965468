// src/tap.rs

use std::collections::VecDeque;

use log::debug;

use crate::tempo::clamp_bpm;
use crate::timer::Deadline;

/// Most recent taps kept for averaging.
pub const MAX_TAPS: usize = 5;

/// Silence after which the tap history is discarded (seconds).
pub const TAP_IDLE_RESET: f64 = 5.0;

/// Tap-based tempo estimator.
///
/// ```
/// use tempokeeper::TapTempo;
///
/// let mut taps = TapTempo::new();
/// assert_eq!(taps.tap(0.0), None);
/// assert_eq!(taps.tap(0.5), Some(120.0));
/// ```
#[derive(Debug, Clone)]
pub struct TapTempo {
    taps: VecDeque<f64>,
    idle_reset: Deadline,
    idle_after: f64,
}

impl TapTempo {
    pub fn new() -> Self {
        Self::with_idle_reset(TAP_IDLE_RESET)
    }

    pub fn with_idle_reset(idle_after: f64) -> Self {
        Self {
            taps: VecDeque::with_capacity(MAX_TAPS + 1),
            idle_reset: Deadline::new(),
            idle_after,
        }
    }

    /// Register a tap at `now` (seconds).
    ///
    /// Returns a clamped BPM once at least two taps are buffered.
    pub fn tap(&mut self, now: f64) -> Option<f64> {
        // A tap after the idle deadline starts a new burst even if nobody
        // polled the reset in between
        if self.idle_reset.has_expired(now) {
            self.reset();
        }

        if let Some(&last) = self.taps.back() {
            if now <= last {
                debug!("Non-increasing tap at {:.3}s, starting a new burst", now);
                self.taps.clear();
            }
        }

        self.taps.push_back(now);
        if self.taps.len() > MAX_TAPS {
            self.taps.pop_front();
        }
        self.idle_reset.arm(now + self.idle_after);

        let bpm = self.estimate()?;
        debug!("Tap tempo estimate {:.2} bpm from {} taps", bpm, self.taps.len());
        Some(bpm)
    }

    /// Current estimate without adding a tap.
    pub fn estimate(&self) -> Option<f64> {
        if self.taps.len() < 2 {
            return None;
        }

        let (first, last) = (self.taps.front()?, self.taps.back()?);
        // Mean of consecutive intervals telescopes to the total span
        let mean_interval = (last - first) / (self.taps.len() - 1) as f64;
        if mean_interval <= 0.0 {
            return None;
        }

        Some(clamp_bpm(60.0 / mean_interval))
    }

    /// Apply the idle reset if its deadline has passed.
    ///
    /// Returns true when the buffer was cleared.
    pub fn poll(&mut self, now: f64) -> bool {
        if self.idle_reset.poll(now) {
            debug!("Tap buffer idle, clearing {} taps", self.taps.len());
            self.taps.clear();
            true
        } else {
            false
        }
    }

    pub fn reset(&mut self) {
        self.taps.clear();
        self.idle_reset.cancel();
    }

    #[inline]
    pub fn tap_count(&self) -> usize {
        self.taps.len()
    }
}

impl Default for TapTempo {
    fn default() -> Self {
        Self::new()
    }
}

// src/practice/session.rs
//
// Per-session practice state.

use super::settings::{PulseUnit, pulse_rate};

/// Active practice time after which a break is suggested (seconds).
pub const FATIGUE_LIMIT: f64 = 30.0 * 60.0;

/// Consecutive failures that trigger a break suggestion.
pub const FAILS_BEFORE_BREAK: u32 = 3;

/// Mutable state of one practice run.
#[derive(Debug, Clone, PartialEq)]
pub struct PracticeSession {
    pub current_bpm: f64,
    pub current_pulse_unit: PulseUnit,
    pub correct_count: u32,
    pub consecutive_fails: u32,

    /// Clock time the session started
    pub started_at: f64,
}

impl PracticeSession {
    pub fn new(bpm: f64, pulse_unit: PulseUnit, started_at: f64) -> Self {
        Self {
            current_bpm: bpm,
            current_pulse_unit: pulse_unit,
            correct_count: 0,
            consecutive_fails: 0,
            started_at,
        }
    }

    #[inline]
    pub fn rate(&self) -> f64 {
        pulse_rate(self.current_bpm, self.current_pulse_unit)
    }
}

/// Outcome of a finished session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSummary {
    pub final_bpm: f64,
    pub pulse_unit: PulseUnit,

    /// Seconds the transport was running during the session
    pub active_secs: f64,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum BreakReason {
    /// Several failures in a row
    RepeatedFailures,

    /// Long stretch of practice without reaching the target
    Fatigue,
}

/// Outbound notifications for the UI layer.
#[derive(Debug, Clone, PartialEq)]
pub enum PracticeSignal {
    SessionCompleted(SessionSummary),
    BreakSuggested(BreakReason),
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ScaleDirection {
    Double,
    Halve,
}

//
// ===============================
// MARK: Fatigue monitor
// ===============================
//

/// Tracks active practice time and fires once past `FATIGUE_LIMIT`.
///
/// Time only accumulates between polls where the transport was running, so
/// a paused metronome does not count toward fatigue.
#[derive(Debug, Clone)]
pub struct FatigueMonitor {
    active_secs: f64,
    last_poll: f64,
    armed: bool,
    limit: f64,
}

impl FatigueMonitor {
    pub fn new(now: f64) -> Self {
        Self::with_limit(now, FATIGUE_LIMIT)
    }

    pub fn with_limit(now: f64, limit: f64) -> Self {
        Self {
            active_secs: 0.0,
            last_poll: now,
            armed: true,
            limit,
        }
    }

    /// Account for time since the last poll.
    ///
    /// Returns true exactly once, on the first poll past the limit where
    /// `below_target` holds. Past the limit but at or above target, the
    /// monitor stays armed.
    pub fn poll(&mut self, now: f64, running: bool, below_target: bool) -> bool {
        if running && now > self.last_poll {
            self.active_secs += now - self.last_poll;
        }
        self.last_poll = self.last_poll.max(now);

        if self.armed && self.active_secs >= self.limit && below_target {
            self.armed = false;
            return true;
        }
        false
    }

    pub fn disarm(&mut self) {
        self.armed = false;
    }

    #[inline]
    pub fn is_armed(&self) -> bool {
        self.armed
    }

    #[inline]
    pub fn active_secs(&self) -> f64 {
        self.active_secs
    }
}

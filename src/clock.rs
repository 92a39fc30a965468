// src/clock.rs
//
// Monotonic clock sources.
//
// Every clock reports seconds in the time base the audio renderer schedules
// against, so "play event X at time T" means the same thing on both sides.

use std::sync::{
    Arc,
    atomic::{AtomicBool, AtomicU64, Ordering},
};
use std::time::Instant;

use crate::error::{EngineError, EngineResult};

/// A monotonically increasing time source.
pub trait ClockSource {
    /// Current time in seconds.
    fn now(&self) -> f64;

    /// Acquire or resume the underlying device.
    ///
    /// Called by the scheduler on start. Clocks without a device to wake
    /// always succeed.
    fn resume(&mut self) -> EngineResult<()> {
        Ok(())
    }
}

//
// ===============================
// MARK: System clock
// ===============================
//

/// Wall-clock based source measured from construction.
#[derive(Debug, Clone)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl ClockSource for SystemClock {
    fn now(&self) -> f64 {
        self.origin.elapsed().as_secs_f64()
    }
}

//
// ===============================
// MARK: Sample clock
// ===============================
//

/// Clock derived from the number of frames an audio renderer has produced.
///
/// Clones share the same counter: the renderer advances it once per block
/// and the scheduler reads it.
#[derive(Debug, Clone)]
pub struct SampleClock {
    frames: Arc<AtomicU64>,
    sample_rate: f64,
}

impl SampleClock {
    pub fn new(sample_rate: f64) -> Self {
        Self {
            frames: Arc::new(AtomicU64::new(0)),
            sample_rate,
        }
    }

    /// Advance by one rendered block.
    #[inline]
    pub fn advance_frames(&self, frames: usize) {
        self.frames.fetch_add(frames as u64, Ordering::AcqRel);
    }

    #[inline]
    pub fn frame_position(&self) -> u64 {
        self.frames.load(Ordering::Acquire)
    }

    #[inline]
    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }
}

impl ClockSource for SampleClock {
    fn now(&self) -> f64 {
        self.frame_position() as f64 / self.sample_rate
    }
}

//
// ===============================
// MARK: Manual clock
// ===============================
//

/// Externally driven clock.
///
/// Used when the host owns the audio clock (a browser `AudioContext`, an
/// iOS render callback) and by tests that need deterministic time. The host
/// can also mark the device as unavailable, which makes `resume` fail.
#[derive(Debug, Clone)]
pub struct ManualClock {
    /// Seconds stored as f64 bits (no AtomicF64 in std)
    now_bits: Arc<AtomicU64>,
    available: Arc<AtomicBool>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            now_bits: Arc::new(AtomicU64::new(0.0_f64.to_bits())),
            available: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Set the current time. Earlier values than the current one are ignored.
    pub fn set(&self, seconds: f64) {
        let current = f64::from_bits(self.now_bits.load(Ordering::Acquire));
        if seconds > current {
            self.now_bits.store(seconds.to_bits(), Ordering::Release);
        }
    }

    pub fn advance(&self, seconds: f64) {
        self.set(self.now() + seconds);
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::Release);
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl ClockSource for ManualClock {
    fn now(&self) -> f64 {
        f64::from_bits(self.now_bits.load(Ordering::Acquire))
    }

    fn resume(&mut self) -> EngineResult<()> {
        if self.available.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(EngineError::AudioUnavailable {
                reason: "host reported the audio device as unavailable".into(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_clock_counts_frames() {
        let clock = SampleClock::new(48_000.0);
        let shared = clock.clone();
        shared.advance_frames(24_000);
        assert!((clock.now() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_manual_clock_is_monotonic() {
        let clock = ManualClock::new();
        clock.set(2.0);
        clock.set(1.0);
        assert_eq!(clock.now(), 2.0);
        clock.advance(0.25);
        assert_eq!(clock.now(), 2.25);
    }

    #[test]
    fn test_manual_clock_unavailable() {
        let mut clock = ManualClock::new();
        clock.set_available(false);
        assert!(clock.resume().is_err());
        clock.set_available(true);
        assert!(clock.resume().is_ok());
    }

    #[test]
    fn test_system_clock_advances() {
        let clock = SystemClock::new();
        let a = clock.now();
        let b = clock.now();
        assert!(b >= a);
    }
}

// src/tempo.rs

use log::warn;

/// Slowest tempo the engine will play.
pub const MIN_BPM: f64 = 20.0;

/// Fastest tempo the engine will play.
pub const MAX_BPM: f64 = 300.0;

/// Finest subdivision per beat (matches the sixteenth pulse unit).
pub const MAX_SUBDIVISION: u32 = 16;

pub const DEFAULT_BPM: f64 = 120.0;

//
// ===============================
// MARK: Tempo
// ===============================
//

/// Tempo state owned by the scheduler.
///
/// This struct:
/// - is copyable
/// - always holds clamped values
/// - is only mutated through its setters
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Tempo {
    bpm: f64,

    /// Pulses per beat including the main beat (1 = main beats only)
    subdivision: u32,
}

impl Default for Tempo {
    fn default() -> Self {
        Self {
            bpm: DEFAULT_BPM,
            subdivision: 1,
        }
    }
}

impl Tempo {
    pub fn new(bpm: f64, subdivision: u32) -> Self {
        Self {
            bpm: clamp_bpm(bpm),
            subdivision: clamp_subdivision(subdivision),
        }
    }

    #[inline]
    pub fn bpm(&self) -> f64 {
        self.bpm
    }

    #[inline]
    pub fn subdivision(&self) -> u32 {
        self.subdivision
    }

    /// Seconds between two main beats.
    #[inline]
    pub fn beat_duration(&self) -> f64 {
        60.0 / self.bpm
    }

    /// Clamp and store a new tempo. Returns the value actually applied.
    pub fn set_bpm(&mut self, bpm: f64) -> f64 {
        self.bpm = clamp_bpm(bpm);
        self.bpm
    }

    /// Clamp and store a new subdivision. Returns the value actually applied.
    pub fn set_subdivision(&mut self, subdivision: u32) -> u32 {
        self.subdivision = clamp_subdivision(subdivision);
        self.subdivision
    }
}

// -------------------------------
// MARK: Clamping
// -------------------------------

/// Clamp a tempo into `[MIN_BPM, MAX_BPM]`, logging when the input was out
/// of range. NaN falls back to the default tempo.
pub fn clamp_bpm(bpm: f64) -> f64 {
    if bpm.is_nan() {
        warn!("bpm is NaN, using {}", DEFAULT_BPM);
        return DEFAULT_BPM;
    }

    let clamped = bpm.clamp(MIN_BPM, MAX_BPM);
    if clamped != bpm {
        warn!("bpm {} out of range, clamped to {}", bpm, clamped);
    }
    clamped
}

/// Clamp a subdivision into `[1, MAX_SUBDIVISION]`.
pub fn clamp_subdivision(subdivision: u32) -> u32 {
    let clamped = subdivision.clamp(1, MAX_SUBDIVISION);
    if clamped != subdivision {
        warn!(
            "subdivision {} out of range, clamped to {}",
            subdivision, clamped
        );
    }
    clamped
}

/// Anything that accepts tempo changes.
///
/// The practice engine and tap estimator write tempo through this seam and
/// never touch scheduler internals.
pub trait TempoControl {
    /// Apply a tempo, returning the clamped value actually used.
    fn set_tempo(&mut self, bpm: f64) -> f64;
}

impl TempoControl for Tempo {
    fn set_tempo(&mut self, bpm: f64) -> f64 {
        self.set_bpm(bpm)
    }
}

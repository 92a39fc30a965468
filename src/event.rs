// src/event.rs

/// Which pulse of the beat an event represents.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum PulseKind {
    /// The beat itself.
    Main,

    /// An evenly spaced pulse between two main beats.
    Sub,
}

/// A pulse scheduled at an absolute clock time.
///
/// These events:
/// - are produced by the scheduler in strictly increasing time order
/// - are never retimed once produced
/// - are consumed exactly once by the renderer
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct PulseEvent {
    /// Absolute onset time in seconds (clock time base)
    pub time: f64,

    pub kind: PulseKind,

    /// Index of the main beat since the scheduler started
    pub beat: u64,

    /// Position inside the beat: 0 for the main beat, 1..subdivision for subs
    pub sub_index: u32,
}

impl PulseEvent {
    #[inline]
    pub fn main(time: f64, beat: u64) -> Self {
        Self {
            time,
            kind: PulseKind::Main,
            beat,
            sub_index: 0,
        }
    }

    #[inline]
    pub fn sub(time: f64, beat: u64, sub_index: u32) -> Self {
        Self {
            time,
            kind: PulseKind::Sub,
            beat,
            sub_index,
        }
    }

    #[inline]
    pub fn is_main(&self) -> bool {
        self.kind == PulseKind::Main
    }
}

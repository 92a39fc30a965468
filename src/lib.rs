// src/lib.rs
//
// Library entry point for Rust hosts and FFI/wasm consumers.

mod audio_buffer;
mod click;
mod clock;
mod config;
mod cues;
mod error;
mod event;
mod metronome;
mod renderer;
mod scheduler;
mod tap;
mod tempo;
mod timer;

pub mod practice;

#[cfg(feature = "ios")]
pub mod ffi;

#[cfg(feature = "web")]
pub mod wasm;

// Re-export key types for Rust consumers
pub use audio_buffer::AudioBuffer;
pub use click::ClickRenderer;
pub use clock::{ClockSource, ManualClock, SampleClock, SystemClock};
pub use config::EngineConfig;
pub use cues::{BeatHook, VisualCues};
pub use error::{EngineError, EngineResult, HookError, HookResult};
pub use event::{PulseEvent, PulseKind};
pub use metronome::{BreakHook, CompletionHook, Metronome, PollReport};
pub use renderer::{LogRenderer, NullRenderer, PulseRenderer};
pub use scheduler::{LOOKAHEAD, Scheduler, TICK_INTERVAL};
pub use tap::TapTempo;
pub use tempo::{MAX_BPM, MIN_BPM, Tempo, TempoControl};
pub use timer::{Deadline, Interval};

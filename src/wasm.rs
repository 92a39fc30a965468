//! WebAssembly bindings via wasm-bindgen for browser integration.
//!
//! This module is only compiled when the `web` feature is enabled.
//!
//! # Usage
//!
//! Build with wasm-pack:
//! ```bash
//! wasm-pack build --target web --features web
//! ```
//!
//! # JavaScript Example
//!
//! ```javascript
//! import init, { tempokeeper_init, WebMetronome } from './tempokeeper.js';
//!
//! await init();
//! tempokeeper_init();
//!
//! const ctx = new AudioContext();
//! const metronome = new WebMetronome();
//! metronome.start();
//!
//! setInterval(() => {
//!     metronome.set_time(ctx.currentTime);
//!     metronome.poll();
//!
//!     // [time, beat, subIndex, isMain] per pulse
//!     const pulses = metronome.drain_pulses();
//!     for (let i = 0; i < pulses.length; i += 4) {
//!         playClick(ctx, pulses[i], pulses[i + 3] === 1);
//!     }
//! }, 25);
//! ```

use std::sync::{Arc, Mutex};

use log::error;
use wasm_bindgen::prelude::*;

use crate::clock::ManualClock;
use crate::config::EngineConfig;
use crate::cues::BeatHook;
use crate::error::HookResult;
use crate::event::PulseEvent;
use crate::metronome::Metronome;
use crate::practice::{BreakReason, PracticeSettings, PracticeSignal, ScaleDirection};

/// Values per pulse in the flat arrays handed to JavaScript.
const PULSE_STRIDE: usize = 4;

// Signal codes returned to JavaScript
const SIGNAL_NONE: u32 = 0;
const SIGNAL_SESSION_COMPLETED: u32 = 1;
const SIGNAL_BREAK_REPEATED_FAILURES: u32 = 2;
const SIGNAL_BREAK_FATIGUE: u32 = 3;

// ═══════════════════════════════════════════════════════════════════════════
// Initialization
// ═══════════════════════════════════════════════════════════════════════════

/// Initialize the wasm module. Call this once before using any other functions.
/// Sets up panic hooks and console logging.
#[wasm_bindgen]
pub fn tempokeeper_init() {
    console_error_panic_hook::set_once();
    console_log::init_with_level(log::Level::Debug).ok();
}

fn signal_code(signal: Option<&PracticeSignal>) -> u32 {
    match signal {
        None => SIGNAL_NONE,
        Some(PracticeSignal::SessionCompleted(_)) => SIGNAL_SESSION_COMPLETED,
        Some(PracticeSignal::BreakSuggested(BreakReason::RepeatedFailures)) => {
            SIGNAL_BREAK_REPEATED_FAILURES
        }
        Some(PracticeSignal::BreakSuggested(BreakReason::Fatigue)) => SIGNAL_BREAK_FATIGUE,
    }
}

fn flatten(events: &[PulseEvent]) -> Vec<f64> {
    let mut out = Vec::with_capacity(events.len() * PULSE_STRIDE);
    for event in events {
        out.push(event.time);
        out.push(event.beat as f64);
        out.push(event.sub_index as f64);
        out.push(if event.is_main() { 1.0 } else { 0.0 });
    }
    out
}

// ═══════════════════════════════════════════════════════════════════════════
// Metronome
// ═══════════════════════════════════════════════════════════════════════════

/// Browser metronome driven by the host's `AudioContext` clock.
///
/// Pulses are drained as timestamps for the host to schedule with Web Audio;
/// visual cues are drained separately once they come due.
#[wasm_bindgen]
pub struct WebMetronome {
    inner: Metronome<ManualClock, Vec<PulseEvent>>,
    clock: ManualClock,
    cues: Arc<Mutex<Vec<PulseEvent>>>,
}

#[wasm_bindgen]
impl WebMetronome {
    /// Create a metronome with default configuration.
    #[wasm_bindgen(constructor)]
    pub fn new() -> WebMetronome {
        Self::with_config(&EngineConfig::default())
    }

    /// Create a metronome from a JSON configuration document.
    pub fn from_json(json: &str) -> Result<WebMetronome, JsValue> {
        match EngineConfig::from_json(json) {
            Ok(config) => Ok(Self::with_config(&config)),
            Err(e) => {
                error!("Invalid metronome config: {}", e);
                Err(JsValue::from_str(&e.to_string()))
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Clock
    // ─────────────────────────────────────────────────────────────────────────

    /// Feed the current `AudioContext.currentTime`. Earlier values are ignored.
    pub fn set_time(&mut self, seconds: f64) {
        self.clock.set(seconds);
    }

    /// Mark the audio context as usable (running) or not (suspended).
    pub fn set_audio_available(&mut self, available: bool) {
        self.clock.set_available(available);
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Transport
    // ─────────────────────────────────────────────────────────────────────────

    /// Start the click. Returns false if the audio context is unavailable.
    pub fn start(&mut self) -> bool {
        self.inner.start().is_ok()
    }

    pub fn stop(&mut self) {
        self.inner.stop();
    }

    pub fn is_running(&self) -> bool {
        self.inner.is_running()
    }

    /// Set the tempo. Returns the clamped value actually applied.
    pub fn set_tempo(&mut self, bpm: f64) -> f64 {
        self.inner.set_tempo(bpm)
    }

    pub fn get_tempo(&self) -> f64 {
        self.inner.tempo().bpm()
    }

    pub fn set_subdivision(&mut self, subdivision: u32) -> u32 {
        self.inner.set_subdivision(subdivision)
    }

    pub fn get_subdivision(&self) -> u32 {
        self.inner.tempo().subdivision()
    }

    /// Register a tap. Returns the new tempo, or undefined while too few
    /// taps are held.
    pub fn tap(&mut self) -> Option<f64> {
        self.inner.tap()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Driving
    // ─────────────────────────────────────────────────────────────────────────

    /// Run due work. Returns a signal code (0 when nothing happened).
    pub fn poll(&mut self) -> u32 {
        let report = self.inner.poll();
        signal_code(report.signals.last())
    }

    /// Take pulses scheduled since the last call, flattened as
    /// `[time, beat, subIndex, isMain]` per pulse.
    pub fn drain_pulses(&mut self) -> Vec<f64> {
        let events = std::mem::take(self.inner.renderer_mut());
        flatten(&events)
    }

    /// Take visual cues that came due, in the same layout as `drain_pulses`.
    pub fn drain_cues(&mut self) -> Vec<f64> {
        match self.cues.lock() {
            Ok(mut fired) => flatten(&std::mem::take(&mut *fired)),
            Err(_) => Vec::new(),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Practice
    // ─────────────────────────────────────────────────────────────────────────

    /// Start a practice session from a JSON settings document (camelCase
    /// keys, missing fields take defaults).
    pub fn start_practice(&mut self, settings_json: &str) -> Result<(), JsValue> {
        let settings = PracticeSettings::from_json(settings_json)
            .map_err(|e| JsValue::from_str(&e.to_string()))?;
        self.inner.start_practice(&settings);
        Ok(())
    }

    pub fn pass(&mut self) -> u32 {
        signal_code(self.inner.pass().as_ref())
    }

    pub fn fail(&mut self) -> u32 {
        signal_code(self.inner.fail().as_ref())
    }

    /// Double (`true`) or halve the pulse unit. False if out of range.
    pub fn scale_pulse(&mut self, double: bool) -> bool {
        let direction = if double {
            ScaleDirection::Double
        } else {
            ScaleDirection::Halve
        };
        self.inner.scale_pulse(direction)
    }

    /// Leave practice mode. Returns true if a session was active.
    pub fn exit_practice(&mut self) -> bool {
        self.inner.exit_practice().is_some()
    }

    pub fn is_practicing(&self) -> bool {
        self.inner.practice().is_active()
    }

    /// Current practice pulse unit as a note denominator, 0 when idle.
    pub fn practice_pulse_unit(&self) -> u32 {
        self.inner
            .practice()
            .session()
            .map_or(0, |s| s.current_pulse_unit.denominator())
    }

    /// Practice event log as JSON lines.
    pub fn practice_log(&self) -> String {
        self.inner.practice().log().to_json_lines().unwrap_or_default()
    }
}

impl WebMetronome {
    fn with_config(config: &EngineConfig) -> WebMetronome {
        let clock = ManualClock::new();
        let cues = Arc::new(Mutex::new(Vec::new()));
        let mut inner = Metronome::new(clock.clone(), Vec::new(), config);

        for main in [true, false] {
            let sink = Arc::clone(&cues);
            let hook: BeatHook = Box::new(move |event: &PulseEvent| -> HookResult {
                if let Ok(mut fired) = sink.lock() {
                    fired.push(*event);
                }
                Ok(())
            });
            if main {
                inner.on_main_beat(Some(hook));
            } else {
                inner.on_sub_beat(Some(hook));
            }
        }

        WebMetronome { inner, clock, cues }
    }
}

impl Default for WebMetronome {
    fn default() -> Self {
        Self::new()
    }
}

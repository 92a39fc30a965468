// C-compatible FFI bindings for Swift/iOS integration.
//
// Two handles per metronome:
// - `TkMetronome` lives on the UI side: transport, tap, practice, polling
// - `TkClickOutput` lives on the audio side: renders clicks into buffers
// Both share one sample clock, so scheduling follows the rendered frame count.
//
// Safety requirements:
// - All pointers must be non-null unless documented otherwise
// - All handles must be created by this module and not fabricated
// - String parameters must be valid UTF-8 (Swift strings are always valid)
// - Caller must call the corresponding _destroy function for each _create

use std::ffi::{CStr, c_char, c_void};
use std::sync::mpsc::{Receiver, Sender, channel};

use log::{LevelFilter, error, warn};
use oslog::OsLogger;

use crate::audio_buffer::AudioBuffer;
use crate::click::ClickRenderer;
use crate::clock::SampleClock;
use crate::config::EngineConfig;
use crate::error::HookResult;
use crate::event::PulseEvent;
use crate::metronome::Metronome;
use crate::practice::{
    BreakReason, PracticeSettings, PracticeSignal, PulseUnit, ScaleDirection, SessionSummary,
};

// Largest chunk rendered in one pass
const MAX_BLOCK: usize = 512;

// Logger subsystem identifier
const LOG_SUBSYSTEM: &str = "com.tempokeeper.engine";

// ═══════════════════════════════════════════════════════════════════════════
// Logger Initialization
// ═══════════════════════════════════════════════════════════════════════════

/// Initialize the oslog logger.
///
/// Call once at application startup. Output shows up in Console.app and
/// Xcode's debug console.
#[unsafe(no_mangle)]
pub extern "C" fn tempokeeper_init_logger() {
    OsLogger::new(LOG_SUBSYSTEM)
        .level_filter(LevelFilter::Debug)
        .init()
        .ok();
}

// ═══════════════════════════════════════════════════════════════════════════
// Opaque Handle Types
// ═══════════════════════════════════════════════════════════════════════════

/// Opaque handle to the metronome (UI-side).
pub struct TkMetronome {
    inner: Metronome<SampleClock, Sender<PulseEvent>>,
}

/// Opaque handle to the click renderer (audio-side).
pub struct TkClickOutput {
    renderer: ClickRenderer,
    rx: Receiver<PulseEvent>,
    scratch: Vec<f32>,
}

/// Host context pointer handed back to callbacks.
struct UserData(*mut c_void);

// The host promises the pointer is usable from whichever thread polls.
unsafe impl Send for UserData {}

impl UserData {
    #[inline]
    fn get(&self) -> *mut c_void {
        self.0
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// FFI Types
// ═══════════════════════════════════════════════════════════════════════════

/// Outcome of a practice operation or fatigue poll.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TkSignal {
    NoSignal = 0,
    SessionCompleted = 1,
    BreakRepeatedFailures = 2,
    BreakFatigue = 3,
}

impl From<Option<PracticeSignal>> for TkSignal {
    fn from(signal: Option<PracticeSignal>) -> Self {
        match signal {
            None => TkSignal::NoSignal,
            Some(PracticeSignal::SessionCompleted(_)) => TkSignal::SessionCompleted,
            Some(PracticeSignal::BreakSuggested(BreakReason::RepeatedFailures)) => {
                TkSignal::BreakRepeatedFailures
            }
            Some(PracticeSignal::BreakSuggested(BreakReason::Fatigue)) => TkSignal::BreakFatigue,
        }
    }
}

/// Pulse data passed to beat callbacks.
#[repr(C)]
pub struct TkPulse {
    pub time: f64,
    pub beat: u64,
    pub sub_index: u32,
    pub is_main: bool,
}

impl From<&PulseEvent> for TkPulse {
    fn from(event: &PulseEvent) -> Self {
        Self {
            time: event.time,
            beat: event.beat,
            sub_index: event.sub_index,
            is_main: event.is_main(),
        }
    }
}

/// Practice configuration. Pulse units are note denominators (1, 2, 4, 8, 16).
#[repr(C)]
pub struct TkPracticeSettings {
    pub starting_bpm: f64,
    pub starting_pulse_unit: u32,
    pub target_bpm: f64,
    pub target_pulse_unit: u32,
    pub required_correct: i64,
    pub increment: f64,
    pub penalty: f64,
}

impl From<&TkPracticeSettings> for PracticeSettings {
    fn from(s: &TkPracticeSettings) -> Self {
        Self {
            starting_bpm: s.starting_bpm,
            starting_pulse_unit: pulse_unit_or_default(s.starting_pulse_unit),
            target_bpm: s.target_bpm,
            target_pulse_unit: pulse_unit_or_default(s.target_pulse_unit),
            required_correct: s.required_correct,
            increment: s.increment,
            penalty: s.penalty,
        }
    }
}

fn pulse_unit_or_default(denominator: u32) -> PulseUnit {
    PulseUnit::from_denominator(denominator).unwrap_or_else(|| {
        warn!("Unknown pulse unit 1/{}, using quarter", denominator);
        PulseUnit::default()
    })
}

/// Snapshot of metronome and practice state for UI display.
#[repr(C)]
pub struct TkReadback {
    pub running: bool,
    pub bpm: f64,
    pub subdivision: u32,
    pub practicing: bool,
    pub pulse_unit: u32,
    pub correct_count: u32,
    pub consecutive_fails: u32,
}

/// Called near the audible onset of a beat.
pub type TkBeatCallback = extern "C" fn(user_data: *mut c_void, pulse: TkPulse);

/// Called when a practice session completes.
pub type TkCompletionCallback =
    extern "C" fn(user_data: *mut c_void, final_bpm: f64, pulse_unit: u32, active_secs: f64);

/// Called when a break is suggested.
pub type TkBreakCallback = extern "C" fn(user_data: *mut c_void, signal: TkSignal);

// ═══════════════════════════════════════════════════════════════════════════
// Creation
// ═══════════════════════════════════════════════════════════════════════════

/// Create a metronome and its click output with default configuration.
///
/// Returns the metronome handle; the click output is returned via
/// `out_output`. Both must be destroyed with their destroy functions.
///
/// # Safety
/// `out_output` must be a valid pointer to store the output handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn tempokeeper_create(
    sample_rate: f64,
    out_output: *mut *mut TkClickOutput,
) -> *mut TkMetronome {
    let config = EngineConfig {
        sample_rate,
        ..EngineConfig::default()
    };
    unsafe { create_pair(&config, out_output) }
}

/// Create a metronome from a JSON configuration document.
///
/// Returns NULL (and leaves `out_output` untouched) if the document does not
/// parse.
///
/// # Safety
/// - `json` must be a valid null-terminated UTF-8 string
/// - `out_output` must be a valid pointer to store the output handle
#[unsafe(no_mangle)]
pub unsafe extern "C" fn tempokeeper_create_with_config(
    json: *const c_char,
    out_output: *mut *mut TkClickOutput,
) -> *mut TkMetronome {
    if json.is_null() {
        return std::ptr::null_mut();
    }
    let text = unsafe { CStr::from_ptr(json).to_str().unwrap_or("{}") };

    match EngineConfig::from_json(text) {
        Ok(config) => unsafe { create_pair(&config, out_output) },
        Err(e) => {
            error!("Invalid metronome config: {}", e);
            std::ptr::null_mut()
        }
    }
}

unsafe fn create_pair(
    config: &EngineConfig,
    out_output: *mut *mut TkClickOutput,
) -> *mut TkMetronome {
    let config = config.sanitized();
    let clock = SampleClock::new(config.sample_rate);
    let (tx, rx) = channel();

    if !out_output.is_null() {
        unsafe {
            *out_output = Box::into_raw(Box::new(TkClickOutput {
                renderer: ClickRenderer::new(clock.clone()),
                rx,
                scratch: vec![0.0; MAX_BLOCK * 2],
            }));
        }
    }

    Box::into_raw(Box::new(TkMetronome {
        inner: Metronome::new(clock, tx, &config),
    }))
}

/// Destroy a metronome handle.
///
/// # Safety
/// `metronome` must be a valid pointer returned by `tempokeeper_create`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn tempokeeper_destroy(metronome: *mut TkMetronome) {
    if !metronome.is_null() {
        unsafe { drop(Box::from_raw(metronome)) };
    }
}

/// Destroy a click output handle.
///
/// # Safety
/// `output` must be a valid pointer returned via `tempokeeper_create`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn click_output_destroy(output: *mut TkClickOutput) {
    if !output.is_null() {
        unsafe { drop(Box::from_raw(output)) };
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Transport
// ═══════════════════════════════════════════════════════════════════════════

/// Start the click. Returns false if the audio clock could not be resumed.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn tempokeeper_start(metronome: *mut TkMetronome) -> bool {
    if metronome.is_null() {
        return false;
    }
    unsafe { (*metronome).inner.start().is_ok() }
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn tempokeeper_stop(metronome: *mut TkMetronome) {
    if metronome.is_null() {
        return;
    }
    unsafe { (*metronome).inner.stop() };
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn tempokeeper_is_running(metronome: *const TkMetronome) -> bool {
    if metronome.is_null() {
        return false;
    }
    unsafe { (*metronome).inner.is_running() }
}

/// Set the tempo. Returns the clamped value actually applied.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn tempokeeper_set_tempo(metronome: *mut TkMetronome, bpm: f64) -> f64 {
    if metronome.is_null() {
        return 0.0;
    }
    unsafe { (*metronome).inner.set_tempo(bpm) }
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn tempokeeper_get_tempo(metronome: *const TkMetronome) -> f64 {
    if metronome.is_null() {
        return 0.0;
    }
    unsafe { (*metronome).inner.tempo().bpm() }
}

/// Set pulses per beat. Returns the clamped value actually applied.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn tempokeeper_set_subdivision(
    metronome: *mut TkMetronome,
    subdivision: u32,
) -> u32 {
    if metronome.is_null() {
        return 0;
    }
    unsafe { (*metronome).inner.set_subdivision(subdivision) }
}

/// Register a tap. Returns the new tempo, or 0.0 while too few taps are held.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn tempokeeper_tap(metronome: *mut TkMetronome) -> f64 {
    if metronome.is_null() {
        return 0.0;
    }
    unsafe { (*metronome).inner.tap().unwrap_or(0.0) }
}

/// Run due work. Call every few milliseconds from the UI run loop.
///
/// Returns the number of events sent to the click output.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn tempokeeper_poll(metronome: *mut TkMetronome) -> u32 {
    if metronome.is_null() {
        return 0;
    }
    unsafe { (*metronome).inner.poll().events as u32 }
}

/// Get the current metronome and practice state.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn tempokeeper_get_readback(metronome: *const TkMetronome) -> TkReadback {
    if metronome.is_null() {
        return TkReadback {
            running: false,
            bpm: 0.0,
            subdivision: 0,
            practicing: false,
            pulse_unit: 0,
            correct_count: 0,
            consecutive_fails: 0,
        };
    }

    let inner = unsafe { &(*metronome).inner };
    let tempo = inner.tempo();
    let session = inner.practice().session();

    TkReadback {
        running: inner.is_running(),
        bpm: tempo.bpm(),
        subdivision: tempo.subdivision(),
        practicing: session.is_some(),
        pulse_unit: session.map_or(0, |s| s.current_pulse_unit.denominator()),
        correct_count: session.map_or(0, |s| s.correct_count),
        consecutive_fails: session.map_or(0, |s| s.consecutive_fails),
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Callbacks
// ═══════════════════════════════════════════════════════════════════════════

/// Set (or clear with NULL) the main beat callback.
///
/// Fires from `tempokeeper_poll`, on the polling thread.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn tempokeeper_set_main_beat_callback(
    metronome: *mut TkMetronome,
    callback: Option<TkBeatCallback>,
    user_data: *mut c_void,
) {
    if metronome.is_null() {
        return;
    }
    let hook = callback.map(|cb| beat_hook(cb, UserData(user_data)));
    unsafe { (*metronome).inner.on_main_beat(hook) };
}

/// Set (or clear with NULL) the subdivision callback.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn tempokeeper_set_sub_beat_callback(
    metronome: *mut TkMetronome,
    callback: Option<TkBeatCallback>,
    user_data: *mut c_void,
) {
    if metronome.is_null() {
        return;
    }
    let hook = callback.map(|cb| beat_hook(cb, UserData(user_data)));
    unsafe { (*metronome).inner.on_sub_beat(hook) };
}

fn beat_hook(cb: TkBeatCallback, user_data: UserData) -> crate::cues::BeatHook {
    Box::new(move |event: &PulseEvent| -> HookResult {
        cb(user_data.get(), TkPulse::from(event));
        Ok(())
    })
}

/// Set (or clear with NULL) the session completion callback.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn tempokeeper_set_completion_callback(
    metronome: *mut TkMetronome,
    callback: Option<TkCompletionCallback>,
    user_data: *mut c_void,
) {
    if metronome.is_null() {
        return;
    }
    let hook = callback.map(|cb| {
        let user_data = UserData(user_data);
        Box::new(move |summary: &SessionSummary| -> HookResult {
            cb(
                user_data.get(),
                summary.final_bpm,
                summary.pulse_unit.denominator(),
                summary.active_secs,
            );
            Ok(())
        }) as crate::metronome::CompletionHook
    });
    unsafe { (*metronome).inner.on_session_completed(hook) };
}

/// Set (or clear with NULL) the break suggestion callback.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn tempokeeper_set_break_callback(
    metronome: *mut TkMetronome,
    callback: Option<TkBreakCallback>,
    user_data: *mut c_void,
) {
    if metronome.is_null() {
        return;
    }
    let hook = callback.map(|cb| {
        let user_data = UserData(user_data);
        Box::new(move |reason: BreakReason| -> HookResult {
            let signal = TkSignal::from(Some(PracticeSignal::BreakSuggested(reason)));
            cb(user_data.get(), signal);
            Ok(())
        }) as crate::metronome::BreakHook
    });
    unsafe { (*metronome).inner.on_break_suggested(hook) };
}

// ═══════════════════════════════════════════════════════════════════════════
// Practice
// ═══════════════════════════════════════════════════════════════════════════

/// Start a practice session. NULL settings use the defaults.
///
/// # Safety
/// `settings` must be NULL or a valid pointer to a TkPracticeSettings.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn tempokeeper_start_practice(
    metronome: *mut TkMetronome,
    settings: *const TkPracticeSettings,
) {
    if metronome.is_null() {
        return;
    }
    let settings = if settings.is_null() {
        PracticeSettings::default()
    } else {
        PracticeSettings::from(unsafe { &*settings })
    };
    unsafe { (*metronome).inner.start_practice(&settings) };
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn tempokeeper_pass(metronome: *mut TkMetronome) -> TkSignal {
    if metronome.is_null() {
        return TkSignal::NoSignal;
    }
    unsafe { (*metronome).inner.pass() }.into()
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn tempokeeper_fail(metronome: *mut TkMetronome) -> TkSignal {
    if metronome.is_null() {
        return TkSignal::NoSignal;
    }
    unsafe { (*metronome).inner.fail() }.into()
}

/// Double (`double = true`) or halve the practice pulse unit.
///
/// Returns false when the unit is already at the end of its range or no
/// session is active.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn tempokeeper_scale_pulse(metronome: *mut TkMetronome, double: bool) -> bool {
    if metronome.is_null() {
        return false;
    }
    let direction = if double {
        ScaleDirection::Double
    } else {
        ScaleDirection::Halve
    };
    unsafe { (*metronome).inner.scale_pulse(direction) }
}

/// Leave practice mode. Returns true if a session was active.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn tempokeeper_exit_practice(metronome: *mut TkMetronome) -> bool {
    if metronome.is_null() {
        return false;
    }
    unsafe { (*metronome).inner.exit_practice() }.is_some()
}

// ═══════════════════════════════════════════════════════════════════════════
// Click Output (audio thread)
// ═══════════════════════════════════════════════════════════════════════════

#[unsafe(no_mangle)]
pub unsafe extern "C" fn click_output_set_volume(output: *mut TkClickOutput, volume: f32) {
    if output.is_null() {
        return;
    }
    unsafe { (*output).renderer.set_volume(volume) };
}

/// Render clicks into planar stereo buffers.
///
/// Advances the shared clock by `frames`, so this is what moves metronome
/// time forward.
///
/// # Safety
/// - Must be called from the audio thread
/// - Output buffers must be valid and have space for `frames` samples
#[unsafe(no_mangle)]
pub unsafe extern "C" fn click_output_render(
    output: *mut TkClickOutput,
    frames: u32,
    output_left: *mut f32,
    output_right: *mut f32,
) {
    let total_frames = frames as usize;

    // Fill with silence if invalid
    if output.is_null() || output_left.is_null() || output_right.is_null() {
        if !output_left.is_null() {
            unsafe { std::ptr::write_bytes(output_left, 0, total_frames) };
        }
        if !output_right.is_null() {
            unsafe { std::ptr::write_bytes(output_right, 0, total_frames) };
        }
        return;
    }

    let wrapper = unsafe { &mut (*output) };
    let out_left = unsafe { std::slice::from_raw_parts_mut(output_left, total_frames) };
    let out_right = unsafe { std::slice::from_raw_parts_mut(output_right, total_frames) };

    wrapper.renderer.receive_from(&wrapper.rx);

    // Process in chunks of MAX_BLOCK
    let mut offset = 0;
    while offset < total_frames {
        let chunk_frames = (total_frames - offset).min(MAX_BLOCK);

        let mut block = AudioBuffer::new(&mut wrapper.scratch[..chunk_frames * 2], 2);
        wrapper.renderer.render_block(&mut block);

        out_left[offset..offset + chunk_frames].copy_from_slice(block.channel(0));
        out_right[offset..offset + chunk_frames].copy_from_slice(block.channel(1));

        offset += chunk_frames;
    }
}

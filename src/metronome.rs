// src/metronome.rs
//
// Metronome controller.
//
// Owns one scheduler, renderer, tap estimator and practice engine, plus the
// coarse timers that drive them. Everything runs cooperatively from
// `poll`: the host calls it often (every few milliseconds) or hands control
// to `run`, and each call performs whatever work is due.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use log::{debug, info, warn};

use crate::clock::ClockSource;
use crate::config::EngineConfig;
use crate::cues::BeatHook;
use crate::error::{EngineResult, HookResult};
use crate::practice::{
    BreakReason, PracticeEngine, PracticeSettings, PracticeSignal, ScaleDirection, SessionSummary,
};
use crate::renderer::PulseRenderer;
use crate::scheduler::Scheduler;
use crate::tap::TapTempo;
use crate::tempo::Tempo;
use crate::timer::Interval;

/// Called when a practice session reaches its target.
pub type CompletionHook = Box<dyn FnMut(&SessionSummary) -> HookResult + Send>;

/// Called when the practice engine suggests a break.
pub type BreakHook = Box<dyn FnMut(BreakReason) -> HookResult + Send>;

/// Longest sleep `run` takes between polls.
const MAX_IDLE_SLEEP: Duration = Duration::from_millis(5);

/// What a single `poll` did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PollReport {
    /// Events handed to the renderer
    pub events: usize,

    /// Visual cues fired
    pub cues: usize,

    /// Practice signals raised by timers
    pub signals: Vec<PracticeSignal>,
}

pub struct Metronome<C: ClockSource, R: PulseRenderer> {
    scheduler: Scheduler<C>,
    renderer: R,
    practice: PracticeEngine,
    taps: TapTempo,

    /// Generation tick
    generation: Interval,

    /// Fatigue check, running only during practice
    fatigue: Interval,

    visual_cues: bool,
    on_session_completed: Option<CompletionHook>,
    on_break_suggested: Option<BreakHook>,
}

impl<C: ClockSource, R: PulseRenderer> Metronome<C, R> {
    pub fn new(clock: C, renderer: R, config: &EngineConfig) -> Self {
        let config = config.sanitized();
        let tempo = Tempo::new(config.initial_bpm, config.initial_subdivision);

        let mut practice = PracticeEngine::new();
        practice.set_fatigue_limit(config.fatigue_limit_secs);

        Self {
            scheduler: Scheduler::with_tempo(clock, tempo, config.lookahead_secs),
            renderer,
            practice,
            taps: TapTempo::with_idle_reset(config.tap_idle_reset_secs),
            generation: Interval::new(config.tick_interval_secs),
            fatigue: Interval::new(config.fatigue_poll_secs),
            visual_cues: config.visual_cues,
            on_session_completed: None,
            on_break_suggested: None,
        }
    }

    // ═══════════════════════════════════════════════════════════════════
    // Transport
    // ═══════════════════════════════════════════════════════════════════

    /// Start the click. Does nothing if already running.
    pub fn start(&mut self) -> EngineResult<()> {
        if self.scheduler.is_running() {
            return Ok(());
        }
        self.scheduler.start()?;

        // Close out the stopped stretch so it never counts as practice time
        self.sync_fatigue(false);
        self.generation.start(self.scheduler.now());
        Ok(())
    }

    /// Stop the click. Clicks already queued in the renderer still play.
    pub fn stop(&mut self) {
        if self.scheduler.is_running() {
            self.sync_fatigue(true);
        }
        self.scheduler.stop();
        self.generation.stop();
    }

    #[inline]
    pub fn is_running(&self) -> bool {
        self.scheduler.is_running()
    }

    pub fn set_tempo(&mut self, bpm: f64) -> f64 {
        self.scheduler.set_tempo(bpm)
    }

    pub fn set_subdivision(&mut self, subdivision: u32) -> u32 {
        self.scheduler.set_subdivision(subdivision)
    }

    #[inline]
    pub fn tempo(&self) -> Tempo {
        self.scheduler.tempo()
    }

    /// Register a tap at the current clock time.
    ///
    /// Once two or more taps are buffered the estimate becomes the tempo.
    pub fn tap(&mut self) -> Option<f64> {
        let now = self.scheduler.now();
        let bpm = self.taps.tap(now)?;
        Some(self.scheduler.set_tempo(bpm))
    }

    // ═══════════════════════════════════════════════════════════════════
    // Practice
    // ═══════════════════════════════════════════════════════════════════

    pub fn start_practice(&mut self, settings: &PracticeSettings) {
        let now = self.scheduler.now();
        self.practice.start(settings, now, &mut self.scheduler);
        self.fatigue.start(now + self.fatigue.period());
    }

    pub fn pass(&mut self) -> Option<PracticeSignal> {
        let signal = self.practice.pass(&mut self.scheduler)?;
        self.dispatch(&signal);
        Some(signal)
    }

    pub fn fail(&mut self) -> Option<PracticeSignal> {
        let signal = self.practice.fail(&mut self.scheduler)?;
        self.dispatch(&signal);
        Some(signal)
    }

    pub fn scale_pulse(&mut self, direction: ScaleDirection) -> bool {
        self.practice.scale_pulse(direction, &mut self.scheduler)
    }

    /// Leave practice mode. The click keeps its current state.
    pub fn exit_practice(&mut self) -> Option<SessionSummary> {
        self.fatigue.stop();
        self.practice.exit()
    }

    #[inline]
    pub fn practice(&self) -> &PracticeEngine {
        &self.practice
    }

    #[inline]
    pub fn practice_mut(&mut self) -> &mut PracticeEngine {
        &mut self.practice
    }

    // ═══════════════════════════════════════════════════════════════════
    // Hooks
    // ═══════════════════════════════════════════════════════════════════

    /// Visual hook for main beats, fired near audible onset.
    pub fn on_main_beat(&mut self, hook: Option<BeatHook>) {
        if self.visual_cues {
            self.scheduler.on_main_beat(hook);
        } else {
            debug!("Visual cues disabled, main beat hook dropped");
        }
    }

    /// Visual hook for subdivisions, fired near audible onset.
    pub fn on_sub_beat(&mut self, hook: Option<BeatHook>) {
        if self.visual_cues {
            self.scheduler.on_sub_beat(hook);
        } else {
            debug!("Visual cues disabled, sub beat hook dropped");
        }
    }

    pub fn on_session_completed(&mut self, hook: Option<CompletionHook>) {
        self.on_session_completed = hook;
    }

    pub fn on_break_suggested(&mut self, hook: Option<BreakHook>) {
        self.on_break_suggested = hook;
    }

    fn dispatch(&mut self, signal: &PracticeSignal) {
        let result = match signal {
            PracticeSignal::SessionCompleted(summary) => {
                self.fatigue.stop();
                match self.on_session_completed.as_mut() {
                    Some(hook) => hook(summary),
                    None => Ok(()),
                }
            }
            PracticeSignal::BreakSuggested(reason) => match self.on_break_suggested.as_mut() {
                Some(hook) => hook(*reason),
                None => Ok(()),
            },
        };

        if let Err(e) = result {
            warn!("Practice hook failed for {:?}: {}", signal, e);
        }
    }

    /// Account practice time up to now with the given transport state.
    fn sync_fatigue(&mut self, running: bool) -> Option<PracticeSignal> {
        let now = self.scheduler.now();
        let signal = self.practice.poll_fatigue(now, running)?;
        self.dispatch(&signal);
        Some(signal)
    }

    // ═══════════════════════════════════════════════════════════════════
    // Driving
    // ═══════════════════════════════════════════════════════════════════

    /// Run everything that is due at the current clock time.
    pub fn poll(&mut self) -> PollReport {
        let now = self.scheduler.now();
        let mut report = PollReport::default();

        if self.generation.poll(now) {
            report.events = self.scheduler.tick(&mut self.renderer);
        }

        report.cues = self.scheduler.poll_cues();
        self.taps.poll(now);

        if self.fatigue.poll(now) {
            let running = self.scheduler.is_running();
            if let Some(signal) = self.sync_fatigue(running) {
                report.signals.push(signal);
            }
        }

        report
    }

    /// Seconds until the next timer is due, capped at `MAX_IDLE_SLEEP`.
    pub fn idle_time(&self) -> Duration {
        let now = self.scheduler.now();
        let next = [self.generation.next_due(), self.fatigue.next_due()]
            .into_iter()
            .flatten()
            .fold(f64::INFINITY, f64::min);

        let wait = (next - now).max(0.0);
        if wait.is_finite() {
            Duration::from_secs_f64(wait).min(MAX_IDLE_SLEEP)
        } else {
            MAX_IDLE_SLEEP
        }
    }

    /// Poll in a loop until `stop` is raised.
    ///
    /// A dedicated driver for hosts without their own event loop. Sleeps
    /// between polls; timing precision comes from the lookahead window, not
    /// from these wake-ups.
    pub fn run(&mut self, stop: &AtomicBool) {
        info!("Metronome loop running");
        while !stop.load(Ordering::Acquire) {
            self.poll();
            std::thread::sleep(self.idle_time());
        }
        info!("Metronome loop exited");
    }

    // ═══════════════════════════════════════════════════════════════════
    // Accessors
    // ═══════════════════════════════════════════════════════════════════

    #[inline]
    pub fn scheduler(&self) -> &Scheduler<C> {
        &self.scheduler
    }

    #[inline]
    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    #[inline]
    pub fn renderer_mut(&mut self) -> &mut R {
        &mut self.renderer
    }

    #[inline]
    pub fn now(&self) -> f64 {
        self.scheduler.now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{ManualClock, SystemClock};
    use crate::event::PulseEvent;
    use crate::practice::PulseUnit;
    use std::sync::{Arc, Mutex};

    type TestMetronome = Metronome<ManualClock, Vec<PulseEvent>>;

    fn metronome(config: EngineConfig) -> (TestMetronome, ManualClock) {
        let clock = ManualClock::new();
        (Metronome::new(clock.clone(), Vec::new(), &config), clock)
    }

    /// Poll every 5 ms for `seconds`.
    fn drive(metronome: &mut TestMetronome, clock: &ManualClock, seconds: f64) -> PollReport {
        let mut total = PollReport::default();
        let steps = (seconds / 0.005).round() as usize;
        for _ in 0..steps {
            let report = metronome.poll();
            total.events += report.events;
            total.cues += report.cues;
            total.signals.extend(report.signals);
            clock.advance(0.005);
        }
        total
    }

    #[test]
    fn test_generates_beats_on_time() {
        let (mut m, clock) = metronome(EngineConfig::default());
        m.start().unwrap();
        drive(&mut m, &clock, 2.0);

        let times: Vec<f64> = m.renderer().iter().map(|e| e.time).collect();
        assert!(times.len() >= 4);
        for (i, t) in times.iter().enumerate() {
            assert!((t - i as f64 * 0.5).abs() < 1e-9);
        }
        // Never generates past the lookahead window
        assert!(*times.last().unwrap() < clock.now() + 0.1);
    }

    #[test]
    fn test_start_failure_leaves_metronome_stopped() {
        let (mut m, clock) = metronome(EngineConfig::default());
        clock.set_available(false);
        assert!(m.start().is_err());
        drive(&mut m, &clock, 0.5);
        assert!(m.renderer().is_empty());

        clock.set_available(true);
        assert!(m.start().is_ok());
        drive(&mut m, &clock, 0.1);
        assert!(!m.renderer().is_empty());
    }

    #[test]
    fn test_stop_keeps_tail_only() {
        let (mut m, clock) = metronome(EngineConfig::default());
        m.start().unwrap();
        drive(&mut m, &clock, 1.0);
        m.stop();
        let count = m.renderer().len();
        drive(&mut m, &clock, 1.0);
        assert_eq!(m.renderer().len(), count);
        m.stop();
    }

    #[test]
    fn test_tap_sets_tempo() {
        let (mut m, clock) = metronome(EngineConfig::default());
        assert_eq!(m.tap(), None);
        clock.advance(0.75);
        assert_eq!(m.tap(), Some(80.0));
        assert_eq!(m.tempo().bpm(), 80.0);
    }

    #[test]
    fn test_tap_buffer_resets_when_idle() {
        let (mut m, clock) = metronome(EngineConfig::default());
        m.tap();
        clock.advance(0.5);
        m.tap();
        drive(&mut m, &clock, 6.0);
        assert_eq!(m.tap(), None);
    }

    #[test]
    fn test_practice_drives_tempo_and_completes() {
        let (mut m, _clock) = metronome(EngineConfig::default());

        let completed = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&completed);
        m.on_session_completed(Some(Box::new(move |summary: &SessionSummary| -> HookResult {
            *sink.lock().unwrap() = Some(summary.final_bpm);
            Ok(())
        })));

        let settings = PracticeSettings {
            starting_bpm: 60.0,
            starting_pulse_unit: PulseUnit::Quarter,
            target_bpm: 80.0,
            target_pulse_unit: PulseUnit::Quarter,
            required_correct: 1,
            increment: 10.0,
            penalty: 0.0,
        };
        m.start_practice(&settings);
        assert_eq!(m.tempo().bpm(), 60.0);

        m.pass();
        assert_eq!(m.tempo().bpm(), 70.0);
        m.pass();
        assert_eq!(m.tempo().bpm(), 80.0);
        assert!(matches!(m.pass(), Some(PracticeSignal::SessionCompleted(_))));
        assert_eq!(*completed.lock().unwrap(), Some(80.0));
    }

    #[test]
    fn test_break_hook_failure_is_isolated() {
        let (mut m, _clock) = metronome(EngineConfig::default());
        m.on_break_suggested(Some(Box::new(|_: BreakReason| -> HookResult {
            Err("toast layer missing".into())
        })));

        m.start_practice(&PracticeSettings::default());
        m.fail();
        m.fail();
        assert_eq!(
            m.fail(),
            Some(PracticeSignal::BreakSuggested(BreakReason::RepeatedFailures))
        );
        assert!(m.practice().is_active());
    }

    #[test]
    fn test_fatigue_only_counts_running_time() {
        let config = EngineConfig {
            fatigue_limit_secs: 3.0,
            ..Default::default()
        };
        let (mut m, clock) = metronome(config);

        let reasons = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&reasons);
        m.on_break_suggested(Some(Box::new(move |reason: BreakReason| -> HookResult {
            sink.lock().unwrap().push(reason);
            Ok(())
        })));

        m.start_practice(&PracticeSettings::default());

        // Stopped transport: no active time accumulates
        let report = drive(&mut m, &clock, 5.0);
        assert!(report.signals.is_empty());

        m.start().unwrap();
        let report = drive(&mut m, &clock, 5.0);
        assert_eq!(
            report.signals,
            vec![PracticeSignal::BreakSuggested(BreakReason::Fatigue)]
        );
        assert_eq!(*reasons.lock().unwrap(), vec![BreakReason::Fatigue]);
    }

    #[test]
    fn test_visual_cues_follow_onsets() {
        let (mut m, clock) = metronome(EngineConfig::default());
        let beats = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&beats);
        let hook_clock = clock.clone();
        m.on_main_beat(Some(Box::new(move |event: &PulseEvent| -> HookResult {
            sink.lock().unwrap().push((event.time, hook_clock.now()));
            Ok(())
        })));

        m.start().unwrap();
        drive(&mut m, &clock, 1.2);

        let beats = beats.lock().unwrap();
        assert_eq!(beats.len(), 3);
        for &(onset, fired_at) in beats.iter() {
            assert!(fired_at >= onset);
            assert!(fired_at - onset < 0.006);
        }
    }

    #[test]
    fn test_visual_cues_can_be_disabled() {
        let config = EngineConfig {
            visual_cues: false,
            ..Default::default()
        };
        let (mut m, clock) = metronome(config);
        m.on_main_beat(Some(Box::new(|_: &PulseEvent| -> HookResult { Ok(()) })));
        m.start().unwrap();
        assert_eq!(drive(&mut m, &clock, 1.0).cues, 0);
    }

    #[test]
    fn test_run_until_stopped() {
        let stop = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stop);
        let stopper = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(100));
            flag.store(true, Ordering::Release);
        });

        let mut m = Metronome::new(
            SystemClock::new(),
            Vec::<PulseEvent>::new(),
            &EngineConfig::default(),
        );
        m.start().unwrap();
        m.run(&stop);
        stopper.join().unwrap();

        assert!(!m.renderer().is_empty());
        assert!(m.renderer()[0].is_main());
    }
}

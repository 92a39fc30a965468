// src/scheduler.rs

use log::{debug, error, info, warn};

use crate::clock::ClockSource;
use crate::cues::{BeatHook, VisualCues};
use crate::error::EngineResult;
use crate::event::PulseEvent;
use crate::renderer::PulseRenderer;
use crate::tempo::{Tempo, TempoControl};

/// How far ahead of the clock events are generated (seconds).
pub const LOOKAHEAD: f64 = 0.100;

/// Period of the coarse generation tick (seconds).
///
/// Must stay at or below a quarter of `LOOKAHEAD` so that several ticks land
/// before any generated event's deadline.
pub const TICK_INTERVAL: f64 = 0.025;

/// Generates pulse events slightly ahead of the clock.
///
/// The tick that decides *what* plays runs on a coarse, jittery timer.
/// *When* it plays is delegated to the renderer, which receives absolute
/// onset times and schedules them on its own sample-accurate clock.
pub struct Scheduler<C: ClockSource> {
    clock: C,

    tempo: Tempo,

    /// Absolute time of the next main beat to generate
    next_event_time: f64,

    /// Index of the next main beat since start; skipped beats still count
    beat_index: u64,

    running: bool,

    lookahead: f64,

    /// Visual cue hooks and their pending queue
    cues: VisualCues,
}

impl<C: ClockSource> Scheduler<C> {
    pub fn new(clock: C) -> Self {
        Self::with_tempo(clock, Tempo::default(), LOOKAHEAD)
    }

    pub fn with_tempo(clock: C, tempo: Tempo, lookahead: f64) -> Self {
        Self {
            clock,
            tempo,
            next_event_time: 0.0,
            beat_index: 0,
            running: false,
            lookahead,
            cues: VisualCues::new(),
        }
    }

    // -------------------------------
    // MARK: Transport
    // -------------------------------

    /// Start generating events from the current clock time.
    ///
    /// Calling this while running does nothing. If the clock cannot be
    /// resumed the scheduler stays stopped and the call may be retried.
    pub fn start(&mut self) -> EngineResult<()> {
        if self.running {
            return Ok(());
        }

        if let Err(e) = self.clock.resume() {
            error!("Scheduler start failed: {}", e);
            return Err(e);
        }

        self.next_event_time = self.clock.now();
        self.beat_index = 0;
        self.running = true;

        info!(
            "Scheduler started at {:.3}s ({} bpm, subdivision {})",
            self.next_event_time,
            self.tempo.bpm(),
            self.tempo.subdivision()
        );
        Ok(())
    }

    /// Stop generating events.
    ///
    /// Events already handed to the renderer inside the lookahead window are
    /// not retracted and still sound.
    pub fn stop(&mut self) {
        if !self.running {
            return;
        }
        self.running = false;
        info!("Scheduler stopped after {} beats", self.beat_index);
    }

    #[inline]
    pub fn is_running(&self) -> bool {
        self.running
    }

    // -------------------------------
    // MARK: Tempo
    // -------------------------------

    /// Set tempo. Applies from the next beat not yet generated; the already
    /// committed next beat keeps its time.
    pub fn set_tempo(&mut self, bpm: f64) -> f64 {
        let applied = self.tempo.set_bpm(bpm);
        debug!("Tempo set to {} bpm", applied);
        applied
    }

    /// Set pulses per beat. Applies from the next beat not yet generated.
    pub fn set_subdivision(&mut self, subdivision: u32) -> u32 {
        let applied = self.tempo.set_subdivision(subdivision);
        debug!("Subdivision set to {}", applied);
        applied
    }

    #[inline]
    pub fn tempo(&self) -> Tempo {
        self.tempo
    }

    // -------------------------------
    // MARK: Generation
    // -------------------------------

    /// Fill the lookahead window with events.
    ///
    /// Called on every coarse timer wake-up. Returns the number of events
    /// handed to the renderer. Renderer failures are logged per event and
    /// never stop generation.
    ///
    /// If the cursor fell behind the clock (missed ticks, a suspended host),
    /// the missed beats are skipped rather than emitted in the past.
    pub fn tick<R: PulseRenderer + ?Sized>(&mut self, renderer: &mut R) -> usize {
        if !self.running {
            return 0;
        }

        let now = self.clock.now();
        if self.next_event_time < now {
            self.skip_missed_beats(now);
        }

        let horizon = now + self.lookahead;
        let mut emitted = 0;

        while self.next_event_time < horizon {
            // Tempo is read once per beat so a beat's subs share its spacing
            let beat_duration = self.tempo.beat_duration();
            let subdivision = self.tempo.subdivision();
            let beat_start = self.next_event_time;

            self.emit(renderer, PulseEvent::main(beat_start, self.beat_index));
            emitted += 1;

            for i in 1..subdivision {
                let offset = f64::from(i) / f64::from(subdivision) * beat_duration;
                self.emit(
                    renderer,
                    PulseEvent::sub(beat_start + offset, self.beat_index, i),
                );
                emitted += 1;
            }

            self.next_event_time = beat_start + beat_duration;
            self.beat_index += 1;
        }

        emitted
    }

    /// Move the cursor to the first beat at or after `now`, keeping phase.
    fn skip_missed_beats(&mut self, now: f64) {
        let beat_duration = self.tempo.beat_duration();
        let missed = ((now - self.next_event_time) / beat_duration).ceil();

        self.next_event_time += missed * beat_duration;
        self.beat_index += missed as u64;
        warn!(
            "Scheduler fell behind the clock, skipped {} beats (resuming at {:.3}s)",
            missed, self.next_event_time
        );
    }

    fn emit<R: PulseRenderer + ?Sized>(&mut self, renderer: &mut R, event: PulseEvent) {
        if let Err(e) = renderer.render_event(&event) {
            warn!("Renderer rejected {:?} at {:.4}s: {}", event.kind, event.time, e);
        }
        self.cues.schedule(&event);
    }

    // -------------------------------
    // MARK: Visual cues
    // -------------------------------

    pub fn on_main_beat(&mut self, hook: Option<BeatHook>) {
        self.cues.set_on_main_beat(hook);
    }

    pub fn on_sub_beat(&mut self, hook: Option<BeatHook>) {
        self.cues.set_on_sub_beat(hook);
    }

    /// Fire visual cues whose onset has passed.
    pub fn poll_cues(&mut self) -> usize {
        let now = self.clock.now();
        self.cues.poll(now)
    }

    // -------------------------------
    // MARK: Accessors
    // -------------------------------

    #[inline]
    pub fn now(&self) -> f64 {
        self.clock.now()
    }

    #[inline]
    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Time of the next main beat to be generated (read-only).
    #[inline]
    pub fn next_event_time(&self) -> f64 {
        self.next_event_time
    }

    #[inline]
    pub fn beats_generated(&self) -> u64 {
        self.beat_index
    }
}

impl<C: ClockSource> TempoControl for Scheduler<C> {
    fn set_tempo(&mut self, bpm: f64) -> f64 {
        Scheduler::set_tempo(self, bpm)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::error::HookResult;
    use crate::event::PulseKind;

    const EPSILON: f64 = 1e-9;

    fn scheduler_at(bpm: f64, subdivision: u32) -> (Scheduler<ManualClock>, ManualClock) {
        let clock = ManualClock::new();
        let mut scheduler = Scheduler::new(clock.clone());
        scheduler.set_tempo(bpm);
        scheduler.set_subdivision(subdivision);
        (scheduler, clock)
    }

    /// Advance the clock one tick at a time, ticking after each step.
    fn run_ticks(
        scheduler: &mut Scheduler<ManualClock>,
        clock: &ManualClock,
        ticks: usize,
        out: &mut Vec<PulseEvent>,
    ) {
        for _ in 0..ticks {
            scheduler.tick(out);
            clock.advance(TICK_INTERVAL);
        }
    }

    fn mains(events: &[PulseEvent]) -> Vec<f64> {
        events.iter().filter(|e| e.is_main()).map(|e| e.time).collect()
    }

    #[test]
    fn test_lookahead_ratio() {
        assert!(LOOKAHEAD >= 4.0 * TICK_INTERVAL);
    }

    #[test]
    fn test_timestamps_strictly_increase() {
        for &(bpm, sub) in &[(20.0, 1), (60.0, 2), (97.0, 3), (120.0, 4), (300.0, 7)] {
            let (mut scheduler, clock) = scheduler_at(bpm, sub);
            scheduler.start().unwrap();

            let mut events = Vec::new();
            run_ticks(&mut scheduler, &clock, 200, &mut events);

            assert!(!events.is_empty());
            for pair in events.windows(2) {
                assert!(
                    pair[1].time > pair[0].time,
                    "events out of order at {} bpm / {}",
                    bpm,
                    sub
                );
            }

            for pair in mains(&events).windows(2) {
                assert!((pair[1] - pair[0] - 60.0 / bpm).abs() < EPSILON);
            }
        }
    }

    #[test]
    fn test_sub_event_offsets() {
        let (mut scheduler, clock) = scheduler_at(90.0, 4);
        scheduler.start().unwrap();

        let mut events = Vec::new();
        run_ticks(&mut scheduler, &clock, 120, &mut events);

        let beat = 60.0 / 90.0;
        let mut last_main = None;
        for event in &events {
            match event.kind {
                PulseKind::Main => last_main = Some(event.time),
                PulseKind::Sub => {
                    let t = last_main.unwrap();
                    let expected = t + f64::from(event.sub_index) / 4.0 * beat;
                    assert!((event.time - expected).abs() < EPSILON);
                }
            }
        }

        let subs_per_beat = events.iter().filter(|e| e.beat == 0 && !e.is_main()).count();
        assert_eq!(subs_per_beat, 3);
    }

    #[test]
    fn test_tempo_change_keeps_committed_beat() {
        let (mut scheduler, clock) = scheduler_at(60.0, 1);
        scheduler.start().unwrap();

        let mut events = Vec::new();
        scheduler.tick(&mut events);
        assert_eq!(mains(&events), vec![0.0]);
        assert!((scheduler.next_event_time() - 1.0).abs() < EPSILON);

        clock.set(0.5);
        scheduler.set_tempo(120.0);
        assert!((scheduler.next_event_time() - 1.0).abs() < EPSILON);

        clock.set(0.95);
        scheduler.tick(&mut events);
        clock.set(1.45);
        scheduler.tick(&mut events);
        clock.set(1.95);
        scheduler.tick(&mut events);

        let times = mains(&events);
        assert_eq!(times.len(), 4);
        assert!((times[1] - 1.0).abs() < EPSILON);
        assert!((times[2] - 1.5).abs() < EPSILON);
        assert!((times[3] - 2.0).abs() < EPSILON);
    }

    #[test]
    fn test_subdivision_change_applies_to_next_beat() {
        let (mut scheduler, clock) = scheduler_at(60.0, 2);
        scheduler.start().unwrap();

        let mut events = Vec::new();
        scheduler.tick(&mut events);
        assert_eq!(events.len(), 2);

        scheduler.set_subdivision(3);
        clock.set(0.95);
        scheduler.tick(&mut events);

        assert_eq!(events.len(), 5);
        assert!(events[..2].iter().all(|e| e.beat == 0));
        assert!(events[2..].iter().all(|e| e.beat == 1));
    }

    #[test]
    fn test_start_is_idempotent() {
        let (mut scheduler, clock) = scheduler_at(120.0, 1);
        scheduler.start().unwrap();

        let mut events = Vec::new();
        scheduler.tick(&mut events);
        let cursor = scheduler.next_event_time();

        clock.set(0.3);
        scheduler.start().unwrap();
        assert_eq!(scheduler.next_event_time(), cursor);
        assert_eq!(scheduler.beats_generated(), 1);
    }

    #[test]
    fn test_stop_when_stopped_is_noop() {
        let (mut scheduler, _clock) = scheduler_at(120.0, 1);
        scheduler.stop();
        assert!(!scheduler.is_running());

        let mut events = Vec::new();
        assert_eq!(scheduler.tick(&mut events), 0);
    }

    #[test]
    fn test_stop_halts_generation() {
        let (mut scheduler, clock) = scheduler_at(120.0, 1);
        scheduler.start().unwrap();

        let mut events = Vec::new();
        run_ticks(&mut scheduler, &clock, 40, &mut events);
        let count = events.len();

        scheduler.stop();
        run_ticks(&mut scheduler, &clock, 40, &mut events);
        assert_eq!(events.len(), count);
    }

    #[test]
    fn test_audio_unavailable_is_retriable() {
        let (mut scheduler, clock) = scheduler_at(120.0, 1);
        clock.set_available(false);

        assert!(scheduler.start().is_err());
        assert!(!scheduler.is_running());

        clock.set_available(true);
        clock.set(2.0);
        assert!(scheduler.start().is_ok());
        assert!((scheduler.next_event_time() - 2.0).abs() < EPSILON);
    }

    #[test]
    fn test_stalled_ticks_skip_missed_beats() {
        let (mut scheduler, clock) = scheduler_at(120.0, 2);
        scheduler.start().unwrap();

        let mut events = Vec::new();
        scheduler.tick(&mut events);
        assert_eq!(events.len(), 2);

        // One minute without a tick
        clock.set(60.0);
        let emitted = scheduler.tick(&mut events);

        let bound = (LOOKAHEAD / 0.5 + 1.0) as usize * 2;
        assert!(emitted <= bound);
        assert_eq!(emitted, 2);

        let resumed = &events[2..];
        assert!(resumed.iter().all(|e| e.time >= 60.0));
        assert!((resumed[0].time - 60.0).abs() < EPSILON);
        assert_eq!(resumed[0].beat, 120);
    }

    #[test]
    fn test_skipped_beats_keep_phase() {
        let (mut scheduler, clock) = scheduler_at(120.0, 1);
        scheduler.start().unwrap();

        let mut events = Vec::new();
        scheduler.tick(&mut events);

        // Mid-beat: the next beat on the original grid is 60.5
        clock.set(60.2);
        assert_eq!(scheduler.tick(&mut events), 0);
        assert!((scheduler.next_event_time() - 60.5).abs() < EPSILON);

        clock.set(60.45);
        assert_eq!(scheduler.tick(&mut events), 1);
        assert!((mains(&events)[1] - 60.5).abs() < EPSILON);
        assert_eq!(events[1].beat, 121);
    }

    struct FailingRenderer {
        calls: usize,
    }

    impl PulseRenderer for FailingRenderer {
        fn render_event(&mut self, _event: &PulseEvent) -> HookResult {
            self.calls += 1;
            Err("device lost".into())
        }
    }

    #[test]
    fn test_renderer_failure_does_not_stop_scheduling() {
        let (mut scheduler, clock) = scheduler_at(120.0, 2);
        scheduler.on_main_beat(Some(Box::new(|_: &PulseEvent| -> HookResult { Ok(()) })));
        scheduler.start().unwrap();

        let mut renderer = FailingRenderer { calls: 0 };
        for _ in 0..40 {
            scheduler.tick(&mut renderer);
            clock.advance(TICK_INTERVAL);
        }

        assert!(renderer.calls > 4);
        assert!(scheduler.poll_cues() > 0);
    }
}

// src/practice/engine.rs
//
// Practice progression state machine.
//
//   Idle -> Active -> Completed
//                  -> Exited
//
// Each transition recomputes the session tempo and pushes it through
// `TempoControl`. The engine never reads scheduler state. Callers serialize
// access (every operation takes `&mut self`).

use log::{debug, info, warn};

use super::journal::{LogEntry, LogKind, MemoryLog, SessionLog};
use super::session::{
    BreakReason, FAILS_BEFORE_BREAK, FATIGUE_LIMIT, FatigueMonitor, PracticeSession,
    PracticeSignal, ScaleDirection, SessionSummary,
};
use super::settings::{PracticeSettings, pulse_rate};
use crate::tempo::{MAX_BPM, MIN_BPM, TempoControl};

/// Everything an active session carries.
#[derive(Debug, Clone)]
pub struct ActivePractice {
    pub settings: PracticeSettings,
    pub session: PracticeSession,
    fatigue: FatigueMonitor,
}

#[derive(Debug, Clone)]
pub enum PracticeState {
    Idle,
    Active(ActivePractice),
    Completed(SessionSummary),
    Exited,
}

pub struct PracticeEngine<L: SessionLog = MemoryLog> {
    state: PracticeState,
    log: L,
    fatigue_limit: f64,
}

impl PracticeEngine<MemoryLog> {
    pub fn new() -> Self {
        Self::with_log(MemoryLog::new())
    }
}

impl Default for PracticeEngine<MemoryLog> {
    fn default() -> Self {
        Self::new()
    }
}

impl<L: SessionLog> PracticeEngine<L> {
    pub fn with_log(log: L) -> Self {
        Self {
            state: PracticeState::Idle,
            log,
            fatigue_limit: FATIGUE_LIMIT,
        }
    }

    /// Override the active-time limit for sessions started afterwards.
    pub fn set_fatigue_limit(&mut self, seconds: f64) {
        self.fatigue_limit = seconds.max(0.0);
    }

    // ═══════════════════════════════════════════════════════════════════
    // Transitions
    // ═══════════════════════════════════════════════════════════════════

    /// Begin a session. Settings are clamped into range first.
    ///
    /// Starting while a session is active replaces it.
    pub fn start<T: TempoControl + ?Sized>(
        &mut self,
        settings: &PracticeSettings,
        now: f64,
        tempo: &mut T,
    ) {
        if self.is_active() {
            warn!("Practice restarted while a session was active");
        }

        let settings = settings.sanitized();
        let bpm = tempo.set_tempo(settings.starting_bpm);
        let unit = settings.starting_pulse_unit;

        info!(
            "Practice started at {} bpm ({}), target {} bpm ({})",
            bpm,
            unit.name(),
            settings.target_bpm,
            settings.target_pulse_unit.name()
        );
        self.log
            .log_event(LogEntry::new(LogKind::Start, bpm, unit.name()));

        self.state = PracticeState::Active(ActivePractice {
            settings,
            session: PracticeSession::new(bpm, unit, now),
            fatigue: FatigueMonitor::with_limit(now, self.fatigue_limit),
        });
    }

    /// Record a successful attempt.
    pub fn pass<T: TempoControl + ?Sized>(&mut self, tempo: &mut T) -> Option<PracticeSignal> {
        let PracticeState::Active(active) = &mut self.state else {
            debug!("pass ignored: no active session");
            return None;
        };

        let settings = &active.settings;
        let session = &mut active.session;

        session.consecutive_fails = 0;
        session.correct_count += 1;

        let required = settings.required_correct.max(1) as u32;
        if session.correct_count < required {
            self.log.log_event(LogEntry::new(
                LogKind::Pass,
                session.current_bpm,
                format!("{}/{}", session.correct_count, required),
            ));
            return None;
        }

        if session.rate() >= settings.target_rate() {
            let summary = SessionSummary {
                final_bpm: session.current_bpm,
                pulse_unit: session.current_pulse_unit,
                active_secs: active.fatigue.active_secs(),
            };

            info!(
                "Practice complete at {} bpm ({})",
                summary.final_bpm,
                summary.pulse_unit.name()
            );
            self.log.log_event(LogEntry::new(
                LogKind::Pass,
                summary.final_bpm,
                "target reached",
            ));

            self.state = PracticeState::Completed(summary.clone());
            return Some(PracticeSignal::SessionCompleted(summary));
        }

        // Never overshoot the target once it is expressed in the current unit
        let ceiling = settings.target_rate() * f64::from(session.current_pulse_unit.denominator());
        let next = (session.current_bpm + settings.increment)
            .min(ceiling)
            .clamp(MIN_BPM, MAX_BPM);

        session.correct_count = 0;

        if next <= session.current_bpm {
            warn!(
                "Cannot advance past {} bpm at {} pulse; target needs a different pulse unit",
                session.current_bpm,
                session.current_pulse_unit.name()
            );
            self.log.log_event(LogEntry::new(
                LogKind::Pass,
                session.current_bpm,
                "tempo limit",
            ));
            return None;
        }

        let previous = session.current_bpm;
        session.current_bpm = tempo.set_tempo(next);

        info!("Level up: {} -> {} bpm", previous, session.current_bpm);
        self.log.log_event(LogEntry::new(
            LogKind::LevelUp,
            session.current_bpm,
            format!("from {}", previous),
        ));

        None
    }

    /// Record a failed attempt.
    pub fn fail<T: TempoControl + ?Sized>(&mut self, tempo: &mut T) -> Option<PracticeSignal> {
        let PracticeState::Active(active) = &mut self.state else {
            debug!("fail ignored: no active session");
            return None;
        };

        let settings = &active.settings;
        let session = &mut active.session;

        session.consecutive_fails += 1;
        session.correct_count = 0;

        let mut signal = None;
        if session.consecutive_fails >= FAILS_BEFORE_BREAK {
            info!("{} failures in a row, suggesting a break", session.consecutive_fails);
            session.consecutive_fails = 0;
            signal = Some(PracticeSignal::BreakSuggested(BreakReason::RepeatedFailures));
        }

        let next = (session.current_bpm - settings.penalty).max(MIN_BPM);
        session.current_bpm = tempo.set_tempo(next);

        self.log.log_event(LogEntry::new(
            LogKind::Fail,
            session.current_bpm,
            format!("-{}", settings.penalty),
        ));

        signal
    }

    /// Re-express the tempo in a finer or coarser note value.
    ///
    /// Doubling the unit doubles the BPM; halving halves it (floored). No
    /// pass/fail evaluation happens. Returns false when already at the
    /// sixteenth (double) or whole (halve) boundary, or when no session is
    /// active.
    pub fn scale_pulse<T: TempoControl + ?Sized>(
        &mut self,
        direction: ScaleDirection,
        tempo: &mut T,
    ) -> bool {
        let PracticeState::Active(active) = &mut self.state else {
            debug!("scale_pulse ignored: no active session");
            return false;
        };
        let session = &mut active.session;

        let (unit, bpm) = match direction {
            ScaleDirection::Double => match session.current_pulse_unit.doubled() {
                Some(unit) => (unit, (session.current_bpm * 2.0).min(MAX_BPM)),
                None => return false,
            },
            ScaleDirection::Halve => match session.current_pulse_unit.halved() {
                Some(unit) => (unit, (session.current_bpm / 2.0).floor().max(MIN_BPM)),
                None => return false,
            },
        };

        session.current_pulse_unit = unit;
        session.current_bpm = tempo.set_tempo(bpm);

        debug!(
            "Pulse scaled to {} at {} bpm",
            unit.name(),
            session.current_bpm
        );
        true
    }

    /// Leave the session. The scheduler is left as is.
    pub fn exit(&mut self) -> Option<SessionSummary> {
        let PracticeState::Active(active) = &mut self.state else {
            debug!("exit ignored: no active session");
            return None;
        };

        active.fatigue.disarm();
        let summary = SessionSummary {
            final_bpm: active.session.current_bpm,
            pulse_unit: active.session.current_pulse_unit,
            active_secs: active.fatigue.active_secs(),
        };

        info!("Practice exited at {} bpm", summary.final_bpm);
        self.log
            .log_event(LogEntry::new(LogKind::Exit, summary.final_bpm, ""));

        self.state = PracticeState::Exited;
        Some(summary)
    }

    /// Account active time and check the fatigue limit.
    ///
    /// Meant to be called on a coarse (about one second) timer. The target
    /// comparison here is the raw configured BPM, not the normalized rate.
    pub fn poll_fatigue(&mut self, now: f64, transport_running: bool) -> Option<PracticeSignal> {
        let PracticeState::Active(active) = &mut self.state else {
            return None;
        };

        let below_target = active.session.current_bpm < active.settings.target_bpm;
        if active.fatigue.poll(now, transport_running, below_target) {
            info!(
                "{:.0} minutes of practice below target, suggesting a break",
                active.fatigue.active_secs() / 60.0
            );
            return Some(PracticeSignal::BreakSuggested(BreakReason::Fatigue));
        }
        None
    }

    // ═══════════════════════════════════════════════════════════════════
    // Accessors
    // ═══════════════════════════════════════════════════════════════════

    #[inline]
    pub fn state(&self) -> &PracticeState {
        &self.state
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        matches!(self.state, PracticeState::Active(_))
    }

    pub fn session(&self) -> Option<&PracticeSession> {
        match &self.state {
            PracticeState::Active(active) => Some(&active.session),
            _ => None,
        }
    }

    pub fn settings(&self) -> Option<&PracticeSettings> {
        match &self.state {
            PracticeState::Active(active) => Some(&active.settings),
            _ => None,
        }
    }

    /// Whether the session has reached its normalized target rate.
    pub fn target_reached(&self) -> bool {
        match &self.state {
            PracticeState::Active(active) => {
                pulse_rate(active.session.current_bpm, active.session.current_pulse_unit)
                    >= active.settings.target_rate()
            }
            PracticeState::Completed(_) => true,
            _ => false,
        }
    }

    #[inline]
    pub fn log(&self) -> &L {
        &self.log
    }

    #[inline]
    pub fn log_mut(&mut self) -> &mut L {
        &mut self.log
    }
}

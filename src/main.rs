// src/main.rs
//
// Headless demo: clicks through the log for a few seconds, then walks a
// short practice session.
//
// Usage: tempokeeper [config.json]
// Set RUST_LOG=debug to see every scheduled pulse.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use log::{error, info};

use tempokeeper::practice::{
    BreakReason, PracticeSettings, PracticeSignal, PulseUnit, SessionSummary,
};
use tempokeeper::{
    EngineConfig, EngineResult, HookResult, LogRenderer, Metronome, PulseEvent, SystemClock,
};

const RUN_SECS: u64 = 3;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(e) = run() {
        error!("{}", e);
        std::process::exit(1);
    }
}

fn run() -> EngineResult<()> {
    let config = match std::env::args().nth(1) {
        Some(path) => EngineConfig::load(&path)?,
        None => EngineConfig::default(),
    };

    let mut metronome = Metronome::new(SystemClock::new(), LogRenderer, &config);

    // --------------------------------
    // Hooks
    // --------------------------------

    metronome.on_main_beat(Some(Box::new(|event: &PulseEvent| -> HookResult {
        info!("Beat {} @ {:.3}s", event.beat, event.time);
        Ok(())
    })));
    metronome.on_session_completed(Some(Box::new(|summary: &SessionSummary| -> HookResult {
        info!(
            "Practice complete at {} bpm ({}), {:.1}s active",
            summary.final_bpm,
            summary.pulse_unit.name(),
            summary.active_secs
        );
        Ok(())
    })));
    metronome.on_break_suggested(Some(Box::new(|reason: BreakReason| -> HookResult {
        info!("Time for a break ({:?})", reason);
        Ok(())
    })));

    // --------------------------------
    // Free click
    // --------------------------------

    metronome.set_subdivision(2);
    metronome.start()?;
    run_for(&mut metronome, Duration::from_secs(RUN_SECS));
    metronome.stop();

    // --------------------------------
    // Practice walk-through
    // --------------------------------

    let settings = PracticeSettings {
        starting_bpm: 60.0,
        starting_pulse_unit: PulseUnit::Quarter,
        target_bpm: 80.0,
        target_pulse_unit: PulseUnit::Quarter,
        required_correct: 1,
        increment: 10.0,
        penalty: 5.0,
    };
    metronome.start_practice(&settings);
    metronome.start()?;

    while metronome.practice().is_active() {
        run_for(&mut metronome, Duration::from_secs(1));
        if let Some(PracticeSignal::SessionCompleted(_)) = metronome.pass() {
            break;
        }
        info!("Practicing at {} bpm", metronome.tempo().bpm());
    }

    metronome.stop();
    Ok(())
}

/// Drive the metronome from this thread until `duration` elapses.
fn run_for(metronome: &mut Metronome<SystemClock, LogRenderer>, duration: Duration) {
    let stop = Arc::new(AtomicBool::new(false));
    let timer = {
        let stop = Arc::clone(&stop);
        thread::spawn(move || {
            thread::sleep(duration);
            stop.store(true, Ordering::Release);
        })
    };

    metronome.run(&stop);
    timer.join().ok();
}

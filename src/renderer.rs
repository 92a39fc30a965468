// src/renderer.rs
//
// The seam between the scheduler and whatever makes the click audible.

use log::debug;

use crate::error::HookResult;
use crate::event::PulseEvent;

/// Realizes pulse events as sound.
///
/// Implementations receive events up to one lookahead window before their
/// onset and must start playback at `event.time` on their own clock,
/// regardless of when `render_event` was called.
pub trait PulseRenderer {
    fn render_event(&mut self, event: &PulseEvent) -> HookResult;
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullRenderer;

impl PulseRenderer for NullRenderer {
    fn render_event(&mut self, _event: &PulseEvent) -> HookResult {
        Ok(())
    }
}

/// Writes every event to the debug log. Used by the headless demo.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogRenderer;

impl PulseRenderer for LogRenderer {
    fn render_event(&mut self, event: &PulseEvent) -> HookResult {
        debug!(
            "pulse {:?} beat={} sub={} at {:.4}s",
            event.kind, event.beat, event.sub_index, event.time
        );
        Ok(())
    }
}

/// Collects events in order. Handy for inspection and offline rendering.
impl PulseRenderer for Vec<PulseEvent> {
    fn render_event(&mut self, event: &PulseEvent) -> HookResult {
        self.push(*event);
        Ok(())
    }
}

impl<R: PulseRenderer + ?Sized> PulseRenderer for Box<R> {
    fn render_event(&mut self, event: &PulseEvent) -> HookResult {
        (**self).render_event(event)
    }
}

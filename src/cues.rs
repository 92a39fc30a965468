// src/cues.rs
//
// Visual beat cues.
//
// A second, lower-priority delayed-callback queue layered next to the audio
// path. Cues fire on the first poll at or after their onset time, so their
// precision is the polling cadence, not the sample clock. A failing hook or
// renderer never affects the other path.

use std::collections::VecDeque;

use log::warn;

use crate::error::HookResult;
use crate::event::{PulseEvent, PulseKind};

/// Observer hook for a visual pulse.
pub type BeatHook = Box<dyn FnMut(&PulseEvent) -> HookResult + Send>;

/// Pending visual cues plus the hooks that consume them.
pub struct VisualCues {
    on_main_beat: Option<BeatHook>,
    on_sub_beat: Option<BeatHook>,

    /// Sorted by onset
    pending: VecDeque<PulseEvent>,
}

impl VisualCues {
    pub fn new() -> Self {
        Self {
            on_main_beat: None,
            on_sub_beat: None,
            pending: VecDeque::with_capacity(32),
        }
    }

    pub fn set_on_main_beat(&mut self, hook: Option<BeatHook>) {
        self.on_main_beat = hook;
    }

    pub fn set_on_sub_beat(&mut self, hook: Option<BeatHook>) {
        self.on_sub_beat = hook;
    }

    /// Whether anyone registered interest in this kind of pulse.
    #[inline]
    pub fn wants(&self, kind: PulseKind) -> bool {
        match kind {
            PulseKind::Main => self.on_main_beat.is_some(),
            PulseKind::Sub => self.on_sub_beat.is_some(),
        }
    }

    /// Queue a cue for an event. Ignored when nobody listens for its kind.
    pub fn schedule(&mut self, event: &PulseEvent) {
        if self.wants(event.kind) {
            let at = self.pending.partition_point(|queued| queued.time <= event.time);
            self.pending.insert(at, *event);
        }
    }

    /// Fire every cue whose onset is at or before `now`.
    ///
    /// Returns the number of cues fired. Hook errors are logged and dropped.
    pub fn poll(&mut self, now: f64) -> usize {
        let mut fired = 0;

        while let Some(event) = self.pending.front().copied() {
            if event.time > now {
                break;
            }
            self.pending.pop_front();

            let hook = match event.kind {
                PulseKind::Main => self.on_main_beat.as_mut(),
                PulseKind::Sub => self.on_sub_beat.as_mut(),
            };

            if let Some(hook) = hook {
                if let Err(e) = hook(&event) {
                    warn!("{:?} beat hook failed: {}", event.kind, e);
                }
                fired += 1;
            }
        }

        fired
    }

    #[inline]
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }
}

impl Default for VisualCues {
    fn default() -> Self {
        Self::new()
    }
}

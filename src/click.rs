// src/click.rs
//
// Single-voice click renderer.
//
// Receives pulse events ahead of time and starts each click on the exact
// frame its timestamp maps to, independent of when the event arrived. Owns a
// SampleClock handle and advances it per block, so the scheduler reading the
// same clock sees time in this renderer's frame domain.

use std::collections::VecDeque;
use std::f32::consts::TAU;
use std::sync::mpsc::{Receiver, Sender, TryRecvError};

use log::debug;

use crate::audio_buffer::AudioBuffer;
use crate::clock::SampleClock;
use crate::error::HookResult;
use crate::event::{PulseEvent, PulseKind};
use crate::renderer::PulseRenderer;

const CLICK_DURATION_SECS: f32 = 0.02;
const MAIN_FREQ: f32 = 1500.0;
const MAIN_GAIN: f32 = 0.9;
const SUB_FREQ: f32 = 1000.0;
const SUB_GAIN: f32 = 0.5;

/// Pre-rendered click waveforms.
#[derive(Debug, Clone)]
struct ClickSamples {
    main: Vec<f32>,
    sub: Vec<f32>,
}

impl ClickSamples {
    fn new(sample_rate: f32) -> Self {
        let len = ((CLICK_DURATION_SECS * sample_rate) as usize).max(1);
        Self {
            main: Self::synth(sample_rate, len, MAIN_FREQ, MAIN_GAIN),
            sub: Self::synth(sample_rate, len, SUB_FREQ, SUB_GAIN),
        }
    }

    /// Sine burst with a fast exponential decay.
    fn synth(sample_rate: f32, len: usize, freq: f32, gain: f32) -> Vec<f32> {
        let inc = freq / sample_rate;
        (0..len)
            .map(|i| {
                let t = i as f32 / len as f32;
                let envelope = (-t * 8.0).exp();
                (i as f32 * inc * TAU).sin() * envelope * gain
            })
            .collect()
    }

    #[inline]
    fn get(&self, kind: PulseKind) -> &[f32] {
        match kind {
            PulseKind::Main => &self.main,
            PulseKind::Sub => &self.sub,
        }
    }
}

/// The one click currently sounding.
#[derive(Debug, Clone, Copy)]
struct ClickVoice {
    kind: PulseKind,
    position: usize,
}

/// Renders pulse events into audio blocks.
pub struct ClickRenderer {
    clock: SampleClock,
    samples: ClickSamples,
    volume: f32,

    /// Onset frame and kind, sorted by onset
    pending: VecDeque<(u64, PulseKind)>,

    voice: Option<ClickVoice>,
}

impl ClickRenderer {
    pub fn new(clock: SampleClock) -> Self {
        let samples = ClickSamples::new(clock.sample_rate() as f32);
        Self {
            clock,
            samples,
            volume: 1.0,
            pending: VecDeque::with_capacity(64),
            voice: None,
        }
    }

    pub fn set_volume(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, 1.0);
    }

    #[inline]
    pub fn volume(&self) -> f32 {
        self.volume
    }

    /// Queue an event for playback at its timestamp, whatever the order
    /// events arrive in.
    pub fn queue(&mut self, event: &PulseEvent) {
        let onset = (event.time * self.clock.sample_rate()).round().max(0.0) as u64;
        let at = self.pending.partition_point(|&(queued, _)| queued <= onset);
        self.pending.insert(at, (onset, event.kind));
    }

    /// Pull every event waiting on a channel. Returns how many arrived.
    pub fn receive_from(&mut self, rx: &Receiver<PulseEvent>) -> usize {
        let mut received = 0;
        loop {
            match rx.try_recv() {
                Ok(event) => {
                    self.queue(&event);
                    received += 1;
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        received
    }

    #[inline]
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    #[inline]
    pub fn is_sounding(&self) -> bool {
        self.voice.is_some()
    }

    /// Render one block and advance the shared clock by its length.
    ///
    /// Events whose onset already passed start on the first frame.
    pub fn render_block(&mut self, output: &mut AudioBuffer) {
        let block_start = self.clock.frame_position();
        let frames = output.frames;

        {
            let out = output.channel_mut(0);
            for (i, sample) in out.iter_mut().enumerate() {
                let frame = block_start + i as u64;

                while let Some(&(onset, kind)) = self.pending.front() {
                    if onset > frame {
                        break;
                    }
                    if onset < block_start {
                        debug!(
                            "Late click ({} frames), playing at block start",
                            block_start - onset
                        );
                    }
                    self.pending.pop_front();
                    self.voice = Some(ClickVoice { kind, position: 0 });
                }

                *sample = self.next_sample();
            }
        }

        output.duplicate_first_channel();
        self.clock.advance_frames(frames);
    }

    #[inline]
    fn next_sample(&mut self) -> f32 {
        let Some(voice) = self.voice.as_mut() else {
            return 0.0;
        };

        let wave = self.samples.get(voice.kind);
        match wave.get(voice.position) {
            Some(&s) => {
                voice.position += 1;
                s * self.volume
            }
            None => {
                self.voice = None;
                0.0
            }
        }
    }
}

impl PulseRenderer for ClickRenderer {
    fn render_event(&mut self, event: &PulseEvent) -> HookResult {
        self.queue(event);
        Ok(())
    }
}

/// Forwards events to a renderer living on another thread.
impl PulseRenderer for Sender<PulseEvent> {
    fn render_event(&mut self, event: &PulseEvent) -> HookResult {
        self.send(*event)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    const SAMPLE_RATE: f64 = 48_000.0;

    fn first_nonzero(data: &[f32]) -> Option<usize> {
        data.iter().position(|s| s.abs() > 0.0)
    }

    #[test]
    fn test_click_starts_on_its_frame() {
        let clock = SampleClock::new(SAMPLE_RATE);
        let mut renderer = ClickRenderer::new(clock.clone());

        // 0.011s -> frame 528; the sine is zero at its first sample
        renderer.render_event(&PulseEvent::main(0.011, 0)).unwrap();

        let mut data = vec![0.0; 1024];
        let mut buffer = AudioBuffer::new(&mut data, 1);
        renderer.render_block(&mut buffer);

        assert_eq!(first_nonzero(&data), Some(529));
        assert_eq!(clock.frame_position(), 1024);
    }

    #[test]
    fn test_late_click_plays_at_block_start() {
        let clock = SampleClock::new(SAMPLE_RATE);
        let mut renderer = ClickRenderer::new(clock.clone());
        clock.advance_frames(4800);

        renderer.queue(&PulseEvent::sub(0.05, 0, 1));

        let mut data = vec![0.0; 256];
        let mut buffer = AudioBuffer::new(&mut data, 1);
        renderer.render_block(&mut buffer);

        assert_eq!(renderer.pending_count(), 0);
        assert!(first_nonzero(&data).is_some());
    }

    #[test]
    fn test_out_of_order_event_plays_at_its_own_time() {
        let clock = SampleClock::new(SAMPLE_RATE);
        let mut renderer = ClickRenderer::new(clock);

        // Tail of a stopped run, then the restart beat behind it
        renderer.queue(&PulseEvent::main(0.08, 3));
        renderer.queue(&PulseEvent::main(0.0, 0));

        let mut data = vec![0.0; 4800];
        let mut buffer = AudioBuffer::new(&mut data, 1);
        renderer.render_block(&mut buffer);

        assert_eq!(first_nonzero(&data), Some(1));
        // 0.08s -> frame 3840, silent until then once the first click decays
        assert!(data[1000..3841].iter().all(|&s| s == 0.0));
        assert!(data[3841..].iter().any(|&s| s != 0.0));
        assert_eq!(renderer.pending_count(), 0);
    }

    #[test]
    fn test_stereo_output_is_duplicated() {
        let clock = SampleClock::new(SAMPLE_RATE);
        let mut renderer = ClickRenderer::new(clock);
        renderer.queue(&PulseEvent::main(0.0, 0));

        let mut data = vec![0.0; 64];
        let mut buffer = AudioBuffer::new(&mut data, 2);
        renderer.render_block(&mut buffer);

        assert_eq!(buffer.channel(0), buffer.channel(1));
    }

    #[test]
    fn test_events_cross_threads() {
        let (mut tx, rx) = mpsc::channel();
        tx.render_event(&PulseEvent::main(0.0, 0)).unwrap();
        tx.render_event(&PulseEvent::sub(0.25, 0, 1)).unwrap();

        let mut renderer = ClickRenderer::new(SampleClock::new(SAMPLE_RATE));
        assert_eq!(renderer.receive_from(&rx), 2);
        assert_eq!(renderer.pending_count(), 2);
    }

    #[test]
    fn test_silence_without_events() {
        let mut renderer = ClickRenderer::new(SampleClock::new(SAMPLE_RATE));
        let mut data = vec![1.0; 16];
        let mut buffer = AudioBuffer::new(&mut data, 1);
        renderer.render_block(&mut buffer);
        assert!(data.iter().all(|&s| s == 0.0));
        assert!(!renderer.is_sounding());
    }
}

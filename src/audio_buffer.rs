// src/audio_buffer.rs

/// Borrowed planar output block: all frames of channel 0, then channel 1, ...
#[derive(Debug)]
pub struct AudioBuffer<'a> {
    pub channels: usize,
    pub frames: usize,
    pub data: &'a mut [f32],
}

impl<'a> AudioBuffer<'a> {
    /// Create a new AudioBuffer wrapping existing data.
    #[inline]
    pub fn new(data: &'a mut [f32], channels: usize) -> Self {
        let channels = channels.max(1);
        let frames = data.len() / channels;
        Self {
            channels,
            frames,
            data,
        }
    }

    #[inline]
    pub fn clear(&mut self) {
        self.data.fill(0.0);
    }

    #[inline]
    pub fn channel(&self, ch: usize) -> &[f32] {
        let start = ch * self.frames;
        &self.data[start..start + self.frames]
    }

    #[inline]
    pub fn channel_mut(&mut self, ch: usize) -> &mut [f32] {
        let start = ch * self.frames;
        &mut self.data[start..start + self.frames]
    }

    /// Copy channel 0 into every other channel.
    pub fn duplicate_first_channel(&mut self) {
        let frames = self.frames;
        if frames == 0 {
            return;
        }
        let (first, rest) = self.data.split_at_mut(frames);
        for ch in rest.chunks_exact_mut(frames) {
            ch.copy_from_slice(first);
        }
    }
}

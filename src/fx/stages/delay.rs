use anyhow::Result;

use crate::fx::stages::Stage;
use crate::fx::stages::common::{pct, wrap_back};
use crate::preset::DlyParams;

/// Feedback echo over a ring buffer one second (plus one block) long.
///
/// The tap is an integer number of samples behind the write cursor. Each
/// sample is read before its slot is overwritten, so the echo time is
/// exact for any block size.
pub struct DelayStage {
    buffer: Vec<f32>,
    write_pos: usize,
    sample_rate: f32,
}

impl DelayStage {
    pub fn new(sample_rate: f32, block_size: usize) -> Self {
        Self {
            buffer: vec![0.0; Self::buffer_len(sample_rate, block_size)],
            write_pos: 0,
            sample_rate,
        }
    }

    fn buffer_len(sample_rate: f32, block_size: usize) -> usize {
        sample_rate as usize + block_size.max(1)
    }

    /// Reallocates for a new block size. Not real-time safe.
    pub fn resize(&mut self, block_size: usize) {
        self.buffer = vec![0.0; Self::buffer_len(self.sample_rate, block_size)];
        self.write_pos = 0;
    }

    /// Tap distance in samples for a delay time, kept inside the buffer.
    pub fn tap_samples(&self, time_ms: f32) -> usize {
        let samples = (time_ms / 1000.0 * self.sample_rate) as usize;
        samples.clamp(1, self.buffer.len() - 1)
    }
}

impl Stage for DelayStage {
    type Params = DlyParams;

    fn process_block(&mut self, params: &DlyParams, block: &mut [f32]) -> Result<()> {
        let tap = self.tap_samples(params.time_ms);
        let feedback = pct(params.feedback_pct);
        let mix = pct(params.mix_pct);
        let len = self.buffer.len();

        for sample in block.iter_mut() {
            let delayed = self.buffer[wrap_back(self.write_pos, tap, len)];
            self.buffer[self.write_pos] = feedback.mul_add(delayed, *sample);
            *sample = (1.0 - mix).mul_add(*sample, delayed * mix);
            self.write_pos = (self.write_pos + 1) % len;
        }

        Ok(())
    }

    fn idle(&mut self, block: &[f32]) {
        let len = self.buffer.len();
        for &sample in block {
            self.buffer[self.write_pos] = sample;
            self.write_pos = (self.write_pos + 1) % len;
        }
    }

    fn reset(&mut self) {
        self.buffer.fill(0.0);
        self.write_pos = 0;
    }
}

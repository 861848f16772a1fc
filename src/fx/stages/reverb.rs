use anyhow::Result;

use crate::fx::stages::Stage;
use crate::fx::stages::common::{pct, wrap_back};
use crate::preset::RevParams;

const BUFFER_SECONDS: f32 = 0.15;
/// Fixed tail tap in samples; room size only scales the feedback.
pub const TAP_SAMPLES: usize = 1500;
const SIZE_TO_FEEDBACK: f32 = 0.85;

/// Single-tap feedback "room": one recirculating tap over a short buffer,
/// blended with the dry signal.
pub struct ReverbStage {
    buffer: Vec<f32>,
    write_pos: usize,
    sample_rate: f32,
}

impl ReverbStage {
    pub fn new(sample_rate: f32, block_size: usize) -> Self {
        Self {
            buffer: vec![0.0; Self::buffer_len(sample_rate, block_size)],
            write_pos: 0,
            sample_rate,
        }
    }

    fn buffer_len(sample_rate: f32, block_size: usize) -> usize {
        (sample_rate * BUFFER_SECONDS) as usize + block_size.max(1)
    }

    pub fn resize(&mut self, block_size: usize) {
        self.buffer = vec![0.0; Self::buffer_len(self.sample_rate, block_size)];
        self.write_pos = 0;
    }

    fn tap(&self) -> usize {
        TAP_SAMPLES.min(self.buffer.len() - 1)
    }
}

impl Stage for ReverbStage {
    type Params = RevParams;

    fn process_block(&mut self, params: &RevParams, block: &mut [f32]) -> Result<()> {
        let feedback = pct(params.size_pct) * SIZE_TO_FEEDBACK;
        let mix = pct(params.mix_pct);
        let tap = self.tap();
        let len = self.buffer.len();

        for sample in block.iter_mut() {
            let tail = self.buffer[wrap_back(self.write_pos, tap, len)];
            self.buffer[self.write_pos] = feedback.mul_add(tail, *sample);
            *sample = (1.0 - mix).mul_add(*sample, tail * mix);
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

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_RATE: f32 = 44_100.0;
    const BLOCK: usize = 1024;

    #[test]
    fn tail_recirculates_scaled_by_size() {
        let mut stage = ReverbStage::new(SAMPLE_RATE, BLOCK);
        let params = RevParams {
            size_pct: 80.0,
            damp_pct: 30.0,
            mix_pct: 50.0,
        };

        let mut out = Vec::new();
        for b in 0..5 {
            let mut block = vec![0.0f32; BLOCK];
            if b == 0 {
                block[0] = 1.0;
            }
            stage.process_block(&params, &mut block).unwrap();
            out.extend_from_slice(&block);
        }

        let feedback = 0.8 * SIZE_TO_FEEDBACK;
        assert!((out[0] - 0.5).abs() < 1e-6);
        assert!((out[TAP_SAMPLES] - 0.5).abs() < 1e-6);
        assert!((out[2 * TAP_SAMPLES] - 0.5 * feedback).abs() < 1e-6);
        assert!((out[3 * TAP_SAMPLES] - 0.5 * feedback * feedback).abs() < 1e-6);
    }

    #[test]
    fn zero_mix_is_dry() {
        let mut stage = ReverbStage::new(SAMPLE_RATE, BLOCK);
        let params = RevParams {
            size_pct: 95.0,
            damp_pct: 0.0,
            mix_pct: 0.0,
        };
        let input: Vec<f32> = (0..BLOCK).map(|i| (i as f32 * 0.05).sin()).collect();
        let mut block = input.clone();
        stage.process_block(&params, &mut block).unwrap();
        assert_eq!(block, input);
    }

    #[test]
    fn idle_writes_dry_input_for_later_taps() {
        let mut stage = ReverbStage::new(SAMPLE_RATE, BLOCK);
        let mut history = vec![0.0f32; BLOCK];
        history[0] = 1.0;
        stage.idle(&history);

        let params = RevParams {
            size_pct: 10.0,
            damp_pct: 30.0,
            mix_pct: 100.0,
        };
        let mut block = vec![0.0f32; BLOCK];
        stage.process_block(&params, &mut block).unwrap();

        let at = TAP_SAMPLES - BLOCK;
        assert!((block[at] - 1.0).abs() < 1e-6);
        assert!(block[..at].iter().all(|&s| s == 0.0));
    }

    #[test]
    fn tap_is_clamped_for_tiny_buffers() {
        let stage = ReverbStage::new(8_000.0, 16);
        assert!(stage.tap() < stage.buffer.len());
    }
}

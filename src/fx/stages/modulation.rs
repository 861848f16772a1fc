use anyhow::Result;
use std::f32::consts::TAU;

use crate::fx::stages::Stage;
use crate::fx::stages::common::pct;
use crate::preset::{ModParams, ModType};

pub const MOD_BUFFER_LEN: usize = 8192;

/// Delay geometry of one modulation flavour, all in samples.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Sweep {
    pub base: f32,
    pub range: f32,
    pub feedback: f32,
}

impl Sweep {
    pub const fn for_type(mod_type: ModType) -> Self {
        match mod_type {
            ModType::Flanger => Self {
                base: 50.0,
                range: 40.0,
                feedback: 0.5,
            },
            // Tremolo shares the chorus tap; its character comes from the depth mix alone.
            ModType::Chorus | ModType::Tremolo => Self {
                base: 200.0,
                range: 100.0,
                feedback: 0.0,
            },
        }
    }
}

/// Read position `delay` samples behind `write_pos`, truncated toward zero
/// and wrapped into `0..len`. No interpolation.
#[inline]
pub fn read_index(write_pos: usize, delay: f32, len: usize) -> usize {
    let pos = (write_pos as f32 - delay).trunc() as i64;
    pos.rem_euclid(len as i64) as usize
}

/// Chorus, tremolo and flanger from one LFO-swept delay tap.
pub struct ModulationStage {
    buffer: Vec<f32>,
    write_pos: usize,
    /// LFO time in samples, wrapped once per second.
    lfo_phase: usize,
    sample_rate: f32,
    period: usize,
}

impl ModulationStage {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            buffer: vec![0.0; MOD_BUFFER_LEN],
            write_pos: 0,
            lfo_phase: 0,
            sample_rate,
            period: (sample_rate.round() as usize).max(1),
        }
    }

    pub const fn write_pos(&self) -> usize {
        self.write_pos
    }

    fn advance_lfo(&mut self, frames: usize) {
        self.lfo_phase = (self.lfo_phase + frames) % self.period;
    }
}

impl Stage for ModulationStage {
    type Params = ModParams;

    fn process_block(&mut self, params: &ModParams, block: &mut [f32]) -> Result<()> {
        let sweep = Sweep::for_type(params.mod_type);
        let depth = pct(params.depth);
        let step = TAU * params.rate / self.sample_rate;
        let len = self.buffer.len();

        for (i, sample) in block.iter_mut().enumerate() {
            let lfo = (step * (i + self.lfo_phase) as f32).sin();
            let delay = lfo.mul_add(sweep.range, sweep.base);

            let delayed = self.buffer[read_index(self.write_pos, delay, len)];
            self.buffer[self.write_pos] = sweep.feedback.mul_add(delayed, *sample);

            *sample = (1.0 - depth).mul_add(*sample, delayed * depth);
            self.write_pos = (self.write_pos + 1) % len;
        }

        self.advance_lfo(block.len());
        Ok(())
    }

    fn idle(&mut self, block: &[f32]) {
        let len = self.buffer.len();
        for &sample in block {
            self.buffer[self.write_pos] = sample;
            self.write_pos = (self.write_pos + 1) % len;
        }
        self.advance_lfo(block.len());
    }

    fn reset(&mut self) {
        self.buffer.fill(0.0);
        self.write_pos = 0;
        self.lfo_phase = 0;
    }
}

use anyhow::{Result, anyhow};
use assert_no_alloc::permit_alloc;

use crate::fx::stages::Stage;
use crate::fx::stages::amp::AmpStage;
use crate::fx::stages::delay::DelayStage;
use crate::fx::stages::modulation::ModulationStage;
use crate::fx::stages::noise_gate::NoiseGateStage;
use crate::fx::stages::reverb::ReverbStage;
use crate::preset::PresetState;

/// Every piece of DSP state that must persist between blocks, owned by the
/// audio thread. The order is fixed: Amp (with EQ) → Gate → Mod → Dly → Rev.
pub struct EffectsChain {
    amp: AmpStage,
    gate: NoiseGateStage,
    modulation: ModulationStage,
    delay: DelayStage,
    reverb: ReverbStage,
}

impl EffectsChain {
    pub fn new(sample_rate: f32, block_size: usize) -> Self {
        Self {
            amp: AmpStage::new(sample_rate),
            gate: NoiseGateStage::new(),
            modulation: ModulationStage::new(sample_rate),
            delay: DelayStage::new(sample_rate, block_size),
            reverb: ReverbStage::new(sample_rate, block_size),
        }
    }

    /// Runs the enabled stages of `preset` over `block` in place.
    ///
    /// A block that ends up with a non-finite sample is an error; all stage
    /// state is cleared first so the fault cannot leak into later blocks.
    pub fn process_block(&mut self, preset: &PresetState, block: &mut [f32]) -> Result<()> {
        if let Err(e) = self.run(preset, block) {
            self.reset();
            return Err(e);
        }

        if let Some(pos) = block.iter().position(|s| !s.is_finite()) {
            self.reset();
            return Err(permit_alloc(|| {
                anyhow!("non-finite sample at offset {pos}, effect state cleared")
            }));
        }

        Ok(())
    }

    fn run(&mut self, preset: &PresetState, block: &mut [f32]) -> Result<()> {
        if preset.amp {
            self.amp.process_block(&preset.amp_params, block)?;
        }

        if preset.gate {
            self.gate.process_block(&preset.gate_threshold_db, block)?;
        }

        if preset.modulation {
            self.modulation.process_block(&preset.mod_params, block)?;
        } else {
            self.modulation.idle(block);
        }

        if preset.delay {
            self.delay.process_block(&preset.dly_params, block)?;
        } else {
            self.delay.idle(block);
        }

        if preset.reverb {
            self.reverb.process_block(&preset.rev_params, block)?;
        } else {
            self.reverb.idle(block);
        }

        Ok(())
    }

    /// Keeps the buffered stages recording `input` while the whole chain
    /// is bypassed, so their history stays current.
    pub fn idle(&mut self, input: &[f32]) {
        self.modulation.idle(input);
        self.delay.idle(input);
        self.reverb.idle(input);
    }

    /// Reallocates the block-size dependent buffers. Not real-time safe.
    pub fn resize(&mut self, block_size: usize) {
        self.delay.resize(block_size);
        self.reverb.resize(block_size);
    }

    pub fn reset(&mut self) {
        self.amp.reset();
        self.modulation.reset();
        self.delay.reset();
        self.reverb.reset();
    }

    pub const fn amp(&self) -> &AmpStage {
        &self.amp
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fx::stages::eq::FilterState;
    use crate::preset::DriveMode;

    const SAMPLE_RATE: f32 = 44_100.0;
    const BLOCK: usize = 1024;

    #[test]
    fn all_disabled_is_passthrough() {
        let mut chain = EffectsChain::new(SAMPLE_RATE, BLOCK);
        let preset = PresetState::default();
        let input: Vec<f32> = (0..BLOCK).map(|i| (i as f32 * 0.03).sin() * 0.4).collect();
        let mut block = input.clone();
        chain.process_block(&preset, &mut block).unwrap();
        assert_eq!(block, input);
    }

    #[test]
    fn gate_runs_after_amp() {
        let mut chain = EffectsChain::new(SAMPLE_RATE, BLOCK);
        let mut preset = PresetState::default();
        preset.gate = true;
        preset.gate_threshold_db = -20.0; // 0.1
        preset.amp = true;
        preset.amp_params.vol = 100.0;
        preset.amp_params.gain = 100.0;
        preset.amp_params.drive_mode = DriveMode::Overdrive1;

        // 0.05 is below the gate on its own but well above it once driven.
        let mut block = vec![0.05f32; BLOCK];
        chain.process_block(&preset, &mut block).unwrap();
        assert!(block[BLOCK - 1] > 0.1, "driven signal was gated");
    }

    #[test]
    fn eq_state_frozen_while_amp_off() {
        let mut chain = EffectsChain::new(SAMPLE_RATE, BLOCK);
        let mut preset = PresetState::default();
        preset.amp = true;
        preset.amp_params.bass = 80.0;

        let mut block = vec![0.2f32; BLOCK];
        chain.process_block(&preset, &mut block).unwrap();
        let before = chain.amp().equalizer().states();
        assert_ne!(before[0], FilterState::default());

        preset.amp = false;
        let mut block = vec![0.7f32; BLOCK];
        chain.process_block(&preset, &mut block).unwrap();
        assert_eq!(chain.amp().equalizer().states(), before);
    }

    #[test]
    fn chain_idle_overwrites_stale_history() {
        let mut chain = EffectsChain::new(SAMPLE_RATE, BLOCK);
        let mut preset = PresetState::default();
        preset.delay = true;
        preset.dly_params.time_ms = 50.0;
        preset.dly_params.feedback_pct = 0.0;
        preset.dly_params.mix_pct = 100.0;

        let mut block = vec![0.5f32; BLOCK];
        chain.process_block(&preset, &mut block).unwrap();

        let silence = vec![0.0f32; BLOCK];
        for _ in 0..4 {
            chain.idle(&silence);
        }

        for _ in 0..4 {
            let mut block = silence.clone();
            chain.process_block(&preset, &mut block).unwrap();
            assert!(block.iter().all(|&s| s == 0.0));
        }
    }

    #[test]
    fn non_finite_input_is_reported_and_state_cleared() {
        let mut chain = EffectsChain::new(SAMPLE_RATE, BLOCK);
        let mut preset = PresetState::default();
        preset.delay = true;
        preset.amp = true;

        let mut block = vec![0.1f32; BLOCK];
        block[10] = f32::NAN;
        assert!(chain.process_block(&preset, &mut block).is_err());

        let mut block = vec![0.1f32; BLOCK];
        chain.process_block(&preset, &mut block).unwrap();
        assert!(block.iter().all(|s| s.is_finite()));
    }
}

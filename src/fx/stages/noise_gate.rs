use anyhow::Result;

use crate::fx::stages::Stage;
use crate::fx::stages::common::db_to_lin;

/// Hard noise gate: every sample whose magnitude is strictly below the
/// threshold is replaced by silence. No envelope, no hysteresis.
#[derive(Default)]
pub struct NoiseGateStage;

impl NoiseGateStage {
    pub const fn new() -> Self {
        Self
    }
}

impl Stage for NoiseGateStage {
    /// Threshold in dBFS.
    type Params = f32;

    fn process_block(&mut self, threshold_db: &f32, block: &mut [f32]) -> Result<()> {
        let threshold = db_to_lin(*threshold_db);

        for sample in block.iter_mut() {
            if sample.abs() < threshold {
                *sample = 0.0;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn silences_signal_below_threshold() {
        let mut gate = NoiseGateStage::new();
        // -45 dB ~= 0.0056
        let mut block = vec![0.005f32; 128];
        gate.process_block(&-45.0, &mut block).unwrap();
        assert!(block.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn passes_signal_above_threshold_unchanged() {
        let mut gate = NoiseGateStage::new();
        let mut block: Vec<f32> = (0..128).map(|i| if i % 2 == 0 { 0.2 } else { -0.2 }).collect();
        let expected = block.clone();
        gate.process_block(&-45.0, &mut block).unwrap();
        assert_eq!(block, expected);
    }

    #[test]
    fn sample_at_threshold_is_kept() {
        let mut gate = NoiseGateStage::new();
        let threshold = db_to_lin(-30.0);
        let mut block = vec![threshold, -threshold, threshold * 0.999];
        gate.process_block(&-30.0, &mut block).unwrap();
        assert_eq!(block[0], threshold);
        assert_eq!(block[1], -threshold);
        assert_eq!(block[2], 0.0);
    }
}

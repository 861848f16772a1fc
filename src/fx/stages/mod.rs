use anyhow::Result;

pub mod amp;
pub mod common;
pub mod delay;
pub mod eq;
pub mod modulation;
pub mod noise_gate;
pub mod reverb;

/// One block-processing effect with its own persistent state.
///
/// Parameters arrive fresh with every block from the active preset
/// snapshot; the stage only keeps what must survive across blocks.
pub trait Stage: Send + 'static {
    type Params;

    /// Process one block in place.
    fn process_block(&mut self, params: &Self::Params, block: &mut [f32]) -> Result<()>;

    /// Called instead of `process_block` while the effect is switched off.
    /// The signal is never modified; stages with a ring buffer keep
    /// recording the dry input so they resume without a jump.
    fn idle(&mut self, _block: &[f32]) {}

    /// Clear all internal state.
    fn reset(&mut self) {}
}

use anyhow::{Result, anyhow, bail};
use arc_swap::ArcSwap;
use assert_no_alloc::permit_alloc;
use crossbeam::channel::{Receiver, Sender, bounded};
use log::{debug, error};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use crate::fx::chain::EffectsChain;
use crate::preset::PresetState;
use crate::tuner::Tuner;

pub const DEFAULT_MASTER_VOLUME: f32 = 0.8;
const MESSAGE_CAPACITY: usize = 32;

pub enum EngineMessage {
    SetTunerEnabled(bool),
    SetMasterVolume(f32),
}

/// What the audio thread plays: the active preset and whether it is
/// bypassed. Published as one unit so a block never pairs the bypass
/// flag of one activation with the parameters of another.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineSnapshot {
    pub preset: PresetState,
    pub bypass: bool,
}

impl Default for EngineSnapshot {
    fn default() -> Self {
        Self {
            preset: PresetState::default(),
            bypass: true,
        }
    }
}

/// Audio-thread side of the effects engine.
///
/// Owns all DSP state. The published [`EngineSnapshot`] is read once per
/// block; tuner and volume changes arrive as [`EngineMessage`]s.
pub struct Engine {
    chain: EffectsChain,
    snapshot: Arc<ArcSwap<EngineSnapshot>>,
    rx_updates: Receiver<EngineMessage>,
    tuner: Tuner,
    master_volume: f32,
}

/// Control-thread side. Cheap to clone, never blocks.
#[derive(Clone)]
pub struct EngineHandle {
    tx_updates: Sender<EngineMessage>,
    snapshot: Arc<ArcSwap<EngineSnapshot>>,
}

impl Engine {
    /// Creates an engine in idle/bypass mode with an all-off preset.
    pub fn new(tuner: Tuner, sample_rate: usize, buffer_size: usize) -> Result<(Self, EngineHandle)> {
        if sample_rate == 0 || buffer_size == 0 {
            bail!("invalid stream configuration: {sample_rate} Hz, {buffer_size} frames");
        }

        let (tx_updates, rx_updates) = bounded(MESSAGE_CAPACITY);
        let snapshot = Arc::new(ArcSwap::from_pointee(EngineSnapshot::default()));

        let engine = Self {
            chain: EffectsChain::new(sample_rate as f32, buffer_size),
            snapshot: Arc::clone(&snapshot),
            rx_updates,
            tuner,
            master_volume: DEFAULT_MASTER_VOLUME,
        };

        Ok((
            engine,
            EngineHandle {
                tx_updates,
                snapshot,
            },
        ))
    }

    /// Processes one block. `output` receives the mono result.
    pub fn process(&mut self, input: &[f32], output: &mut [f32]) -> Result<()> {
        self.handle_messages();

        if input.len() != output.len() {
            return Err(permit_alloc(|| {
                anyhow!(
                    "block size mismatch: {} input frames, {} output frames",
                    input.len(),
                    output.len()
                )
            }));
        }

        if self.tuner.is_enabled() {
            self.tuner.process(input);
            self.chain.idle(input);
            output.fill(0.0);
            return Ok(());
        }

        let snapshot = self.snapshot.load();

        if snapshot.bypass {
            self.chain.idle(input);
            for (out, &sample) in output.iter_mut().zip(input) {
                *out = sample * self.master_volume;
            }
            return Ok(());
        }

        output.copy_from_slice(input);
        self.chain.process_block(&snapshot.preset, output)?;

        for sample in output.iter_mut() {
            *sample = (*sample * self.master_volume).clamp(-1.0, 1.0);
        }

        Ok(())
    }

    /// Processes one block and never lets a fault escape as audio.
    ///
    /// Any error or panic inside [`Engine::process`] leaves `output` fully
    /// silent for this block; the fault is returned for logging and the
    /// next block is processed normally.
    pub fn render(&mut self, input: &[f32], output: &mut [f32]) -> Result<()> {
        self.guarded(output, |engine, output| engine.process(input, output))
    }

    fn guarded<F>(&mut self, output: &mut [f32], block: F) -> Result<()>
    where
        F: FnOnce(&mut Self, &mut [f32]) -> Result<()>,
    {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| block(self, output)));

        match outcome {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => {
                output.fill(0.0);
                Err(e)
            }
            Err(_) => {
                output.fill(0.0);
                self.chain.reset();
                Err(permit_alloc(|| {
                    anyhow!("panic during block processing, effect state cleared")
                }))
            }
        }
    }

    pub fn update_buffer_size(&mut self, new_size: usize) -> Result<()> {
        if new_size == 0 {
            bail!("buffer size must be non-zero");
        }
        self.chain.resize(new_size);
        Ok(())
    }

    pub fn handle_messages(&mut self) {
        while let Ok(message) = self.rx_updates.try_recv() {
            match message {
                EngineMessage::SetTunerEnabled(enabled) => {
                    self.tuner.set_enabled(enabled);
                    permit_alloc(|| debug!("Tuner enabled: {enabled}"));
                }
                EngineMessage::SetMasterVolume(volume) => {
                    self.master_volume = volume;
                    permit_alloc(|| debug!("Master volume: {volume}"));
                }
            }
        }
    }

    pub fn is_bypassed(&self) -> bool {
        self.snapshot.load().bypass
    }
}

impl EngineHandle {
    /// Publishes a preset together with the bypass state in one store.
    /// The audio thread picks both up at the start of its next block.
    pub fn publish(&self, preset: &PresetState, bypass: bool) {
        self.snapshot.store(Arc::new(EngineSnapshot {
            preset: preset.sanitized(),
            bypass,
        }));
        debug!("Published preset {} '{}', bypass {bypass}", preset.id, preset.name);
    }

    /// Replaces the active preset, keeping the bypass state.
    pub fn set_preset(&self, preset: &PresetState) {
        let preset = preset.sanitized();
        self.snapshot.rcu(|current| EngineSnapshot {
            preset: preset.clone(),
            bypass: current.bypass,
        });
        debug!("Published preset {} '{}'", preset.id, preset.name);
    }

    /// Switches bypass, keeping the active preset.
    pub fn set_bypass(&self, bypass: bool) {
        self.snapshot.rcu(|current| EngineSnapshot {
            preset: current.preset.clone(),
            bypass,
        });
        debug!("Bypass: {bypass}");
    }

    pub fn snapshot(&self) -> Arc<EngineSnapshot> {
        self.snapshot.load_full()
    }

    pub fn set_tuner_enabled(&self, enabled: bool) {
        self.send(EngineMessage::SetTunerEnabled(enabled));
    }

    pub fn set_master_volume(&self, volume: f32) {
        let volume = if volume.is_finite() {
            volume.clamp(0.0, 1.0)
        } else {
            0.0
        };
        self.send(EngineMessage::SetMasterVolume(volume));
    }

    fn send(&self, message: EngineMessage) {
        self.tx_updates.try_send(message).unwrap_or_else(|e| {
            error!("Failed to send engine message: {e}");
        });
    }
}

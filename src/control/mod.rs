use anyhow::{Context, Result};
use log::{debug, info};

use crate::audio::engine::EngineHandle;
use crate::preset::{BANK_COUNT, DriveMode, Effect, Manager, ModType, PresetState, Slot, SlotId};
use crate::tuner::{TunerHandle, TunerInfo};

pub mod command;

pub use command::Command;

/// A numeric preset parameter that can be edited from the control surface.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Param {
    GateThreshold,
    AmpVol,
    AmpGain,
    AmpBass,
    AmpMid,
    AmpTreble,
    AmpWarmth,
    ModRate,
    ModDepth,
    DlyTime,
    DlyFeedback,
    DlyMix,
    RevSize,
    RevDamp,
    RevMix,
}

impl Param {
    pub const ALL: [Self; 15] = [
        Self::GateThreshold,
        Self::AmpVol,
        Self::AmpGain,
        Self::AmpBass,
        Self::AmpMid,
        Self::AmpTreble,
        Self::AmpWarmth,
        Self::ModRate,
        Self::ModDepth,
        Self::DlyTime,
        Self::DlyFeedback,
        Self::DlyMix,
        Self::RevSize,
        Self::RevDamp,
        Self::RevMix,
    ];

    pub const fn key(self) -> &'static str {
        match self {
            Self::GateThreshold => "gate.threshold",
            Self::AmpVol => "amp.vol",
            Self::AmpGain => "amp.gain",
            Self::AmpBass => "amp.bass",
            Self::AmpMid => "amp.mid",
            Self::AmpTreble => "amp.treble",
            Self::AmpWarmth => "amp.warmth",
            Self::ModRate => "mod.rate",
            Self::ModDepth => "mod.depth",
            Self::DlyTime => "dly.time",
            Self::DlyFeedback => "dly.feedback",
            Self::DlyMix => "dly.mix",
            Self::RevSize => "rev.size",
            Self::RevDamp => "rev.damp",
            Self::RevMix => "rev.mix",
        }
    }

    pub fn get(self, preset: &PresetState) -> f32 {
        match self {
            Self::GateThreshold => preset.gate_threshold_db,
            Self::AmpVol => preset.amp_params.vol,
            Self::AmpGain => preset.amp_params.gain,
            Self::AmpBass => preset.amp_params.bass,
            Self::AmpMid => preset.amp_params.mid,
            Self::AmpTreble => preset.amp_params.treble,
            Self::AmpWarmth => preset.amp_params.warmth,
            Self::ModRate => preset.mod_params.rate,
            Self::ModDepth => preset.mod_params.depth,
            Self::DlyTime => preset.dly_params.time_ms,
            Self::DlyFeedback => preset.dly_params.feedback_pct,
            Self::DlyMix => preset.dly_params.mix_pct,
            Self::RevSize => preset.rev_params.size_pct,
            Self::RevDamp => preset.rev_params.damp_pct,
            Self::RevMix => preset.rev_params.mix_pct,
        }
    }

    fn field(self, preset: &mut PresetState) -> &mut f32 {
        match self {
            Self::GateThreshold => &mut preset.gate_threshold_db,
            Self::AmpVol => &mut preset.amp_params.vol,
            Self::AmpGain => &mut preset.amp_params.gain,
            Self::AmpBass => &mut preset.amp_params.bass,
            Self::AmpMid => &mut preset.amp_params.mid,
            Self::AmpTreble => &mut preset.amp_params.treble,
            Self::AmpWarmth => &mut preset.amp_params.warmth,
            Self::ModRate => &mut preset.mod_params.rate,
            Self::ModDepth => &mut preset.mod_params.depth,
            Self::DlyTime => &mut preset.dly_params.time_ms,
            Self::DlyFeedback => &mut preset.dly_params.feedback_pct,
            Self::DlyMix => &mut preset.dly_params.mix_pct,
            Self::RevSize => &mut preset.rev_params.size_pct,
            Self::RevDamp => &mut preset.rev_params.damp_pct,
            Self::RevMix => &mut preset.rev_params.mix_pct,
        }
    }
}

impl std::fmt::Display for Param {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.key())
    }
}

impl std::str::FromStr for Param {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|p| p.key() == key)
            .with_context(|| format!("unknown parameter '{key}'"))
    }
}

/// Front-panel state machine: bank/slot navigation, idle, tuner mode and
/// preset editing. Every change is republished to the engine, and edits
/// are written to the bank file straight away.
pub struct Controller {
    presets: Manager,
    engine: EngineHandle,
    tuner: TunerHandle,
    current: SlotId,
    idle: bool,
    tuner_enabled: bool,
    master_volume: f32,
}

impl Controller {
    /// Starts idle on `start`, with the engine in bypass.
    pub fn new(presets: Manager, engine: EngineHandle, tuner: TunerHandle, start: SlotId) -> Self {
        let controller = Self {
            presets,
            engine,
            tuner,
            current: start,
            idle: true,
            tuner_enabled: false,
            master_volume: crate::audio::engine::DEFAULT_MASTER_VOLUME,
        };
        controller.publish();
        controller
    }

    pub fn next_bank(&mut self) {
        let bank = if self.current.bank >= BANK_COUNT {
            1
        } else {
            self.current.bank + 1
        };
        self.activate(SlotId::new(bank, self.current.slot));
    }

    pub fn prev_bank(&mut self) {
        let bank = if self.current.bank <= 1 {
            BANK_COUNT
        } else {
            self.current.bank - 1
        };
        self.activate(SlotId::new(bank, self.current.slot));
    }

    pub fn select_bank(&mut self, bank: u8) {
        self.activate(SlotId::new(bank, self.current.slot));
    }

    pub fn select_slot(&mut self, slot: Slot) {
        self.activate(SlotId::new(self.current.bank, slot));
    }

    /// Footswitch behaviour: pressing the active slot again drops to idle.
    pub fn press_slot(&mut self, slot: Slot) {
        if slot == self.current.slot && !self.idle {
            self.set_idle(true);
        } else {
            self.select_slot(slot);
        }
    }

    pub fn set_idle(&mut self, idle: bool) {
        self.idle = idle;
        info!("{}", self.status_line());
        self.publish();
    }

    pub fn toggle_effect(&mut self, effect: Effect) -> Result<()> {
        self.edit(|preset| {
            let enabled = !preset.is_enabled(effect);
            preset.set_enabled(effect, enabled);
        })
    }

    /// Sets a numeric parameter; out-of-range values are clamped.
    pub fn set_param(&mut self, param: Param, value: f32) -> Result<()> {
        self.edit(|preset| *param.field(preset) = value)
    }

    pub fn set_drive_mode(&mut self, mode: DriveMode) -> Result<()> {
        self.edit(|preset| preset.amp_params.drive_mode = mode)
    }

    pub fn set_mod_type(&mut self, mod_type: ModType) -> Result<()> {
        self.edit(|preset| preset.mod_params.mod_type = mod_type)
    }

    pub fn rename(&mut self, name: &str) -> Result<()> {
        self.edit(|preset| preset.name = name.trim().to_string())
    }

    pub fn set_notes(&mut self, notes: &str) -> Result<()> {
        self.edit(|preset| preset.notes = notes.to_string())
    }

    pub fn toggle_tuner(&mut self) {
        self.tuner_enabled = !self.tuner_enabled;
        self.engine.set_tuner_enabled(self.tuner_enabled);
        info!(
            "Tuner {}",
            if self.tuner_enabled { "on" } else { "off" }
        );
    }

    pub fn set_master_volume(&mut self, volume: f32) {
        self.master_volume = if volume.is_finite() {
            volume.clamp(0.0, 1.0)
        } else {
            0.0
        };
        self.engine.set_master_volume(self.master_volume);
    }

    /// Latest tuner estimate, `None` while tuner mode is off.
    pub fn tuner_reading(&self) -> Option<TunerInfo> {
        self.tuner_enabled.then(|| self.tuner.get_tuner_info())
    }

    pub fn status_line(&self) -> String {
        if self.idle {
            "IDLE (BYPASS)".to_string()
        } else {
            let name = self.active_preset().map_or("", |p| p.name.as_str());
            format!("{}: {name}", self.current)
        }
    }

    pub fn active_preset(&self) -> Option<&PresetState> {
        self.presets.get(self.current)
    }

    pub fn presets(&self) -> &Manager {
        &self.presets
    }

    pub const fn current(&self) -> SlotId {
        self.current
    }

    pub const fn is_idle(&self) -> bool {
        self.idle
    }

    pub const fn is_tuner_enabled(&self) -> bool {
        self.tuner_enabled
    }

    pub const fn master_volume(&self) -> f32 {
        self.master_volume
    }

    fn activate(&mut self, id: SlotId) {
        self.current = id;
        self.set_idle(false);
    }

    fn edit<F>(&mut self, apply: F) -> Result<()>
    where
        F: FnOnce(&mut PresetState),
    {
        let id = self.current;
        let preset = self
            .presets
            .get_mut(id)
            .with_context(|| format!("no preset in slot {id}"))?;
        apply(preset);
        *preset = preset.sanitized();
        debug!("Edited preset {id}: {}", preset.indicator());

        self.publish();
        self.presets.save()
    }

    fn publish(&self) {
        match self.presets.get(self.current) {
            Some(preset) => self.engine.publish(preset, self.idle),
            None => self.engine.set_bypass(self.idle),
        }
    }
}

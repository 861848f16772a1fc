use clap::ValueEnum;
use serde::{Deserialize, Serialize};

pub mod manager;

pub use manager::Manager;

pub const BANK_COUNT: u8 = 9;

/// One of the four preset slots inside a bank.
#[derive(
    ValueEnum, Copy, Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord,
)]
pub enum Slot {
    #[default]
    A,
    B,
    C,
    D,
}

impl Slot {
    pub const ALL: [Self; 4] = [Self::A, Self::B, Self::C, Self::D];
}

impl std::fmt::Display for Slot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let letter = match self {
            Self::A => "A",
            Self::B => "B",
            Self::C => "C",
            Self::D => "D",
        };
        write!(f, "{letter}")
    }
}

impl std::str::FromStr for Slot {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "A" => Ok(Self::A),
            "B" => Ok(Self::B),
            "C" => Ok(Self::C),
            "D" => Ok(Self::D),
            other => anyhow::bail!("unknown slot '{other}', expected A-D"),
        }
    }
}

/// Address of a preset: bank 1-9 plus slot letter.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct SlotId {
    pub bank: u8,
    pub slot: Slot,
}

impl Default for SlotId {
    fn default() -> Self {
        Self {
            bank: 1,
            slot: Slot::A,
        }
    }
}

impl SlotId {
    pub fn new(bank: u8, slot: Slot) -> Self {
        Self {
            bank: bank.clamp(1, BANK_COUNT),
            slot,
        }
    }
}

impl std::fmt::Display for SlotId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", self.bank, self.slot)
    }
}

/// The five switchable effects of a preset.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Effect {
    Gate,
    Amp,
    Mod,
    Dly,
    Rev,
}

impl Effect {
    pub const ALL: [Self; 5] = [Self::Gate, Self::Amp, Self::Mod, Self::Dly, Self::Rev];
}

impl std::fmt::Display for Effect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Gate => "Gate",
            Self::Amp => "Amp",
            Self::Mod => "Mod",
            Self::Dly => "Dly",
            Self::Rev => "Rev",
        };
        write!(f, "{name}")
    }
}

impl std::str::FromStr for Effect {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gate" => Ok(Self::Gate),
            "amp" => Ok(Self::Amp),
            "mod" => Ok(Self::Mod),
            "dly" | "delay" => Ok(Self::Dly),
            "rev" | "reverb" => Ok(Self::Rev),
            other => anyhow::bail!("unknown effect '{other}'"),
        }
    }
}

#[derive(ValueEnum, Copy, Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum DriveMode {
    #[default]
    Clean,
    #[serde(rename = "Overdrive 1")]
    #[value(name = "od1")]
    Overdrive1,
    #[serde(rename = "Overdrive 2")]
    #[value(name = "od2")]
    Overdrive2,
    Distortion,
    Fuzz,
}

impl std::fmt::Display for DriveMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Clean => "Clean",
            Self::Overdrive1 => "Overdrive 1",
            Self::Overdrive2 => "Overdrive 2",
            Self::Distortion => "Distortion",
            Self::Fuzz => "Fuzz",
        };
        write!(f, "{name}")
    }
}

#[derive(ValueEnum, Copy, Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum ModType {
    #[default]
    Chorus,
    Tremolo,
    Flanger,
}

impl std::fmt::Display for ModType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Chorus => "Chorus",
            Self::Tremolo => "Tremolo",
            Self::Flanger => "Flanger",
        };
        write!(f, "{name}")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AmpParams {
    #[serde(rename = "Vol")]
    pub vol: f32,
    #[serde(rename = "Gain")]
    pub gain: f32,
    #[serde(rename = "Bas")]
    pub bass: f32,
    #[serde(rename = "Mid")]
    pub mid: f32,
    #[serde(rename = "Tre")]
    pub treble: f32,
    #[serde(rename = "Drive_Mode")]
    pub drive_mode: DriveMode,
    #[serde(rename = "Warmth")]
    pub warmth: f32,
}

impl Default for AmpParams {
    fn default() -> Self {
        Self {
            vol: 50.0,
            gain: 30.0,
            bass: 50.0,
            mid: 50.0,
            treble: 50.0,
            drive_mode: DriveMode::Clean,
            warmth: 0.0,
        }
    }
}

impl AmpParams {
    fn sanitized(&self) -> Self {
        Self {
            vol: clamp_or(self.vol, 0.0, 100.0),
            gain: clamp_or(self.gain, 0.0, 100.0),
            bass: clamp_or(self.bass, 0.0, 100.0),
            mid: clamp_or(self.mid, 0.0, 100.0),
            treble: clamp_or(self.treble, 0.0, 100.0),
            drive_mode: self.drive_mode,
            warmth: clamp_or(self.warmth, 0.0, 100.0),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModParams {
    #[serde(rename = "Type")]
    pub mod_type: ModType,
    /// LFO rate in Hz.
    #[serde(rename = "Rate")]
    pub rate: f32,
    #[serde(rename = "Depth")]
    pub depth: f32,
}

impl Default for ModParams {
    fn default() -> Self {
        Self {
            mod_type: ModType::Chorus,
            rate: 1.5,
            depth: 50.0,
        }
    }
}

impl ModParams {
    fn sanitized(&self) -> Self {
        Self {
            mod_type: self.mod_type,
            rate: clamp_or(self.rate, 0.1, 10.0),
            depth: clamp_or(self.depth, 0.0, 100.0),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DlyParams {
    #[serde(rename = "Time")]
    pub time_ms: f32,
    #[serde(rename = "Feedback")]
    pub feedback_pct: f32,
    #[serde(rename = "Mix")]
    pub mix_pct: f32,
}

impl Default for DlyParams {
    fn default() -> Self {
        Self {
            time_ms: 300.0,
            feedback_pct: 30.0,
            mix_pct: 30.0,
        }
    }
}

impl DlyParams {
    fn sanitized(&self) -> Self {
        Self {
            time_ms: clamp_or(self.time_ms, 50.0, 1000.0),
            feedback_pct: clamp_or(self.feedback_pct, 0.0, 90.0),
            mix_pct: clamp_or(self.mix_pct, 0.0, 100.0),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RevParams {
    #[serde(rename = "Size")]
    pub size_pct: f32,
    /// Stored with the preset; the single-tap model does not use it.
    #[serde(rename = "Damp")]
    pub damp_pct: f32,
    #[serde(rename = "Mix")]
    pub mix_pct: f32,
}

impl Default for RevParams {
    fn default() -> Self {
        Self {
            size_pct: 50.0,
            damp_pct: 30.0,
            mix_pct: 20.0,
        }
    }
}

impl RevParams {
    fn sanitized(&self) -> Self {
        Self {
            size_pct: clamp_or(self.size_pct, 10.0, 95.0),
            damp_pct: clamp_or(self.damp_pct, 0.0, 100.0),
            mix_pct: clamp_or(self.mix_pct, 0.0, 100.0),
        }
    }
}

pub const MIN_GATE_THRESHOLD_DB: f32 = -60.0;
pub const MAX_GATE_THRESHOLD_DB: f32 = -5.0;

/// A complete, self-contained parameter snapshot for one slot.
///
/// Field names on disk match the `bank_presets_pro.json` layout, so
/// existing bank files load as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PresetState {
    #[serde(skip)]
    pub id: SlotId,
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Gate")]
    pub gate: bool,
    #[serde(rename = "Amp")]
    pub amp: bool,
    #[serde(rename = "Mod")]
    pub modulation: bool,
    #[serde(rename = "Dly")]
    pub delay: bool,
    #[serde(rename = "Rev")]
    pub reverb: bool,
    #[serde(rename = "Gate_Threshold")]
    pub gate_threshold_db: f32,
    #[serde(rename = "Amp_Params")]
    pub amp_params: AmpParams,
    #[serde(rename = "Mod_Params")]
    pub mod_params: ModParams,
    #[serde(rename = "Dly_Params")]
    pub dly_params: DlyParams,
    #[serde(rename = "Rev_Params")]
    pub rev_params: RevParams,
    #[serde(rename = "Notes")]
    pub notes: String,
}

impl Default for PresetState {
    fn default() -> Self {
        Self {
            id: SlotId::default(),
            name: String::new(),
            gate: false,
            amp: false,
            modulation: false,
            delay: false,
            reverb: false,
            gate_threshold_db: -45.0,
            amp_params: AmpParams::default(),
            mod_params: ModParams::default(),
            dly_params: DlyParams::default(),
            rev_params: RevParams::default(),
            notes: String::new(),
        }
    }
}

impl PresetState {
    pub fn new(id: SlotId) -> Self {
        Self {
            id,
            ..Self::default()
        }
    }

    pub fn is_enabled(&self, effect: Effect) -> bool {
        match effect {
            Effect::Gate => self.gate,
            Effect::Amp => self.amp,
            Effect::Mod => self.modulation,
            Effect::Dly => self.delay,
            Effect::Rev => self.reverb,
        }
    }

    pub fn set_enabled(&mut self, effect: Effect, enabled: bool) {
        let flag = match effect {
            Effect::Gate => &mut self.gate,
            Effect::Amp => &mut self.amp,
            Effect::Mod => &mut self.modulation,
            Effect::Dly => &mut self.delay,
            Effect::Rev => &mut self.reverb,
        };
        *flag = enabled;
    }

    /// Returns a copy with every parameter clamped into its valid range.
    /// Non-finite values fall back to the lower bound.
    pub fn sanitized(&self) -> Self {
        Self {
            id: self.id,
            name: self.name.clone(),
            gate: self.gate,
            amp: self.amp,
            modulation: self.modulation,
            delay: self.delay,
            reverb: self.reverb,
            gate_threshold_db: clamp_or(
                self.gate_threshold_db,
                MIN_GATE_THRESHOLD_DB,
                MAX_GATE_THRESHOLD_DB,
            ),
            amp_params: self.amp_params.sanitized(),
            mod_params: self.mod_params.sanitized(),
            dly_params: self.dly_params.sanitized(),
            rev_params: self.rev_params.sanitized(),
            notes: self.notes.clone(),
        }
    }

    /// Five-character effect indicator, e.g. `"-A-D-"`.
    pub fn indicator(&self) -> String {
        Effect::ALL
            .iter()
            .map(|&fx| {
                if self.is_enabled(fx) {
                    fx.to_string().chars().next().unwrap_or('?')
                } else {
                    '-'
                }
            })
            .collect()
    }
}

fn clamp_or(value: f32, min: f32, max: f32) -> f32 {
    if value.is_finite() {
        value.clamp(min, max)
    } else {
        min
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitized_clamps_out_of_range_values() {
        let mut preset = PresetState::default();
        preset.gate_threshold_db = -120.0;
        preset.amp_params.gain = 250.0;
        preset.mod_params.rate = 0.0;
        preset.dly_params.time_ms = 5000.0;
        preset.dly_params.feedback_pct = 100.0;
        preset.rev_params.size_pct = f32::NAN;

        let clean = preset.sanitized();
        assert_eq!(clean.gate_threshold_db, MIN_GATE_THRESHOLD_DB);
        assert_eq!(clean.amp_params.gain, 100.0);
        assert_eq!(clean.mod_params.rate, 0.1);
        assert_eq!(clean.dly_params.time_ms, 1000.0);
        assert_eq!(clean.dly_params.feedback_pct, 90.0);
        assert_eq!(clean.rev_params.size_pct, 10.0);
    }

    #[test]
    fn loads_bank_file_field_names() {
        let json = r#"{
            "Name": "Lead", "Gate": true, "Amp": true, "Mod": false, "Dly": true, "Rev": false,
            "Gate_Threshold": -40, "Notes": "solo",
            "Amp_Params": {"Vol": 70, "Gain": 80, "Bas": 55, "Mid": 60, "Tre": 45, "Drive_Mode": "Overdrive 2", "Warmth": 0},
            "Mod_Params": {"Type": "Flanger", "Rate": 0.8, "Depth": 40},
            "Dly_Params": {"Time": 450, "Feedback": 35, "Mix": 25}
        }"#;

        let preset: PresetState = serde_json::from_str(json).unwrap();
        assert_eq!(preset.name, "Lead");
        assert!(preset.gate && preset.amp && preset.delay);
        assert_eq!(preset.amp_params.drive_mode, DriveMode::Overdrive2);
        assert_eq!(preset.mod_params.mod_type, ModType::Flanger);
        assert_eq!(preset.dly_params.time_ms, 450.0);
        // Missing Rev_Params falls back to defaults.
        assert_eq!(preset.rev_params, RevParams::default());
    }

    #[test]
    fn indicator_marks_enabled_effects() {
        let mut preset = PresetState::default();
        preset.set_enabled(Effect::Amp, true);
        preset.set_enabled(Effect::Rev, true);
        assert_eq!(preset.indicator(), "-A--R");
    }

    #[test]
    fn parses_slots_and_effects() {
        assert_eq!("b".parse::<Slot>().unwrap(), Slot::B);
        assert!("E".parse::<Slot>().is_err());
        assert_eq!("delay".parse::<Effect>().unwrap(), Effect::Dly);
        assert_eq!(SlotId::new(12, Slot::C).to_string(), "9C");
    }
}

use anyhow::{Context, Result, anyhow, bail};
use clap::ValueEnum;

use super::{Controller, Param};
use crate::preset::{DriveMode, Effect, ModType, Slot};

pub const HELP: &str = "\
commands:
  n | next              next bank
  p | prev              previous bank
  bank <1-9>            select bank
  a | b | c | d         press slot footswitch
  idle                  bypass
  fx <gate|amp|mod|dly|rev>
  set <param> <value>   e.g. set amp.gain 70
  drive <clean|od1|od2|distortion|fuzz>
  modtype <chorus|tremolo|flanger>
  name <text>
  notes <text>
  tuner                 toggle tuner mode
  vol <0.0-1.0>         master volume
  status | list | help | quit";

/// One line typed at the control prompt.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    NextBank,
    PrevBank,
    SelectBank(u8),
    PressSlot(Slot),
    Idle,
    ToggleEffect(Effect),
    SetParam(Param, f32),
    SetDriveMode(DriveMode),
    SetModType(ModType),
    Rename(String),
    SetNotes(String),
    ToggleTuner,
    SetMasterVolume(f32),
    Status,
    List,
    Help,
    Quit,
}

impl std::str::FromStr for Command {
    type Err = anyhow::Error;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        let (word, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
        let rest = rest.trim();

        let command = match word.to_ascii_lowercase().as_str() {
            "n" | "next" => Self::NextBank,
            "p" | "prev" => Self::PrevBank,
            "bank" => {
                let bank: u8 = rest
                    .parse()
                    .with_context(|| format!("invalid bank '{rest}'"))?;
                if !(1..=crate::preset::BANK_COUNT).contains(&bank) {
                    bail!("bank must be 1-{}", crate::preset::BANK_COUNT);
                }
                Self::SelectBank(bank)
            }
            "a" | "b" | "c" | "d" => Self::PressSlot(word.parse()?),
            "idle" => Self::Idle,
            "fx" => Self::ToggleEffect(rest.parse()?),
            "set" => {
                let (param, value) = rest
                    .split_once(char::is_whitespace)
                    .context("usage: set <param> <value>")?;
                let value: f32 = value
                    .trim()
                    .parse()
                    .with_context(|| format!("invalid value '{}'", value.trim()))?;
                Self::SetParam(param.parse()?, value)
            }
            "drive" => Self::SetDriveMode(DriveMode::from_str(rest, true).map_err(|e| anyhow!(e))?),
            "modtype" => Self::SetModType(ModType::from_str(rest, true).map_err(|e| anyhow!(e))?),
            "name" => Self::Rename(rest.to_string()),
            "notes" => Self::SetNotes(rest.to_string()),
            "tuner" | "t" => Self::ToggleTuner,
            "vol" => Self::SetMasterVolume(
                rest.parse()
                    .with_context(|| format!("invalid volume '{rest}'"))?,
            ),
            "status" | "s" => Self::Status,
            "list" | "l" => Self::List,
            "help" | "h" | "?" => Self::Help,
            "quit" | "q" | "exit" => Self::Quit,
            "" => bail!("empty command"),
            other => bail!("unknown command '{other}', type 'help'"),
        };

        Ok(command)
    }
}

impl Command {
    /// Applies the command to `controller`. Returns `false` on quit.
    pub fn apply(self, controller: &mut Controller) -> Result<bool> {
        match self {
            Self::NextBank => controller.next_bank(),
            Self::PrevBank => controller.prev_bank(),
            Self::SelectBank(bank) => controller.select_bank(bank),
            Self::PressSlot(slot) => controller.press_slot(slot),
            Self::Idle => controller.set_idle(true),
            Self::ToggleEffect(effect) => controller.toggle_effect(effect)?,
            Self::SetParam(param, value) => controller.set_param(param, value)?,
            Self::SetDriveMode(mode) => controller.set_drive_mode(mode)?,
            Self::SetModType(mod_type) => controller.set_mod_type(mod_type)?,
            Self::Rename(name) => controller.rename(&name)?,
            Self::SetNotes(notes) => controller.set_notes(&notes)?,
            Self::ToggleTuner => controller.toggle_tuner(),
            Self::SetMasterVolume(volume) => controller.set_master_volume(volume),
            Self::Status | Self::List | Self::Help => {}
            Self::Quit => return Ok(false),
        }
        Ok(true)
    }
}

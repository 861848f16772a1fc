use super::{BANK_COUNT, PresetState, Slot, SlotId};
use anyhow::{Context, Result};
use log::{debug, info, warn};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

type BankFile = BTreeMap<u8, BTreeMap<Slot, PresetState>>;

/// Owns the bank file: nine banks of four slots, stored as one JSON document.
pub struct Manager {
    path: PathBuf,
    banks: BankFile,
}

impl Manager {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let mut banks = if path.exists() {
            let content = fs::read_to_string(&path)
                .with_context(|| format!("failed to read preset file {}", path.display()))?;
            let banks: BankFile =
                serde_json::from_str(&content).context("failed to parse preset JSON")?;
            debug!("Loaded presets from {}", path.display());
            banks
        } else {
            info!(
                "No preset file at {}, starting with empty banks",
                path.display()
            );
            BankFile::new()
        };

        fill_missing(&mut banks);

        Ok(Self { path, banks })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, id: SlotId) -> Option<&PresetState> {
        self.banks.get(&id.bank).and_then(|bank| bank.get(&id.slot))
    }

    pub fn get_mut(&mut self, id: SlotId) -> Option<&mut PresetState> {
        self.banks
            .get_mut(&id.bank)
            .and_then(|bank| bank.get_mut(&id.slot))
    }

    /// All four presets of one bank, in slot order.
    pub fn bank(&self, bank: u8) -> Vec<&PresetState> {
        self.banks
            .get(&bank)
            .map(|slots| slots.values().collect())
            .unwrap_or_default()
    }

    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).context("failed to create preset directory")?;
        }

        let json = serde_json::to_string_pretty(&self.banks).context("failed to serialize presets")?;
        fs::write(&self.path, json)
            .with_context(|| format!("failed to write preset file {}", self.path.display()))?;

        debug!("Saved presets to {}", self.path.display());
        Ok(())
    }
}

fn fill_missing(banks: &mut BankFile) {
    banks.retain(|&bank, _| {
        let keep = (1..=BANK_COUNT).contains(&bank);
        if !keep {
            warn!("Ignoring preset bank {bank}, banks are numbered 1-{BANK_COUNT}");
        }
        keep
    });

    for bank in 1..=BANK_COUNT {
        let slots = banks.entry(bank).or_default();
        for slot in Slot::ALL {
            let id = SlotId::new(bank, slot);
            slots
                .entry(slot)
                .and_modify(|preset| preset.id = id)
                .or_insert_with(|| PresetState::new(id));
        }
    }
}

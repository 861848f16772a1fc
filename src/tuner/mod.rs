use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Open-string reference pitches of a guitar in standard tuning.
pub const REFERENCE_NOTES: [(&str, f32); 6] = [
    ("E2", 82.4),
    ("A2", 110.0),
    ("D3", 146.8),
    ("G3", 196.0),
    ("B3", 246.9),
    ("E4", 329.6),
];

/// Estimates below this are treated as noise and ignored.
pub const MIN_FREQUENCY_HZ: f32 = 60.0;
const IN_TUNE_HZ: f32 = 1.5;
const NEEDLE_RANGE_HZ: f32 = 10.0;

/// Zero-crossing tuner. Each block fully replaces the previous reading;
/// while disabled the last reading is kept.
pub struct Tuner {
    sample_rate: f32,
    enabled: Arc<AtomicBool>,
    reading: Arc<AtomicU64>,
}

/// Read side of the tuner for the display. Cheap to clone.
#[derive(Clone)]
pub struct TunerHandle {
    enabled: Arc<AtomicBool>,
    reading: Arc<AtomicU64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TunerInfo {
    /// Nearest reference note, `None` until the first valid estimate.
    pub note: Option<&'static str>,
    /// Estimated frequency minus the reference frequency, in Hz.
    pub deviation_hz: f32,
}

impl Tuner {
    pub fn new(sample_rate: usize) -> (Self, TunerHandle) {
        let enabled = Arc::new(AtomicBool::new(false));
        let reading = Arc::new(AtomicU64::new(0));

        (
            Self {
                sample_rate: sample_rate as f32,
                enabled: Arc::clone(&enabled),
                reading: Arc::clone(&reading),
            },
            TunerHandle { enabled, reading },
        )
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    /// Estimates the pitch of one block and publishes the nearest note.
    pub fn process(&mut self, block: &[f32]) {
        if let Some(freq) = estimate_frequency(block, self.sample_rate)
            && freq > MIN_FREQUENCY_HZ
        {
            self.reading.store(encode(nearest_note(freq)), Ordering::Release);
        }
    }
}

impl TunerHandle {
    pub fn get_tuner_info(&self) -> TunerInfo {
        decode(self.reading.load(Ordering::Acquire))
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }
}

impl TunerInfo {
    pub fn in_tune(&self) -> bool {
        self.note.is_some() && self.deviation_hz.abs() < IN_TUNE_HZ
    }

    /// Needle position for a 0..1 gauge, 0.5 being in tune.
    pub fn needle(&self) -> f32 {
        0.5 + self.deviation_hz.clamp(-NEEDLE_RANGE_HZ, NEEDLE_RANGE_HZ) / (4.0 * NEEDLE_RANGE_HZ)
    }
}

impl std::fmt::Display for TunerInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.note {
            Some(note) => write!(f, "{note} {:+.1} Hz", self.deviation_hz),
            None => write!(f, "-"),
        }
    }
}

/// Counts sign changes between consecutive samples. Exact zeros count as
/// their own sign, so `+ 0 -` is two changes.
pub fn count_zero_crossings(block: &[f32]) -> usize {
    block
        .windows(2)
        .filter(|w| sign(w[0]) != sign(w[1]))
        .count()
}

/// `crossings * sample_rate / (2 * block_len)`; `None` without crossings.
pub fn estimate_frequency(block: &[f32], sample_rate: f32) -> Option<f32> {
    let crossings = count_zero_crossings(block);
    if crossings == 0 {
        return None;
    }
    Some(crossings as f32 * sample_rate / (2.0 * block.len() as f32))
}

/// Index into [`REFERENCE_NOTES`] of the closest pitch, with the signed
/// difference `freq - reference`.
pub fn nearest_note(freq: f32) -> (usize, f32) {
    let mut best = (0, f32::INFINITY);
    for (i, &(_, reference)) in REFERENCE_NOTES.iter().enumerate() {
        let diff = freq - reference;
        if diff.abs() < best.1.abs() {
            best = (i, diff);
        }
    }
    best
}

#[inline]
fn sign(x: f32) -> i8 {
    if x > 0.0 {
        1
    } else if x < 0.0 {
        -1
    } else {
        0
    }
}

// Upper half: note index + 1 (0 = no reading). Lower half: deviation bits.
fn encode((index, deviation): (usize, f32)) -> u64 {
    ((index as u64 + 1) << 32) | u64::from(deviation.to_bits())
}

fn decode(packed: u64) -> TunerInfo {
    let index = (packed >> 32) as usize;
    if index == 0 {
        return TunerInfo::default();
    }
    TunerInfo {
        note: REFERENCE_NOTES.get(index - 1).map(|&(name, _)| name),
        deviation_hz: f32::from_bits(packed as u32),
    }
}

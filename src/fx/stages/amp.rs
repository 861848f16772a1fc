use anyhow::Result;
use std::f32::consts::FRAC_2_PI;

use crate::fx::stages::Stage;
use crate::fx::stages::common::pct;
use crate::fx::stages::eq::Equalizer;
use crate::preset::{AmpParams, DriveMode};

/// Headroom compensation applied to the clean channel after its boost.
const CLEAN_HEADROOM: f32 = 0.8;
const CLEAN_BOOST: f32 = 1.5;
const DISTORTION_CEILING: f32 = 0.5;
const DISTORTION_MAKEUP: f32 = 1.5;
const FUZZ_SCALE: f32 = 0.8;

/// Drive curve for one sample.
///
/// `gain` is the raw 0-100 control; most curves use the derived factor
/// `g = gain / 10 + 1`, fuzz works on the raw value.
#[inline]
pub fn shape(mode: DriveMode, input: f32, gain: f32, warmth: f32) -> f32 {
    let g = gain / 10.0 + 1.0;

    match mode {
        DriveMode::Clean => {
            let mut y = input * CLEAN_BOOST.mul_add(g, 1.0);
            if warmth > 0.0 {
                y /= warmth.mul_add(y.abs(), 1.0);
            }
            y * CLEAN_HEADROOM
        }
        DriveMode::Overdrive1 => (input * (g + 2.0)).tanh(),
        DriveMode::Overdrive2 => FRAC_2_PI * (input * 2.0 * g).atan(),
        DriveMode::Distortion => {
            (input * (g + 2.0)).clamp(-DISTORTION_CEILING, DISTORTION_CEILING) * DISTORTION_MAKEUP
        }
        DriveMode::Fuzz => {
            let magnitude = 1.0 - (-(input * gain * FUZZ_SCALE).abs()).exp();
            if input == 0.0 {
                0.0
            } else {
                input.signum() * magnitude
            }
        }
    }
}

/// Drive stage followed by the tone section and the output volume.
pub struct AmpStage {
    eq: Equalizer,
}

impl AmpStage {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            eq: Equalizer::new(sample_rate),
        }
    }

    pub const fn equalizer(&self) -> &Equalizer {
        &self.eq
    }
}

impl Stage for AmpStage {
    type Params = AmpParams;

    fn process_block(&mut self, params: &AmpParams, block: &mut [f32]) -> Result<()> {
        let mode = params.drive_mode;
        let warmth = pct(params.warmth);

        for sample in block.iter_mut() {
            *sample = shape(mode, *sample, params.gain, warmth);
        }

        self.eq
            .process_block(params.bass, params.mid, params.treble, block)?;

        let volume = pct(params.vol);
        for sample in block.iter_mut() {
            *sample *= volume;
        }

        Ok(())
    }

    fn reset(&mut self) {
        self.eq.reset();
    }
}

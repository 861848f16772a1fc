//! Three-band tone section: low shelf, mid peak, high shelf.
//!
//! Coefficients follow the RBJ Audio EQ Cookbook and are recomputed every
//! block from the current control positions. Each band keeps its own
//! [`FilterState`] for the lifetime of the engine, so a control change only
//! swaps coefficients and the recursion carries on without a reset.

use anyhow::{Result, anyhow};
use assert_no_alloc::permit_alloc;
use std::f64::consts::PI;

pub const LOW_SHELF_HZ: f32 = 250.0;
pub const MID_PEAK_HZ: f32 = 1000.0;
pub const MID_PEAK_Q: f32 = 1.0;
pub const HIGH_SHELF_HZ: f32 = 5000.0;

/// Full-scale boost/cut of the shelves, in dB.
const SHELF_RANGE_DB: f64 = 20.0;
/// Full-scale boost/cut of the mid peak, in dB.
const PEAK_RANGE_DB: f64 = 18.0;

/// Maps a 0-100 control position to dB; 50 is flat.
#[inline]
fn position_to_db(position: f32, range_db: f64) -> f64 {
    (f64::from(position) - 50.0) / 50.0 * range_db
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ShelfType {
    Low,
    High,
}

/// Normalised biquad coefficients (`a0 == 1`).
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Coefficients {
    pub b0: f32,
    pub b1: f32,
    pub b2: f32,
    pub a1: f32,
    pub a2: f32,
}

impl Coefficients {
    pub const IDENTITY: Self = Self {
        b0: 1.0,
        b1: 0.0,
        b2: 0.0,
        a1: 0.0,
        a2: 0.0,
    };

    /// Shelving filter driven by a 0-100 gain position.
    pub fn shelf(
        shelf_type: ShelfType,
        freq: f32,
        gain_position: f32,
        sample_rate: f32,
    ) -> Result<Self> {
        let a = 10f64.powf(position_to_db(gain_position, SHELF_RANGE_DB) / 40.0);
        let omega = 2.0 * PI * f64::from(freq) / f64::from(sample_rate);
        let (sn, cs) = omega.sin_cos();
        // NaN from a negative radicand also collapses to 0 here.
        let beta = ((a.powi(2) + 1.0) / 0.7 - (a - 1.0).powi(2)).sqrt().max(0.0) / 2.0;
        let two_beta_sn = 2.0 * beta * sn;

        let (b, den) = match shelf_type {
            ShelfType::Low => (
                [
                    a * ((a + 1.0) - (a - 1.0) * cs + two_beta_sn),
                    2.0 * a * ((a - 1.0) - (a + 1.0) * cs),
                    a * ((a + 1.0) - (a - 1.0) * cs - two_beta_sn),
                ],
                [
                    (a + 1.0) + (a - 1.0) * cs + two_beta_sn,
                    -2.0 * ((a - 1.0) + (a + 1.0) * cs),
                    (a + 1.0) + (a - 1.0) * cs - two_beta_sn,
                ],
            ),
            ShelfType::High => (
                [
                    a * ((a + 1.0) + (a - 1.0) * cs + two_beta_sn),
                    -2.0 * a * ((a - 1.0) + (a + 1.0) * cs),
                    a * ((a + 1.0) + (a - 1.0) * cs - two_beta_sn),
                ],
                [
                    (a + 1.0) - (a - 1.0) * cs + two_beta_sn,
                    2.0 * ((a - 1.0) - (a + 1.0) * cs),
                    (a + 1.0) - (a - 1.0) * cs - two_beta_sn,
                ],
            ),
        };

        Self::normalize(b, den)
    }

    /// Peaking filter driven by a 0-100 gain position.
    pub fn peaking(freq: f32, gain_position: f32, q: f32, sample_rate: f32) -> Result<Self> {
        let a = 10f64.powf(position_to_db(gain_position, PEAK_RANGE_DB) / 40.0);
        let omega = 2.0 * PI * f64::from(freq) / f64::from(sample_rate);
        let alpha = omega.sin() / (2.0 * f64::from(q));
        let cs = omega.cos();

        Self::normalize(
            [1.0 + alpha * a, -2.0 * cs, 1.0 - alpha * a],
            [1.0 + alpha / a, -2.0 * cs, 1.0 - alpha / a],
        )
    }

    fn normalize(b: [f64; 3], a: [f64; 3]) -> Result<Self> {
        let a0 = a[0];
        if a0 == 0.0 || !a0.is_finite() {
            return Err(permit_alloc(|| anyhow!("invalid filter denominator a0={a0}")));
        }

        let coeffs = Self {
            b0: (b[0] / a0) as f32,
            b1: (b[1] / a0) as f32,
            b2: (b[2] / a0) as f32,
            a1: (a[1] / a0) as f32,
            a2: (a[2] / a0) as f32,
        };

        if !coeffs.is_finite() {
            return Err(permit_alloc(|| {
                anyhow!("non-finite filter coefficients: {coeffs:?}")
            }));
        }

        Ok(coeffs)
    }

    pub fn is_finite(&self) -> bool {
        [self.b0, self.b1, self.b2, self.a1, self.a2]
            .iter()
            .all(|c| c.is_finite())
    }
}

/// The last two input and output samples of one biquad.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct FilterState {
    pub x1: f32,
    pub x2: f32,
    pub y1: f32,
    pub y2: f32,
}

/// Direct form I biquad. Coefficients can be swapped at any time; the
/// state is only ever cleared by [`Biquad::reset`].
#[derive(Clone, Debug)]
pub struct Biquad {
    coeffs: Coefficients,
    state: FilterState,
}

impl Default for Biquad {
    fn default() -> Self {
        Self::new()
    }
}

impl Biquad {
    pub const fn new() -> Self {
        Self {
            coeffs: Coefficients::IDENTITY,
            state: FilterState {
                x1: 0.0,
                x2: 0.0,
                y1: 0.0,
                y2: 0.0,
            },
        }
    }

    pub const fn set_coefficients(&mut self, coeffs: Coefficients) {
        self.coeffs = coeffs;
    }

    pub const fn state(&self) -> &FilterState {
        &self.state
    }

    pub fn reset(&mut self) {
        self.state = FilterState::default();
    }

    #[inline]
    pub fn process(&mut self, input: f32) -> f32 {
        let c = &self.coeffs;
        let s = &mut self.state;

        let output = c.b0 * input + c.b1 * s.x1 + c.b2 * s.x2 - c.a1 * s.y1 - c.a2 * s.y2;

        s.x2 = s.x1;
        s.x1 = input;
        s.y2 = s.y1;
        s.y1 = output;

        output
    }

    pub fn process_block(&mut self, block: &mut [f32]) {
        for sample in block.iter_mut() {
            *sample = self.process(*sample);
        }
    }
}

/// Low shelf → mid peak → high shelf cascade.
pub struct Equalizer {
    low: Biquad,
    mid: Biquad,
    high: Biquad,
    sample_rate: f32,
}

impl Equalizer {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            low: Biquad::new(),
            mid: Biquad::new(),
            high: Biquad::new(),
            sample_rate,
        }
    }

    /// Recomputes all coefficients from the given 0-100 positions, then
    /// filters `block` in place.
    pub fn process_block(
        &mut self,
        bass: f32,
        mid: f32,
        treble: f32,
        block: &mut [f32],
    ) -> Result<()> {
        let sr = self.sample_rate;

        self.low.set_coefficients(Coefficients::shelf(
            ShelfType::Low,
            LOW_SHELF_HZ,
            bass,
            sr,
        )?);
        self.mid
            .set_coefficients(Coefficients::peaking(MID_PEAK_HZ, mid, MID_PEAK_Q, sr)?);
        self.high.set_coefficients(Coefficients::shelf(
            ShelfType::High,
            HIGH_SHELF_HZ,
            treble,
            sr,
        )?);

        self.low.process_block(block);
        self.mid.process_block(block);
        self.high.process_block(block);

        Ok(())
    }

    pub fn states(&self) -> [FilterState; 3] {
        [*self.low.state(), *self.mid.state(), *self.high.state()]
    }

    pub fn reset(&mut self) {
        self.low.reset();
        self.mid.reset();
        self.high.reset();
    }
}

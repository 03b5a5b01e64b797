//! Perceptual weighting filters for loudness measurement.
//!
//! Maps the weighting selector to a cascade of biquads:
//! - **A/B/C/D**: IEC 61672:2003 curves (D from the IEC 537 draft),
//!   normalized to 0 dB at 1 kHz.
//! - **K**: ITU-R BS.1770-4 pre-filter (shelf + RLB high-pass), designed for
//!   any sample rate with the same formulas libebur128 uses.
//! - **None**: flat.

use crate::dsp::biquad::Biquad;
use nih_plug::prelude::Enum;
use std::f64::consts::PI;

const MAX_SECTIONS: usize = 3;

// IEC 61672 pole frequencies (Hz)
const F1: f64 = 20.598997;
const F2: f64 = 107.65265;
const F3: f64 = 737.86223;
const F4: f64 = 12194.217;
// B-curve extra pole
const F5: f64 = 158.5;

/// Frequency weighting applied before energy integration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Enum)]
pub enum Weighting {
    #[name = "None"]
    None,
    #[name = "A-Weighted"]
    A,
    #[name = "B-Weighted"]
    B,
    #[name = "C-Weighted"]
    C,
    #[name = "D-Weighted"]
    D,
    #[name = "K-Weighted"]
    K,
}

impl Default for Weighting {
    fn default() -> Self {
        Weighting::K
    }
}

impl Weighting {
    /// Build the filter cascade for this weighting at `sample_rate`.
    pub fn design(self, sample_rate: f32) -> WeightingFilter {
        let sr = sample_rate as f64;
        let mut filter = WeightingFilter::flat();

        match self {
            Weighting::None => {}
            Weighting::A => {
                filter.push(hpf2(F1, sr));
                filter.push(Biquad::from_analog(
                    [0.0, 0.0, 1.0],
                    [warp(F2, sr) * warp(F3, sr), warp(F2, sr) + warp(F3, sr), 1.0],
                    sr,
                ));
                filter.push(lpf2(F4, sr));
                filter.normalize_at(1000.0, sr);
            }
            Weighting::B => {
                filter.push(hpf2(F1, sr));
                filter.push(Biquad::from_analog(
                    [0.0, 1.0, 0.0],
                    [warp(F5, sr), 1.0, 0.0],
                    sr,
                ));
                filter.push(lpf2(F4, sr));
                filter.normalize_at(1000.0, sr);
            }
            Weighting::C => {
                filter.push(hpf2(F1, sr));
                filter.push(lpf2(F4, sr));
                filter.normalize_at(1000.0, sr);
            }
            Weighting::D => {
                filter.push(Biquad::from_analog(
                    [0.0, 1.0, 0.0],
                    [1776.3 * 7288.5, 1776.3 + 7288.5, 1.0],
                    sr,
                ));
                filter.push(Biquad::from_analog(
                    [4.0975e7, 6532.0, 1.0],
                    [3.8836e8, 21514.0, 1.0],
                    sr,
                ));
                filter.normalize_at(1000.0, sr);
            }
            Weighting::K => {
                let (shelf, highpass) = k_filter(sr);
                filter.push(shelf);
                filter.push(highpass);
            }
        }

        filter
    }
}

/// Pre-warped analog angular frequency for a digital frequency `f`.
fn warp(f: f64, sr: f64) -> f64 {
    2.0 * sr * (PI * f / sr).tan()
}

/// `s^2 / (s + w)^2`
fn hpf2(f: f64, sr: f64) -> Biquad {
    let w = warp(f, sr);
    Biquad::from_analog([0.0, 0.0, 1.0], [w * w, 2.0 * w, 1.0], sr)
}

/// `1 / (s + w)^2`
fn lpf2(f: f64, sr: f64) -> Biquad {
    let w = warp(f, sr);
    Biquad::from_analog([1.0, 0.0, 0.0], [w * w, 2.0 * w, 1.0], sr)
}

fn k_filter(sr: f64) -> (Biquad, Biquad) {
    // High shelf (head acoustics)
    let f0 = 1681.974450955533;
    let g = 3.999843853973347;
    let q = 0.7071752369554196;

    let k = (PI * f0 / sr).tan();
    let vh = 10f64.powf(g / 20.0);
    let vb = vh.powf(0.4996667741545416);
    let a0 = 1.0 + k / q + k * k;

    let mut shelf = Biquad::new();
    shelf.set_coefficients(
        (vh + vb * k / q + k * k) / a0,
        2.0 * (k * k - vh) / a0,
        (vh - vb * k / q + k * k) / a0,
        2.0 * (k * k - 1.0) / a0,
        (1.0 - k / q + k * k) / a0,
    );

    // RLB high-pass
    let f0 = 38.13547087602444;
    let q = 0.5003270373238773;
    let k = (PI * f0 / sr).tan();
    let a0 = 1.0 + k / q + k * k;

    let mut highpass = Biquad::new();
    highpass.set_coefficients(
        1.0,
        -2.0,
        1.0,
        2.0 * (k * k - 1.0) / a0,
        (1.0 - k / q + k * k) / a0,
    );

    (shelf, highpass)
}

/// Fixed-capacity cascade of biquads for one channel.
#[derive(Debug, Clone, Copy)]
pub struct WeightingFilter {
    sections: [Biquad; MAX_SECTIONS],
    len: usize,
}

impl Default for WeightingFilter {
    fn default() -> Self {
        Self::flat()
    }
}

impl WeightingFilter {
    pub fn flat() -> Self {
        Self {
            sections: [Biquad::new(); MAX_SECTIONS],
            len: 0,
        }
    }

    fn push(&mut self, bq: Biquad) {
        debug_assert!(self.len < MAX_SECTIONS, "too many weighting sections");
        if self.len < MAX_SECTIONS {
            self.sections[self.len] = bq;
            self.len += 1;
        }
    }

    fn normalize_at(&mut self, freq: f64, sr: f64) {
        let mag = self.magnitude(freq, sr);
        if self.len > 0 && mag > 0.0 {
            self.sections[0].scale(1.0 / mag);
        }
    }

    /// Combined magnitude response of the cascade.
    pub fn magnitude(&self, freq: f64, sr: f64) -> f64 {
        self.sections[..self.len]
            .iter()
            .map(|s| s.magnitude(freq, sr))
            .product()
    }

    #[inline]
    pub fn process(&mut self, x: f32) -> f32 {
        self.sections[..self.len]
            .iter_mut()
            .fold(x, |acc, s| s.process(acc))
    }

    pub fn reset(&mut self) {
        for s in self.sections.iter_mut() {
            s.reset();
        }
    }
}

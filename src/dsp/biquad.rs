//! Biquad Filter Implementation (IIR 2nd Order)
//!
//! Second-order recursive section used to build the perceptual weighting
//! chains of the loudness meters.
//!
//! # Design Notes
//! - Coefficients are designed in `f64` and stored as `f32`
//! - Analog prototypes are mapped through the bilinear transform
//! - All processing is safe for the audio thread (no allocations)

/// Biquad filter implementation (IIR 2nd order)
///
/// `a*` hold the feed-forward (numerator) taps and `b*` the feedback taps,
/// already normalized so the leading denominator coefficient is 1.
#[derive(Debug, Clone, Copy)]
pub struct Biquad {
    a0: f32,
    a1: f32,
    a2: f32,
    b1: f32,
    b2: f32,
    z1: f32,
    z2: f32,
}

impl Default for Biquad {
    fn default() -> Self {
        Self::new()
    }
}

impl Biquad {
    /// Identity filter.
    pub fn new() -> Self {
        Self {
            a0: 1.0,
            a1: 0.0,
            a2: 0.0,
            b1: 0.0,
            b2: 0.0,
            z1: 0.0,
            z2: 0.0,
        }
    }

    /// Process a single sample
    #[inline]
    pub fn process(&mut self, input: f32) -> f32 {
        let out = input * self.a0 + self.z1;

        // Anti-denormal: tiny DC offset
        self.z1 = input * self.a1 + self.z2 - self.b1 * out + 1e-25;
        self.z2 = input * self.a2 - self.b2 * out + 1e-25;

        out
    }

    /// Explicitly clear filter delay state.
    ///
    /// Coefficient updates keep the state; call this when the meter history
    /// is discarded as well.
    #[inline]
    pub fn reset(&mut self) {
        self.z1 = 0.0;
        self.z2 = 0.0;
    }

    /// Set normalized digital coefficients.
    ///
    /// Transfer function: `(n0 + n1 z^-1 + n2 z^-2) / (1 + d1 z^-1 + d2 z^-2)`.
    pub fn set_coefficients(&mut self, n0: f64, n1: f64, n2: f64, d1: f64, d2: f64) {
        self.a0 = n0 as f32;
        self.a1 = n1 as f32;
        self.a2 = n2 as f32;
        self.b1 = d1 as f32;
        self.b2 = d2 as f32;
    }

    /// Scale the numerator (overall section gain).
    pub fn scale(&mut self, k: f64) {
        self.a0 = (self.a0 as f64 * k) as f32;
        self.a1 = (self.a1 as f64 * k) as f32;
        self.a2 = (self.a2 as f64 * k) as f32;
    }

    // ---------------------------------------------------------------------
    // Filter design helpers
    // ---------------------------------------------------------------------

    /// Map an analog section `(nb2 s^2 + nb1 s + nb0) / (da2 s^2 + da1 s + da0)`
    /// to the digital domain using the bilinear transform at `sr`.
    pub fn from_analog(num: [f64; 3], den: [f64; 3], sr: f64) -> Self {
        let c = 2.0 * sr;
        let c2 = c * c;
        let [nb0, nb1, nb2] = num;
        let [da0, da1, da2] = den;

        let n0 = nb2 * c2 + nb1 * c + nb0;
        let n1 = 2.0 * (nb0 - nb2 * c2);
        let n2 = nb2 * c2 - nb1 * c + nb0;

        let d0 = da2 * c2 + da1 * c + da0;
        let d1 = 2.0 * (da0 - da2 * c2);
        let d2 = da2 * c2 - da1 * c + da0;

        let inv = 1.0 / d0;
        let mut bq = Self::new();
        bq.set_coefficients(n0 * inv, n1 * inv, n2 * inv, d1 * inv, d2 * inv);
        bq
    }

    /// Magnitude response at `freq` Hz.
    pub fn magnitude(&self, freq: f64, sr: f64) -> f64 {
        let w = 2.0 * std::f64::consts::PI * freq / sr;
        let (c1, s1) = (w.cos(), -w.sin());
        let (c2, s2) = ((2.0 * w).cos(), -(2.0 * w).sin());

        let nr = self.a0 as f64 + self.a1 as f64 * c1 + self.a2 as f64 * c2;
        let ni = self.a1 as f64 * s1 + self.a2 as f64 * s2;
        let dr = 1.0 + self.b1 as f64 * c1 + self.b2 as f64 * c2;
        let di = self.b1 as f64 * s1 + self.b2 as f64 * s2;

        ((nr * nr + ni * ni) / (dr * dr + di * di).max(1e-300)).sqrt()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_passthrough() {
        let mut bq = Biquad::new();
        for x in [0.5f32, -0.25, 1.0] {
            assert!((bq.process(x) - x).abs() < 1e-6);
        }
    }

    #[test]
    fn test_analog_highpass_blocks_dc() {
        // s^2 / (s + w)^2, w = 2*pi*100
        let w = 2.0 * std::f64::consts::PI * 100.0;
        let bq = Biquad::from_analog([0.0, 0.0, 1.0], [w * w, 2.0 * w, 1.0], 48000.0);
        assert!(bq.magnitude(1.0, 48000.0) < 1e-3);
        assert!((bq.magnitude(10000.0, 48000.0) - 1.0).abs() < 0.01);
    }
}

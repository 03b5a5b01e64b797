//! Gain Smoother
//!
//! Turns a pair of loudness curves (long and short horizon) and a target level
//! into a per-sample gain curve.
//!
//! # Behavior
//! - Below the silence threshold (short loudness) the gain is held.
//! - When the short-horizon loudness overshoots the target by more than the
//!   deviation, the short fall speed pulls the gain down quickly.
//! - With the quick amplifier enabled, an undershoot beyond the deviation
//!   uses the short grow speed.
//! - Otherwise the long-horizon loudness is driven towards the target with the
//!   long grow/fall speeds.
//! - Gain never overshoots the correction it is heading for, and is capped by
//!   the optional maximum gain.
//!
//! Speeds are given in dB/s and converted to per-sample multipliers.

use crate::dsp::utils::{db_to_gain, DB_EPS};

/// Target level handed to the smoother for one chunk.
#[derive(Debug, Clone, Copy)]
pub enum Target<'a> {
    Constant(f32),
    /// One value per sample of the chunk.
    Curve(&'a [f32]),
}

impl Target<'_> {
    #[inline]
    pub fn at(&self, i: usize) -> f32 {
        match self {
            Target::Constant(v) => *v,
            Target::Curve(c) => c.get(i).or_else(|| c.last()).copied().unwrap_or(0.0),
        }
    }
}

pub trait GainSmoother {
    fn set_sample_rate(&mut self, sample_rate: f32);

    /// Deviation band in dB.
    fn set_deviation(&mut self, db: f32);

    /// Long-horizon speeds in dB/s.
    fn set_long_speed(&mut self, grow: f32, fall: f32);

    /// Short-horizon speeds in dB/s.
    fn set_short_speed(&mut self, grow: f32, fall: f32);

    /// Silence threshold as linear loudness.
    fn set_silence_threshold(&mut self, gain: f32);

    /// Maximum gain as a linear value.
    fn set_max_gain(&mut self, value: f32, enabled: bool);

    fn enable_quick_amplifier(&mut self, enabled: bool);

    /// Write one gain value per sample into `out`.
    fn process(&mut self, out: &mut [f32], long: &[f32], short: &[f32], target: Target);

    fn reset(&mut self);
}

#[derive(Debug, Clone, Copy)]
struct Speed {
    grow_db: f32,
    fall_db: f32,
    grow: f32,
    fall: f32,
}

impl Default for Speed {
    fn default() -> Self {
        Self {
            grow_db: 0.0,
            fall_db: 0.0,
            grow: 1.0,
            fall: 1.0,
        }
    }
}

impl Speed {
    fn update(&mut self, sample_rate: f32) {
        let sr = sample_rate.max(1.0);
        self.grow = db_to_gain(self.grow_db.max(0.0) / sr);
        self.fall = db_to_gain(-self.fall_db.max(0.0) / sr);
    }
}

/// Default [`GainSmoother`].
#[derive(Debug, Clone)]
pub struct AutoGain {
    sample_rate: f32,
    deviation: f32,
    silence: f32,
    max_gain: f32,
    max_gain_enabled: bool,
    quick_amp: bool,
    long: Speed,
    short: Speed,
    gain: f32,
}

impl Default for AutoGain {
    fn default() -> Self {
        Self {
            sample_rate: 48000.0,
            deviation: 1.0,
            silence: 0.0,
            max_gain: 1.0,
            max_gain_enabled: false,
            quick_amp: false,
            long: Speed::default(),
            short: Speed::default(),
            gain: 1.0,
        }
    }
}

impl AutoGain {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    fn step(&mut self, long: f32, short: f32, target: f32) -> f32 {
        let mut gain = self.gain;

        if short >= self.silence {
            let short_c = target / short.max(DB_EPS);

            if short * gain > target * self.deviation {
                gain = (gain * self.short.fall).max(short_c);
            } else if self.quick_amp && short * gain * self.deviation < target {
                gain = (gain * self.short.grow).min(short_c);
            } else {
                let long_c = target / long.max(DB_EPS);
                if long * gain > target {
                    gain = (gain * self.long.fall).max(long_c);
                } else if long * gain < target {
                    gain = (gain * self.long.grow).min(long_c);
                }
            }
        }

        if self.max_gain_enabled {
            gain = gain.min(self.max_gain);
        }

        self.gain = gain;
        gain
    }
}

impl GainSmoother for AutoGain {
    fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
        self.long.update(sample_rate);
        self.short.update(sample_rate);
    }

    fn set_deviation(&mut self, db: f32) {
        self.deviation = db_to_gain(db.max(0.0));
    }

    fn set_long_speed(&mut self, grow: f32, fall: f32) {
        self.long.grow_db = grow;
        self.long.fall_db = fall;
        self.long.update(self.sample_rate);
    }

    fn set_short_speed(&mut self, grow: f32, fall: f32) {
        self.short.grow_db = grow;
        self.short.fall_db = fall;
        self.short.update(self.sample_rate);
    }

    fn set_silence_threshold(&mut self, gain: f32) {
        self.silence = gain.max(0.0);
    }

    fn set_max_gain(&mut self, value: f32, enabled: bool) {
        self.max_gain = value;
        self.max_gain_enabled = enabled;
    }

    fn enable_quick_amplifier(&mut self, enabled: bool) {
        self.quick_amp = enabled;
    }

    fn process(&mut self, out: &mut [f32], long: &[f32], short: &[f32], target: Target) {
        let n = out.len().min(long.len()).min(short.len());
        for i in 0..n {
            out[i] = self.step(long[i], short[i], target.at(i));
        }
        // Short input slices: hold the last gain
        let g = self.gain;
        out[n..].fill(g);
    }

    fn reset(&mut self) {
        self.gain = 1.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::utils::gain_to_db;

    fn smoother() -> AutoGain {
        let mut s = AutoGain::new();
        s.set_sample_rate(48000.0);
        s.set_deviation(6.0);
        s.set_long_speed(12.0, 12.0);
        s.set_short_speed(60.0, 60.0);
        s.set_silence_threshold(db_to_gain(-76.0));
        s
    }

    #[test]
    fn test_silence_holds_gain() {
        let mut s = smoother();
        let quiet = vec![db_to_gain(-90.0); 4800];
        let mut out = vec![0.0; 4800];
        s.process(&mut out, &quiet, &quiet, Target::Constant(db_to_gain(-23.0)));
        assert!(out.iter().all(|g| *g == 1.0));
    }

    #[test]
    fn test_long_grow_rate() {
        let mut s = smoother();
        // 10 dB too quiet, quick amp off: long speed applies
        let level = vec![db_to_gain(-33.0); 48000];
        let mut out = vec![0.0; 48000];
        s.process(&mut out, &level, &level, Target::Constant(db_to_gain(-23.0)));
        // 12 dB/s for one second, bounded by the 10 dB needed
        assert!((gain_to_db(out[47999]) - 10.0).abs() < 0.01);
        // Halfway: ~6 dB
        assert!((gain_to_db(out[23999]) - 6.0).abs() < 0.05);
    }

    #[test]
    fn test_short_fall_on_overshoot() {
        let mut s = smoother();
        // 20 dB too loud: beyond the deviation, short fall at 60 dB/s
        let level = vec![db_to_gain(-3.0); 4800];
        let mut out = vec![0.0; 4800];
        s.process(&mut out, &level, &level, Target::Constant(db_to_gain(-23.0)));
        // 100 ms at 60 dB/s
        assert!((gain_to_db(out[4799]) + 6.0).abs() < 0.05);
    }

    #[test]
    fn test_quick_amplifier() {
        let mut s = smoother();
        s.enable_quick_amplifier(true);
        let level = vec![db_to_gain(-43.0); 4800];
        let mut out = vec![0.0; 4800];
        s.process(&mut out, &level, &level, Target::Constant(db_to_gain(-23.0)));
        assert!((gain_to_db(out[4799]) - 6.0).abs() < 0.05);
    }

    #[test]
    fn test_max_gain_clamp() {
        let mut s = smoother();
        s.set_max_gain(db_to_gain(3.0), true);
        let level = vec![db_to_gain(-33.0); 48000];
        let mut out = vec![0.0; 48000];
        s.process(&mut out, &level, &level, Target::Constant(db_to_gain(-23.0)));
        assert!(out.iter().all(|g| *g <= db_to_gain(3.0)));
    }

    #[test]
    fn test_curve_target_is_followed_per_sample() {
        let t = [0.1f32, 0.2, 0.3];
        let target = Target::Curve(&t);
        assert_eq!(target.at(1), 0.2);
        // Past the end holds the last value
        assert_eq!(target.at(7), 0.3);
    }
}

//! Gain correction stage: target continuity around the gain smoother.

use super::consts::{BUFFER_SIZE, LEVEL_GAIN_MAX, LEVEL_GAIN_MIN};
use crate::dsp::auto_gain::{GainSmoother, Target};
use crate::dsp::utils::{alloc_buffer, fill_ramp};
use anyhow::Result;

/// Configured target and the target delivered at the end of the last chunk.
#[derive(Debug, Clone, Copy, Default)]
pub struct LevelState {
    configured: f32,
    previous: Option<f32>,
}

impl LevelState {
    pub fn set_level(&mut self, gain: f32) {
        self.configured = gain;
    }

    pub fn configured(&self) -> f32 {
        self.configured
    }

    /// Last delivered target, if any chunk was processed yet.
    pub fn previous(&self) -> Option<f32> {
        self.previous
    }

    /// Target for the configured level. Ramps through `buf` when the level
    /// moved since the last chunk.
    pub fn configured_target<'a>(&mut self, buf: &'a mut [f32]) -> Target<'a> {
        let target = self.configured;
        match self.previous {
            Some(prev) if prev != target && !buf.is_empty() => {
                fill_ramp(buf, prev, target);
                self.previous = Some(target);
                Target::Curve(buf)
            }
            _ => {
                self.previous = Some(target);
                Target::Constant(target)
            }
        }
    }

    /// Target following a sidechain loudness curve, clamped to the level range.
    pub fn matched_target<'a>(&mut self, loudness: &[f32], buf: &'a mut [f32]) -> Target<'a> {
        let n = buf.len().min(loudness.len());
        for (t, l) in buf[..n].iter_mut().zip(loudness) {
            *t = l.clamp(LEVEL_GAIN_MIN, LEVEL_GAIN_MAX);
        }
        if n > 0 {
            self.previous = Some(buf[n - 1]);
        }
        Target::Curve(&buf[..n])
    }

    /// Drop any pending ramp.
    pub fn settle(&mut self) {
        self.previous = Some(self.configured);
    }
}

/// Drives the smoother and keeps the gain curve of the current chunk.
#[derive(Debug, Default)]
pub struct GainCorrection<S> {
    pub smoother: S,
    pub level: LevelState,
    target: Vec<f32>,
    gain: Vec<f32>,
}

impl<S: GainSmoother> GainCorrection<S> {
    pub fn init(&mut self, sample_rate: f32) -> Result<()> {
        self.target = alloc_buffer(BUFFER_SIZE)?;
        self.gain = alloc_buffer(BUFFER_SIZE)?;
        self.smoother.set_sample_rate(sample_rate);
        Ok(())
    }

    /// Compute `n` gain values. `matched` carries the sidechain long loudness
    /// in Match modes.
    pub fn process(
        &mut self,
        long: &[f32],
        short: &[f32],
        matched: Option<&[f32]>,
        n: usize,
    ) -> &[f32] {
        let buf = &mut self.target[..n];
        let target = match matched {
            Some(loudness) => self.level.matched_target(loudness, buf),
            None => self.level.configured_target(buf),
        };
        self.smoother
            .process(&mut self.gain[..n], &long[..n], &short[..n], target);
        &self.gain[..n]
    }

    pub fn reset(&mut self) {
        self.smoother.reset();
        self.level.settle();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::utils::db_to_gain;

    #[test]
    fn test_first_chunk_has_no_ramp() {
        let mut level = LevelState::default();
        level.set_level(0.5);
        let mut buf = [0.0f32; 4];
        assert!(matches!(level.configured_target(&mut buf), Target::Constant(v) if v == 0.5));
    }

    #[test]
    fn test_level_change_ramps_once() {
        let mut level = LevelState::default();
        level.set_level(db_to_gain(-23.0));
        let mut buf = [0.0f32; 8];
        let _ = level.configured_target(&mut buf);

        level.set_level(db_to_gain(-18.0));
        match level.configured_target(&mut buf) {
            Target::Curve(c) => {
                assert_eq!(c[7], db_to_gain(-18.0));
                assert!(c[0] > db_to_gain(-23.0));
            }
            Target::Constant(_) => panic!("expected a ramp"),
        }
        assert!(matches!(level.configured_target(&mut buf), Target::Constant(_)));
    }

    #[test]
    fn test_match_clamps_and_hands_over() {
        let mut level = LevelState::default();
        level.set_level(db_to_gain(-23.0));

        let loud = [db_to_gain(30.0); 4];
        let mut buf = [0.0f32; 4];
        match level.matched_target(&loud, &mut buf) {
            Target::Curve(c) => assert!(c.iter().all(|v| *v == LEVEL_GAIN_MAX)),
            Target::Constant(_) => panic!("expected a curve"),
        }
        assert_eq!(level.previous(), Some(LEVEL_GAIN_MAX));

        // Leaving Match ramps down from where it ended
        match level.configured_target(&mut buf) {
            Target::Curve(c) => assert!(c[0] < LEVEL_GAIN_MAX && c[0] > level.configured()),
            Target::Constant(_) => panic!("expected a ramp"),
        }
    }
}

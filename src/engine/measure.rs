//! Long/short horizon loudness measurement for one monitored signal.

use super::consts::{BUFFER_SIZE, LONG_PERIOD_MAX, SHORT_PERIOD_MAX};
use crate::dsp::loudness::{ChannelRole, LoudnessMeter, LUFS_SHIFT_GAIN};
use crate::dsp::utils::alloc_buffer;
use crate::dsp::weighting::Weighting;
use anyhow::{Context, Result};

/// Channel roles for a signal with `channels` channels.
pub fn designation(channels: usize, channel: usize) -> ChannelRole {
    if channels == 1 {
        return ChannelRole::Center;
    }
    match channel {
        0 => ChannelRole::Left,
        1 => ChannelRole::Right,
        2 => ChannelRole::Center,
        3 => ChannelRole::Lfe,
        4 => ChannelRole::LeftSurround,
        5 => ChannelRole::RightSurround,
        _ => ChannelRole::Center,
    }
}

/// A long and a short horizon meter measuring the same signal, with the
/// curves of the current chunk.
#[derive(Debug, Default)]
pub struct HorizonPair<M> {
    pub long: M,
    pub short: M,
    pub long_curve: Vec<f32>,
    pub short_curve: Vec<f32>,
}

impl<M: LoudnessMeter> HorizonPair<M> {
    pub fn init(&mut self, channels: usize, sample_rate: f32) -> Result<()> {
        self.long
            .init(channels, LONG_PERIOD_MAX)
            .context("long horizon meter")?;
        self.long.set_sample_rate(sample_rate)?;
        self.short
            .init(channels, SHORT_PERIOD_MAX)
            .context("short horizon meter")?;
        self.short.set_sample_rate(sample_rate)?;

        self.long_curve = alloc_buffer(BUFFER_SIZE)?;
        self.short_curve = alloc_buffer(BUFFER_SIZE)?;
        Ok(())
    }

    pub fn designate(&mut self, channels: usize) {
        for c in 0..channels {
            let role = designation(channels, c);
            self.long.set_designation(c, role);
            self.short.set_designation(c, role);
        }
    }

    pub fn configure(&mut self, long_ms: f32, short_ms: f32, weighting: Weighting) {
        self.long.set_period(long_ms);
        self.short.set_period(short_ms);
        self.long.set_weighting(weighting);
        self.short.set_weighting(weighting);
    }

    /// Measure the first `n` samples of `inputs` into the chunk curves.
    pub fn measure(&mut self, inputs: &[&[f32]], n: usize) {
        self.long
            .process(inputs, &mut self.long_curve[..n], LUFS_SHIFT_GAIN);
        self.short
            .process(inputs, &mut self.short_curve[..n], LUFS_SHIFT_GAIN);
    }

    pub fn long(&self, n: usize) -> &[f32] {
        &self.long_curve[..n]
    }

    pub fn short(&self, n: usize) -> &[f32] {
        &self.short_curve[..n]
    }

    pub fn reset(&mut self) {
        self.long.reset();
        self.short.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_designations() {
        assert_eq!(designation(1, 0), ChannelRole::Center);
        assert_eq!(designation(2, 0), ChannelRole::Left);
        assert_eq!(designation(2, 1), ChannelRole::Right);
    }
}

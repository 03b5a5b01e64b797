//! Loudness Meter
//!
//! # Contract
//! - **Input**: one slice per channel for the current chunk.
//! - **Output**: per-sample loudness as a linear gain, i.e. the square root of
//!   the channel-weighted mean power over the measuring period, scaled by a
//!   caller-supplied shift gain. With [`LUFS_SHIFT_GAIN`], `20*log10(out)`
//!   reads directly in LUFS.
//! - **Will Not Do**: gating or integrated loudness. The autogain only needs a
//!   sliding measurement over a configurable period.
//!
//! # Lifecycle
//! `init` (channels, max period) -> `set_sample_rate` (allocates history) ->
//! any number of `set_period` / `set_weighting` / `set_designation` calls
//! between `process` calls. Configuration never discards history except on a
//! weighting change, which resets the filter state.

use crate::dsp::utils::{alloc_buffer, millis_to_samples};
use crate::dsp::weighting::{Weighting, WeightingFilter};
use anyhow::{Context, Result};

/// Shift turning mean-square dBFS into LUFS (BS.1770: -0.691 dB).
pub const LUFS_SHIFT_GAIN: f32 = 0.923_528;

/// Loudness contribution role of a channel (BS.1770-4 channel weights).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelRole {
    Center,
    Left,
    Right,
    LeftSurround,
    RightSurround,
    Lfe,
}

impl ChannelRole {
    pub fn weight(self) -> f32 {
        match self {
            ChannelRole::Center | ChannelRole::Left | ChannelRole::Right => 1.0,
            ChannelRole::LeftSurround | ChannelRole::RightSurround => 1.41,
            ChannelRole::Lfe => 0.0,
        }
    }
}

/// Per-sample loudness measurement over a sliding period.
pub trait LoudnessMeter {
    /// Set up for `channels` inputs and periods up to `max_period_ms`.
    fn init(&mut self, channels: usize, max_period_ms: f32) -> Result<()>;

    /// (Re)allocate sample-rate dependent state. Not real-time safe.
    fn set_sample_rate(&mut self, sample_rate: f32) -> Result<()>;

    fn set_period(&mut self, period_ms: f32);

    fn set_weighting(&mut self, weighting: Weighting);

    fn set_designation(&mut self, channel: usize, role: ChannelRole);

    /// Measure `inputs` and write one loudness value per sample into `out`.
    fn process(&mut self, inputs: &[&[f32]], out: &mut [f32], shift_gain: f32);

    /// Forget all measured history.
    fn reset(&mut self);
}

/// Default [`LoudnessMeter`]: weighting cascade + running mean square.
#[derive(Debug, Default)]
pub struct SlidingLoudnessMeter {
    sample_rate: f32,
    max_period_ms: f32,
    period_ms: f32,
    weighting: Weighting,
    filters: Vec<WeightingFilter>,
    weights: Vec<f32>,
    /// Channel-weighted power per sample, ring buffer
    history: Vec<f32>,
    head: usize,
    /// Samples in the measuring window
    window: usize,
    sum: f64,
}

impl SlidingLoudnessMeter {
    pub fn new() -> Self {
        Self::default()
    }

    fn channels(&self) -> usize {
        self.filters.len()
    }

    fn update_window(&mut self) {
        let cap = self.history.len();
        if cap < 2 {
            self.window = 1;
            self.sum = 0.0;
            return;
        }
        self.window = millis_to_samples(self.sample_rate, self.period_ms).clamp(1, cap - 1);

        // Re-integrate the last `window` samples
        let mut sum = 0.0f64;
        for k in 1..=self.window {
            sum += self.history[(self.head + cap - k) % cap] as f64;
        }
        self.sum = sum;
    }

    fn redesign(&mut self) {
        let design = self.weighting.design(self.sample_rate.max(1.0));
        for f in self.filters.iter_mut() {
            *f = design;
        }
    }
}

impl LoudnessMeter for SlidingLoudnessMeter {
    fn init(&mut self, channels: usize, max_period_ms: f32) -> Result<()> {
        let mut filters = Vec::new();
        filters
            .try_reserve_exact(channels)
            .context("loudness meter: channel filters")?;
        filters.resize(channels, WeightingFilter::flat());

        let mut weights = Vec::new();
        weights
            .try_reserve_exact(channels)
            .context("loudness meter: channel weights")?;
        weights.resize(channels, ChannelRole::Center.weight());

        self.filters = filters;
        self.weights = weights;
        self.max_period_ms = max_period_ms.max(0.0);
        if self.period_ms <= 0.0 {
            self.period_ms = self.max_period_ms;
        }
        Ok(())
    }

    fn set_sample_rate(&mut self, sample_rate: f32) -> Result<()> {
        self.sample_rate = sample_rate;
        let len = millis_to_samples(sample_rate, self.max_period_ms).max(1) + 1;
        self.history = alloc_buffer(len).context("loudness meter: history")?;
        self.head = 0;
        self.redesign();
        self.update_window();
        Ok(())
    }

    fn set_period(&mut self, period_ms: f32) {
        let period_ms = period_ms.clamp(0.0, self.max_period_ms);
        if period_ms == self.period_ms {
            return;
        }
        self.period_ms = period_ms;
        self.update_window();
    }

    fn set_weighting(&mut self, weighting: Weighting) {
        if weighting == self.weighting {
            return;
        }
        self.weighting = weighting;
        self.redesign();
    }

    fn set_designation(&mut self, channel: usize, role: ChannelRole) {
        if let Some(w) = self.weights.get_mut(channel) {
            *w = role.weight();
        }
    }

    fn process(&mut self, inputs: &[&[f32]], out: &mut [f32], shift_gain: f32) {
        let cap = self.history.len();
        if cap < 2 {
            out.fill(0.0);
            return;
        }
        let channels = self.channels().min(inputs.len());
        let inv_window = 1.0 / self.window as f64;

        for (i, o) in out.iter_mut().enumerate() {
            let mut power = 0.0f32;
            for c in 0..channels {
                let x = inputs[c].get(i).copied().unwrap_or(0.0);
                let y = self.filters[c].process(x);
                power += self.weights[c] * y * y;
            }

            let tail = (self.head + cap - self.window) % cap;
            self.sum += power as f64 - self.history[tail] as f64;
            self.history[self.head] = power;
            self.head = (self.head + 1) % cap;

            let ms = (self.sum * inv_window).max(0.0) as f32;
            *o = ms.sqrt() * shift_gain;
        }
    }

    fn reset(&mut self) {
        self.history.fill(0.0);
        self.head = 0;
        self.sum = 0.0;
        for f in self.filters.iter_mut() {
            f.reset();
        }
    }
}

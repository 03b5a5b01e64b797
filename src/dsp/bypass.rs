//! Click-free bypass.
//!
//! Crossfades linearly between the processed and the dry signal over
//! `BYPASS_TIME_MS`. The crossfade position is kept across calls, so toggling
//! mid-block or across blocks never produces a step larger than one increment.

const BYPASS_TIME_MS: f32 = 5.0;

#[derive(Debug, Clone)]
pub struct Bypass {
    /// 0.0 = fully processed, 1.0 = fully dry
    mix: f32,
    target: f32,
    step: f32,
}

impl Default for Bypass {
    fn default() -> Self {
        Self {
            mix: 0.0,
            target: 0.0,
            step: 1.0,
        }
    }
}

impl Bypass {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn init(&mut self, sample_rate: f32) {
        let len = (BYPASS_TIME_MS * sample_rate / 1000.0).max(1.0);
        self.step = 1.0 / len;
    }

    /// Per-sample change of the crossfade position.
    pub fn increment(&self) -> f32 {
        self.step
    }

    pub fn set_bypass(&mut self, bypass: bool) {
        self.target = if bypass { 1.0 } else { 0.0 };
    }

    pub fn bypassing(&self) -> bool {
        self.target >= 1.0 && self.mix >= 1.0
    }

    /// Jump to the current target without a transition.
    pub fn settle(&mut self) {
        self.mix = self.target;
    }

    pub fn process(&mut self, out: &mut [f32], dry: &[f32], wet: &[f32]) {
        for ((o, d), w) in out.iter_mut().zip(dry).zip(wet) {
            if self.mix < self.target {
                self.mix = (self.mix + self.step).min(self.target);
            } else if self.mix > self.target {
                self.mix = (self.mix - self.step).max(self.target);
            }
            *o = if self.mix <= 0.0 {
                *w
            } else if self.mix >= 1.0 {
                *d
            } else {
                *w + (*d - *w) * self.mix
            };
        }
    }
}

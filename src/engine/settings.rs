//! Snapshot of every user-facing control, applied to the engine as a whole.

use super::consts::*;
use super::sidechain::SidechainMode;
use crate::dsp::weighting::Weighting;

/// Gain change amount over a time period; converted to a speed in dB/s.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GainControl {
    /// Index into [`SPEED_AMOUNTS`], clamped on use.
    pub amount: i32,
    pub period_ms: f32,
}

impl GainControl {
    pub const fn new(amount: i32, period_ms: f32) -> Self {
        Self { amount, period_ms }
    }

    const fn from_default(dfl: (i32, f32)) -> Self {
        Self::new(dfl.0, dfl.1)
    }

    pub fn speed(&self) -> f32 {
        speed(self.amount, self.period_ms)
    }
}

/// dB quantum selected by `amount`. Out-of-range indices clamp to the table.
pub fn amount_db(amount: i32) -> f32 {
    let last = SPEED_AMOUNTS.len() as i32 - 1;
    SPEED_AMOUNTS[amount.clamp(0, last) as usize]
}

/// Speed in dB/s for applying the selected amount over `period_ms`.
pub fn speed(amount: i32, period_ms: f32) -> f32 {
    amount_db(amount) * 1000.0 / period_ms.max(GAIN_PERIOD_MIN)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Settings {
    pub bypass: bool,

    pub long_period_ms: f32,
    pub short_period_ms: f32,
    pub weighting: Weighting,

    pub level_db: f32,
    pub deviation_db: f32,
    pub silence_db: f32,

    pub preamp_db: f32,
    pub lookahead_ms: f32,
    pub sidechain_mode: SidechainMode,

    pub long_grow: GainControl,
    pub long_fall: GainControl,
    pub short_grow: GainControl,
    pub short_fall: GainControl,

    pub max_gain_db: f32,
    pub max_gain_enabled: bool,
    pub quick_amplifier: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bypass: false,
            long_period_ms: LONG_PERIOD_DFL,
            short_period_ms: SHORT_PERIOD_DFL,
            weighting: Weighting::K,
            level_db: LEVEL_DFL,
            deviation_db: DEVIATION_DFL,
            silence_db: SILENCE_DFL,
            preamp_db: PREAMP_DFL,
            lookahead_ms: LOOKAHEAD_DFL,
            sidechain_mode: SidechainMode::Internal,
            long_grow: GainControl::from_default(LONG_GROW_DFL),
            long_fall: GainControl::from_default(LONG_FALL_DFL),
            short_grow: GainControl::from_default(SHORT_GROW_DFL),
            short_fall: GainControl::from_default(SHORT_FALL_DFL),
            max_gain_db: MAX_GAIN_DFL,
            max_gain_enabled: true,
            quick_amplifier: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_speed_selector_clamps_to_table() {
        assert_eq!(amount_db(-5), SPEED_AMOUNTS[0]);
        assert_eq!(amount_db(100), SPEED_AMOUNTS[SPEED_AMOUNTS.len() - 1]);
        assert_eq!(speed(-1, 1000.0), speed(0, 1000.0));
        assert_eq!(speed(42, 500.0), 24.0 * 2.0);
    }

    #[test]
    fn test_speed_period_is_strictly_positive() {
        assert_eq!(speed(0, 0.0), 1.0 * 1000.0 / GAIN_PERIOD_MIN);
        assert!(speed(3, -10.0).is_finite());
    }

    #[test]
    fn test_default_speeds() {
        let s = Settings::default();
        assert_eq!(s.long_grow.speed(), 6.0);
        assert_eq!(s.short_fall.speed(), 240.0);
    }
}

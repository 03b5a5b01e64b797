//! Ranges, defaults and geometry shared by the parameters and the engine.

/// Largest chunk processed in one pass; every scratch buffer has this size.
pub const BUFFER_SIZE: usize = 1024;

/// Most channels per signal (main, sidechain, link) the engine handles.
pub const MAX_CHANNELS: usize = 8;

// Loudness measuring periods (ms)
pub const LONG_PERIOD_MIN: f32 = 100.0;
pub const LONG_PERIOD_MAX: f32 = 2000.0;
pub const LONG_PERIOD_DFL: f32 = 400.0;

pub const SHORT_PERIOD_MIN: f32 = 5.0;
pub const SHORT_PERIOD_MAX: f32 = 100.0;
pub const SHORT_PERIOD_DFL: f32 = 20.0;

// Target level (LUFS)
pub const LEVEL_MIN: f32 = -60.0;
pub const LEVEL_MAX: f32 = 0.0;
pub const LEVEL_DFL: f32 = -23.0;

/// Clamp range of a matched (sidechain-derived) target, linear.
pub const LEVEL_GAIN_MIN: f32 = 0.001; // -60 dB
pub const LEVEL_GAIN_MAX: f32 = 1.0; // 0 dB

// Deviation (dB)
pub const DEVIATION_MIN: f32 = 0.0;
pub const DEVIATION_MAX: f32 = 24.0;
pub const DEVIATION_DFL: f32 = 6.0;

// Silence threshold (LUFS)
pub const SILENCE_MIN: f32 = -120.0;
pub const SILENCE_MAX: f32 = -24.0;
pub const SILENCE_DFL: f32 = -76.0;

// Maximum gain (dB)
pub const MAX_GAIN_MIN: f32 = 0.0;
pub const MAX_GAIN_MAX: f32 = 84.0;
pub const MAX_GAIN_DFL: f32 = 48.0;

// Sidechain preamp (dB)
pub const PREAMP_MIN: f32 = -60.0;
pub const PREAMP_MAX: f32 = 40.0;
pub const PREAMP_DFL: f32 = 0.0;

// Lookahead (ms)
pub const LOOKAHEAD_MIN: f32 = 0.0;
pub const LOOKAHEAD_MAX: f32 = 20.0;
pub const LOOKAHEAD_DFL: f32 = 5.0;

/// Gain change quanta (dB) selectable for each speed control.
pub const SPEED_AMOUNTS: [f32; 9] = [1.0, 2.0, 3.0, 6.0, 9.0, 12.0, 15.0, 18.0, 24.0];

// Time in which the selected amount is applied (ms)
pub const GAIN_PERIOD_MIN: f32 = 1.0;
pub const GAIN_PERIOD_MAX: f32 = 10000.0;

// Defaults: (amount index, period ms)
pub const LONG_GROW_DFL: (i32, f32) = (3, 1000.0); // 6 dB/s
pub const LONG_FALL_DFL: (i32, f32) = (3, 1000.0); // 6 dB/s
pub const SHORT_GROW_DFL: (i32, f32) = (5, 100.0); // 120 dB/s
pub const SHORT_FALL_DFL: (i32, f32) = (5, 50.0); // 240 dB/s

// History graphs
pub const MESH_TIME: f32 = 2.0;
pub const MESH_POINTS: usize = 640;

mod debug;
pub mod dsp;
pub mod engine;
pub mod meters;
mod presets;

use crate::dsp::weighting::Weighting;
use crate::engine::consts::*;
use crate::engine::settings::{amount_db, GainControl, Settings};
use crate::engine::sidechain::SidechainMode;
use crate::engine::Autogain;
use crate::meters::Telemetry;
use crate::presets::{LevelPreset, PresetManager};
use assert_no_alloc::permit_alloc;
use log::{info, warn};
use nih_plug::prelude::*;
use std::sync::Arc;

// -----------------------------------------------------------------------------
// PARAMETERS
// -----------------------------------------------------------------------------

#[derive(Params)]
pub struct AutogainParams {
    #[id = "bypass"]
    pub bypass: BoolParam,

    // -------------------------------------------------------------------------
    // LOUDNESS MEASUREMENT
    // -------------------------------------------------------------------------
    #[id = "lperiod"]
    pub long_period: FloatParam,

    #[id = "speriod"]
    pub short_period: FloatParam,

    #[id = "weight"]
    pub weighting: EnumParam<Weighting>,

    // -------------------------------------------------------------------------
    // TARGET
    // -------------------------------------------------------------------------
    #[id = "preset"]
    pub level_preset: EnumParam<LevelPreset>,

    #[id = "level"]
    pub level: FloatParam,

    #[id = "dev"]
    pub deviation: FloatParam,

    #[id = "silence"]
    pub silence: FloatParam,

    #[id = "g_max"]
    pub max_gain: FloatParam,

    #[id = "g_max_on"]
    pub max_gain_enabled: BoolParam,

    #[id = "qamp"]
    pub quick_amplifier: BoolParam,

    // -------------------------------------------------------------------------
    // SIDECHAIN
    // -------------------------------------------------------------------------
    #[id = "sc_mode"]
    pub sidechain_mode: EnumParam<SidechainMode>,

    #[id = "sc_pamp"]
    pub sidechain_preamp: FloatParam,

    #[id = "lookahead"]
    pub lookahead: FloatParam,

    // -------------------------------------------------------------------------
    // GAIN CHANGE SPEEDS (amount per period)
    // -------------------------------------------------------------------------
    #[id = "lgrow_a"]
    pub long_grow_amount: IntParam,
    #[id = "lgrow_t"]
    pub long_grow_period: FloatParam,

    #[id = "lfall_a"]
    pub long_fall_amount: IntParam,
    #[id = "lfall_t"]
    pub long_fall_period: FloatParam,

    #[id = "sgrow_a"]
    pub short_grow_amount: IntParam,
    #[id = "sgrow_t"]
    pub short_grow_period: FloatParam,

    #[id = "sfall_a"]
    pub short_fall_amount: IntParam,
    #[id = "sfall_t"]
    pub short_fall_period: FloatParam,
}

// Helper to format gain in dB
fn format_db(v: f32) -> String {
    format!("{:.1} dB", v)
}

fn format_lufs(v: f32) -> String {
    format!("{:.1} LUFS", v)
}

fn format_ms(v: f32) -> String {
    if v >= 1000.0 {
        format!("{:.2} s", v / 1000.0)
    } else {
        format!("{:.1} ms", v)
    }
}

fn format_amount(v: i32) -> String {
    format!("{} dB", amount_db(v))
}

fn period_param(name: &str, default: f32, min: f32, max: f32) -> FloatParam {
    FloatParam::new(
        name,
        default,
        FloatRange::Skewed {
            min,
            max,
            factor: FloatRange::skew_factor(-2.0),
        },
    )
    .with_value_to_string(Arc::new(format_ms))
}

fn amount_param(name: &str, default: i32) -> IntParam {
    IntParam::new(
        name,
        default,
        IntRange::Linear {
            min: 0,
            max: SPEED_AMOUNTS.len() as i32 - 1,
        },
    )
    .with_value_to_string(Arc::new(format_amount))
}

impl Default for AutogainParams {
    fn default() -> Self {
        Self {
            bypass: BoolParam::new("Bypass", false).make_bypass(),

            long_period: period_param(
                "Long Period",
                LONG_PERIOD_DFL,
                LONG_PERIOD_MIN,
                LONG_PERIOD_MAX,
            ),
            short_period: period_param(
                "Short Period",
                SHORT_PERIOD_DFL,
                SHORT_PERIOD_MIN,
                SHORT_PERIOD_MAX,
            ),
            weighting: EnumParam::new("Weighting", Weighting::K),

            level_preset: EnumParam::new("Level Preset", LevelPreset::Custom),
            level: FloatParam::new(
                "Level",
                LEVEL_DFL,
                FloatRange::Linear {
                    min: LEVEL_MIN,
                    max: LEVEL_MAX,
                },
            )
            .with_step_size(0.05)
            .with_value_to_string(Arc::new(format_lufs)),
            deviation: FloatParam::new(
                "Deviation",
                DEVIATION_DFL,
                FloatRange::Linear {
                    min: DEVIATION_MIN,
                    max: DEVIATION_MAX,
                },
            )
            .with_step_size(0.01)
            .with_value_to_string(Arc::new(format_db)),
            silence: FloatParam::new(
                "Silence",
                SILENCE_DFL,
                FloatRange::Linear {
                    min: SILENCE_MIN,
                    max: SILENCE_MAX,
                },
            )
            .with_value_to_string(Arc::new(format_lufs)),
            max_gain: FloatParam::new(
                "Max Gain",
                MAX_GAIN_DFL,
                FloatRange::Linear {
                    min: MAX_GAIN_MIN,
                    max: MAX_GAIN_MAX,
                },
            )
            .with_value_to_string(Arc::new(format_db)),
            max_gain_enabled: BoolParam::new("Max Gain Limit", true),
            quick_amplifier: BoolParam::new("Quick Amplifier", false),

            sidechain_mode: EnumParam::new("Sidechain Mode", SidechainMode::Internal),
            sidechain_preamp: FloatParam::new(
                "Sidechain Preamp",
                PREAMP_DFL,
                FloatRange::Linear {
                    min: PREAMP_MIN,
                    max: PREAMP_MAX,
                },
            )
            .with_value_to_string(Arc::new(format_db)),
            lookahead: FloatParam::new(
                "Lookahead",
                LOOKAHEAD_DFL,
                FloatRange::Linear {
                    min: LOOKAHEAD_MIN,
                    max: LOOKAHEAD_MAX,
                },
            )
            .with_step_size(0.01)
            .with_value_to_string(Arc::new(format_ms)),

            long_grow_amount: amount_param("Long Grow Amount", LONG_GROW_DFL.0),
            long_grow_period: period_param(
                "Long Grow Period",
                LONG_GROW_DFL.1,
                GAIN_PERIOD_MIN,
                GAIN_PERIOD_MAX,
            ),
            long_fall_amount: amount_param("Long Fall Amount", LONG_FALL_DFL.0),
            long_fall_period: period_param(
                "Long Fall Period",
                LONG_FALL_DFL.1,
                GAIN_PERIOD_MIN,
                GAIN_PERIOD_MAX,
            ),
            short_grow_amount: amount_param("Short Grow Amount", SHORT_GROW_DFL.0),
            short_grow_period: period_param(
                "Short Grow Period",
                SHORT_GROW_DFL.1,
                GAIN_PERIOD_MIN,
                GAIN_PERIOD_MAX,
            ),
            short_fall_amount: amount_param("Short Fall Amount", SHORT_FALL_DFL.0),
            short_fall_period: period_param(
                "Short Fall Period",
                SHORT_FALL_DFL.1,
                GAIN_PERIOD_MIN,
                GAIN_PERIOD_MAX,
            ),
        }
    }
}

impl AutogainParams {
    /// Snapshot of the current parameter values. A non-Custom level preset
    /// overrides the level and deviation controls.
    pub fn settings(&self, presets: &PresetManager) -> Settings {
        let (level_db, deviation_db) = match presets.values(self.level_preset.value()) {
            Some(p) => (p.level, p.deviation),
            None => (self.level.value(), self.deviation.value()),
        };

        Settings {
            bypass: self.bypass.value(),
            long_period_ms: self.long_period.value(),
            short_period_ms: self.short_period.value(),
            weighting: self.weighting.value(),
            level_db,
            deviation_db,
            silence_db: self.silence.value(),
            preamp_db: self.sidechain_preamp.value(),
            lookahead_ms: self.lookahead.value(),
            sidechain_mode: self.sidechain_mode.value(),
            long_grow: GainControl::new(
                self.long_grow_amount.value(),
                self.long_grow_period.value(),
            ),
            long_fall: GainControl::new(
                self.long_fall_amount.value(),
                self.long_fall_period.value(),
            ),
            short_grow: GainControl::new(
                self.short_grow_amount.value(),
                self.short_grow_period.value(),
            ),
            short_fall: GainControl::new(
                self.short_fall_amount.value(),
                self.short_fall_period.value(),
            ),
            max_gain_db: self.max_gain.value(),
            max_gain_enabled: self.max_gain_enabled.value(),
            quick_amplifier: self.quick_amplifier.value(),
        }
    }
}

// -----------------------------------------------------------------------------
// PLUGIN STRUCT
// -----------------------------------------------------------------------------
pub struct AutogainPlugin {
    params: Arc<AutogainParams>,
    engine: Autogain,
    telemetry: Arc<Telemetry>,
    preset_manager: PresetManager,
    /// Settings last pushed into the engine
    applied: Option<Settings>,
    latency: u32,
}

impl Default for AutogainPlugin {
    fn default() -> Self {
        Self {
            params: Arc::new(AutogainParams::default()),
            engine: Autogain::new(2),
            telemetry: Arc::new(Telemetry::new()),
            preset_manager: PresetManager::new(),
            applied: None,
            latency: 0,
        }
    }
}

impl AutogainPlugin {
    /// Meters and graphs shared with the consumer side.
    pub fn telemetry(&self) -> Arc<Telemetry> {
        self.telemetry.clone()
    }

    fn apply_settings(&mut self, context: &mut impl ProcessContext<Self>) {
        let settings = self.params.settings(&self.preset_manager);
        if self.applied == Some(settings) {
            return;
        }
        self.engine.update_settings(&settings);
        self.applied = Some(settings);

        let latency = self.engine.latency() as u32;
        if latency != self.latency {
            self.latency = latency;
            context.set_latency_samples(latency);
        }
    }

    fn process_internal(
        &mut self,
        buffer: &mut Buffer,
        aux: &mut AuxiliaryBuffers,
        context: &mut impl ProcessContext<Self>,
    ) -> ProcessStatus {
        self.apply_settings(context);

        let sidechain = aux
            .inputs
            .first()
            .map(|sc| sc.as_slice_immutable())
            .filter(|sc| !sc.is_empty());
        self.engine.process(buffer.as_slice(), sidechain);

        ProcessStatus::Normal
    }
}

impl Plugin for AutogainPlugin {
    const NAME: &'static str = "VxAutogain";
    const VENDOR: &'static str = "Andrzej Marczewski";
    const URL: &'static str = "";
    const EMAIL: &'static str = "";
    const VERSION: &'static str = env!("CARGO_PKG_VERSION");

    const AUDIO_IO_LAYOUTS: &'static [AudioIOLayout] = &[
        AudioIOLayout {
            main_input_channels: NonZeroU32::new(2),
            main_output_channels: NonZeroU32::new(2),
            aux_input_ports: &[new_nonzero_u32(2)],
            names: PortNames {
                layout: Some("Stereo + Sidechain"),
                aux_inputs: &["Sidechain"],
                ..PortNames::const_default()
            },
            ..AudioIOLayout::const_default()
        },
        AudioIOLayout {
            main_input_channels: NonZeroU32::new(2),
            main_output_channels: NonZeroU32::new(2),
            ..AudioIOLayout::const_default()
        },
        AudioIOLayout {
            main_input_channels: NonZeroU32::new(1),
            main_output_channels: NonZeroU32::new(1),
            aux_input_ports: &[new_nonzero_u32(1)],
            names: PortNames {
                layout: Some("Mono + Sidechain"),
                aux_inputs: &["Sidechain"],
                ..PortNames::const_default()
            },
            ..AudioIOLayout::const_default()
        },
        AudioIOLayout {
            main_input_channels: NonZeroU32::new(1),
            main_output_channels: NonZeroU32::new(1),
            ..AudioIOLayout::const_default()
        },
    ];

    const MIDI_INPUT: MidiConfig = MidiConfig::None;
    const SAMPLE_ACCURATE_AUTOMATION: bool = false;

    type SysExMessage = ();
    type BackgroundTask = ();

    fn params(&self) -> Arc<dyn Params> {
        self.params.clone()
    }

    fn initialize(
        &mut self,
        audio_io_layout: &AudioIOLayout,
        buffer_config: &BufferConfig,
        context: &mut impl InitContext<Self>,
    ) -> bool {
        #[cfg(feature = "debug")]
        crate::debug::logger::install();

        std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let channels = audio_io_layout
                .main_output_channels
                .map(NonZeroU32::get)
                .unwrap_or(2) as usize;
            let settings = self.params.settings(&self.preset_manager);

            let result = permit_alloc(|| {
                let mut engine = Autogain::new(channels);
                engine.set_telemetry(self.telemetry.clone());
                engine.update_settings(&settings);
                engine
                    .update_sample_rate(buffer_config.sample_rate)
                    .map(|_| engine)
            });

            let ok = match result {
                Ok(engine) => {
                    self.engine = engine;
                    self.applied = Some(settings);
                    self.latency = self.engine.latency() as u32;
                    context.set_latency_samples(self.latency);
                    info!(
                        "autogain: {} ch @ {} Hz, latency {} samples",
                        channels, buffer_config.sample_rate, self.latency
                    );
                    true
                }
                Err(e) => {
                    warn!("autogain: initialization failed: {e:#}");
                    false
                }
            };

            #[cfg(feature = "debug")]
            crate::debug::logger::flush();

            ok
        }))
        .unwrap_or(false)
    }

    fn process(
        &mut self,
        buffer: &mut Buffer,
        aux: &mut AuxiliaryBuffers,
        context: &mut impl ProcessContext<Self>,
    ) -> ProcessStatus {
        std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            self.process_internal(buffer, aux, context)
        }))
        .unwrap_or(ProcessStatus::Normal)
    }

    fn reset(&mut self) {
        std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            self.engine.reset();
            self.telemetry.reset();
        }))
        .unwrap_or(());
    }

    fn deactivate(&mut self) {
        #[cfg(feature = "debug")]
        crate::debug::logger::flush();
    }
}

impl ClapPlugin for AutogainPlugin {
    const CLAP_ID: &'static str = "com.andrzej.vxautogain";
    const CLAP_DESCRIPTION: Option<&'static str> =
        Some("Keeps loudness at a target level with a smooth, look-ahead gain");
    const CLAP_MANUAL_URL: Option<&'static str> = None;
    const CLAP_SUPPORT_URL: Option<&'static str> = None;
    const CLAP_FEATURES: &'static [ClapFeature] = &[
        ClapFeature::AudioEffect,
        ClapFeature::Utility,
        ClapFeature::Stereo,
        ClapFeature::Mono,
    ];
}

impl Vst3Plugin for AutogainPlugin {
    const VST3_CLASS_ID: [u8; 16] = *b"VxAutogain_Lvl01";
    const VST3_SUBCATEGORIES: &'static [Vst3SubCategory] = &[
        Vst3SubCategory::Fx,
        Vst3SubCategory::Dynamics,
        Vst3SubCategory::Tools,
    ];
}

nih_export_clap!(AutogainPlugin);
nih_export_vst3!(AutogainPlugin);

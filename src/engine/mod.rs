//! Autogain Engine
//!
//! Block-wise orchestration of the gain control loop:
//!
//! ```text
//! route sidechain -> measure (input, sidechain) -> gain correction
//!     -> lookahead delay x gain -> bypass crossfade -> measure output
//!     -> meters / graphs
//! ```
//!
//! Host blocks are split into chunks of at most [`BUFFER_SIZE`] samples. All
//! scratch memory is allocated in [`Autogain::update_sample_rate`]; nothing
//! on the `process` path allocates. If allocation failed the engine passes
//! audio through untouched and reports zero meters.

pub mod consts;
pub mod correction;
pub mod measure;
pub mod metrics;
pub mod settings;
pub mod sidechain;

use crate::ag_log;
use crate::dsp::auto_gain::{AutoGain, GainSmoother};
use crate::dsp::bypass::Bypass;
use crate::dsp::delay::Delay;
use crate::dsp::feed::ExternalFeed;
use crate::dsp::loudness::{LoudnessMeter, SlidingLoudnessMeter};
use crate::dsp::utils::{alloc_buffer, db_to_gain, millis_to_samples, ramp_mul};
use crate::meters::{MeterId, Telemetry};
use anyhow::{Context, Result};
use std::sync::Arc;

use consts::{BUFFER_SIZE, LOOKAHEAD_MAX, LOOKAHEAD_MIN, MAX_CHANNELS};
use correction::GainCorrection;
use measure::HorizonPair;
use metrics::{FrameMetrics, GraphRecorder};
use settings::Settings;
use sidechain::{Order, Primary, Source, SidechainMode, TargetSource};

/// Per-channel state: lookahead, crossfade and chunk scratch.
pub struct Channel {
    delay: Delay,
    bypass: Bypass,
    /// Copy of the unprocessed input chunk
    dry: Vec<f32>,
    /// Preamped control signal
    sidechain: Vec<f32>,
    /// Delayed and gained signal
    buffer: Vec<f32>,
}

impl Channel {
    fn new() -> Self {
        Self {
            delay: Delay::new(),
            bypass: Bypass::new(),
            dry: Vec::new(),
            sidechain: Vec::new(),
            buffer: Vec::new(),
        }
    }

    fn init(&mut self, sample_rate: f32) -> Result<()> {
        self.dry = alloc_buffer(BUFFER_SIZE)?;
        self.sidechain = alloc_buffer(BUFFER_SIZE)?;
        self.buffer = alloc_buffer(BUFFER_SIZE)?;
        self.delay
            .init(millis_to_samples(sample_rate, LOOKAHEAD_MAX))
            .context("lookahead delay")?;
        self.bypass.init(sample_rate);
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Signal {
    Dry,
    Sidechain,
}

/// Channel slices of one signal, without allocating.
fn gather<'a>(channels: &'a [Channel], signal: Signal, n: usize) -> ([&'a [f32]; MAX_CHANNELS], usize) {
    let mut out: [&[f32]; MAX_CHANNELS] = [&[]; MAX_CHANNELS];
    let count = channels.len().min(MAX_CHANNELS);
    for (o, c) in out.iter_mut().zip(channels) {
        *o = match signal {
            Signal::Dry => &c.dry[..n],
            Signal::Sidechain => &c.sidechain[..n],
        };
    }
    (out, count)
}

pub struct Autogain<M = SlidingLoudnessMeter, S = AutoGain>
where
    M: LoudnessMeter + Default,
    S: GainSmoother + Default,
{
    channels: Vec<Channel>,
    sample_rate: f32,
    ready: bool,

    input: HorizonPair<M>,
    output: HorizonPair<M>,
    sidechain: HorizonPair<M>,
    correction: GainCorrection<S>,

    settings: Settings,
    /// Mode used by the last `process` call
    active_mode: SidechainMode,
    preamp: f32,
    preamp_prev: f32,
    lookahead: usize,

    graphs: GraphRecorder,
    metrics: FrameMetrics,
    telemetry: Option<Arc<Telemetry>>,
    link: Option<Box<dyn ExternalFeed>>,
}

impl<M, S> Autogain<M, S>
where
    M: LoudnessMeter + Default,
    S: GainSmoother + Default,
{
    pub fn new(channels: usize) -> Self {
        let channels = channels.clamp(1, MAX_CHANNELS);
        Self {
            channels: (0..channels).map(|_| Channel::new()).collect(),
            sample_rate: 0.0,
            ready: false,
            input: HorizonPair::default(),
            output: HorizonPair::default(),
            sidechain: HorizonPair::default(),
            correction: GainCorrection::default(),
            settings: Settings::default(),
            active_mode: SidechainMode::Internal,
            preamp: 1.0,
            preamp_prev: 1.0,
            lookahead: 0,
            graphs: GraphRecorder::default(),
            metrics: FrameMetrics::default(),
            telemetry: None,
            link: None,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    /// (Re)allocate everything that depends on the sample rate. On error the
    /// engine stays in pass-through until the next successful call.
    pub fn update_sample_rate(&mut self, sample_rate: f32) -> Result<()> {
        self.ready = false;
        self.sample_rate = sample_rate;
        let count = self.channels.len();

        for (i, c) in self.channels.iter_mut().enumerate() {
            c.init(sample_rate)
                .with_context(|| format!("channel {i}"))?;
        }
        self.input.init(count, sample_rate).context("input meters")?;
        self.output.init(count, sample_rate).context("output meters")?;
        self.sidechain
            .init(count, sample_rate)
            .context("sidechain meters")?;
        self.correction.init(sample_rate)?;
        self.graphs.init(sample_rate)?;

        self.ready = true;
        let settings = self.settings;
        self.apply(&settings);
        self.settle();
        Ok(())
    }

    /// Push a settings snapshot into every stage. Never resets audio state.
    pub fn update_settings(&mut self, settings: &Settings) {
        self.settings = *settings;
        self.apply(settings);
        ag_log!(
            "settings: level {:.1} LUFS, mode {:?}, lookahead {} samples",
            settings.level_db,
            settings.sidechain_mode,
            self.lookahead
        );
    }

    fn apply(&mut self, s: &Settings) {
        let count = self.channels.len();
        for pair in [&mut self.input, &mut self.output, &mut self.sidechain] {
            pair.configure(s.long_period_ms, s.short_period_ms, s.weighting);
            pair.designate(count);
        }

        let smoother = &mut self.correction.smoother;
        smoother.set_deviation(s.deviation_db);
        smoother.set_long_speed(s.long_grow.speed(), s.long_fall.speed());
        smoother.set_short_speed(s.short_grow.speed(), s.short_fall.speed());
        smoother.set_silence_threshold(db_to_gain(s.silence_db));
        smoother.set_max_gain(db_to_gain(s.max_gain_db), s.max_gain_enabled);
        smoother.enable_quick_amplifier(s.quick_amplifier);
        self.correction.level.set_level(db_to_gain(s.level_db));

        self.preamp = db_to_gain(s.preamp_db);

        let lookahead_ms = s.lookahead_ms.clamp(LOOKAHEAD_MIN, LOOKAHEAD_MAX);
        self.lookahead = millis_to_samples(self.sample_rate, lookahead_ms);
        for c in self.channels.iter_mut() {
            c.delay.set_delay(self.lookahead);
            c.bypass.set_bypass(s.bypass);
        }
    }

    /// Latency introduced by the lookahead, in samples.
    pub fn latency(&self) -> usize {
        self.lookahead
    }

    pub fn active_mode(&self) -> SidechainMode {
        self.active_mode
    }

    pub fn set_telemetry(&mut self, telemetry: Arc<Telemetry>) {
        self.telemetry = Some(telemetry);
    }

    /// Attach (or detach) the feed used by the Link modes.
    pub fn set_link(&mut self, link: Option<Box<dyn ExternalFeed>>) {
        self.link = link;
    }

    /// Clear all audio state (delay contents, meter history, gain).
    pub fn reset(&mut self) {
        for c in self.channels.iter_mut() {
            c.delay.clear();
        }
        self.input.reset();
        self.output.reset();
        self.sidechain.reset();
        self.correction.reset();
        self.graphs.clear();
        self.metrics.reset();
        self.settle();
    }

    /// Skip pending transitions (bypass, preamp and level ramps).
    fn settle(&mut self) {
        for c in self.channels.iter_mut() {
            c.bypass.settle();
        }
        self.preamp_prev = self.preamp;
        self.correction.level.settle();
    }

    /// Process one host block in place.
    ///
    /// `main` holds one slice per channel; `sidechain` the physical sidechain
    /// if the host bound one for this block.
    pub fn process<Mt, St>(&mut self, main: &mut [Mt], sidechain: Option<&[St]>) -> &FrameMetrics
    where
        Mt: AsRef<[f32]> + AsMut<[f32]>,
        St: AsRef<[f32]>,
    {
        self.metrics.reset();
        if !self.ready {
            if let Some(t) = self.telemetry.as_ref() {
                t.reset();
            }
            return &self.metrics;
        }

        let samples = main.iter().map(|c| c.as_ref().len()).min().unwrap_or(0);
        let count = self.channels.len().min(main.len());
        let sidechain = sidechain.filter(|sc| !sc.is_empty());
        let link_bound = self.link.as_ref().is_some_and(|l| l.is_connected());

        let mode = self
            .settings
            .sidechain_mode
            .resolve(sidechain.is_some(), link_bound);
        if mode != self.active_mode {
            if mode != self.settings.sidechain_mode {
                ag_log!(
                    "sidechain: {:?} unavailable, falling back to {:?}",
                    self.settings.sidechain_mode,
                    mode
                );
            }
            self.active_mode = mode;
        }
        let routing = mode.routing();

        let mut offset = 0;
        while offset < samples {
            let n = (samples - offset).min(BUFFER_SIZE);
            let range = offset..offset + n;

            for (c, ch) in self.channels.iter_mut().zip(main.iter()).take(count) {
                c.dry[..n].copy_from_slice(&ch.as_ref()[range.clone()]);
            }

            // Control signal, ramped through the preamp
            let (from, to) = (self.preamp_prev, self.preamp);
            match routing.source {
                Source::Main => {
                    for c in self.channels.iter_mut().take(count) {
                        ramp_mul(&mut c.sidechain[..n], &c.dry[..n], from, to);
                    }
                }
                Source::Sidechain => {
                    let sc = sidechain.unwrap_or(&[]);
                    for (i, c) in self.channels.iter_mut().take(count).enumerate() {
                        let src = sc
                            .get(i.min(sc.len().saturating_sub(1)))
                            .and_then(|s| s.as_ref().get(range.clone()));
                        match src {
                            Some(src) => ramp_mul(&mut c.sidechain[..n], src, from, to),
                            None => c.sidechain[..n].fill(0.0),
                        }
                    }
                }
                Source::Link => {
                    for (i, c) in self.channels.iter_mut().take(count).enumerate() {
                        match self.link.as_mut() {
                            Some(link) => link.read(i, &mut c.buffer[..n]),
                            None => c.buffer[..n].fill(0.0),
                        }
                        ramp_mul(&mut c.sidechain[..n], &c.buffer[..n], from, to);
                    }
                }
            }
            self.preamp_prev = self.preamp;

            let primary = match routing.primary {
                Primary::SidechainBuffer => Signal::Sidechain,
                Primary::RawInput => Signal::Dry,
            };
            let (inputs, k) = gather(&self.channels[..count], primary, n);
            let (controls, kc) = gather(&self.channels[..count], Signal::Sidechain, n);
            match routing.order {
                Order::SidechainFirst => {
                    self.sidechain.measure(&controls[..kc], n);
                    self.input.measure(&inputs[..k], n);
                }
                Order::InputFirst => {
                    self.input.measure(&inputs[..k], n);
                    self.sidechain.measure(&controls[..kc], n);
                }
            }

            let matched = match routing.target {
                TargetSource::SidechainLong => Some(self.sidechain.long(n)),
                TargetSource::Configured => None,
            };
            let gain = self
                .correction
                .process(self.input.long(n), self.input.short(n), matched, n);

            for (c, ch) in self.channels.iter_mut().zip(main.iter_mut()).take(count) {
                c.delay.process(&mut c.buffer[..n], &c.dry[..n]);
                for (b, g) in c.buffer[..n].iter_mut().zip(gain) {
                    *b *= *g;
                }
                let out = &mut ch.as_mut()[range.clone()];
                c.bypass.process(out, &c.dry[..n], &c.buffer[..n]);
            }

            self.metrics.raise(MeterId::Gain, gain);
            self.graphs.record(MeterId::Gain, gain);

            // Output loudness is measured on what actually leaves the plugin
            let mut outputs: [&[f32]; MAX_CHANNELS] = [&[]; MAX_CHANNELS];
            for (o, ch) in outputs.iter_mut().zip(main.iter()).take(count) {
                *o = &ch.as_ref()[range.clone()];
            }
            self.output.measure(&outputs[..count], n);

            for (id, curve) in [
                (MeterId::InputLong, self.input.long(n)),
                (MeterId::InputShort, self.input.short(n)),
                (MeterId::OutputLong, self.output.long(n)),
                (MeterId::OutputShort, self.output.short(n)),
                (MeterId::SidechainLong, self.sidechain.long(n)),
                (MeterId::SidechainShort, self.sidechain.short(n)),
            ] {
                self.metrics.raise(id, curve);
                self.graphs.record(id, curve);
            }

            offset += n;
        }

        if let Some(t) = self.telemetry.as_ref() {
            self.metrics.publish(t);
            self.graphs.publish(t);
        }
        &self.metrics
    }
}

#[cfg(test)]
mod tests {
    use super::consts::{LEVEL_GAIN_MAX, LEVEL_GAIN_MIN, MESH_POINTS};
    use super::*;
    use crate::dsp::auto_gain::Target;
    use crate::dsp::feed::feed_channel;
    use crate::dsp::weighting::Weighting;
    use crate::dsp::loudness::ChannelRole;
    use std::sync::atomic::{AtomicUsize, Ordering};

    static SEQ: AtomicUsize = AtomicUsize::new(0);

    /// Reports |x| of the first channel as loudness.
    #[derive(Debug, Default)]
    struct EchoMeter {
        seq: usize,
    }

    impl LoudnessMeter for EchoMeter {
        fn init(&mut self, _channels: usize, _max_period_ms: f32) -> Result<()> {
            Ok(())
        }
        fn set_sample_rate(&mut self, _sample_rate: f32) -> Result<()> {
            Ok(())
        }
        fn set_period(&mut self, _period_ms: f32) {}
        fn set_weighting(&mut self, _weighting: Weighting) {}
        fn set_designation(&mut self, _channel: usize, _role: ChannelRole) {}
        fn process(&mut self, inputs: &[&[f32]], out: &mut [f32], _shift_gain: f32) {
            for (i, o) in out.iter_mut().enumerate() {
                *o = inputs.first().and_then(|c| c.get(i)).map_or(0.0, |v| v.abs());
            }
            self.seq = SEQ.fetch_add(1, Ordering::SeqCst) + 1;
        }
        fn reset(&mut self) {}
    }

    /// Gain equals the delivered target.
    #[derive(Debug, Default)]
    struct TargetSmoother;

    impl GainSmoother for TargetSmoother {
        fn set_sample_rate(&mut self, _sample_rate: f32) {}
        fn set_deviation(&mut self, _db: f32) {}
        fn set_long_speed(&mut self, _grow: f32, _fall: f32) {}
        fn set_short_speed(&mut self, _grow: f32, _fall: f32) {}
        fn set_silence_threshold(&mut self, _gain: f32) {}
        fn set_max_gain(&mut self, _value: f32, _enabled: bool) {}
        fn enable_quick_amplifier(&mut self, _enabled: bool) {}
        fn process(&mut self, out: &mut [f32], _long: &[f32], _short: &[f32], target: Target) {
            for (i, o) in out.iter_mut().enumerate() {
                *o = target.at(i);
            }
        }
        fn reset(&mut self) {}
    }

    type Fake = Autogain<EchoMeter, TargetSmoother>;

    fn settings() -> Settings {
        Settings {
            lookahead_ms: 0.0,
            ..Settings::default()
        }
    }

    fn fake(channels: usize, s: &Settings) -> Fake {
        let mut e = Fake::new(channels);
        e.update_settings(s);
        e.update_sample_rate(48000.0).unwrap();
        assert!(e.is_ready());
        e
    }

    fn block(channels: usize, len: usize, value: f32) -> Vec<Vec<f32>> {
        vec![vec![value; len]; channels]
    }

    fn run<M, S>(e: &mut Autogain<M, S>, main: &mut [Vec<f32>]) -> FrameMetrics
    where
        M: LoudnessMeter + Default,
        S: GainSmoother + Default,
    {
        *e.process(main, None::<&[Vec<f32>]>)
    }

    #[test]
    fn test_latency_follows_lookahead() {
        let mut s = settings();
        s.lookahead_ms = 10.0;
        let mut e = fake(2, &s);
        assert_eq!(e.latency(), 480);
        for _ in 0..3 {
            e.update_settings(&s);
            assert_eq!(e.latency(), 480);
        }
    }

    #[test]
    fn test_level_ramp_is_continuous_across_chunks() {
        let mut s = settings();
        s.level_db = -23.0;
        let mut e = fake(2, &s);

        let mut main = block(2, 2048, 1.0);
        run(&mut e, &mut main);
        assert!(main[0].iter().all(|v| *v == db_to_gain(-23.0)));

        s.level_db = -18.0;
        e.update_settings(&s);
        let mut main = block(2, 2048, 1.0);
        run(&mut e, &mut main);

        let out = &main[0];
        let target = db_to_gain(-18.0);
        // first chunk ends on the new level, second chunk starts there
        assert_eq!(out[1023], target);
        assert_eq!(out[1024], target);

        let step = (target - db_to_gain(-23.0)) / 1024.0;
        assert!((out[0] - db_to_gain(-23.0) - step).abs() < 1e-6);
        for w in out.windows(2) {
            assert!((w[1] - w[0]).abs() <= step + 1e-6);
        }
    }

    #[test]
    fn test_match_target_is_clamped() {
        let mut s = settings();
        s.sidechain_mode = SidechainMode::Match;
        let mut e = fake(2, &s);

        let mut main = block(2, 512, 0.5);
        let loud = block(2, 512, db_to_gain(30.0));
        let m = *e.process(&mut main, Some(&loud[..]));
        assert_eq!(e.active_mode(), SidechainMode::Match);
        assert_eq!(m.get(MeterId::Gain), LEVEL_GAIN_MAX);
        assert!(main[1].iter().all(|v| *v == 0.5));

        let quiet = block(2, 512, db_to_gain(-90.0));
        let mut main = block(2, 512, 0.5);
        let m = *e.process(&mut main, Some(&quiet[..]));
        assert_eq!(m.get(MeterId::Gain), LEVEL_GAIN_MIN);
    }

    #[test]
    fn test_match_measures_sidechain_first() {
        let mut s = settings();
        s.sidechain_mode = SidechainMode::Match;
        let mut e = fake(1, &s);
        let sc = block(1, 64, 0.1);

        let mut main = block(1, 64, 0.2);
        e.process(&mut main, Some(&sc[..]));
        assert!(e.sidechain.long.seq < e.input.long.seq);

        s.sidechain_mode = SidechainMode::Control;
        e.update_settings(&s);
        let mut main = block(1, 64, 0.2);
        e.process(&mut main, Some(&sc[..]));
        assert!(e.input.long.seq < e.sidechain.long.seq);
    }

    #[test]
    fn test_control_meters_raw_input() {
        let mut s = settings();
        s.sidechain_mode = SidechainMode::Control;
        s.preamp_db = 20.0;
        let mut e = fake(1, &s);

        let sc = block(1, 256, 0.01);
        let mut main = block(1, 256, 0.25);
        let m = *e.process(&mut main, Some(&sc[..]));
        assert_eq!(m.get(MeterId::InputLong), 0.25);
        assert!((m.get(MeterId::SidechainLong) - 0.1).abs() < 1e-6);
    }

    #[test]
    fn test_preamp_change_ramps_over_one_chunk() {
        let mut s = settings();
        let mut e = fake(1, &s);
        let mut main = block(1, 1024, 0.5);
        run(&mut e, &mut main);

        s.preamp_db = 6.0;
        e.update_settings(&s);
        let (from, to) = (1.0, db_to_gain(6.0));

        let mut main = block(1, 1024, 0.5);
        run(&mut e, &mut main);
        let control = e.sidechain.long(1024);
        let step = (to - from) / 1024.0;
        assert!((control[0] - 0.5 * (from + step)).abs() < 1e-6);
        for w in control.windows(2) {
            assert!((w[1] - w[0] - 0.5 * step).abs() < 1e-5);
        }
        assert_eq!(control[1023], 0.5 * to);

        let mut main = block(1, 1024, 0.5);
        run(&mut e, &mut main);
        assert!(e.sidechain.long(1024).iter().all(|v| *v == 0.5 * to));
    }

    #[test]
    fn test_link_control_meters_feed_and_keeps_level() {
        let mut s = settings();
        s.sidechain_mode = SidechainMode::LinkControl;
        s.preamp_db = 20.0;
        let mut e = fake(1, &s);

        let (mut tx, rx) = feed_channel(1, 4096).unwrap();
        e.set_link(Some(Box::new(rx)));
        tx.write(0, &[0.01; 256]);

        let mut main = block(1, 256, 0.25);
        let m = run(&mut e, &mut main);
        assert_eq!(e.active_mode(), SidechainMode::LinkControl);
        assert_eq!(m.get(MeterId::InputLong), 0.25);
        assert_eq!(m.get(MeterId::InputShort), 0.25);
        assert!((m.get(MeterId::SidechainLong) - 0.1).abs() < 1e-6);
        assert!((m.get(MeterId::SidechainShort) - 0.1).abs() < 1e-6);

        let level = db_to_gain(s.level_db);
        assert_eq!(m.get(MeterId::Gain), level);
        assert!(main[0].iter().all(|v| *v == 0.25 * level));
    }

    #[test]
    fn test_missing_sidechain_is_bit_identical_to_internal() {
        let input: Vec<Vec<f32>> = (0..2)
            .map(|c| {
                (0..24000)
                    .map(|i| 0.3 * ((i as f32 * 0.031) + c as f32).sin())
                    .collect()
            })
            .collect();

        let render = |mode: SidechainMode| {
            let mut e: Autogain = Autogain::new(2);
            e.update_settings(&Settings {
                sidechain_mode: mode,
                ..Settings::default()
            });
            e.update_sample_rate(48000.0).unwrap();

            let mut out = input.clone();
            for start in (0..24000).step_by(3000) {
                let mut chunk: Vec<Vec<f32>> =
                    out.iter().map(|c| c[start..start + 3000].to_vec()).collect();
                run(&mut e, &mut chunk);
                for (o, c) in out.iter_mut().zip(&chunk) {
                    o[start..start + 3000].copy_from_slice(c);
                }
            }
            out
        };

        let internal = render(SidechainMode::Internal);
        for mode in [
            SidechainMode::Control,
            SidechainMode::Match,
            SidechainMode::LinkControl,
            SidechainMode::LinkMatch,
        ] {
            assert_eq!(render(mode), internal, "{mode:?}");
        }
    }

    #[test]
    fn test_graph_sizes_for_any_block_size() {
        let telemetry = Arc::new(Telemetry::new());
        let mut e = fake(2, &settings());
        e.set_telemetry(telemetry.clone());

        let (mut x, mut y) = (Vec::new(), Vec::new());
        for len in [1usize, 37, 1024, 1500, 4096] {
            let mut main = block(2, len, 0.1);
            run(&mut e, &mut main);

            for id in MeterId::ALL {
                assert!(telemetry.graph(id).take(&mut x, &mut y));
                let expected = if id.is_closed() { MESH_POINTS + 2 } else { MESH_POINTS };
                assert_eq!(x.len(), expected, "{:?} after {len}", id);
                assert_eq!(y.len(), expected);
            }
        }
    }

    #[test]
    fn test_meters_reset_every_call() {
        let mut e = fake(1, &settings());

        let mut main = vec![[vec![0.8f32; 1024], vec![0.1f32; 1024]].concat()];
        let m = run(&mut e, &mut main);
        // peak-hold across the two chunks
        assert_eq!(m.get(MeterId::InputLong), 0.8);

        let mut main = block(1, 1024, 0.0);
        let m = run(&mut e, &mut main);
        assert_eq!(m.get(MeterId::InputLong), 0.0);
        assert_eq!(m.get(MeterId::OutputShort), 0.0);
    }

    #[test]
    fn test_bypass_moves_to_dry_without_steps() {
        let mut s = settings();
        s.level_db = -6.0;
        let mut e = fake(1, &s);
        let g = db_to_gain(-6.0);

        let mut first = block(1, 480, 1.0);
        run(&mut e, &mut first);
        assert_eq!(first[0][479], g);

        s.bypass = true;
        e.update_settings(&s);
        let mut second = block(1, 960, 1.0);
        run(&mut e, &mut second);

        let mut out = vec![first[0][479]];
        out.extend_from_slice(&second[0]);
        let bound = (1.0 - g) / 240.0 + 1e-6;
        for w in out.windows(2) {
            assert!((w[1] - w[0]).abs() <= bound);
        }
        assert!((out[out.len() - 1] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_link_modes_follow_feed() {
        let mut s = settings();
        s.sidechain_mode = SidechainMode::LinkMatch;
        let mut e = fake(1, &s);

        let (mut tx, rx) = feed_channel(1, 4096).unwrap();
        e.set_link(Some(Box::new(rx)));
        tx.write(0, &[db_to_gain(10.0); 256]);

        let mut main = block(1, 256, 0.5);
        let m = run(&mut e, &mut main);
        assert_eq!(e.active_mode(), SidechainMode::LinkMatch);
        assert_eq!(m.get(MeterId::Gain), LEVEL_GAIN_MAX);

        drop(tx);
        let mut main = block(1, 256, 0.5);
        run(&mut e, &mut main);
        assert_eq!(e.active_mode(), SidechainMode::Internal);
    }

    #[test]
    fn test_not_ready_passes_through() {
        let mut e = Fake::new(2);
        assert!(!e.is_ready());
        let mut main = block(2, 128, 0.7);
        let m = run(&mut e, &mut main);
        assert!(main.iter().flatten().all(|v| *v == 0.7));
        assert_eq!(m, FrameMetrics::default());
    }

    #[test]
    fn test_reset_clears_lookahead() {
        let mut s = settings();
        s.lookahead_ms = 1.0;
        let mut e = fake(1, &s);

        let mut main = block(1, 100, 1.0);
        run(&mut e, &mut main);
        e.reset();

        let mut main = block(1, 48, 1.0);
        run(&mut e, &mut main);
        assert!(main[0].iter().all(|v| *v == 0.0));
    }
}

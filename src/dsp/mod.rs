pub mod auto_gain;
pub mod biquad;
pub mod bypass;
pub mod delay;
pub mod feed;
pub mod loudness;
pub mod meter_graph;
pub mod utils;
pub mod weighting;

pub use auto_gain::{AutoGain, GainSmoother, Target};
pub use biquad::Biquad;
pub use bypass::Bypass;
pub use delay::Delay;
pub use feed::{feed_channel, ExternalFeed, FeedReceiver, FeedSender};
pub use loudness::{ChannelRole, LoudnessMeter, SlidingLoudnessMeter, LUFS_SHIFT_GAIN};
pub use meter_graph::MeterGraph;
pub use weighting::{Weighting, WeightingFilter};

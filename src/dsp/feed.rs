//! External link feed.
//!
//! Link modes take their control signal from another signal path in the same
//! process instead of a physical sidechain. The producer side writes blocks
//! per channel, the engine pulls the same amount on the audio thread. Missing
//! samples (underrun) read as silence. Dropping the sender disconnects the
//! link.

use crate::dsp::utils::check_alloc;
use anyhow::{Context, Result};
use ringbuf::{Consumer, Producer, RingBuffer};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Source of a linked control signal.
pub trait ExternalFeed: Send {
    fn is_connected(&self) -> bool;

    /// Fill `dst` with the next samples of `channel`.
    fn read(&mut self, channel: usize, dst: &mut [f32]);
}

pub struct FeedSender {
    producers: Vec<Producer<f32>>,
    connected: Arc<AtomicBool>,
}

pub struct FeedReceiver {
    consumers: Vec<Consumer<f32>>,
    connected: Arc<AtomicBool>,
}

/// Create a connected sender/receiver pair holding up to `capacity` samples
/// per channel. Not real-time safe.
pub fn feed_channel(channels: usize, capacity: usize) -> Result<(FeedSender, FeedReceiver)> {
    let capacity = capacity.max(1);
    let connected = Arc::new(AtomicBool::new(true));

    let mut producers = Vec::new();
    let mut consumers = Vec::new();
    producers
        .try_reserve_exact(channels)
        .context("link feed: producers")?;
    consumers
        .try_reserve_exact(channels)
        .context("link feed: consumers")?;

    for c in 0..channels {
        check_alloc(capacity).with_context(|| format!("link feed: channel {c}"))?;
        let (prod, cons) = RingBuffer::<f32>::new(capacity).split();
        producers.push(prod);
        consumers.push(cons);
    }

    Ok((
        FeedSender {
            producers,
            connected: connected.clone(),
        },
        FeedReceiver {
            consumers,
            connected,
        },
    ))
}

impl FeedSender {
    /// Push a block for `channel`. Returns the number of samples accepted;
    /// the rest is dropped when the receiver lags behind.
    pub fn write(&mut self, channel: usize, src: &[f32]) -> usize {
        let Some(prod) = self.producers.get_mut(channel) else {
            return 0;
        };
        let mut written = 0;
        for x in src {
            if prod.push(*x).is_err() {
                break;
            }
            written += 1;
        }
        written
    }
}

impl Drop for FeedSender {
    fn drop(&mut self) {
        self.connected.store(false, Ordering::Release);
    }
}

impl ExternalFeed for FeedReceiver {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    fn read(&mut self, channel: usize, dst: &mut [f32]) {
        let Some(cons) = self.consumers.get_mut(channel) else {
            dst.fill(0.0);
            return;
        };
        for d in dst.iter_mut() {
            *d = cons.pop().unwrap_or(0.0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reads_what_was_written() {
        let (mut tx, mut rx) = feed_channel(2, 8).unwrap();
        assert_eq!(tx.write(0, &[1.0, 2.0]), 2);
        assert_eq!(tx.write(1, &[3.0]), 1);

        let mut left = [0.0f32; 2];
        let mut right = [9.0f32; 2];
        rx.read(0, &mut left);
        rx.read(1, &mut right);
        assert_eq!(left, [1.0, 2.0]);
        // underrun reads silence
        assert_eq!(right, [3.0, 0.0]);
    }

    #[test]
    fn test_drop_disconnects() {
        let (tx, rx) = feed_channel(1, 4).unwrap();
        assert!(rx.is_connected());
        drop(tx);
        assert!(!rx.is_connected());
    }

    #[test]
    fn test_overflow_is_dropped() {
        let (mut tx, _rx) = feed_channel(1, 2).unwrap();
        assert_eq!(tx.write(0, &[1.0, 2.0, 3.0]), 2);
        assert_eq!(tx.write(5, &[1.0]), 0);
    }

    #[test]
    fn test_oversized_feed_fails_without_aborting() {
        assert!(feed_channel(1, usize::MAX / 2).is_err());
    }
}

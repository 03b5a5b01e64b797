//! Lookahead delay line.
//!
//! A single-producer/single-consumer ring holding exactly `delay` samples in
//! flight. Each processed sample is pushed then one is popped, so the
//! occupancy (and therefore the delay) stays constant between `set_delay`
//! calls. Growing the delay inserts silence, shrinking it drops the oldest
//! samples.

use crate::dsp::utils::check_alloc;
use anyhow::{bail, Context, Result};
use ringbuf::{Consumer, Producer, RingBuffer};

pub struct Delay {
    producer: Option<Producer<f32>>,
    consumer: Option<Consumer<f32>>,
    max_delay: usize,
    delay: usize,
}

impl Default for Delay {
    fn default() -> Self {
        Self::new()
    }
}

impl Delay {
    pub fn new() -> Self {
        Self {
            producer: None,
            consumer: None,
            max_delay: 0,
            delay: 0,
        }
    }

    /// Allocate room for up to `max_samples` of delay. Not real-time safe.
    pub fn init(&mut self, max_samples: usize) -> Result<()> {
        let Some(cap) = max_samples.checked_add(1) else {
            bail!("delay line too long: {max_samples} samples");
        };
        check_alloc(cap).context("delay line")?;
        let (prod, cons) = RingBuffer::<f32>::new(cap).split();
        self.producer = Some(prod);
        self.consumer = Some(cons);
        self.max_delay = max_samples;

        let delay = self.delay.min(max_samples);
        self.delay = 0;
        self.set_delay(delay);
        Ok(())
    }

    pub fn delay(&self) -> usize {
        self.delay
    }

    pub fn set_delay(&mut self, samples: usize) {
        let samples = samples.min(self.max_delay);
        let (Some(prod), Some(cons)) = (self.producer.as_mut(), self.consumer.as_mut()) else {
            return;
        };

        while cons.len() < samples {
            if prod.push(0.0).is_err() {
                break;
            }
        }
        while cons.len() > samples {
            if cons.pop().is_none() {
                break;
            }
        }
        self.delay = samples;
    }

    /// `out[i] = input[i - delay]`
    pub fn process(&mut self, out: &mut [f32], input: &[f32]) {
        let (Some(prod), Some(cons)) = (self.producer.as_mut(), self.consumer.as_mut()) else {
            for (o, x) in out.iter_mut().zip(input) {
                *o = *x;
            }
            return;
        };

        for (o, x) in out.iter_mut().zip(input) {
            let _ = prod.push(*x);
            *o = cons.pop().unwrap_or(0.0);
        }
    }

    /// Replace the buffered audio with silence, keeping the delay.
    pub fn clear(&mut self) {
        if let Some(cons) = self.consumer.as_mut() {
            while cons.pop().is_some() {}
        }
        let delay = self.delay;
        self.delay = 0;
        self.set_delay(delay);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delays_by_configured_samples() {
        let mut d = Delay::new();
        d.init(16).unwrap();
        d.set_delay(3);

        let input = [1.0f32, 2.0, 3.0, 4.0, 5.0];
        let mut out = [0.0f32; 5];
        d.process(&mut out, &input);
        assert_eq!(out, [0.0, 0.0, 0.0, 1.0, 2.0]);

        let mut out = [0.0f32; 2];
        d.process(&mut out, &[6.0, 7.0]);
        assert_eq!(out, [3.0, 4.0]);
    }

    #[test]
    fn test_delay_is_clamped_to_max() {
        let mut d = Delay::new();
        d.init(4).unwrap();
        d.set_delay(100);
        assert_eq!(d.delay(), 4);
    }

    #[test]
    fn test_clear_keeps_latency() {
        let mut d = Delay::new();
        d.init(8).unwrap();
        d.set_delay(2);
        let mut out = [0.0f32; 3];
        d.process(&mut out, &[1.0, 1.0, 1.0]);
        d.clear();
        d.process(&mut out, &[5.0, 6.0, 7.0]);
        assert_eq!(out, [0.0, 0.0, 5.0]);
    }

    #[test]
    fn test_oversized_init_fails_and_passes_through() {
        let mut d = Delay::new();
        assert!(d.init(usize::MAX / 2).is_err());
        let mut out = [0.0f32; 2];
        d.process(&mut out, &[0.5, 0.25]);
        assert_eq!(out, [0.5, 0.25]);
    }
}

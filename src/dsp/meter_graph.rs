//! Decimating history graph.
//!
//! Reduces a stream of values to one point per `samples_per_point` samples
//! (maximum magnitude in the period) and keeps the last `point_count` points
//! in a ring.

use crate::dsp::utils::alloc_buffer;
use anyhow::{Context, Result};

#[derive(Debug, Default)]
pub struct MeterGraph {
    points: Vec<f32>,
    head: usize,
    period: usize,
    counter: usize,
    current: f32,
}

impl MeterGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn init(&mut self, point_count: usize, samples_per_point: usize) -> Result<()> {
        self.points = alloc_buffer(point_count).context("meter graph")?;
        self.head = 0;
        self.period = samples_per_point.max(1);
        self.counter = 0;
        self.current = 0.0;
        Ok(())
    }

    pub fn process(&mut self, values: &[f32]) {
        if self.points.is_empty() {
            return;
        }
        for v in values {
            self.current = self.current.max(v.abs());
            self.counter += 1;
            if self.counter >= self.period {
                self.points[self.head] = self.current;
                self.head = (self.head + 1) % self.points.len();
                self.counter = 0;
                self.current = 0.0;
            }
        }
    }

    /// Copy the history, oldest point first. Copies at most `dst.len()` points.
    pub fn copy_to(&self, dst: &mut [f32]) {
        let (newer, older) = self.points.split_at(self.head);
        for (d, s) in dst.iter_mut().zip(older.iter().chain(newer)) {
            *d = *s;
        }
    }

    pub fn clear(&mut self) {
        self.points.fill(0.0);
        self.head = 0;
        self.counter = 0;
        self.current = 0.0;
    }
}

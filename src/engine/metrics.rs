//! Peak-hold meters of one `process` call and the history graphs.

use super::consts::{MESH_POINTS, MESH_TIME};
use crate::dsp::meter_graph::MeterGraph;
use crate::dsp::utils::{abs_max, alloc_buffer, seconds_to_samples};
use crate::meters::{MeterId, Telemetry};
use anyhow::{Context, Result};

/// Peak-hold value of every monitored quantity within one `process` call.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FrameMetrics {
    values: [f32; MeterId::COUNT],
}

impl FrameMetrics {
    pub fn reset(&mut self) {
        self.values = [0.0; MeterId::COUNT];
    }

    pub fn raise(&mut self, id: MeterId, values: &[f32]) {
        let v = &mut self.values[id.index()];
        *v = v.max(abs_max(values));
    }

    pub fn get(&self, id: MeterId) -> f32 {
        self.values[id.index()]
    }

    pub fn publish(&self, telemetry: &Telemetry) {
        for id in MeterId::ALL {
            telemetry.set_meter(id, self.get(id));
        }
    }
}

/// One history graph per monitored quantity, sharing a fixed time axis.
#[derive(Debug, Default)]
pub struct GraphRecorder {
    graphs: [MeterGraph; MeterId::COUNT],
    /// Seconds ago, descending from `MESH_TIME` to 0
    time: Vec<f32>,
    scratch: Vec<f32>,
}

impl GraphRecorder {
    pub fn init(&mut self, sample_rate: f32) -> Result<()> {
        let per_point = (seconds_to_samples(sample_rate, MESH_TIME) / MESH_POINTS).max(1);
        for g in self.graphs.iter_mut() {
            g.init(MESH_POINTS, per_point).context("history graphs")?;
        }

        self.time = alloc_buffer(MESH_POINTS)?;
        let last = (MESH_POINTS - 1) as f32;
        for (i, t) in self.time.iter_mut().enumerate() {
            *t = MESH_TIME * (1.0 - i as f32 / last);
        }
        self.scratch = alloc_buffer(MESH_POINTS)?;
        Ok(())
    }

    pub fn time_points(&self) -> &[f32] {
        &self.time
    }

    pub fn record(&mut self, id: MeterId, values: &[f32]) {
        self.graphs[id.index()].process(values);
    }

    /// Write every graph whose mesh the consumer has released.
    pub fn publish(&mut self, telemetry: &Telemetry) {
        if self.time.len() != MESH_POINTS {
            return;
        }
        for id in MeterId::ALL {
            let mesh = telemetry.graph(id);
            if !mesh.is_empty() {
                continue;
            }
            self.graphs[id.index()].copy_to(&mut self.scratch);

            if id.is_closed() {
                mesh.set(0, self.time[0], 0.0);
                for (i, (t, v)) in self.time.iter().zip(&self.scratch).enumerate() {
                    mesh.set(i + 1, *t, *v);
                }
                mesh.set(MESH_POINTS + 1, self.time[MESH_POINTS - 1], 0.0);
                mesh.commit(MESH_POINTS + 2);
            } else {
                for (i, (t, v)) in self.time.iter().zip(&self.scratch).enumerate() {
                    mesh.set(i, *t, *v);
                }
                mesh.commit(MESH_POINTS);
            }
        }
    }

    pub fn clear(&mut self) {
        for g in self.graphs.iter_mut() {
            g.clear();
        }
    }
}

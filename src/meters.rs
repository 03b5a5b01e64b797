//! Thread-safe telemetry for real-time audio processing.
//!
//! This module provides atomic float storage for sharing meter values and
//! graph meshes between the audio thread and any consumer thread without
//! locks.
//!
//! Meshes use a single-flag handshake: the audio thread only writes a mesh
//! while it is marked empty, and the consumer marks it empty again once it
//! has copied the data out.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};

use crate::engine::consts::MESH_POINTS;

/// Monitored quantities, in publication order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeterId {
    InputLong,
    InputShort,
    OutputLong,
    OutputShort,
    SidechainLong,
    SidechainShort,
    Gain,
}

impl MeterId {
    pub const COUNT: usize = 7;

    pub const ALL: [MeterId; MeterId::COUNT] = [
        MeterId::InputLong,
        MeterId::InputShort,
        MeterId::OutputLong,
        MeterId::OutputShort,
        MeterId::SidechainLong,
        MeterId::SidechainShort,
        MeterId::Gain,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    /// Closed graphs are drawn as filled areas and carry two boundary points.
    pub fn is_closed(self) -> bool {
        matches!(
            self,
            MeterId::InputLong
                | MeterId::InputShort
                | MeterId::SidechainLong
                | MeterId::SidechainShort
        )
    }
}

#[derive(Debug, Default)]
struct AtomicF32(AtomicU32);

impl AtomicF32 {
    #[inline]
    fn store(&self, val: f32) {
        self.0.store(val.to_bits(), Ordering::Relaxed);
    }

    #[inline]
    fn load(&self) -> f32 {
        f32::from_bits(self.0.load(Ordering::Relaxed))
    }
}

/// Two-row (time, value) buffer with an empty/full handshake.
#[derive(Debug)]
pub struct Mesh {
    x: Box<[AtomicF32]>,
    y: Box<[AtomicF32]>,
    len: AtomicUsize,
    empty: AtomicBool,
}

impl Mesh {
    pub fn new(capacity: usize) -> Self {
        let row = || (0..capacity).map(|_| AtomicF32::default()).collect::<Box<[_]>>();
        Self {
            x: row(),
            y: row(),
            len: AtomicUsize::new(0),
            empty: AtomicBool::new(true),
        }
    }

    pub fn capacity(&self) -> usize {
        self.x.len()
    }

    /// True when the consumer has taken the previous data (or none was written).
    pub fn is_empty(&self) -> bool {
        self.empty.load(Ordering::Acquire)
    }

    /// Number of points in the last committed frame.
    pub fn len(&self) -> usize {
        self.len.load(Ordering::Acquire)
    }

    /// Write one point. Only valid while the mesh is empty.
    #[inline]
    pub(crate) fn set(&self, i: usize, x: f32, y: f32) {
        if let (Some(xs), Some(ys)) = (self.x.get(i), self.y.get(i)) {
            xs.store(x);
            ys.store(y);
        }
    }

    /// Publish `len` points written with [`Mesh::set`].
    pub(crate) fn commit(&self, len: usize) {
        self.len.store(len.min(self.capacity()), Ordering::Release);
        self.empty.store(false, Ordering::Release);
    }

    /// Copy the published points out and hand the mesh back to the writer.
    /// Returns `false` (leaving the outputs untouched) if nothing is pending.
    pub fn take(&self, x: &mut Vec<f32>, y: &mut Vec<f32>) -> bool {
        if self.is_empty() {
            return false;
        }
        let len = self.len();
        x.clear();
        y.clear();
        x.extend(self.x[..len].iter().map(AtomicF32::load));
        y.extend(self.y[..len].iter().map(AtomicF32::load));
        self.empty.store(true, Ordering::Release);
        true
    }
}

/// Shared meters and graphs of one plugin instance.
#[derive(Debug)]
pub struct Telemetry {
    meters: [AtomicF32; MeterId::COUNT],
    graphs: [Mesh; MeterId::COUNT],
}

impl Default for Telemetry {
    fn default() -> Self {
        Self::new()
    }
}

impl Telemetry {
    pub fn new() -> Self {
        Self {
            meters: Default::default(),
            graphs: std::array::from_fn(|_| Mesh::new(MESH_POINTS + 2)),
        }
    }

    pub fn set_meter(&self, id: MeterId, val: f32) {
        self.meters[id.index()].store(val);
    }

    pub fn meter(&self, id: MeterId) -> f32 {
        self.meters[id.index()].load()
    }

    pub fn graph(&self, id: MeterId) -> &Mesh {
        &self.graphs[id.index()]
    }

    pub fn reset(&self) {
        for m in self.meters.iter() {
            m.store(0.0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mesh_handshake() {
        let mesh = Mesh::new(4);
        assert!(mesh.is_empty());

        mesh.set(0, 1.0, 0.5);
        mesh.set(1, 0.0, 0.25);
        mesh.commit(2);
        assert!(!mesh.is_empty());

        let (mut x, mut y) = (Vec::new(), Vec::new());
        assert!(mesh.take(&mut x, &mut y));
        assert_eq!(x, vec![1.0, 0.0]);
        assert_eq!(y, vec![0.5, 0.25]);
        assert!(mesh.is_empty());
        assert!(!mesh.take(&mut x, &mut y));
    }

    #[test]
    fn test_meter_roundtrip() {
        let t = Telemetry::new();
        t.set_meter(MeterId::Gain, 0.75);
        assert_eq!(t.meter(MeterId::Gain), 0.75);
        t.reset();
        assert_eq!(t.meter(MeterId::Gain), 0.0);
    }
}

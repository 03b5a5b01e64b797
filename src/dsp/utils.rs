//! Small numeric helpers shared by the DSP units and the engine.

use anyhow::{anyhow, Result};

/// Smallest magnitude treated as signal when converting to dB.
pub const DB_EPS: f32 = 1e-10;

#[inline]
pub fn db_to_gain(db: f32) -> f32 {
    (10.0f32).powf(db / 20.0)
}

#[inline]
pub fn gain_to_db(gain: f32) -> f32 {
    20.0 * gain.max(DB_EPS).log10()
}

/// Milliseconds to a whole number of samples, rounded to nearest.
#[inline]
pub fn millis_to_samples(sample_rate: f32, ms: f32) -> usize {
    (ms.max(0.0) * sample_rate / 1000.0).round() as usize
}

/// Seconds to a whole number of samples, rounded to nearest.
#[inline]
pub fn seconds_to_samples(sample_rate: f32, seconds: f32) -> usize {
    (seconds.max(0.0) * sample_rate).round() as usize
}

/// Allocates a zeroed buffer without aborting the process on OOM.
pub fn alloc_buffer(len: usize) -> Result<Vec<f32>> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(len)
        .map_err(|e| anyhow!("failed to allocate {len} samples: {e}"))?;
    buf.resize(len, 0.0);
    Ok(buf)
}

/// Checks that `len` samples fit in memory before handing the size to an
/// allocator that aborts on failure (e.g. `ringbuf::RingBuffer::new`).
pub fn check_alloc(len: usize) -> Result<()> {
    let mut scratch: Vec<f32> = Vec::new();
    scratch
        .try_reserve_exact(len)
        .map_err(|e| anyhow!("failed to allocate {len} samples: {e}"))
}

/// Fills `dst` with a linear ramp that reaches `to` on its last sample.
///
/// The sample before the ramp is assumed to hold `from`, so every step
/// (including the first) equals `(to - from) / dst.len()`.
pub fn fill_ramp(dst: &mut [f32], from: f32, to: f32) {
    let n = dst.len();
    if n == 0 {
        return;
    }
    let delta = (to - from) / n as f32;
    for (i, v) in dst.iter_mut().enumerate() {
        *v = from + delta * (i + 1) as f32;
    }
    // Land exactly on the endpoint regardless of rounding
    dst[n - 1] = to;
}

/// `dst[i] = src[i] * ramp(from -> to)`, same ramp shape as [`fill_ramp`].
pub fn ramp_mul(dst: &mut [f32], src: &[f32], from: f32, to: f32) {
    let n = dst.len().min(src.len());
    if n == 0 {
        return;
    }
    if from == to {
        for (d, s) in dst[..n].iter_mut().zip(src) {
            *d = *s * to;
        }
        return;
    }
    let delta = (to - from) / n as f32;
    for (i, (d, s)) in dst[..n].iter_mut().zip(src).enumerate() {
        let k = if i + 1 == n {
            to
        } else {
            from + delta * (i + 1) as f32
        };
        *d = *s * k;
    }
}

/// Maximum absolute value of a slice (0 for an empty slice).
#[inline]
pub fn abs_max(x: &[f32]) -> f32 {
    x.iter().fold(0.0f32, |m, v| m.max(v.abs()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ramp_lands_on_endpoint() {
        let mut buf = [0.0f32; 8];
        fill_ramp(&mut buf, 0.0, 1.0);
        assert_eq!(buf[7], 1.0);
        assert!((buf[0] - 0.125).abs() < 1e-6);
        for w in buf.windows(2) {
            assert!((w[1] - w[0] - 0.125).abs() < 1e-6);
        }
    }

    #[test]
    fn test_millis_to_samples() {
        assert_eq!(millis_to_samples(48000.0, 10.0), 480);
        assert_eq!(millis_to_samples(44100.0, 0.0), 0);
    }

    #[test]
    fn test_check_alloc_reports_oversized_requests() {
        assert!(check_alloc(4096).is_ok());
        assert!(check_alloc(usize::MAX / 2).is_err());
    }

    #[test]
    fn test_ramp_mul_constant() {
        let src = [1.0f32, -2.0, 3.0];
        let mut dst = [0.0f32; 3];
        ramp_mul(&mut dst, &src, 0.5, 0.5);
        assert_eq!(dst, [0.5, -1.0, 1.5]);
    }

    #[test]
    fn test_ramp_mul_moves_between_gains() {
        let src = [2.0f32; 4];
        let mut dst = [0.0f32; 4];
        ramp_mul(&mut dst, &src, 1.0, 0.5);
        // Steps of (0.5 - 1.0) / 4 starting one step past `from`
        let expected = [2.0 * 0.875, 2.0 * 0.75, 2.0 * 0.625, 2.0 * 0.5];
        for (d, e) in dst.iter().zip(expected) {
            assert!((d - e).abs() < 1e-6);
        }
        assert_eq!(dst[3], 1.0);
    }
}

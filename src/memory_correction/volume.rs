//! Volumes and acquisition-order interleaving
//!
//! A volume is an `Array3` shaped `(Z, Y, X)`. Channel stacks are interleaved
//! into a single `(N·Z, Y, X)` volume whose plane `c + q·N` is channel `c` at
//! time index `q`, which is the order the camera actually read them out.

use std::fmt::Debug;

use ndarray::{Array3, ArrayView3, Axis, s};
use tracing::debug;

use crate::memory_correction::common::error::{CorrectionError, Result};

/// Sample types a volume may hold.
///
/// The engine works in `f32`; `from_f32` converts back with truncation toward
/// zero and saturation at the type's range.
pub trait Sample: Copy + Send + Sync + Debug + 'static {
    fn to_f32(self) -> f32;
    fn from_f32(value: f32) -> Self;
}

macro_rules! impl_sample {
    ($($t:ty),*) => {
        $(
            impl Sample for $t {
                #[inline]
                fn to_f32(self) -> f32 {
                    self as f32
                }

                #[inline]
                fn from_f32(value: f32) -> Self {
                    value as $t
                }
            }
        )*
    };
}

impl_sample!(u8, u16, u32, f32, f64);

/// Convert any volume to the `f32` working representation.
pub fn to_working<T: Sample>(volume: ArrayView3<'_, T>) -> Array3<f32> {
    volume.mapv(T::to_f32)
}

/// Convert a working volume back to the caller's dtype.
pub fn from_working<T: Sample>(volume: ArrayView3<'_, f32>) -> Array3<T> {
    volume.mapv(T::from_f32)
}

/// Merge per-channel stacks into acquisition order.
///
/// All stacks must share one shape; the result is `(N·Z, Y, X)`.
pub fn interleave<T: Sample>(stacks: &[Array3<T>]) -> Result<Array3<T>> {
    let first = stacks
        .first()
        .ok_or_else(|| CorrectionError::EmptyInput("no channel stacks to interleave".to_string()))?;
    let shape = first.dim();

    if let Some((idx, bad)) = stacks.iter().enumerate().find(|(_, s)| s.dim() != shape) {
        return Err(CorrectionError::ShapeMismatch(format!(
            "channel 0 is {:?} but channel {} is {:?}",
            shape,
            idx,
            bad.dim()
        )));
    }

    let channels = stacks.len();
    let (z, y, x) = shape;
    debug!(channels, z, y, x, "Interleaving channel stacks");

    let mut merged = Array3::from_elem((channels * z, y, x), T::from_f32(0.0));
    if z == 0 {
        return Ok(merged);
    }
    for (c, stack) in stacks.iter().enumerate() {
        merged
            .slice_mut(s![c..;channels, .., ..])
            .assign(stack);
    }
    Ok(merged)
}

/// Split an interleaved volume back into `channel_count` stacks.
pub fn deinterleave<T: Sample>(volume: ArrayView3<'_, T>, channel_count: usize) -> Result<Vec<Array3<T>>> {
    if channel_count == 0 {
        return Err(CorrectionError::EmptyInput("channel count must be at least 1".to_string()));
    }
    let planes = volume.len_of(Axis(0));
    if planes % channel_count != 0 {
        return Err(CorrectionError::ShapeMismatch(format!(
            "{planes} planes cannot be split evenly into {channel_count} channels"
        )));
    }

    let (_, y, x) = volume.dim();
    if planes == 0 {
        return Ok(vec![Array3::from_elem((0, y, x), T::from_f32(0.0)); channel_count]);
    }

    Ok((0..channel_count)
        .map(|c| volume.slice(s![c..;channel_count, .., ..]).to_owned())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channel(c: u16, z: usize, y: usize, x: usize) -> Array3<u16> {
        Array3::from_shape_fn((z, y, x), |(q, r, col)| {
            c * 10_000 + (q * 100 + r * 10 + col) as u16
        })
    }

    #[test]
    fn test_interleave_order() {
        let stacks = vec![channel(0, 3, 2, 2), channel(1, 3, 2, 2)];
        let merged = interleave(&stacks).unwrap();
        assert_eq!(merged.dim(), (6, 2, 2));
        for q in 0..3 {
            for c in 0..2 {
                assert_eq!(
                    merged.index_axis(Axis(0), c + q * 2),
                    stacks[c].index_axis(Axis(0), q)
                );
            }
        }
    }

    #[test]
    fn test_round_trip() {
        let stacks = vec![channel(0, 4, 3, 5), channel(1, 4, 3, 5), channel(2, 4, 3, 5)];
        let merged = interleave(&stacks).unwrap();
        let split = deinterleave(merged.view(), stacks.len()).unwrap();
        assert_eq!(split, stacks);
    }

    #[test]
    fn test_single_channel_is_identity() {
        let stacks = vec![channel(7, 2, 2, 2)];
        let merged = interleave(&stacks).unwrap();
        assert_eq!(merged, stacks[0]);
    }

    #[test]
    fn test_shape_mismatch_rejected() {
        let stacks = vec![channel(0, 3, 2, 2), channel(1, 3, 2, 3)];
        let err = interleave(&stacks).unwrap_err();
        assert!(matches!(err, CorrectionError::ShapeMismatch(_)));
    }

    #[test]
    fn test_empty_rejected() {
        let stacks: Vec<Array3<u16>> = Vec::new();
        assert!(matches!(
            interleave(&stacks).unwrap_err(),
            CorrectionError::EmptyInput(_)
        ));
    }

    #[test]
    fn test_deinterleave_uneven_rejected() {
        let v = Array3::<f32>::zeros((5, 2, 2));
        assert!(deinterleave(v.view(), 2).is_err());
        assert!(deinterleave(v.view(), 0).is_err());
    }

    #[test]
    fn test_sample_casts_saturate() {
        assert_eq!(u16::from_f32(-3.0), 0);
        assert_eq!(u16::from_f32(70_000.0), u16::MAX);
        assert_eq!(u16::from_f32(48.9), 48);
        assert_eq!(u8::from_f32(f32::NAN), 0);
        assert_eq!(f32::from_f32(48.24), 48.24);
    }
}

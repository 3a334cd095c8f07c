//! Memory-bias removal over an interleaved volume
//!
//! Every strategy computes the same recurrence. For each pixel, plane `p`
//! loses `dampening · gain · (1 − exp(−decay · (raw[p−1] − offset)))` on top of
//! the dark offset, and the result is clamped at zero. The correction always
//! reads the *raw* previous plane, never the corrected one.
//!
//! Planes are strictly sequential; pixels within a plane are independent.

mod types;
mod scalar;
mod vectorized;
mod parallel;
#[cfg(jetson_cuda)]
mod cuda;


pub use types::{CorrectionStrategy, MemoryCorrector, DEFAULT_DAMPENING};
pub use scalar::ScalarCorrector;
pub use vectorized::VectorizedCorrector;
pub use parallel::ParallelCorrector;
#[cfg(jetson_cuda)]
pub use cuda::CudaCorrector;

pub(crate) use types::validate_inputs;

/// Corrected value of one sample.
///
/// `previous_raw` is the uncorrected reading of the same pixel one plane
/// earlier, or `None` on the first plane.
#[inline]
pub fn correct_sample(
    raw: f32,
    previous_raw: Option<f32>,
    gain: f32,
    decay_rate: f32,
    dark_offset: f32,
    dampening: f32,
) -> f32 {
    let d = match previous_raw {
        None => raw - dark_offset,
        Some(prev) => {
            let correction = gain * (1.0 - (-decay_rate * (prev - dark_offset)).exp());
            raw - dark_offset - dampening * correction
        }
    };
    d.max(0.0)
}

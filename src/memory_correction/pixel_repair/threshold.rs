//! Knee ("L-method") threshold on a sorted distribution.

use tracing::{debug, warn};

use crate::memory_correction::common::error::{CorrectionError, Result};

/// Sorted values beyond this count are subsampled with a uniform stride.
pub const DEFAULT_SAMPLE_CAP: usize = 50_000;

/// Outcome of [`determine_threshold`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Threshold {
    pub value: f32,
    /// Non-finite values were left out, or none were finite and `value` fell back to 0.
    pub degenerate: bool,
}

/// Pick the value furthest from the chord joining the smallest and largest
/// sorted values.
///
/// Only finite values take part. When any value is NaN or infinite the result
/// is marked degenerate, and with no finite values at all the threshold is 0.
pub fn determine_threshold(values: &[f32], max_samples: usize) -> Result<Threshold> {
    if values.is_empty() {
        return Err(CorrectionError::EmptyInput(
            "threshold needs at least one value".to_string(),
        ));
    }
    if max_samples == 0 {
        return Err(CorrectionError::InvalidConfiguration(
            "threshold sample cap must be at least 1".to_string(),
        ));
    }

    let mut sorted: Vec<f32> = values.iter().copied().filter(|v| v.is_finite()).collect();
    let non_finite = values.len() - sorted.len();
    if non_finite > 0 {
        warn!(non_finite, total = values.len(), "Ignoring non-finite values in threshold");
    }
    if sorted.is_empty() {
        warn!("No finite values to threshold, falling back to 0");
        return Ok(Threshold {
            value: 0.0,
            degenerate: true,
        });
    }

    sorted.sort_unstable_by(f32::total_cmp);

    if sorted.len() > max_samples {
        let stride = sorted.len() / max_samples;
        sorted = sorted.into_iter().step_by(stride).collect();
    }

    let n = sorted.len();
    let first = sorted[0] as f64;
    let last = sorted[n - 1] as f64;
    let step = if n > 1 { (last - first) / (n - 1) as f64 } else { 0.0 };

    let mut position = 0;
    let mut best = f64::NEG_INFINITY;
    for (i, &v) in sorted.iter().enumerate() {
        let chord = first + step * i as f64;
        let distance = (v as f64 - chord).abs();
        if distance > best {
            best = distance;
            position = i;
        }
    }

    let value = sorted[position];
    debug!(samples = n, position, value, "Knee threshold");

    Ok(Threshold {
        value,
        degenerate: non_finite > 0,
    })
}

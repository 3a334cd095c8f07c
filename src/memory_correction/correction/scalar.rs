use ndarray::{Array3, ArrayView3};
use tracing::debug;

use crate::memory_correction::calibration::CalibrationModel;
use crate::memory_correction::common::error::Result;
use super::{MemoryCorrector, correct_sample, validate_inputs};

/// Explicit loop over pixels and planes.
///
/// Slow, but the other strategies are checked against it.
pub struct ScalarCorrector;

impl MemoryCorrector for ScalarCorrector {
    fn name(&self) -> &'static str {
        "scalar"
    }

    fn correct(
        &self,
        volume: ArrayView3<'_, f32>,
        calibration: &CalibrationModel,
        dampening: f32,
    ) -> Result<Array3<f32>> {
        validate_inputs(&volume, calibration)?;
        let (planes, height, width) = volume.dim();
        debug!(planes, height, width, "Running scalar correction");

        let gain = calibration.gain();
        let decay_rate = calibration.decay_rate();
        let dark_offset = calibration.dark_offset();

        let mut out = Array3::<f32>::zeros(volume.dim());
        for y in 0..height {
            for x in 0..width {
                let (g, k, off) = (gain[[y, x]], decay_rate[[y, x]], dark_offset[[y, x]]);
                for p in 0..planes {
                    let previous = if p == 0 { None } else { Some(volume[[p - 1, y, x]]) };
                    out[[p, y, x]] = correct_sample(volume[[p, y, x]], previous, g, k, off, dampening);
                }
            }
        }
        Ok(out)
    }
}

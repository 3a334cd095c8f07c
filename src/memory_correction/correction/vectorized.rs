use ndarray::{Array3, ArrayView3, s};
use tracing::debug;

use crate::memory_correction::calibration::CalibrationModel;
use crate::memory_correction::common::error::Result;
use super::{MemoryCorrector, validate_inputs};

/// Whole-volume array arithmetic with the calibration maps broadcast over planes.
pub struct VectorizedCorrector;

impl MemoryCorrector for VectorizedCorrector {
    fn name(&self) -> &'static str {
        "vectorized"
    }

    fn correct(
        &self,
        volume: ArrayView3<'_, f32>,
        calibration: &CalibrationModel,
        dampening: f32,
    ) -> Result<Array3<f32>> {
        validate_inputs(&volume, calibration)?;
        let planes = volume.dim().0;
        debug!(shape = ?volume.dim(), "Running vectorized correction");

        let mut shifted = &volume - &calibration.dark_offset();

        if planes > 1 {
            // Built from the leading planes before any of them is modified.
            let mut correction = shifted.slice(s![..planes - 1, .., ..]).to_owned();
            correction.zip_mut_with(&calibration.decay_rate(), |c, &k| {
                *c = 1.0 - (-k * *c).exp();
            });
            correction *= &calibration.gain();
            correction *= dampening;

            let mut trailing = shifted.slice_mut(s![1.., .., ..]);
            trailing -= &correction;
        }

        shifted.mapv_inplace(|v| v.max(0.0));
        Ok(shifted)
    }
}

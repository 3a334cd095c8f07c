use ndarray::{Array3, ArrayView3, Axis, Zip};
use tracing::debug;

use crate::memory_correction::calibration::CalibrationModel;
use crate::memory_correction::common::error::Result;
use super::{MemoryCorrector, correct_sample, validate_inputs};

/// Device-parallel strategy on the rayon thread pool.
///
/// One parallel pass over `(y, x)` per plane, planes in order, with the previous
/// raw plane passed alongside the current one.
pub struct ParallelCorrector;

impl MemoryCorrector for ParallelCorrector {
    fn name(&self) -> &'static str {
        "parallel"
    }

    fn correct(
        &self,
        volume: ArrayView3<'_, f32>,
        calibration: &CalibrationModel,
        dampening: f32,
    ) -> Result<Array3<f32>> {
        validate_inputs(&volume, calibration)?;
        debug!(
            shape = ?volume.dim(),
            threads = rayon::current_num_threads(),
            "Running parallel correction"
        );

        let gain = calibration.gain();
        let decay_rate = calibration.decay_rate();
        let dark_offset = calibration.dark_offset();

        let mut out = Array3::<f32>::zeros(volume.dim());
        for (p, plane) in out.axis_iter_mut(Axis(0)).enumerate() {
            let raw = volume.index_axis(Axis(0), p);
            if p == 0 {
                Zip::from(plane)
                    .and(raw)
                    .and(&dark_offset)
                    .par_for_each(|o, &v, &off| {
                        *o = correct_sample(v, None, 0.0, 0.0, off, dampening);
                    });
                continue;
            }

            let previous = volume.index_axis(Axis(0), p - 1);
            Zip::from(plane)
                .and(raw)
                .and(previous)
                .and(&gain)
                .and(&decay_rate)
                .and(&dark_offset)
                .par_for_each(|o, &v, &prev, &g, &k, &off| {
                    *o = correct_sample(v, Some(prev), g, k, off, dampening);
                });
        }
        Ok(out)
    }
}

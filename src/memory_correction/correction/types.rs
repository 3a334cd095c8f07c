//! Strategy selection and the corrector interface

use std::fmt;
use std::str::FromStr;

use ndarray::{Array3, ArrayView3};

use crate::memory_correction::calibration::CalibrationModel;
use crate::memory_correction::common::error::{CorrectionError, Result};

/// Empirical scale on the correction term that keeps it from over-correcting.
pub const DEFAULT_DAMPENING: f32 = 0.88;

/// Removes the memory bias from an interleaved `(planes, height, width)` volume.
///
/// Implementations return a new volume of the same shape with every value
/// non-negative, and must agree with [`super::ScalarCorrector`] within float
/// tolerance.
pub trait MemoryCorrector: Send + Sync {
    fn name(&self) -> &'static str;

    fn correct(
        &self,
        volume: ArrayView3<'_, f32>,
        calibration: &CalibrationModel,
        dampening: f32,
    ) -> Result<Array3<f32>>;
}

/// Execution strategy for the correction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CorrectionStrategy {
    /// Per-pixel, per-plane loop; the reference implementation
    Scalar,
    /// Whole-volume array operations (default)
    #[default]
    Vectorized,
    /// Parallel over pixels, sequential over planes; CUDA on Jetson, thread pool elsewhere
    Device,
}

impl CorrectionStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Scalar => "scalar",
            Self::Vectorized => "vectorized",
            Self::Device => "device",
        }
    }

    /// Instantiate the corrector for this strategy.
    ///
    /// `plane_batch` is the number of planes per device kernel launch.
    pub fn build(&self, plane_batch: usize) -> Result<Box<dyn MemoryCorrector>> {
        if plane_batch == 0 {
            return Err(CorrectionError::InvalidConfiguration(
                "plane batch must be at least 1".to_string(),
            ));
        }
        Ok(match self {
            Self::Scalar => Box::new(super::ScalarCorrector),
            Self::Vectorized => Box::new(super::VectorizedCorrector),
            #[cfg(jetson_cuda)]
            Self::Device => Box::new(super::CudaCorrector::new(plane_batch)?),
            #[cfg(not(jetson_cuda))]
            Self::Device => Box::new(super::ParallelCorrector),
        })
    }
}

impl fmt::Display for CorrectionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CorrectionStrategy {
    type Err = CorrectionError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "scalar" | "cpu" => Ok(Self::Scalar),
            "vectorized" | "array" | "numpy" => Ok(Self::Vectorized),
            "device" | "gpu" | "cuda" | "parallel" => Ok(Self::Device),
            other => Err(CorrectionError::InvalidConfiguration(format!(
                "unknown correction strategy {other:?} (expected scalar, vectorized or device)"
            ))),
        }
    }
}

/// Plane shape of `volume` must equal the calibration map shape.
pub(crate) fn validate_inputs(volume: &ArrayView3<'_, f32>, calibration: &CalibrationModel) -> Result<()> {
    let (_, height, width) = volume.dim();
    if (height, width) != calibration.shape() {
        return Err(CorrectionError::DimensionMismatch {
            volume: (height, width),
            calibration: calibration.shape(),
        });
    }
    Ok(())
}

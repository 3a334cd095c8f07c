//! Per-pixel calibration of the sensor memory effect
//!
//! A calibration dataset stacks three maps measured over a calibration ROI:
//! plane 0 is the gain, plane 1 the decay rate, plane 2 the dark offset. Any
//! further planes are ignored.

use ndarray::{Array2, Array3, ArrayView2, Axis, s};
use tracing::debug;

use crate::memory_correction::common::error::{CorrectionError, Result};
use crate::memory_correction::roi::Roi;

/// Plane indices inside a calibration dataset.
const GAIN_PLANE: usize = 0;
const DECAY_RATE_PLANE: usize = 1;
const DARK_OFFSET_PLANE: usize = 2;
const MIN_CALIBRATION_PLANES: usize = 3;

/// Alignment rule applied when a calibration is cropped to a data ROI.
///
/// The camera's addressable region has only ever been seen to move vertically
/// relative to the calibration capture, by `left + right` of the calibration ROI
/// minus `left + right` of the data ROI. Horizontally it stays put. Both parts
/// are empirical; they can be overridden here if a camera behaves differently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropAlignment {
    /// Columns added to the horizontal slice start.
    pub horizontal_shift: i64,
    /// Apply the empirical vertical shift rule.
    pub vertical_shift_enabled: bool,
}

impl CropAlignment {
    pub const HORIZONTAL_SHIFT: i64 = 0;

    pub fn vertical_shift(&self, calibration: &Roi, data: &Roi) -> i64 {
        if !self.vertical_shift_enabled {
            return 0;
        }
        calibration.left + calibration.right - data.left - data.right
    }
}

impl Default for CropAlignment {
    fn default() -> Self {
        Self {
            horizontal_shift: Self::HORIZONTAL_SHIFT,
            vertical_shift_enabled: true,
        }
    }
}

/// Gain, decay-rate and dark-offset maps over a sensor ROI.
///
/// Read-only once built; share it freely between concurrent corrections.
#[derive(Debug, Clone)]
pub struct CalibrationModel {
    gain: Array2<f32>,
    decay_rate: Array2<f32>,
    dark_offset: Array2<f32>,
    roi: Roi,
    alignment: CropAlignment,
}

impl CalibrationModel {
    /// Build from a `(planes, height, width)` calibration dataset.
    pub fn from_dataset(dataset: Array3<f32>, roi: Roi, alignment: CropAlignment) -> Result<Self> {
        let (planes, height, width) = dataset.dim();
        if planes < MIN_CALIBRATION_PLANES {
            return Err(CorrectionError::CalibrationShape {
                expected: format!("at least {MIN_CALIBRATION_PLANES} planes"),
                found: dataset.shape().to_vec(),
            });
        }
        if (height, width) != roi.shape() {
            return Err(CorrectionError::CalibrationShape {
                expected: format!("(_, {}, {}) to match ROI {}", roi.height(), roi.width(), roi),
                found: dataset.shape().to_vec(),
            });
        }

        debug!(planes, height, width, %roi, "Loading calibration dataset");

        Ok(Self {
            gain: dataset.index_axis(Axis(0), GAIN_PLANE).to_owned(),
            decay_rate: dataset.index_axis(Axis(0), DECAY_RATE_PLANE).to_owned(),
            dark_offset: dataset.index_axis(Axis(0), DARK_OFFSET_PLANE).to_owned(),
            roi,
            alignment,
        })
    }

    /// Build from already separated maps.
    pub fn from_maps(
        gain: Array2<f32>,
        decay_rate: Array2<f32>,
        dark_offset: Array2<f32>,
        roi: Roi,
        alignment: CropAlignment,
    ) -> Result<Self> {
        for (name, map) in [("gain", &gain), ("decay rate", &decay_rate), ("dark offset", &dark_offset)] {
            if map.dim() != roi.shape() {
                return Err(CorrectionError::CalibrationShape {
                    expected: format!("{name} map of {:?} to match ROI {}", roi.shape(), roi),
                    found: map.shape().to_vec(),
                });
            }
        }
        Ok(Self {
            gain,
            decay_rate,
            dark_offset,
            roi,
            alignment,
        })
    }

    pub fn gain(&self) -> ArrayView2<'_, f32> {
        self.gain.view()
    }

    pub fn decay_rate(&self) -> ArrayView2<'_, f32> {
        self.decay_rate.view()
    }

    pub fn dark_offset(&self) -> ArrayView2<'_, f32> {
        self.dark_offset.view()
    }

    pub fn roi(&self) -> &Roi {
        &self.roi
    }

    pub fn alignment(&self) -> CropAlignment {
        self.alignment
    }

    /// `(height, width)` of every map.
    pub fn shape(&self) -> (usize, usize) {
        self.gain.dim()
    }

    /// Crop to the sub-window matching `data_roi`, applying the [`CropAlignment`] rule.
    ///
    /// The returned model owns copies of the maps and reports `data_roi` as its ROI.
    pub fn crop_to(&self, data_roi: &Roi) -> Result<CalibrationModel> {
        self.crop_to_with(data_roi, self.alignment)
    }

    /// [`Self::crop_to`] with an explicit alignment in place of the model's own.
    pub fn crop_to_with(&self, data_roi: &Roi, alignment: CropAlignment) -> Result<CalibrationModel> {
        let out_of_bounds = || CorrectionError::RoiOutOfBounds {
            calibration: self.roi,
            data: *data_roi,
        };

        if !self.roi.contains(data_roi) {
            return Err(out_of_bounds());
        }

        let cal = self.roi.normalized();
        let data = data_roi.normalized();
        let offset = data.sub(cal);
        let vertical = alignment.vertical_shift(&cal, &data);
        let horizontal = alignment.horizontal_shift;

        let row_start = offset[1] + vertical;
        let col_start = offset[0] + horizontal;
        let row_end = row_start + data.height() as i64;
        let col_end = col_start + data.width() as i64;

        let (height, width) = self.shape();
        if row_start < 0 || col_start < 0 || row_end > height as i64 || col_end > width as i64 {
            return Err(out_of_bounds());
        }

        debug!(
            vertical_shift = vertical,
            horizontal_shift = horizontal,
            rows = ?(row_start..row_end),
            cols = ?(col_start..col_end),
            "Cropping calibration to data ROI"
        );

        let (r0, r1, c0, c1) = (
            row_start as usize,
            row_end as usize,
            col_start as usize,
            col_end as usize,
        );
        let window = s![r0..r1, c0..c1];

        Ok(CalibrationModel {
            gain: self.gain.slice(window).to_owned(),
            decay_rate: self.decay_rate.slice(window).to_owned(),
            dark_offset: self.dark_offset.slice(window).to_owned(),
            roi: *data_roi,
            alignment,
        })
    }
}

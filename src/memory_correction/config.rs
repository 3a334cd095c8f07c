//! Correction configuration types

use crate::memory_correction::calibration::CropAlignment;
use crate::memory_correction::common::error::{CorrectionError, Result};
use crate::memory_correction::correction::{CorrectionStrategy, DEFAULT_DAMPENING};
use crate::memory_correction::pixel_repair::{DEFAULT_MEDIAN_WINDOW, DEFAULT_SAMPLE_CAP};

/// Planes per device kernel launch.
pub const DEFAULT_PLANE_BATCH: usize = 16;

/// Configuration for one correction pipeline
#[derive(Debug, Clone)]
pub struct CorrectionConfig {
    /// Execution strategy for the memory-bias recurrence
    pub strategy: CorrectionStrategy,
    /// Scale on the correction term (empirical, 0.88)
    pub dampening: f32,
    /// Run insensitive pixel repair after correction
    pub repair_pixels: bool,
    /// Side of the square median window used by pixel repair (odd)
    pub median_window: usize,
    /// Sorted deviation values beyond this count are subsampled before thresholding
    pub outlier_sample_cap: usize,
    /// Also flag pixels by their background-subtracted mean projection
    pub mean_detection: bool,
    /// Background level subtracted from the mean projection
    pub background: f32,
    /// How calibration maps are aligned when cropped to the data ROI; takes
    /// precedence over the alignment stored in the calibration model
    pub alignment: CropAlignment,
    /// Planes per kernel launch for the CUDA device strategy
    pub plane_batch: usize,
}

impl Default for CorrectionConfig {
    fn default() -> Self {
        Self {
            strategy: CorrectionStrategy::default(),
            dampening: DEFAULT_DAMPENING,
            repair_pixels: true,
            median_window: DEFAULT_MEDIAN_WINDOW,
            outlier_sample_cap: DEFAULT_SAMPLE_CAP,
            mean_detection: false,
            background: 0.0,
            alignment: CropAlignment::default(),
            plane_batch: DEFAULT_PLANE_BATCH,
        }
    }
}

impl CorrectionConfig {
    pub fn builder() -> CorrectionConfigBuilder {
        CorrectionConfigBuilder::default()
    }

    pub fn validate(&self) -> Result<()> {
        if !self.dampening.is_finite() {
            return Err(CorrectionError::InvalidConfiguration(format!(
                "dampening must be finite, got {}",
                self.dampening
            )));
        }
        if self.median_window == 0 || self.median_window % 2 == 0 {
            return Err(CorrectionError::InvalidConfiguration(format!(
                "median window must be odd and positive, got {}",
                self.median_window
            )));
        }
        if self.outlier_sample_cap < 2 {
            return Err(CorrectionError::InvalidConfiguration(format!(
                "outlier sample cap must be at least 2, got {}",
                self.outlier_sample_cap
            )));
        }
        if !self.background.is_finite() {
            return Err(CorrectionError::InvalidConfiguration(format!(
                "background must be finite, got {}",
                self.background
            )));
        }
        if self.plane_batch == 0 {
            return Err(CorrectionError::InvalidConfiguration(
                "plane batch must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Builder for CorrectionConfig
#[derive(Default)]
pub struct CorrectionConfigBuilder {
    strategy: Option<CorrectionStrategy>,
    dampening: Option<f32>,
    repair_pixels: Option<bool>,
    median_window: Option<usize>,
    outlier_sample_cap: Option<usize>,
    mean_detection: Option<bool>,
    background: Option<f32>,
    alignment: Option<CropAlignment>,
    plane_batch: Option<usize>,
}

impl CorrectionConfigBuilder {
    pub fn strategy(mut self, strategy: CorrectionStrategy) -> Self {
        self.strategy = Some(strategy);
        self
    }

    pub fn dampening(mut self, dampening: f32) -> Self {
        self.dampening = Some(dampening);
        self
    }

    pub fn repair_pixels(mut self, enable: bool) -> Self {
        self.repair_pixels = Some(enable);
        self
    }

    pub fn median_window(mut self, window: usize) -> Self {
        self.median_window = Some(window);
        self
    }

    pub fn outlier_sample_cap(mut self, cap: usize) -> Self {
        self.outlier_sample_cap = Some(cap);
        self
    }

    pub fn mean_detection(mut self, enable: bool) -> Self {
        self.mean_detection = Some(enable);
        self
    }

    pub fn background(mut self, background: f32) -> Self {
        self.background = Some(background);
        self
    }

    pub fn alignment(mut self, alignment: CropAlignment) -> Self {
        self.alignment = Some(alignment);
        self
    }

    pub fn plane_batch(mut self, planes: usize) -> Self {
        self.plane_batch = Some(planes);
        self
    }

    pub fn build(self) -> CorrectionConfig {
        let default = CorrectionConfig::default();
        CorrectionConfig {
            strategy: self.strategy.unwrap_or(default.strategy),
            dampening: self.dampening.unwrap_or(default.dampening),
            repair_pixels: self.repair_pixels.unwrap_or(default.repair_pixels),
            median_window: self.median_window.unwrap_or(default.median_window),
            outlier_sample_cap: self.outlier_sample_cap.unwrap_or(default.outlier_sample_cap),
            mean_detection: self.mean_detection.unwrap_or(default.mean_detection),
            background: self.background.unwrap_or(default.background),
            alignment: self.alignment.unwrap_or(default.alignment),
            plane_batch: self.plane_batch.unwrap_or(default.plane_batch),
        }
    }
}

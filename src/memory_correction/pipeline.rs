//! Correction pipeline
//!
//! Crop the calibration to the data ROI, interleave the channel stacks into
//! acquisition order, remove the memory bias, optionally repair insensitive
//! pixels, then split back into channels in the caller's dtype.

use ndarray::{Array3, ArrayView3};
use tracing::{debug, info, info_span, instrument};

use crate::memory_correction::calibration::CalibrationModel;
use crate::memory_correction::common::error::Result;
use crate::memory_correction::config::CorrectionConfig;
use crate::memory_correction::correction::{CorrectionStrategy, MemoryCorrector};
use crate::memory_correction::pixel_repair::{InsensitivePixelDetector, PixelRepairReport};
use crate::memory_correction::roi::Roi;
use crate::memory_correction::timing::PipelineTimings;
use crate::memory_correction::volume::{Sample, deinterleave, from_working, interleave, to_working};

#[cfg(test)]
mod tests;

/// Result of [`CorrectionPipeline::correct_with_report`].
#[derive(Debug)]
pub struct CorrectionOutput<T> {
    /// Corrected stacks in the input channel order
    pub stacks: Vec<Array3<T>>,
    /// Present when pixel repair ran
    pub repair: Option<PixelRepairReport>,
    pub timings: PipelineTimings,
}

pub struct CorrectionPipeline {
    corrector: Box<dyn MemoryCorrector>,
    detector: InsensitivePixelDetector,
    config: CorrectionConfig,
}

impl CorrectionPipeline {
    /// Build a pipeline using the corrector selected by `config.strategy`.
    pub fn new(config: CorrectionConfig) -> Result<Self> {
        config.validate()?;
        let corrector = config.strategy.build(config.plane_batch)?;
        Self::with_corrector(corrector, config)
    }

    pub fn with_corrector(corrector: Box<dyn MemoryCorrector>, config: CorrectionConfig) -> Result<Self> {
        config.validate()?;
        let detector = detector_for(&config)?;
        info!(
            corrector = corrector.name(),
            dampening = config.dampening,
            repair_pixels = config.repair_pixels,
            "Correction pipeline initialized"
        );
        Ok(Self {
            corrector,
            detector,
            config,
        })
    }

    /// Correct one acquisition round of channel stacks.
    ///
    /// Every stack must have the same shape, with planes matching `data_roi`.
    /// The output has one stack per input, each with the input's shape and dtype.
    pub fn correct<T: Sample>(
        &self,
        stacks: &[Array3<T>],
        calibration: &CalibrationModel,
        data_roi: &Roi,
    ) -> Result<Vec<Array3<T>>> {
        Ok(self.correct_with_report(stacks, calibration, data_roi)?.stacks)
    }

    #[instrument(skip(self, stacks, calibration), fields(channels = stacks.len(), roi = %data_roi))]
    pub fn correct_with_report<T: Sample>(
        &self,
        stacks: &[Array3<T>],
        calibration: &CalibrationModel,
        data_roi: &Roi,
    ) -> Result<CorrectionOutput<T>> {
        let mut timings = PipelineTimings::new();

        let cropped = timings.time("crop_calibration", || {
            calibration.crop_to_with(data_roi, self.config.alignment)
        })?;
        let interleaved = timings.time("interleave", || interleave(stacks))?;
        let working = timings.time("to_working", || to_working(interleaved.view()));
        drop(interleaved);

        let (corrected, repair) = self.run(working.view(), &cropped, &mut timings)?;
        drop(working);

        let restored = timings.time("from_working", || from_working::<T>(corrected.view()));
        let stacks = timings.time("deinterleave", || deinterleave(restored.view(), stacks.len()))?;

        info!(
            channels = stacks.len(),
            total_ms = timings.total_duration().as_secs_f64() * 1000.0,
            "Correction complete"
        );

        Ok(CorrectionOutput {
            stacks,
            repair,
            timings,
        })
    }

    /// Correct an already interleaved working volume against a calibration that
    /// already matches its plane shape.
    pub fn correct_interleaved(
        &self,
        volume: ArrayView3<'_, f32>,
        calibration: &CalibrationModel,
    ) -> Result<(Array3<f32>, Option<PixelRepairReport>)> {
        let mut timings = PipelineTimings::new();
        self.run(volume, calibration, &mut timings)
    }

    fn run(
        &self,
        volume: ArrayView3<'_, f32>,
        calibration: &CalibrationModel,
        timings: &mut PipelineTimings,
    ) -> Result<(Array3<f32>, Option<PixelRepairReport>)> {
        debug!(shape = ?volume.dim(), corrector = self.corrector.name(), "Removing memory bias");

        let corrected = {
            let _span = info_span!("memory_correction", corrector = self.corrector.name()).entered();
            timings.time("memory_correction", || {
                self.corrector.correct(volume, calibration, self.config.dampening)
            })?
        };

        if !self.config.repair_pixels || corrected.is_empty() {
            return Ok((corrected, None));
        }

        let _span = info_span!("pixel_repair").entered();
        let (repaired, report) = timings.time("pixel_repair", || self.detector.repair(corrected.view()))?;
        Ok((repaired, Some(report)))
    }

    pub fn config(&self) -> &CorrectionConfig {
        &self.config
    }

    /// Replace the configuration, rebuilding the corrector from its strategy.
    pub fn set_config(&mut self, config: CorrectionConfig) -> Result<()> {
        *self = Self::new(config)?;
        Ok(())
    }

    pub fn corrector_name(&self) -> &'static str {
        self.corrector.name()
    }
}

fn detector_for(config: &CorrectionConfig) -> Result<InsensitivePixelDetector> {
    let detector = InsensitivePixelDetector::new(config.median_window, config.outlier_sample_cap)?;
    Ok(if config.mean_detection {
        detector.with_mean_detection(config.background)
    } else {
        detector
    })
}

/// One-call form of [`CorrectionPipeline::correct`] with default settings
/// apart from the strategy, dampening and repair switch.
pub fn correct<T: Sample>(
    stacks: &[Array3<T>],
    calibration: &CalibrationModel,
    data_roi: &Roi,
    strategy: CorrectionStrategy,
    dampening: f32,
    repair_pixels: bool,
) -> Result<Vec<Array3<T>>> {
    let config = CorrectionConfig::builder()
        .strategy(strategy)
        .dampening(dampening)
        .repair_pixels(repair_pixels)
        .build();
    CorrectionPipeline::new(config)?.correct(stacks, calibration, data_roi)
}

use ndarray::{Array2, Array3, ArrayView2, ArrayView3, Axis, Zip};
use rayon::prelude::*;
use tracing::{debug, info, instrument, warn};

use crate::memory_correction::common::error::{CorrectionError, Result};
use crate::memory_correction::volume::{Sample, from_working, to_working};
use super::median::{median_at, median_filter_2d};
use super::threshold::{Threshold, determine_threshold, DEFAULT_SAMPLE_CAP};

pub const DEFAULT_MEDIAN_WINDOW: usize = 3;

/// Diagnostics from one detection pass.
#[derive(Debug, Clone)]
pub struct PixelRepairReport {
    /// `|std - median_filter(std)|` per pixel, infinities zeroed
    pub deviation_distance: Array2<f32>,
    pub deviation_threshold: Threshold,
    /// Present when the mean-based secondary detection ran
    pub mean_threshold: Option<Threshold>,
    /// `true` where the pixel was judged insensitive
    pub defects: Array2<bool>,
    pub defect_count: usize,
}

impl PixelRepairReport {
    /// Some distances were non-finite and were left out of a threshold.
    pub fn degenerate(&self) -> bool {
        self.deviation_threshold.degenerate
            || self.mean_threshold.is_some_and(|t| t.degenerate)
    }

    /// `(y, x)` of every flagged pixel, row-major.
    pub fn defect_positions(&self) -> Vec<(usize, usize)> {
        self.defects
            .indexed_iter()
            .filter(|&(_, &flag)| flag)
            .map(|(pos, _)| pos)
            .collect()
    }
}

/// Finds pixels with abnormal temporal variance and replaces them with local medians.
#[derive(Debug, Clone)]
pub struct InsensitivePixelDetector {
    median_window: usize,
    sample_cap: usize,
    mean_detection: bool,
    background: f32,
}

impl Default for InsensitivePixelDetector {
    fn default() -> Self {
        Self {
            median_window: DEFAULT_MEDIAN_WINDOW,
            sample_cap: DEFAULT_SAMPLE_CAP,
            mean_detection: false,
            background: 0.0,
        }
    }
}

impl InsensitivePixelDetector {
    pub fn new(median_window: usize, sample_cap: usize) -> Result<Self> {
        if median_window == 0 || median_window % 2 == 0 {
            return Err(CorrectionError::InvalidConfiguration(format!(
                "median window must be odd and positive, got {median_window}"
            )));
        }
        if sample_cap == 0 {
            return Err(CorrectionError::InvalidConfiguration(
                "outlier sample cap must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            median_window,
            sample_cap,
            ..Self::default()
        })
    }

    /// Also flag pixels whose background-subtracted mean stands out from its neighbours.
    pub fn with_mean_detection(mut self, background: f32) -> Self {
        self.mean_detection = true;
        self.background = background;
        self
    }

    pub fn median_window(&self) -> usize {
        self.median_window
    }

    /// Flag insensitive pixels without touching the data.
    #[instrument(skip(self, volume), fields(shape = ?volume.dim()))]
    pub fn detect(&self, volume: ArrayView3<'_, f32>) -> Result<PixelRepairReport> {
        let (planes, height, width) = volume.dim();
        if planes == 0 || height == 0 || width == 0 {
            return Err(CorrectionError::EmptyInput(format!(
                "cannot detect insensitive pixels in a volume of shape {:?}",
                volume.dim()
            )));
        }

        let deviation = volume.std_axis(Axis(0), 0.0);
        let mut deviation_distance = self.local_distance(deviation.view());
        deviation_distance.mapv_inplace(|v| if v.is_infinite() { 0.0 } else { v });

        let deviation_threshold = self.threshold(&deviation_distance)?;
        let mut defects = deviation_distance.mapv(|d| d > deviation_threshold.value);

        let mean_threshold = if self.mean_detection {
            let (mean_flags, threshold) = self.detect_by_mean(&volume)?;
            Zip::from(&mut defects).and(&mean_flags).for_each(|d, &m| *d |= m);
            Some(threshold)
        } else {
            None
        };

        let defect_count = defects.iter().filter(|&&d| d).count();
        let report = PixelRepairReport {
            deviation_distance,
            deviation_threshold,
            mean_threshold,
            defects,
            defect_count,
        };

        if report.degenerate() {
            warn!("Insensitive pixel threshold saw non-finite distances; those pixels are not flagged");
        }
        info!(
            defect_count,
            threshold = report.deviation_threshold.value,
            "Insensitive pixel detection complete"
        );
        Ok(report)
    }

    /// Detect, then replace every flagged pixel in every plane with its local median.
    pub fn repair(&self, volume: ArrayView3<'_, f32>) -> Result<(Array3<f32>, PixelRepairReport)> {
        let report = self.detect(volume)?;
        let repaired = self.apply(volume, &report);
        Ok((repaired, report))
    }

    /// [`Self::repair`] for any sample type; the result keeps the input dtype.
    pub fn repair_samples<T: Sample>(&self, volume: ArrayView3<'_, T>) -> Result<(Array3<T>, PixelRepairReport)> {
        let working = to_working(volume);
        let (repaired, report) = self.repair(working.view())?;
        Ok((from_working(repaired.view()), report))
    }

    /// Replace flagged pixels of `volume` using a report from [`Self::detect`].
    pub fn apply(&self, volume: ArrayView3<'_, f32>, report: &PixelRepairReport) -> Array3<f32> {
        let mut out = volume.to_owned();
        let positions = report.defect_positions();
        if positions.is_empty() {
            return out;
        }
        debug!(pixels = positions.len(), planes = volume.dim().0, "Repairing insensitive pixels");

        let window = self.median_window;
        let planes: Vec<_> = out.axis_iter_mut(Axis(0)).collect();
        planes.into_par_iter().enumerate().for_each(|(p, mut plane)| {
            // Medians come from the untouched input plane.
            let source = volume.index_axis(Axis(0), p);
            let mut buf = Vec::with_capacity(window * window);
            for &(y, x) in &positions {
                plane[[y, x]] = median_at(&source, y, x, window, &mut buf);
            }
        });
        out
    }

    fn local_distance(&self, projection: ArrayView2<'_, f32>) -> Array2<f32> {
        let filtered = median_filter_2d(projection, self.median_window);
        let mut distance = projection.to_owned();
        Zip::from(&mut distance)
            .and(&filtered)
            .for_each(|d, &f| *d = (*d - f).abs());
        distance
    }

    fn threshold(&self, distances: &Array2<f32>) -> Result<Threshold> {
        let values: Vec<f32> = distances.iter().copied().collect();
        determine_threshold(&values, self.sample_cap)
    }

    fn detect_by_mean(&self, volume: &ArrayView3<'_, f32>) -> Result<(Array2<bool>, Threshold)> {
        let background = self.background;
        let mean = volume
            .mean_axis(Axis(0))
            .ok_or_else(|| CorrectionError::EmptyInput("mean of an empty volume".to_string()))?
            .mapv(|v| v - background);
        let filtered = median_filter_2d(mean.view(), self.median_window);

        // Relative to the local level; flat or zero neighbourhoods give non-finite ratios.
        let mut distance = mean;
        Zip::from(&mut distance).and(&filtered).for_each(|d, &f| {
            let r = (*d - f).abs() / f;
            *d = if r.is_finite() { r } else { 0.0 };
        });

        let threshold = self.threshold(&distance)?;
        debug!(threshold = threshold.value, "Mean-based threshold");
        Ok((distance.mapv(|d| d > threshold.value), threshold))
    }
}

//! Insensitive pixel detection and repair
//!
//! A spatially static defective pixel shows a temporal standard deviation that
//! disagrees with its neighbours'. Pixels whose deviation from the local median
//! exceeds an adaptive knee threshold are replaced, plane by plane, with the
//! median of their neighbourhood.

mod median;
mod threshold;
mod detector;

pub use median::{median_at, median_filter_2d};
pub use threshold::{Threshold, determine_threshold, DEFAULT_SAMPLE_CAP};
pub use detector::{InsensitivePixelDetector, PixelRepairReport, DEFAULT_MEDIAN_WINDOW};

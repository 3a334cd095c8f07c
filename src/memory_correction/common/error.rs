use thiserror::Error;

use crate::memory_correction::roi::Roi;

#[derive(Error, Debug)]
pub enum CorrectionError {
    #[error("Channel volumes differ in shape: {0}")]
    ShapeMismatch(String),

    #[error("Volume planes are {volume:?} (height, width) but calibration maps are {calibration:?}")]
    DimensionMismatch {
        volume: (usize, usize),
        calibration: (usize, usize),
    },

    #[error("Calibration ROI {calibration} does not cover data ROI {data}")]
    RoiOutOfBounds { calibration: Roi, data: Roi },

    #[error("Calibration data has shape {found:?}, expected {expected}")]
    CalibrationShape { expected: String, found: Vec<usize> },

    #[error("Invalid ROI: {0}")]
    InvalidRoi(String),

    #[error("Empty input: {0}")]
    EmptyInput(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("CUDA error: {0}")]
    CudaError(String),

    #[error("Failed to read input file: {0}")]
    InputReadError(String),

    #[error("Failed to write output file: {0}")]
    OutputWriteError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Coarse classification used by callers deciding whether to retry with other input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Configuration,
    Device,
    Io,
}

impl CorrectionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ShapeMismatch(_)
            | Self::DimensionMismatch { .. }
            | Self::RoiOutOfBounds { .. }
            | Self::CalibrationShape { .. }
            | Self::InvalidRoi(_)
            | Self::EmptyInput(_) => ErrorKind::Validation,
            Self::InvalidConfiguration(_) => ErrorKind::Configuration,
            Self::CudaError(_) => ErrorKind::Device,
            Self::InputReadError(_) | Self::OutputWriteError(_) | Self::IoError(_) => ErrorKind::Io,
        }
    }
}

pub type Result<T> = std::result::Result<T, CorrectionError>;

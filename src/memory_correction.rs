//! Memory-effect ("sticky pixel") correction engine
//!
//! The pieces, leaves first: [`roi`] and [`calibration`] describe the per-pixel
//! sensor model, [`volume`] interleaves channel stacks into acquisition order,
//! [`correction`] removes the memory bias with one of three strategies, and
//! [`pixel_repair`] finds and repairs insensitive pixels. [`pipeline`] ties them
//! together; [`stack_io`] reads and writes TIFF stacks for the binary.

pub mod common;
pub mod roi;
pub mod calibration;
pub mod volume;
pub mod correction;
pub mod pixel_repair;
pub mod config;
pub mod pipeline;
pub mod timing;
pub mod stack_io;

pub use common::{
    CorrectionError,
    ErrorKind,
    Result,
};

pub use roi::{Roi, offset_between};

pub use calibration::{CalibrationModel, CropAlignment};

pub use volume::{Sample, interleave, deinterleave};

pub use correction::{
    CorrectionStrategy,
    MemoryCorrector,
    ScalarCorrector,
    VectorizedCorrector,
    ParallelCorrector,
};

#[cfg(jetson_cuda)]
pub use correction::CudaCorrector;

pub use pixel_repair::{
    InsensitivePixelDetector,
    PixelRepairReport,
    Threshold,
    determine_threshold,
};

pub use config::{CorrectionConfig, CorrectionConfigBuilder};

pub use pipeline::{CorrectionOutput, CorrectionPipeline, correct};

pub use timing::{PipelineTimings, StepTiming, Timer};

pub use stack_io::{
    StackCompression,
    StackReader,
    StackWriter,
    TiffStackReader,
    TiffStackWriter,
};

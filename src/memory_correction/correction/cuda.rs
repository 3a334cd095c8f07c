use cudarc::driver::safe::*;
use cudarc::nvrtc::Ptx;
use ndarray::{Array3, ArrayView3};
use std::sync::Arc;
use tracing::debug;

use crate::memory_correction::calibration::CalibrationModel;
use crate::memory_correction::common::error::{CorrectionError, Result};
use super::{MemoryCorrector, validate_inputs};

const BLOCK: usize = 32;

fn cuda_err(e: impl std::fmt::Display) -> CorrectionError {
    CorrectionError::CudaError(e.to_string())
}

/// CUDA memory correction.
///
/// The raw volume is uploaded once; each launch covers `plane_batch` planes,
/// one thread per pixel walking its planes in order.
pub struct CudaCorrector {
    stream: Arc<CudaStream>,
    kernel: CudaFunction,
    plane_batch: usize,
}

impl CudaCorrector {
    /// Initialize CUDA context and load kernel
    pub fn new(plane_batch: usize) -> Result<Self> {
        // Include compiled PTX from build.rs
        let ptx = include_str!(concat!(env!("OUT_DIR"), "/sticky_correct.ptx"));
        let kernel_name = "sticky_correct";

        let ctx = CudaContext::new(0).map_err(cuda_err)?;
        let stream = ctx.default_stream();
        let module = ctx.load_module(Ptx::from_src(ptx)).map_err(cuda_err)?;
        let kernel = module.load_function(kernel_name).map_err(cuda_err)?;

        Ok(Self {
            stream,
            kernel,
            plane_batch: plane_batch.max(1),
        })
    }
}

impl MemoryCorrector for CudaCorrector {
    fn name(&self) -> &'static str {
        "cuda"
    }

    fn correct(
        &self,
        volume: ArrayView3<'_, f32>,
        calibration: &CalibrationModel,
        dampening: f32,
    ) -> Result<Array3<f32>> {
        validate_inputs(&volume, calibration)?;
        let (planes, height, width) = volume.dim();
        if planes == 0 {
            return Ok(Array3::zeros(volume.dim()));
        }
        debug!(planes, height, width, batch = self.plane_batch, "Running CUDA correction");

        // Copy inputs to GPU in row-major order
        let raw: Vec<f32> = volume.iter().copied().collect();
        let gain: Vec<f32> = calibration.gain().iter().copied().collect();
        let decay_rate: Vec<f32> = calibration.decay_rate().iter().copied().collect();
        let dark_offset: Vec<f32> = calibration.dark_offset().iter().copied().collect();

        let d_raw = self.stream.clone_htod(&raw).map_err(cuda_err)?;
        let d_gain = self.stream.clone_htod(&gain).map_err(cuda_err)?;
        let d_decay = self.stream.clone_htod(&decay_rate).map_err(cuda_err)?;
        let d_offset = self.stream.clone_htod(&dark_offset).map_err(cuda_err)?;
        let mut d_out = self
            .stream
            .alloc_zeros::<f32>(planes * height * width)
            .map_err(cuda_err)?;

        let cfg = LaunchConfig {
            grid_dim: (
                width.div_ceil(BLOCK) as u32,
                height.div_ceil(BLOCK) as u32,
                1,
            ),
            block_dim: (BLOCK as u32, BLOCK as u32, 1),
            shared_mem_bytes: 0,
        };

        let width_i32 = width as i32;
        let height_i32 = height as i32;

        // Launches on one stream run in order, so batch n sees batch n-1 finished.
        for z_start in (0..planes).step_by(self.plane_batch) {
            let z_count = self.plane_batch.min(planes - z_start) as i32;
            let z_start = z_start as i32;

            let mut launch_args = self.stream.launch_builder(&self.kernel);
            launch_args.arg(&d_raw);
            launch_args.arg(&mut d_out);
            launch_args.arg(&d_gain);
            launch_args.arg(&d_decay);
            launch_args.arg(&d_offset);
            launch_args.arg(&dampening);
            launch_args.arg(&width_i32);
            launch_args.arg(&height_i32);
            launch_args.arg(&z_start);
            launch_args.arg(&z_count);

            unsafe { launch_args.launch(cfg) }.map_err(cuda_err)?;
        }

        // Copy back from GPU
        let host = self.stream.clone_dtoh(&d_out).map_err(cuda_err)?;
        Array3::from_shape_vec((planes, height, width), host).map_err(cuda_err)
    }
}

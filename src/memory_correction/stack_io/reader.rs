use std::path::Path;

use ndarray::Array3;

use crate::memory_correction::common::error::Result;

pub trait StackReader {
    /// Read integer camera data as `(planes, height, width)`.
    fn read_u16(&self, path: &Path) -> Result<Array3<u16>>;

    /// Read any supported sample type, converted to `f32`.
    fn read_f32(&self, path: &Path) -> Result<Array3<f32>>;
}

use std::path::Path;

use ndarray::ArrayView3;

use crate::memory_correction::common::error::Result;

pub trait StackWriter {
    fn write_u16(&self, stack: ArrayView3<'_, u16>, path: &Path) -> Result<()>;
    fn write_f32(&self, stack: ArrayView3<'_, f32>, path: &Path) -> Result<()>;
}

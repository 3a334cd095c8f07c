use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use ndarray::{Array3, ArrayView3, Axis};
use tiff::decoder::{Decoder, DecodingResult};
use tiff::encoder::{TiffEncoder, colortype};
use tracing::debug;

use crate::memory_correction::common::error::{CorrectionError, Result};
use crate::memory_correction::stack_io::reader::StackReader;
use crate::memory_correction::stack_io::types::StackCompression;
use crate::memory_correction::stack_io::writer::StackWriter;
use crate::memory_correction::volume::Sample;

/// Reads every page of a grayscale TIFF as one plane.
pub struct TiffStackReader;

/// Writes one grayscale page per plane.
#[derive(Default)]
pub struct TiffStackWriter {
    pub compression: StackCompression,
}

fn read_error(path: &Path, e: impl std::fmt::Display) -> CorrectionError {
    CorrectionError::InputReadError(format!("{}: {}", path.display(), e))
}

fn write_error(path: &Path, e: impl std::fmt::Display) -> CorrectionError {
    CorrectionError::OutputWriteError(format!("{}: {}", path.display(), e))
}

fn convert_page<T: Sample>(page: DecodingResult, path: &Path) -> Result<Vec<T>> {
    Ok(match page {
        DecodingResult::U8(v) => v.into_iter().map(|s| T::from_f32(s as f32)).collect(),
        DecodingResult::U16(v) => v.into_iter().map(|s| T::from_f32(s as f32)).collect(),
        DecodingResult::U32(v) => v.into_iter().map(|s| T::from_f32(s as f32)).collect(),
        DecodingResult::F32(v) => v.into_iter().map(T::from_f32).collect(),
        DecodingResult::F64(v) => v.into_iter().map(|s| T::from_f32(s as f32)).collect(),
        _ => return Err(read_error(path, "unsupported sample format")),
    })
}

impl TiffStackReader {
    fn read_planes<T: Sample>(&self, path: &Path, convert: fn(DecodingResult, &Path) -> Result<Vec<T>>) -> Result<Array3<T>> {
        let file = File::open(path).map_err(|e| read_error(path, e))?;
        let mut decoder = Decoder::new(BufReader::new(file)).map_err(|e| read_error(path, e))?;

        let (width, height) = decoder.dimensions().map_err(|e| read_error(path, e))?;
        let mut data = Vec::new();
        let mut planes = 0usize;

        loop {
            let dims = decoder.dimensions().map_err(|e| read_error(path, e))?;
            if dims != (width, height) {
                return Err(CorrectionError::ShapeMismatch(format!(
                    "{}: page {} is {:?}, first page is {:?}",
                    path.display(),
                    planes,
                    dims,
                    (width, height)
                )));
            }

            let page = decoder.read_image().map_err(|e| read_error(path, e))?;
            let samples = convert(page, path)?;
            if samples.len() != width as usize * height as usize {
                return Err(read_error(path, "only single-channel pages are supported"));
            }
            data.extend(samples);
            planes += 1;

            if !decoder.more_images() {
                break;
            }
            decoder.next_image().map_err(|e| read_error(path, e))?;
        }

        debug!(path = %path.display(), planes, width, height, "Read TIFF stack");
        Array3::from_shape_vec((planes, height as usize, width as usize), data)
            .map_err(|e| read_error(path, e))
    }
}

impl StackReader for TiffStackReader {
    fn read_u16(&self, path: &Path) -> Result<Array3<u16>> {
        self.read_planes(path, convert_page::<u16>)
    }

    fn read_f32(&self, path: &Path) -> Result<Array3<f32>> {
        self.read_planes(path, convert_page::<f32>)
    }
}

impl TiffStackWriter {
    pub fn new(compression: StackCompression) -> Self {
        Self { compression }
    }

    fn encoder(&self, path: &Path) -> Result<TiffEncoder<BufWriter<File>>> {
        let file = File::create(path).map_err(|e| write_error(path, e))?;
        Ok(TiffEncoder::new(BufWriter::new(file))
            .map_err(|e| write_error(path, e))?
            .with_compression(self.compression.to_tiff()))
    }
}

impl StackWriter for TiffStackWriter {
    fn write_u16(&self, stack: ArrayView3<'_, u16>, path: &Path) -> Result<()> {
        let (planes, height, width) = stack.dim();
        debug!(path = %path.display(), planes, height, width, "Writing u16 TIFF stack");
        let mut encoder = self.encoder(path)?;
        for plane in stack.axis_iter(Axis(0)) {
            let samples: Vec<u16> = plane.iter().copied().collect();
            encoder
                .write_image::<colortype::Gray16>(width as u32, height as u32, &samples)
                .map_err(|e| write_error(path, e))?;
        }
        Ok(())
    }

    fn write_f32(&self, stack: ArrayView3<'_, f32>, path: &Path) -> Result<()> {
        let (planes, height, width) = stack.dim();
        debug!(path = %path.display(), planes, height, width, "Writing f32 TIFF stack");
        let mut encoder = self.encoder(path)?;
        for plane in stack.axis_iter(Axis(0)) {
            let samples: Vec<f32> = plane.iter().copied().collect();
            encoder
                .write_image::<colortype::Gray32Float>(width as u32, height as u32, &samples)
                .map_err(|e| write_error(path, e))?;
        }
        Ok(())
    }
}

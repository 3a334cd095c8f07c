//! Stack file I/O
//!
//! Multi-page grayscale TIFF reading and writing, one page per plane. The
//! correction engine never touches files; the binary uses these collaborators.

mod reader;
mod writer;
mod tiff_stack;
pub mod types;

pub use reader::StackReader;
pub use writer::StackWriter;
pub use tiff_stack::{TiffStackReader, TiffStackWriter};
pub use types::StackCompression;

//! Stack writing options

/// TIFF compression methods
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StackCompression {
    /// No compression (fastest, largest file)
    #[default]
    None,
    /// LZW compression (slow, good compression)
    Lzw,
    /// Deflate compression, balanced level
    Deflate,
}

impl StackCompression {
    pub(crate) fn to_tiff(self) -> tiff::encoder::Compression {
        match self {
            Self::None => tiff::encoder::Compression::Uncompressed,
            Self::Lzw => tiff::encoder::Compression::Lzw,
            Self::Deflate => tiff::encoder::Compression::Deflate(
                tiff::encoder::compression::DeflateLevel::Balanced,
            ),
        }
    }
}

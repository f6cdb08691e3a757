//! Binary program images.
//!
//! An image is a flat sequence of 32-bit instruction words with no header.
//! Its size must be a multiple of 4 bytes. Words are little-endian by
//! default, matching an image loaded directly into memory on x86.

use serde::{Serialize, Deserialize};
use std::io::Write;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

/// Byte order of the words inside an image file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ByteOrder {
    #[default]
    Little,
    Big,
}

impl ByteOrder {
    /// Assemble a word from its four bytes in file order.
    #[inline]
    pub fn read_word(self, bytes: [u8; 4]) -> u32 {
        match self {
            ByteOrder::Little => u32::from_le_bytes(bytes),
            ByteOrder::Big => u32::from_be_bytes(bytes),
        }
    }

    /// Split a word into its four bytes in file order.
    #[inline]
    pub fn write_word(self, word: u32) -> [u8; 4] {
        match self {
            ByteOrder::Little => word.to_le_bytes(),
            ByteOrder::Big => word.to_be_bytes(),
        }
    }
}

/// A loaded program image.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgramImage {
    /// The raw instruction words, in file order.
    pub words: Vec<u32>,
}

impl ProgramImage {
    /// Create an image from words.
    pub fn new(words: Vec<u32>) -> Self {
        Self { words }
    }

    /// Parse an in-memory buffer.
    pub fn from_bytes(bytes: &[u8], order: ByteOrder) -> Result<Self, ImageError> {
        if bytes.len() % 4 != 0 {
            return Err(ImageError::InvalidSize(bytes.len() as u64));
        }
        let words = bytes
            .chunks_exact(4)
            .map(|c| order.read_word([c[0], c[1], c[2], c[3]]))
            .collect();
        Ok(Self { words })
    }

    /// Serialise to bytes.
    pub fn to_bytes(&self, order: ByteOrder) -> Vec<u8> {
        self.words
            .iter()
            .flat_map(|&w| order.write_word(w))
            .collect()
    }

    /// Get the number of instructions.
    pub fn len(&self) -> usize {
        self.words.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}

/// Load an image file from disk.
///
/// The size is checked before anything is read, so a malformed file
/// never produces instructions.
pub fn load_image<P: AsRef<Path>>(path: P, order: ByteOrder) -> Result<ProgramImage, ImageError> {
    let path = path.as_ref();
    let file = std::fs::File::open(path)
        .map_err(|e| ImageError::Open(e.to_string()))?;

    let size = file
        .metadata()
        .map_err(|e| ImageError::Read(e.to_string()))?
        .len();
    if size % 4 != 0 {
        return Err(ImageError::InvalidSize(size));
    }

    let bytes = std::fs::read(path).map_err(|e| ImageError::Read(e.to_string()))?;
    if bytes.len() as u64 != size {
        return Err(ImageError::Read(format!(
            "expected {} bytes, read {}",
            size,
            bytes.len()
        )));
    }

    let image = ProgramImage::from_bytes(&bytes, order)?;
    debug!(path = %path.display(), instructions = image.len(), "image loaded");
    Ok(image)
}

/// Save an image file to disk.
pub fn save_image<P: AsRef<Path>>(
    path: P,
    image: &ProgramImage,
    order: ByteOrder,
) -> Result<(), ImageError> {
    let mut file = std::fs::File::create(path.as_ref())
        .map_err(|e| ImageError::Write(e.to_string()))?;
    file.write_all(&image.to_bytes(order))
        .map_err(|e| ImageError::Write(e.to_string()))?;
    Ok(())
}

/// Errors that can occur while loading or saving images.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ImageError {
    #[error("unable to open input file ({0})")]
    Open(String),

    #[error("invalid input file (size {0} is not a multiple of 4)")]
    InvalidSize(u64),

    #[error("unable to read file ({0})")]
    Read(String),

    #[error("unable to write file ({0})")]
    Write(String),
}

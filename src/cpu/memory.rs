//! Stack memory.
//!
//! The machine has a single 1024-byte region that backs the stack. Words
//! are stored little-endian. Every access is bounds-checked: a 4-byte
//! access must lie entirely inside `[0, 1024)`.

use serde::{Serialize, Deserialize};
use thiserror::Error;

/// The number of bytes of memory.
pub const MEMORY_SIZE: usize = 1024;

/// Width of a word access in bytes.
pub const WORD_SIZE: usize = 4;

/// Byte-addressable stack memory.
///
/// Serializes as a flat byte array; deserializing rejects any length other
/// than [`MEMORY_SIZE`].
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<u8>", into = "Vec<u8>")]
pub struct Memory {
    bytes: Vec<u8>,
}

impl Memory {
    /// Create a new memory with all bytes zeroed.
    pub fn new() -> Self {
        Self {
            bytes: vec![0; MEMORY_SIZE],
        }
    }

    /// Read one byte.
    pub fn read_byte(&self, addr: i64) -> Result<u8, MemoryError> {
        let index = Self::check(addr, 1)?;
        Ok(self.bytes[index])
    }

    /// Write one byte.
    pub fn write_byte(&mut self, addr: i64, value: u8) -> Result<(), MemoryError> {
        let index = Self::check(addr, 1)?;
        self.bytes[index] = value;
        Ok(())
    }

    /// Read a little-endian word.
    pub fn read_word(&self, addr: i64) -> Result<i32, MemoryError> {
        let index = Self::check(addr, WORD_SIZE)?;
        let mut raw = [0u8; WORD_SIZE];
        raw.copy_from_slice(&self.bytes[index..index + WORD_SIZE]);
        Ok(i32::from_le_bytes(raw))
    }

    /// Write a little-endian word.
    pub fn write_word(&mut self, addr: i64, value: i32) -> Result<(), MemoryError> {
        let index = Self::check(addr, WORD_SIZE)?;
        self.bytes[index..index + WORD_SIZE].copy_from_slice(&value.to_le_bytes());
        Ok(())
    }

    /// Validate an access of `width` bytes at `addr` and return its index.
    fn check(addr: i64, width: usize) -> Result<usize, MemoryError> {
        if addr < 0 || addr as u64 + width as u64 > MEMORY_SIZE as u64 {
            return Err(MemoryError::AddressOutOfRange { addr, width });
        }
        Ok(addr as usize)
    }

    /// Clear all memory to zeros.
    pub fn clear(&mut self) {
        self.bytes.fill(0);
    }

    /// Raw byte view.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Dump aligned words starting at `start` (for debugging).
    pub fn dump_words(&self, start: usize, count: usize) -> Vec<(usize, i32)> {
        (0..count)
            .map(|i| start + i * WORD_SIZE)
            .take_while(|addr| addr + WORD_SIZE <= MEMORY_SIZE)
            .filter_map(|addr| self.read_word(addr as i64).ok().map(|w| (addr, w)))
            .collect()
    }
}

impl Default for Memory {
    fn default() -> Self {
        Self::new()
    }
}

impl TryFrom<Vec<u8>> for Memory {
    type Error = MemoryError;

    fn try_from(bytes: Vec<u8>) -> Result<Self, Self::Error> {
        if bytes.len() != MEMORY_SIZE {
            return Err(MemoryError::WrongSize(bytes.len()));
        }
        Ok(Self { bytes })
    }
}

impl From<Memory> for Vec<u8> {
    fn from(mem: Memory) -> Self {
        mem.bytes
    }
}

impl std::fmt::Debug for Memory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Only count non-zero bytes
        let non_zero = self.bytes.iter().filter(|&&b| b != 0).count();

        f.debug_struct("Memory")
            .field("non_zero_bytes", &non_zero)
            .field("total_bytes", &MEMORY_SIZE)
            .finish()
    }
}

/// Errors that can occur during memory operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MemoryError {
    /// Access is not fully inside the memory region.
    #[error("memory access of {width} bytes at address {addr} out of range (0-1023)")]
    AddressOutOfRange { addr: i64, width: usize },

    #[error("memory image holds {0} bytes, expected 1024")]
    WrongSize(usize),
}

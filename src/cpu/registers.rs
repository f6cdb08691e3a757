//! Register file.
//!
//! The machine has 17 signed 32-bit registers:
//! - 0-5, 7-15: general purpose
//! - 6: stack pointer (`%esp`)
//! - 16: flags word, written by `cmpl` and read by the conditional jumps

use crate::alu::Flags;
use serde::{Serialize, Deserialize};
use thiserror::Error;

/// Number of registers, including the stack pointer and flags.
pub const NUM_REGS: usize = 17;

/// Index of the stack pointer.
pub const SP: usize = 6;

/// Index of the flags register.
pub const FLAGS: usize = 16;

/// Size of the stack region in bytes; also the empty-stack pointer value.
pub const STACK_SIZE: i32 = 1024;

/// The register file.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registers {
    values: [i32; NUM_REGS],
}

impl Registers {
    /// Create a register file in its power-on state: everything zero
    /// except the stack pointer, which points at the top of the empty stack.
    pub fn new() -> Self {
        let mut values = [0; NUM_REGS];
        values[SP] = STACK_SIZE;
        Self { values }
    }

    /// Reset to the power-on state.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Read a register by operand index.
    #[inline]
    pub fn read(&self, index: u8) -> Result<i32, RegisterError> {
        self.values
            .get(usize::from(index))
            .copied()
            .ok_or(RegisterError::InvalidIndex(index))
    }

    /// Write a register by operand index.
    #[inline]
    pub fn write(&mut self, index: u8, value: i32) -> Result<(), RegisterError> {
        let slot = self.values
            .get_mut(usize::from(index))
            .ok_or(RegisterError::InvalidIndex(index))?;
        *slot = value;
        Ok(())
    }

    /// Current stack pointer.
    #[inline]
    pub fn sp(&self) -> i32 {
        self.values[SP]
    }

    /// Set the stack pointer.
    #[inline]
    pub fn set_sp(&mut self, value: i32) {
        self.values[SP] = value;
    }

    /// True when nothing has been pushed: `ret` here ends the program.
    #[inline]
    pub fn stack_is_empty(&self) -> bool {
        self.values[SP] == STACK_SIZE
    }

    /// Current flag word.
    #[inline]
    pub fn flags(&self) -> Flags {
        Flags::from_bits(self.values[FLAGS] as u32)
    }

    /// Replace the flag word.
    #[inline]
    pub fn set_flags(&mut self, flags: Flags) {
        self.values[FLAGS] = flags.bits() as i32;
    }

    /// All register values, in index order.
    pub fn as_slice(&self) -> &[i32] {
        &self.values
    }

    /// Conventional display name for a register index.
    pub fn name(index: u8) -> String {
        match usize::from(index) {
            SP => "%esp".to_string(),
            FLAGS => "%eflags".to_string(),
            _ => format!("%r{}", index),
        }
    }
}

impl Default for Registers {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Registers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut map = f.debug_map();
        for (i, value) in self.values.iter().enumerate() {
            map.entry(&Self::name(i as u8), value);
        }
        map.finish()
    }
}

/// Errors raised by register access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RegisterError {
    #[error("register index {0} out of range (0-16)")]
    InvalidIndex(u8),
}

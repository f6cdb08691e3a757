//! CPU emulation for the simulated machine.
//!
//! This module implements the complete machine model:
//! - 17 registers, with the stack pointer at index 6 and flags at index 16
//! - 1024 bytes of little-endian stack memory
//! - 22-instruction set in a fixed 32-bit encoding

pub mod memory;
pub mod registers;
pub mod decode;
pub mod console;
pub mod execute;

pub use memory::{Memory, MemoryError};
pub use registers::{Registers, RegisterError};
pub use decode::{Instruction, Opcode, DecodeError};
pub use console::{Console, ConsoleError, StdConsole, BufferedConsole};
pub use execute::{Cpu, CpuError, CpuState, HaltReason, StepOutcome};

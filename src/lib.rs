//! # mini86
//!
//! A simulator for a small x86-like instruction set.
//!
//! Programs are flat images of 32-bit instruction words. Each word is
//! decoded into an [`Instruction`] and executed against a 17-register
//! file and 1024 bytes of stack memory, with x86-style condition flags,
//! relative branches and stack-based call/return.

pub mod alu;
pub mod cpu;
pub mod asm;
pub mod config;
pub mod driver;

#[cfg(feature = "tui")]
pub mod tui;

// Re-export commonly used types
pub use alu::{Condition, Flags};
pub use cpu::{
    BufferedConsole, Console, Cpu, CpuError, CpuState, HaltReason, Instruction, Memory, Opcode,
    Registers, StdConsole, StepOutcome,
};
pub use asm::{assemble, disassemble, AssemblerError, ByteOrder, ProgramImage, load_image, save_image};
pub use config::SimConfig;
pub use driver::{run_file, run_program, RunReport, SimError};

#[cfg(feature = "tui")]
pub use tui::run_debugger;

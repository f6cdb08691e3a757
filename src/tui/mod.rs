//! TUI debugger for the simulator.
//!
//! Provides an interactive terminal-based debugger with:
//! - Register file and decoded flags
//! - Stack memory view with the stack pointer marked
//! - Step/run/breakpoint controls
//! - Disassembly view and captured program output

mod app;
mod ui;

pub use app::{DebuggerApp, run_debugger};

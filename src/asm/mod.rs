//! Program images, assembler and disassembler.
//!
//! This module provides:
//! - The binary image format (flat 32-bit words) with loader and writer
//! - A two-pass assembler (text → instruction words)
//! - A disassembler (instruction words → readable text)

pub mod assembler;
pub mod disasm;
pub mod image;

pub use assembler::{assemble, AssemblerError};
pub use disasm::{disassemble, format_instruction, list_fields};
pub use image::{ByteOrder, ImageError, ProgramImage, load_image, save_image};

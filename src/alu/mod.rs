//! Integer ALU primitives.
//!
//! This module provides the pieces of the machine that are pure arithmetic:
//! - [`Flags`] - The bit-packed status word written by `cmpl`
//! - [`Condition`] - Branch predicates evaluated against [`Flags`]
//! - [`arith`] - Two's complement compare and shift helpers

mod flags;
pub mod arith;

pub use flags::{Condition, Flags};
pub use arith::{compare, shift_right_logical};

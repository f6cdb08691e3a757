//! Status flags and branch conditions.
//!
//! The flags word keeps the x86 bit positions:
//! - bit 0: Carry (CF)
//! - bit 6: Zero (ZF)
//! - bit 7: Sign (SF)
//! - bit 11: Overflow (OF)
//!
//! Every other bit is always zero after a compare.

use std::fmt;
use serde::{Serialize, Deserialize};

/// Bit-packed condition flags.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Flags(u32);

impl Flags {
    /// Carry flag bit.
    pub const CARRY: u32 = 1 << 0;
    /// Zero flag bit.
    pub const ZERO: u32 = 1 << 6;
    /// Sign flag bit.
    pub const SIGN: u32 = 1 << 7;
    /// Overflow flag bit.
    pub const OVERFLOW: u32 = 1 << 11;

    /// Mask of all defined flag bits.
    pub const MASK: u32 = Self::CARRY | Self::ZERO | Self::SIGN | Self::OVERFLOW;

    /// All flags clear.
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Build a flag word from individual flags.
    pub const fn new(carry: bool, zero: bool, sign: bool, overflow: bool) -> Self {
        let mut bits = 0;
        if carry {
            bits |= Self::CARRY;
        }
        if zero {
            bits |= Self::ZERO;
        }
        if sign {
            bits |= Self::SIGN;
        }
        if overflow {
            bits |= Self::OVERFLOW;
        }
        Self(bits)
    }

    /// Interpret a raw register value as a flag word.
    ///
    /// Undefined bits are kept so that a register written by other means
    /// reads back unchanged; the accessors only look at their own bit.
    #[inline]
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    /// Raw bit pattern.
    #[inline]
    pub const fn bits(self) -> u32 {
        self.0
    }

    #[inline]
    pub const fn carry(self) -> bool {
        self.0 & Self::CARRY != 0
    }

    #[inline]
    pub const fn zero(self) -> bool {
        self.0 & Self::ZERO != 0
    }

    #[inline]
    pub const fn sign(self) -> bool {
        self.0 & Self::SIGN != 0
    }

    #[inline]
    pub const fn overflow(self) -> bool {
        self.0 & Self::OVERFLOW != 0
    }

    /// Set or clear a single flag bit.
    pub fn set(&mut self, bit: u32, value: bool) {
        if value {
            self.0 |= bit;
        } else {
            self.0 &= !bit;
        }
    }
}

impl fmt::Debug for Flags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Flags(0x{:03x} ", self.0)?;
        fmt::Display::fmt(self, f)?;
        write!(f, ")")
    }
}

impl fmt::Display for Flags {
    /// Prints `CZSO` with a `-` for each clear flag.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let pick = |set: bool, c: char| if set { c } else { '-' };
        write!(
            f,
            "{}{}{}{}",
            pick(self.carry(), 'C'),
            pick(self.zero(), 'Z'),
            pick(self.sign(), 'S'),
            pick(self.overflow(), 'O'),
        )
    }
}

/// Branch predicate of a conditional (or unconditional) jump.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Condition {
    /// `je`: ZF
    Equal,
    /// `jl`: SF xor OF
    Less,
    /// `jle`: (SF xor OF) or ZF
    LessOrEqual,
    /// `jge`: not (SF xor OF)
    GreaterOrEqual,
    /// `jbe`: CF or ZF
    BelowOrEqual,
    /// `jmp`
    Always,
}

impl Condition {
    /// Evaluate the predicate against a flag word.
    pub fn holds(self, flags: Flags) -> bool {
        let less = flags.sign() ^ flags.overflow();
        match self {
            Condition::Equal => flags.zero(),
            Condition::Less => less,
            Condition::LessOrEqual => less || flags.zero(),
            Condition::GreaterOrEqual => !less,
            Condition::BelowOrEqual => flags.carry() || flags.zero(),
            Condition::Always => true,
        }
    }
}

//! Instruction decoder.
//!
//! Every instruction is one 32-bit word, fields packed from the top bit down:
//!
//! ```text
//!  31     27 26     22 21     17 16 15                0
//! +---------+---------+---------+--+-------------------+
//! | opcode  |  reg1   |  reg2   |--|     immediate     |
//! +---------+---------+---------+--+-------------------+
//! ```
//!
//! The immediate is the low 16 bits read as a signed value; bit 16 is unused.
//! Decoding never fails: the opcode is checked when the instruction executes.

use serde::{Serialize, Deserialize};
use thiserror::Error;

const OPCODE_SHIFT: u32 = 27;
const REG1_SHIFT: u32 = 22;
const REG2_SHIFT: u32 = 17;
const FIELD_MASK: u32 = 0b1_1111;
const IMMEDIATE_MASK: u32 = 0xFFFF;

/// The operations of the instruction set, numbered by their opcode field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Opcode {
    /// reg1 := reg1 - imm
    Subl = 0,
    /// reg2 := reg1 + reg2
    AddlRegReg = 1,
    /// reg1 := reg1 + imm
    AddlImmReg = 2,
    /// reg2 := reg1 * reg2
    Imull = 3,
    /// reg1 := unsigned(reg1) >> 1
    Shrl = 4,
    /// reg2 := reg1
    MovlRegReg = 5,
    /// reg2 := mem[reg1 + imm]
    MovlDerefReg = 6,
    /// mem[reg2 + imm] := reg1
    MovlRegDeref = 7,
    /// reg1 := imm
    MovlImmReg = 8,
    /// flags := reg2 - reg1
    Cmpl = 9,
    Je = 10,
    Jl = 11,
    Jle = 12,
    Jge = 13,
    Jbe = 14,
    Jmp = 15,
    /// Push return address, branch by imm
    Call = 16,
    /// Pop return address, or halt on an empty stack
    Ret = 17,
    Pushl = 18,
    Popl = 19,
    /// Print reg1 as `<decimal> (0x<hex>)`
    Printr = 20,
    /// Read a decimal integer into reg1
    Readr = 21,
}

impl Opcode {
    /// Every opcode, in numeric order.
    pub const ALL: [Opcode; 22] = [
        Opcode::Subl,
        Opcode::AddlRegReg,
        Opcode::AddlImmReg,
        Opcode::Imull,
        Opcode::Shrl,
        Opcode::MovlRegReg,
        Opcode::MovlDerefReg,
        Opcode::MovlRegDeref,
        Opcode::MovlImmReg,
        Opcode::Cmpl,
        Opcode::Je,
        Opcode::Jl,
        Opcode::Jle,
        Opcode::Jge,
        Opcode::Jbe,
        Opcode::Jmp,
        Opcode::Call,
        Opcode::Ret,
        Opcode::Pushl,
        Opcode::Popl,
        Opcode::Printr,
        Opcode::Readr,
    ];

    /// Assembly mnemonic.
    pub fn mnemonic(self) -> &'static str {
        match self {
            Opcode::Subl => "subl",
            Opcode::AddlRegReg | Opcode::AddlImmReg => "addl",
            Opcode::Imull => "imull",
            Opcode::Shrl => "shrl",
            Opcode::MovlRegReg
            | Opcode::MovlDerefReg
            | Opcode::MovlRegDeref
            | Opcode::MovlImmReg => "movl",
            Opcode::Cmpl => "cmpl",
            Opcode::Je => "je",
            Opcode::Jl => "jl",
            Opcode::Jle => "jle",
            Opcode::Jge => "jge",
            Opcode::Jbe => "jbe",
            Opcode::Jmp => "jmp",
            Opcode::Call => "call",
            Opcode::Ret => "ret",
            Opcode::Pushl => "pushl",
            Opcode::Popl => "popl",
            Opcode::Printr => "printr",
            Opcode::Readr => "readr",
        }
    }
}

impl TryFrom<u8> for Opcode {
    type Error = DecodeError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Opcode::ALL
            .get(usize::from(value))
            .copied()
            .ok_or(DecodeError::InvalidOpcode(value))
    }
}

impl From<Opcode> for u8 {
    fn from(op: Opcode) -> u8 {
        op as u8
    }
}

/// A decoded instruction word.
///
/// Fields hold whatever the word contained; `opcode` is the raw 5-bit
/// field, so an image with an undefined opcode still decodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Instruction {
    pub opcode: u8,
    pub first_register: u8,
    pub second_register: u8,
    pub immediate: i16,
}

impl Instruction {
    /// Build an instruction from a known opcode.
    pub fn new(op: Opcode, first_register: u8, second_register: u8, immediate: i16) -> Self {
        Self {
            opcode: op.into(),
            first_register,
            second_register,
            immediate,
        }
    }

    /// The operation this instruction selects.
    pub fn operation(&self) -> Result<Opcode, DecodeError> {
        Opcode::try_from(self.opcode)
    }
}

/// Decode one instruction word.
pub fn decode(word: u32) -> Instruction {
    Instruction {
        opcode: ((word >> OPCODE_SHIFT) & FIELD_MASK) as u8,
        first_register: ((word >> REG1_SHIFT) & FIELD_MASK) as u8,
        second_register: ((word >> REG2_SHIFT) & FIELD_MASK) as u8,
        immediate: (word & IMMEDIATE_MASK) as u16 as i16,
    }
}

/// Encode an instruction back to a word. Fields wider than 5 bits are masked.
pub fn encode(instr: &Instruction) -> u32 {
    (u32::from(instr.opcode) & FIELD_MASK) << OPCODE_SHIFT
        | (u32::from(instr.first_register) & FIELD_MASK) << REG1_SHIFT
        | (u32::from(instr.second_register) & FIELD_MASK) << REG2_SHIFT
        | u32::from(instr.immediate as u16)
}

/// Decode a sequence of words, preserving order.
pub fn decode_program(words: &[u32]) -> Vec<Instruction> {
    words.iter().map(|&w| decode(w)).collect()
}

/// Errors that can occur during instruction decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("invalid opcode: {0}")]
    InvalidOpcode(u8),
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_decode_fields() {
        // movl $-3, %r2  ->  opcode 8, reg1 2, reg2 0, imm 0xfffd
        let word = (8 << 27) | (2 << 22) | 0xFFFD;
        let instr = decode(word);
        assert_eq!(instr.operation().unwrap(), Opcode::MovlImmReg);
        assert_eq!(instr.first_register, 2);
        assert_eq!(instr.second_register, 0);
        assert_eq!(instr.immediate, -3);
    }

    #[test]
    fn test_decode_ignores_bit_16() {
        let instr = decode(1 << 16 | 5);
        assert_eq!(instr.immediate, 5);
        assert_eq!(instr.second_register, 0);
    }

    #[test]
    fn test_unknown_opcode_decodes() {
        let instr = decode(31 << 27);
        assert_eq!(instr.opcode, 31);
        assert_eq!(instr.operation(), Err(DecodeError::InvalidOpcode(31)));
    }

    #[test]
    fn test_opcode_numbering() {
        for (i, op) in Opcode::ALL.iter().enumerate() {
            assert_eq!(u8::from(*op) as usize, i);
            assert_eq!(Opcode::try_from(i as u8).unwrap(), *op);
        }
        assert!(Opcode::try_from(22).is_err());
    }

    #[test]
    fn test_decode_program_preserves_order() {
        let words: Vec<u32> = Opcode::ALL
            .iter()
            .map(|&op| encode(&Instruction::new(op, 1, 2, 3)))
            .collect();
        let decoded = decode_program(&words);
        assert_eq!(decoded.len(), 22);
        for (instr, op) in decoded.iter().zip(Opcode::ALL) {
            assert_eq!(instr.operation().unwrap(), op);
        }
    }

    proptest! {
        #[test]
        fn prop_encode_decode_roundtrip(
            opcode in 0u8..32,
            r1 in 0u8..32,
            r2 in 0u8..32,
            imm in any::<i16>(),
        ) {
            let instr = Instruction {
                opcode,
                first_register: r1,
                second_register: r2,
                immediate: imm,
            };
            prop_assert_eq!(decode(encode(&instr)), instr);
        }
    }
}

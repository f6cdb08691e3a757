//! Simple assembler for simulator programs.
//!
//! Syntax (AT&T operand order, source first):
//! ```text
//! ; Comment (also `#`)
//! main:               ; Define a label
//!     movl $5, %r0    ; Immediate to register
//!     addl $10, %r0
//!     pushl %r0
//!     movl 0(%esp), %r1
//!     cmpl %r1, %r0   ; flags from r0 - r1
//!     je done         ; Label or signed byte displacement
//!     call helper
//! done:
//!     printr %r0
//!     ret
//!     .word 0x40000005 ; Raw instruction word
//! ```
//!
//! Every statement is one 4-byte word; a label names the byte address of
//! the next statement. Branch displacements are relative to the branching
//! instruction itself.

use crate::cpu::decode::{encode, Instruction, Opcode};
use crate::cpu::registers::{FLAGS, NUM_REGS, SP};
use std::collections::HashMap;
use thiserror::Error;

/// Assemble source code to a list of instruction words.
pub fn assemble(source: &str) -> Result<Vec<u32>, AssemblerError> {
    let mut asm = Assembler::new();
    asm.assemble(source)
}

/// One parsed operand.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Operand {
    /// `$imm`
    Immediate(i64),
    /// `%reg`
    Register(u8),
    /// `offset(%reg)`
    Memory { offset: i64, base: u8 },
    /// Bare number or label, used by branches and `.word`
    Bare(Target),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Target {
    Value(i64),
    Label(String),
}

/// A statement waiting for pass 2.
struct Statement {
    line: usize,
    mnemonic: String,
    operands: Vec<Operand>,
}

/// The assembler state.
struct Assembler {
    /// Symbol table (label -> byte address).
    symbols: HashMap<String, u32>,
    /// Statements in address order.
    statements: Vec<Statement>,
}

impl Assembler {
    fn new() -> Self {
        Self {
            symbols: HashMap::new(),
            statements: Vec::new(),
        }
    }

    fn assemble(&mut self, source: &str) -> Result<Vec<u32>, AssemblerError> {
        // Pass 1: collect labels and parse statements
        for (line_num, line) in source.lines().enumerate() {
            self.process_line(line, line_num + 1)?;
        }

        // Pass 2: encode with every label known
        self.statements
            .iter()
            .enumerate()
            .map(|(i, stmt)| self.encode_statement(stmt, (i * 4) as u32))
            .collect()
    }

    fn process_line(&mut self, line: &str, line_num: usize) -> Result<(), AssemblerError> {
        // Remove comments
        let line = match line.find(|c: char| c == ';' || c == '#') {
            Some(idx) => &line[..idx],
            None => line,
        };
        let mut line = line.trim();

        // Leading labels, possibly several
        while let Some(colon_idx) = line.find(':') {
            let label = line[..colon_idx].trim();
            if !is_identifier(label) {
                return Err(AssemblerError::SyntaxError {
                    line: line_num,
                    message: format!("invalid label {:?}", label),
                });
            }
            let addr = (self.statements.len() * 4) as u32;
            if self.symbols.insert(label.to_string(), addr).is_some() {
                return Err(AssemblerError::DuplicateLabel {
                    line: line_num,
                    label: label.to_string(),
                });
            }
            line = line[colon_idx + 1..].trim();
        }

        if line.is_empty() {
            return Ok(());
        }

        let (mnemonic, rest) = match line.find(char::is_whitespace) {
            Some(idx) => (&line[..idx], line[idx..].trim()),
            None => (line, ""),
        };

        let operands = if rest.is_empty() {
            Vec::new()
        } else {
            rest.split(',')
                .map(|op| parse_operand(op.trim(), line_num))
                .collect::<Result<Vec<_>, _>>()?
        };

        self.statements.push(Statement {
            line: line_num,
            mnemonic: mnemonic.to_lowercase(),
            operands,
        });
        Ok(())
    }

    fn encode_statement(&self, stmt: &Statement, addr: u32) -> Result<u32, AssemblerError> {
        use Operand::*;

        let line = stmt.line;
        let mnemonic = stmt.mnemonic.as_str();

        if mnemonic == ".word" {
            return match stmt.operands.as_slice() {
                [Bare(t)] => {
                    let value = self.resolve(t, None, line)?;
                    if value < i64::from(i32::MIN) || value > i64::from(u32::MAX) {
                        return Err(AssemblerError::ValueOutOfRange { line, value });
                    }
                    Ok(value as u32)
                }
                _ => Err(self.bad_operands(stmt)),
            };
        }

        let instr = match (mnemonic, stmt.operands.as_slice()) {
            ("subl", [Immediate(v), Register(r)]) => {
                Instruction::new(Opcode::Subl, *r, 0, imm16(*v, line)?)
            }
            ("addl", [Register(a), Register(b)]) => Instruction::new(Opcode::AddlRegReg, *a, *b, 0),
            ("addl", [Immediate(v), Register(r)]) => {
                Instruction::new(Opcode::AddlImmReg, *r, 0, imm16(*v, line)?)
            }
            ("imull", [Register(a), Register(b)]) => Instruction::new(Opcode::Imull, *a, *b, 0),
            ("shrl", [Register(r)]) => Instruction::new(Opcode::Shrl, *r, 0, 0),
            ("movl", [Register(a), Register(b)]) => Instruction::new(Opcode::MovlRegReg, *a, *b, 0),
            ("movl", [Memory { offset, base }, Register(r)]) => {
                Instruction::new(Opcode::MovlDerefReg, *base, *r, imm16(*offset, line)?)
            }
            ("movl", [Register(r), Memory { offset, base }]) => {
                Instruction::new(Opcode::MovlRegDeref, *r, *base, imm16(*offset, line)?)
            }
            ("movl", [Immediate(v), Register(r)]) => {
                Instruction::new(Opcode::MovlImmReg, *r, 0, imm16(*v, line)?)
            }
            ("cmpl", [Register(a), Register(b)]) => Instruction::new(Opcode::Cmpl, *a, *b, 0),
            ("ret", []) => Instruction::new(Opcode::Ret, 0, 0, 0),
            ("pushl", [Register(r)]) => Instruction::new(Opcode::Pushl, *r, 0, 0),
            ("popl", [Register(r)]) => Instruction::new(Opcode::Popl, *r, 0, 0),
            ("printr", [Register(r)]) => Instruction::new(Opcode::Printr, *r, 0, 0),
            ("readr", [Register(r)]) => Instruction::new(Opcode::Readr, *r, 0, 0),
            (m, operands) => {
                let Some(op) = branch_opcode(m) else {
                    return Err(if is_known_mnemonic(m) {
                        self.bad_operands(stmt)
                    } else {
                        AssemblerError::UnknownMnemonic {
                            line,
                            mnemonic: m.to_string(),
                        }
                    });
                };
                let [Bare(t)] = operands else {
                    return Err(self.bad_operands(stmt));
                };
                let displacement = self.resolve(t, Some(addr), line)?;
                Instruction::new(op, 0, 0, imm16(displacement, line)?)
            }
        };

        Ok(encode(&instr))
    }

    /// Value of a target; labels become displacements when `from` is given.
    fn resolve(&self, target: &Target, from: Option<u32>, line: usize) -> Result<i64, AssemblerError> {
        match target {
            Target::Value(v) => Ok(*v),
            Target::Label(label) => {
                let addr = self.symbols.get(label).ok_or_else(|| AssemblerError::UndefinedLabel {
                    line,
                    label: label.clone(),
                })?;
                Ok(i64::from(*addr) - i64::from(from.unwrap_or(0)))
            }
        }
    }

    fn bad_operands(&self, stmt: &Statement) -> AssemblerError {
        AssemblerError::InvalidOperands {
            line: stmt.line,
            mnemonic: stmt.mnemonic.clone(),
        }
    }
}

fn branch_opcode(mnemonic: &str) -> Option<Opcode> {
    match mnemonic {
        "je" => Some(Opcode::Je),
        "jl" => Some(Opcode::Jl),
        "jle" => Some(Opcode::Jle),
        "jge" => Some(Opcode::Jge),
        "jbe" => Some(Opcode::Jbe),
        "jmp" => Some(Opcode::Jmp),
        "call" => Some(Opcode::Call),
        _ => None,
    }
}

fn is_known_mnemonic(mnemonic: &str) -> bool {
    Opcode::ALL.iter().any(|op| op.mnemonic() == mnemonic)
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '.')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
}

fn imm16(value: i64, line: usize) -> Result<i16, AssemblerError> {
    i16::try_from(value).map_err(|_| AssemblerError::ValueOutOfRange { line, value })
}

fn parse_operand(op: &str, line: usize) -> Result<Operand, AssemblerError> {
    if let Some(rest) = op.strip_prefix('$') {
        return parse_number(rest, line).map(Operand::Immediate);
    }
    if op.starts_with('%') {
        return parse_register(op, line).map(Operand::Register);
    }
    if let Some(open) = op.find('(') {
        let close = op.strip_suffix(')').ok_or_else(|| AssemblerError::SyntaxError {
            line,
            message: format!("unterminated memory operand {:?}", op),
        })?;
        let offset_str = op[..open].trim();
        let offset = if offset_str.is_empty() {
            0
        } else {
            parse_number(offset_str, line)?
        };
        let base = parse_register(close[open + 1..].trim(), line)?;
        return Ok(Operand::Memory { offset, base });
    }
    if is_identifier(op) {
        return Ok(Operand::Bare(Target::Label(op.to_string())));
    }
    parse_number(op, line).map(|v| Operand::Bare(Target::Value(v)))
}

fn parse_register(op: &str, line: usize) -> Result<u8, AssemblerError> {
    let invalid = || AssemblerError::SyntaxError {
        line,
        message: format!("invalid register {:?}", op),
    };
    let name = op.strip_prefix('%').ok_or_else(invalid)?.to_lowercase();
    let index = match name.as_str() {
        "esp" | "sp" => SP,
        "eflags" | "flags" => FLAGS,
        _ => name
            .strip_prefix('r')
            .and_then(|n| n.parse::<usize>().ok())
            .ok_or_else(invalid)?,
    };
    if index >= NUM_REGS {
        return Err(invalid());
    }
    Ok(index as u8)
}

fn parse_number(text: &str, line: usize) -> Result<i64, AssemblerError> {
    let invalid = || AssemblerError::SyntaxError {
        line,
        message: format!("invalid number {:?}", text),
    };
    let (negative, digits) = match text.as_bytes().first() {
        Some(b'-') => (true, &text[1..]),
        Some(b'+') => (false, &text[1..]),
        _ => (false, text),
    };
    let magnitude = if let Some(hex) = digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
        i64::from_str_radix(hex, 16).map_err(|_| invalid())?
    } else {
        digits.parse::<i64>().map_err(|_| invalid())?
    };
    Ok(if negative { -magnitude } else { magnitude })
}

/// Errors that can occur during assembly.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AssemblerError {
    #[error("syntax error on line {line}: {message}")]
    SyntaxError { line: usize, message: String },

    #[error("unknown mnemonic on line {line}: {mnemonic}")]
    UnknownMnemonic { line: usize, mnemonic: String },

    #[error("invalid operands for {mnemonic} on line {line}")]
    InvalidOperands { line: usize, mnemonic: String },

    #[error("undefined label on line {line}: {label}")]
    UndefinedLabel { line: usize, label: String },

    #[error("duplicate label on line {line}: {label}")]
    DuplicateLabel { line: usize, label: String },

    #[error("value out of range on line {line}: {value}")]
    ValueOutOfRange { line: usize, value: i64 },
}

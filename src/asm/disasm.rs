//! Disassembler.
//!
//! Renders decoded instructions in AT&T-style assembly, the same syntax
//! the assembler accepts, plus the raw field listing used for debugging.

use crate::cpu::decode::{decode, Instruction, Opcode};
use crate::cpu::Registers;

/// Disassemble a single instruction word to text.
pub fn disassemble_instruction(word: u32) -> String {
    format_instruction(&decode(word))
}

/// Disassemble a program, one line per word with its byte address.
pub fn disassemble(words: &[u32]) -> String {
    let mut output = String::new();
    output.push_str("; Disassembly\n");
    output.push_str("; -----------\n\n");

    for (i, &word) in words.iter().enumerate() {
        let line = disassemble_instruction(word);
        output.push_str(&format!("{:04}: {:<28} ; {:08x}\n", i * 4, line, word));
    }

    output
}

/// Field-by-field listing of decoded instructions.
pub fn list_fields(instructions: &[Instruction]) -> String {
    let mut output = String::from("instructions: \n");
    for instr in instructions {
        output.push_str(&format!(
            "op: {}, reg1: {}, reg2: {}, imm: {}\n",
            instr.opcode, instr.first_register, instr.second_register, instr.immediate
        ));
    }
    output.push_str("--------------\n");
    output
}

/// Format a decoded instruction as assembly text.
pub fn format_instruction(instr: &Instruction) -> String {
    let Ok(op) = instr.operation() else {
        return format!(".word 0x{:08x}", crate::cpu::decode::encode(instr));
    };

    let r1 = Registers::name(instr.first_register);
    let r2 = Registers::name(instr.second_register);
    let imm = instr.immediate;
    let m = op.mnemonic();

    match op {
        Opcode::Subl | Opcode::AddlImmReg | Opcode::MovlImmReg => format!("{} ${}, {}", m, imm, r1),
        Opcode::AddlRegReg | Opcode::Imull | Opcode::MovlRegReg | Opcode::Cmpl => {
            format!("{} {}, {}", m, r1, r2)
        }
        Opcode::MovlDerefReg => format!("{} {}({}), {}", m, imm, r1, r2),
        Opcode::MovlRegDeref => format!("{} {}, {}({})", m, r1, imm, r2),
        Opcode::Je
        | Opcode::Jl
        | Opcode::Jle
        | Opcode::Jge
        | Opcode::Jbe
        | Opcode::Jmp
        | Opcode::Call => format!("{} {:+}", m, imm),
        Opcode::Ret => m.to_string(),
        Opcode::Shrl | Opcode::Pushl | Opcode::Popl | Opcode::Printr | Opcode::Readr => {
            format!("{} {}", m, r1)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::decode::encode;

    fn word(op: Opcode, r1: u8, r2: u8, imm: i16) -> u32 {
        encode(&Instruction::new(op, r1, r2, imm))
    }

    #[test]
    fn test_disassemble_forms() {
        assert_eq!(disassemble_instruction(word(Opcode::MovlImmReg, 0, 0, 5)), "movl $5, %r0");
        assert_eq!(disassemble_instruction(word(Opcode::AddlRegReg, 1, 2, 0)), "addl %r1, %r2");
        assert_eq!(disassemble_instruction(word(Opcode::MovlDerefReg, 6, 3, 8)), "movl 8(%esp), %r3");
        assert_eq!(disassemble_instruction(word(Opcode::MovlRegDeref, 3, 6, -4)), "movl %r3, -4(%esp)");
        assert_eq!(disassemble_instruction(word(Opcode::Jle, 0, 0, -12)), "jle -12");
        assert_eq!(disassemble_instruction(word(Opcode::Call, 0, 0, 8)), "call +8");
        assert_eq!(disassemble_instruction(word(Opcode::Ret, 0, 0, 0)), "ret");
        assert_eq!(disassemble_instruction(word(Opcode::Printr, 4, 0, 0)), "printr %r4");
    }

    #[test]
    fn test_disassemble_unknown_opcode() {
        assert_eq!(disassemble_instruction(0xF800_0000), ".word 0xf8000000");
    }

    #[test]
    fn test_list_fields() {
        let listing = list_fields(&[Instruction::new(Opcode::Subl, 1, 0, -3)]);
        assert_eq!(
            listing,
            "instructions: \nop: 0, reg1: 1, reg2: 0, imm: -3\n--------------\n"
        );
    }

    #[test]
    fn test_disassemble_program() {
        let out = disassemble(&[word(Opcode::Ret, 0, 0, 0), word(Opcode::Popl, 2, 0, 0)]);
        assert!(out.contains("0000: ret"));
        assert!(out.contains("0004: popl %r2"));
    }
}

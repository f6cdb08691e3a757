//! CPU execution engine.
//!
//! Implements the fetch-decode-execute cycle and all instruction behaviors.

use crate::alu::{self, Condition};
use crate::cpu::{Memory, Registers};
use crate::cpu::console::{Console, ConsoleError};
use crate::cpu::decode::{DecodeError, Instruction, Opcode};
use crate::cpu::memory::{MemoryError, WORD_SIZE};
use crate::cpu::registers::RegisterError;
use serde::{Serialize, Deserialize};
use thiserror::Error;
use tracing::{debug, trace, warn};

/// Why the machine stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HaltReason {
    /// `ret` executed with an empty stack.
    ReturnFromTop,
    /// The program counter moved past the last instruction.
    EndOfProgram,
}

/// Result of a single step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepOutcome {
    /// Execution continues at this program counter.
    Continue(u32),
    /// The machine halted.
    Halted(HaltReason),
}

/// CPU execution state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CpuState {
    /// CPU is running normally.
    Running,
    /// CPU has halted.
    Halted(HaltReason),
    /// An instruction faulted; the run is over.
    Faulted,
}

/// The simulated processor: register file, stack memory, program counter
/// and the decoded program it executes.
#[derive(Clone, Serialize, Deserialize)]
pub struct Cpu {
    /// CPU registers.
    pub regs: Registers,
    /// Stack memory.
    pub mem: Memory,
    /// Byte address of the next instruction.
    pub pc: u32,
    /// Current execution state.
    pub state: CpuState,
    /// Instructions executed so far.
    pub cycles: u64,
    #[serde(skip)]
    program: Vec<Instruction>,
    #[serde(skip)]
    last_instr: Option<Instruction>,
}

impl Cpu {
    /// Create a new CPU with power-on state and no program.
    pub fn new() -> Self {
        Self {
            regs: Registers::new(),
            mem: Memory::new(),
            pc: 0,
            state: CpuState::Running,
            cycles: 0,
            program: Vec::new(),
            last_instr: None,
        }
    }

    /// Create a CPU ready to run `program` from address 0.
    pub fn with_program(program: Vec<Instruction>) -> Self {
        let mut cpu = Self::new();
        cpu.load_program(program);
        cpu
    }

    /// Reset registers, memory and the program counter; keeps the program.
    pub fn reset(&mut self) {
        self.regs.reset();
        self.mem.clear();
        self.pc = 0;
        self.state = CpuState::Running;
        self.cycles = 0;
        self.last_instr = None;
    }

    /// Replace the program and reset the machine.
    pub fn load_program(&mut self, program: Vec<Instruction>) {
        debug!(instructions = program.len(), "program loaded");
        self.program = program;
        self.reset();
    }

    /// The decoded program.
    pub fn program(&self) -> &[Instruction] {
        &self.program
    }

    /// Instruction at a byte address, if inside the program.
    pub fn instruction_at(&self, pc: u32) -> Option<Instruction> {
        self.program.get((pc / 4) as usize).copied()
    }

    /// Execute a single instruction.
    ///
    /// Returns what happened; the CPU state is updated to match. A fault
    /// moves the CPU to [`CpuState::Faulted`].
    pub fn step(&mut self, console: &mut dyn Console) -> Result<StepOutcome, CpuError> {
        if self.state != CpuState::Running {
            return Err(CpuError::NotRunning(self.state));
        }

        // Fetch
        let Some(instr) = self.instruction_at(self.pc) else {
            return Ok(self.halt(HaltReason::EndOfProgram));
        };

        trace!(
            pc = self.pc,
            instr = %crate::asm::disasm::format_instruction(&instr),
            "step"
        );

        // Execute
        let outcome = match self.execute(instr, console) {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(pc = self.pc, error = %e, "instruction faulted");
                self.state = CpuState::Faulted;
                return Err(e);
            }
        };

        self.cycles += 1;
        self.last_instr = Some(instr);

        match outcome {
            StepOutcome::Continue(next) => {
                self.pc = next;
                Ok(outcome)
            }
            StepOutcome::Halted(reason) => Ok(self.halt(reason)),
        }
    }

    fn halt(&mut self, reason: HaltReason) -> StepOutcome {
        debug!(pc = self.pc, cycles = self.cycles, ?reason, "halted");
        self.state = CpuState::Halted(reason);
        StepOutcome::Halted(reason)
    }

    /// Run until halt or error.
    ///
    /// Returns the halt reason.
    pub fn run(&mut self, console: &mut dyn Console) -> Result<HaltReason, CpuError> {
        loop {
            if let StepOutcome::Halted(reason) = self.step(console)? {
                return Ok(reason);
            }
        }
    }

    /// Run for at most `max_steps` steps.
    ///
    /// Returns `None` if the limit was reached while still running.
    pub fn run_limited(
        &mut self,
        console: &mut dyn Console,
        max_steps: u64,
    ) -> Result<Option<HaltReason>, CpuError> {
        for _ in 0..max_steps {
            if let StepOutcome::Halted(reason) = self.step(console)? {
                return Ok(Some(reason));
            }
        }
        Ok(None)
    }

    /// Execute a decoded instruction located at `self.pc`.
    ///
    /// Does not move the program counter; the returned outcome carries the
    /// next one.
    fn execute(
        &mut self,
        instr: Instruction,
        console: &mut dyn Console,
    ) -> Result<StepOutcome, CpuError> {
        let pc = self.pc;
        let r1 = instr.first_register;
        let r2 = instr.second_register;
        let imm = alu::arith::extend_immediate(instr.immediate);
        let next = pc.wrapping_add(4);

        match instr.operation()? {
            // ==================== Arithmetic ====================

            Opcode::Subl => {
                let value = self.regs.read(r1)?.wrapping_sub(imm);
                self.regs.write(r1, value)?;
            }

            Opcode::AddlRegReg => {
                let value = self.regs.read(r1)?.wrapping_add(self.regs.read(r2)?);
                self.regs.write(r2, value)?;
            }

            Opcode::AddlImmReg => {
                let value = self.regs.read(r1)?.wrapping_add(imm);
                self.regs.write(r1, value)?;
            }

            Opcode::Imull => {
                let value = self.regs.read(r1)?.wrapping_mul(self.regs.read(r2)?);
                self.regs.write(r2, value)?;
            }

            Opcode::Shrl => {
                let value = alu::shift_right_logical(self.regs.read(r1)?);
                self.regs.write(r1, value)?;
            }

            // ==================== Data Transfer ====================

            Opcode::MovlRegReg => {
                let value = self.regs.read(r1)?;
                self.regs.write(r2, value)?;
            }

            Opcode::MovlDerefReg => {
                let addr = i64::from(self.regs.read(r1)?) + i64::from(imm);
                let value = self.mem.read_word(addr)?;
                self.regs.write(r2, value)?;
            }

            Opcode::MovlRegDeref => {
                let addr = i64::from(self.regs.read(r2)?) + i64::from(imm);
                let value = self.regs.read(r1)?;
                self.mem.write_word(addr, value)?;
            }

            Opcode::MovlImmReg => {
                self.regs.write(r1, imm)?;
            }

            // ==================== Compare / Branch ====================

            Opcode::Cmpl => {
                let (_, flags) = alu::compare(self.regs.read(r2)?, self.regs.read(r1)?);
                self.regs.set_flags(flags);
            }

            Opcode::Je => return self.branch_if(Condition::Equal, imm),
            Opcode::Jl => return self.branch_if(Condition::Less, imm),
            Opcode::Jle => return self.branch_if(Condition::LessOrEqual, imm),
            Opcode::Jge => return self.branch_if(Condition::GreaterOrEqual, imm),
            Opcode::Jbe => return self.branch_if(Condition::BelowOrEqual, imm),
            Opcode::Jmp => return self.branch_if(Condition::Always, imm),

            // ==================== Stack ====================

            Opcode::Call => {
                let target = self.branch_target(imm)?;
                self.push(next as i32)?;
                return Ok(StepOutcome::Continue(target));
            }

            Opcode::Ret => {
                if self.regs.stack_is_empty() {
                    return Ok(StepOutcome::Halted(HaltReason::ReturnFromTop));
                }
                let addr = self.pop()?;
                let target = u32::try_from(addr)
                    .map_err(|_| CpuError::InvalidReturnAddress { pc, addr })?;
                return Ok(StepOutcome::Continue(target));
            }

            Opcode::Pushl => {
                let value = self.regs.read(r1)?;
                self.push(value)?;
            }

            Opcode::Popl => {
                // Validate the destination before touching the stack
                self.regs.read(r1)?;
                let value = self.mem.read_word(i64::from(self.regs.sp()))?;
                self.regs.write(r1, value)?;
                // Bump whatever sp holds after the load, so `popl %esp` ends at value + 4
                let sp = self.regs.sp().wrapping_add(WORD_SIZE as i32);
                self.regs.set_sp(sp);
            }

            // ==================== I/O ====================

            Opcode::Printr => {
                let value = self.regs.read(r1)?;
                console.print(value)?;
            }

            Opcode::Readr => {
                self.regs.read(r1)?;
                let value = console.read()?;
                self.regs.write(r1, value)?;
            }
        }

        Ok(StepOutcome::Continue(next))
    }

    /// Branch by `offset` bytes from the current instruction if `cond` holds.
    fn branch_if(&self, cond: Condition, offset: i32) -> Result<StepOutcome, CpuError> {
        if cond.holds(self.regs.flags()) {
            Ok(StepOutcome::Continue(self.branch_target(offset)?))
        } else {
            Ok(StepOutcome::Continue(self.pc.wrapping_add(4)))
        }
    }

    /// Destination of a relative branch from the current instruction.
    fn branch_target(&self, offset: i32) -> Result<u32, CpuError> {
        let target = i64::from(self.pc) + i64::from(offset);
        u32::try_from(target).map_err(|_| CpuError::InvalidBranchTarget {
            pc: self.pc,
            target,
        })
    }

    /// Push a word: the stack pointer drops by 4 and the word lands there.
    fn push(&mut self, value: i32) -> Result<(), CpuError> {
        let sp = self.regs.sp().wrapping_sub(WORD_SIZE as i32);
        self.mem.write_word(i64::from(sp), value)?;
        self.regs.set_sp(sp);
        Ok(())
    }

    /// Pop a word from the stack pointer, then raise it by 4.
    fn pop(&mut self) -> Result<i32, CpuError> {
        let sp = self.regs.sp();
        let value = self.mem.read_word(i64::from(sp))?;
        self.regs.set_sp(sp.wrapping_add(WORD_SIZE as i32));
        Ok(value)
    }

    /// Get the last executed instruction.
    pub fn last_instruction(&self) -> Option<Instruction> {
        self.last_instr
    }

    /// Check if the CPU is halted.
    pub fn is_halted(&self) -> bool {
        matches!(self.state, CpuState::Halted(_))
    }

    /// Check if the CPU is running.
    pub fn is_running(&self) -> bool {
        self.state == CpuState::Running
    }
}

impl Default for Cpu {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Cpu {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cpu")
            .field("state", &self.state)
            .field("pc", &self.pc)
            .field("cycles", &self.cycles)
            .field("regs", &self.regs)
            .finish()
    }
}

/// Errors that can occur during CPU execution.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CpuError {
    #[error("CPU not running: {0:?}")]
    NotRunning(CpuState),

    #[error("register error: {0}")]
    RegisterError(#[from] RegisterError),

    #[error("memory error: {0}")]
    MemoryError(#[from] MemoryError),

    #[error("decode error: {0}")]
    DecodeError(#[from] DecodeError),

    #[error("branch at pc {pc} to negative address {target}")]
    InvalidBranchTarget { pc: u32, target: i64 },

    #[error("ret at pc {pc} popped negative return address {addr}")]
    InvalidReturnAddress { pc: u32, addr: i32 },

    #[error("input error: {0}")]
    Input(#[from] ConsoleError),
}

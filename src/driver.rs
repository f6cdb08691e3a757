//! Program driver.
//!
//! Ties the pieces together: load an image, decode it, build a fresh
//! [`Cpu`] and run it until it halts, faults or hits the step limit.

use crate::asm::image::{self, ImageError};
use crate::config::{ConfigError, SimConfig};
use crate::cpu::decode::{decode_program, Instruction};
use crate::cpu::{Console, Cpu, CpuError, HaltReason};
use crate::asm::AssemblerError;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, warn};

/// Summary of a finished run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunReport {
    /// Why the machine stopped; `None` if the step limit was reached.
    pub halt: Option<HaltReason>,
    /// Instructions executed.
    pub steps: u64,
}

/// Run decoded instructions on a fresh machine.
///
/// Returns the final machine alongside the report so callers can inspect
/// or dump its state.
pub fn run_program(
    program: Vec<Instruction>,
    config: &SimConfig,
    console: &mut dyn Console,
) -> Result<(Cpu, RunReport), SimError> {
    let mut cpu = Cpu::with_program(program);

    let result = match config.max_steps {
        Some(limit) => cpu.run_limited(console, limit),
        None => cpu.run(console).map(Some),
    };

    let halt = result.map_err(|source| SimError::Fault { pc: cpu.pc, source })?;
    if halt.is_none() {
        warn!(steps = cpu.cycles, "step limit reached before halt");
    }

    let report = RunReport {
        halt,
        steps: cpu.cycles,
    };
    Ok((cpu, report))
}

/// Load, decode and run an image file.
///
/// A malformed image is rejected before any instruction executes.
pub fn run_file<P: AsRef<Path>>(
    path: P,
    config: &SimConfig,
    console: &mut dyn Console,
) -> Result<(Cpu, RunReport), SimError> {
    let image = image::load_image(path, config.byte_order)?;
    let program = decode_program(&image.words);
    debug!(instructions = program.len(), "decoded image");
    run_program(program, config, console)
}

/// Any error that ends a simulator invocation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SimError {
    #[error("must provide an argument specifying a binary file to execute")]
    MissingProgram,

    #[error(transparent)]
    Image(#[from] ImageError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Assembler(#[from] AssemblerError),

    #[error("fault at pc {pc}: {source}")]
    Fault {
        pc: u32,
        #[source]
        source: CpuError,
    },

    #[error("unable to serialize machine state: {0}")]
    Dump(String),

    #[error("terminal error: {0}")]
    Terminal(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asm::assemble;
    use crate::asm::image::{save_image, ByteOrder, ProgramImage};
    use crate::cpu::{BufferedConsole, MemoryError, StdConsole};

    fn run_source(source: &str, input: &[i32]) -> (Cpu, RunReport, Vec<String>) {
        let words = assemble(source).unwrap();
        let mut console = BufferedConsole::with_input(input.iter().copied());
        let (cpu, report) =
            run_program(decode_program(&words), &SimConfig::default(), &mut console).unwrap();
        (cpu, report, console.output)
    }

    #[test]
    fn test_add_immediate_program() {
        let (_, report, output) = run_source(
            "movl $5, %r0\naddl $10, %r0\nprintr %r0",
            &[],
        );
        assert_eq!(output, vec!["15 (0xf)"]);
        assert_eq!(report.halt, Some(HaltReason::EndOfProgram));
        assert_eq!(report.steps, 3);
    }

    #[test]
    fn test_factorial_with_calls() {
        let source = r#"
        main:
            readr %r0
            movl $1, %r1
            call fact
            printr %r1
            ret
        ; r1 *= r0, r0 -= 1, recurse while r0 > 1
        fact:
            movl $1, %r2
            cmpl %r2, %r0       ; r0 - 1
            jle fact_done
            imull %r0, %r1
            pushl %r0
            subl $1, %r0
            call fact
            popl %r0
        fact_done:
            ret
        "#;
        let (cpu, report, output) = run_source(source, &[5]);
        assert_eq!(output, vec!["120 (0x78)"]);
        assert_eq!(report.halt, Some(HaltReason::ReturnFromTop));
        assert_eq!(cpu.regs.sp(), 1024);
    }

    #[test]
    fn test_sum_loop_with_memory() {
        // Sum 1..=10 keeping the running total in stack memory
        let source = r#"
            movl $0, %r0
            movl %r0, -4(%esp)
            movl $10, %r1
            movl $0, %r3
        loop:
            movl -4(%esp), %r2
            addl %r1, %r2
            movl %r2, -4(%esp)
            subl $1, %r1
            cmpl %r3, %r1
            jge loop_check
        loop_check:
            cmpl %r1, %r3       ; 0 - r1
            jl loop
            movl -4(%esp), %r2
            printr %r2
        "#;
        let (_, _, output) = run_source(source, &[]);
        assert_eq!(output, vec!["55 (0x37)"]);
    }

    #[test]
    fn test_unsigned_halving_loop() {
        let source = r#"
            movl $-1, %r0
            movl $0, %r1
            movl $0, %r2
        again:
            shrl %r0
            addl $1, %r1
            cmpl %r2, %r0
            je out
            jmp again
        out:
            printr %r1
        "#;
        let (_, _, output) = run_source(source, &[]);
        assert_eq!(output, vec!["32 (0x20)"]);
    }

    #[test]
    fn test_fault_reports_pc() {
        let words = assemble("movl $1, %r0\npopl %r0").unwrap();
        let err = run_program(
            decode_program(&words),
            &SimConfig::default(),
            &mut BufferedConsole::new(),
        )
        .unwrap_err();
        assert_eq!(
            err,
            SimError::Fault {
                pc: 4,
                source: CpuError::MemoryError(MemoryError::AddressOutOfRange { addr: 1024, width: 4 }),
            }
        );
        assert!(err.to_string().starts_with("fault at pc 4: memory error"));
    }

    #[test]
    fn test_step_limit() {
        let words = assemble("spin: jmp spin").unwrap();
        let config = SimConfig {
            max_steps: Some(50),
            ..SimConfig::default()
        };
        let (_, report) =
            run_program(decode_program(&words), &config, &mut BufferedConsole::new()).unwrap();
        assert_eq!(report, RunReport { halt: None, steps: 50 });
    }

    #[test]
    fn test_run_file_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("echo.bin");
        let words = assemble("readr %r4\naddl $1, %r4\nprintr %r4\nret").unwrap();
        save_image(&path, &ProgramImage::new(words), ByteOrder::Little).unwrap();

        let mut console = StdConsole::new(b"41\n".as_slice(), Vec::new());
        let (_, report) = run_file(&path, &SimConfig::default(), &mut console).unwrap();
        assert_eq!(report.halt, Some(HaltReason::ReturnFromTop));
        assert_eq!(String::from_utf8(console.into_output()).unwrap(), "42 (0x2a)\n");
    }

    #[test]
    fn test_run_file_rejects_bad_size() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.bin");
        // A valid printr followed by two stray bytes
        let mut bytes = assemble("printr %r0").unwrap()[0].to_le_bytes().to_vec();
        bytes.extend([0, 0]);
        std::fs::write(&path, bytes).unwrap();

        let mut console = BufferedConsole::new();
        let err = run_file(&path, &SimConfig::default(), &mut console).unwrap_err();
        assert_eq!(err, SimError::Image(ImageError::InvalidSize(6)));
        assert!(console.output.is_empty());
    }
}

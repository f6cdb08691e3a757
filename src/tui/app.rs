//! Debugger application state and logic.

use crate::{BufferedConsole, Cpu, Instruction, StepOutcome};
use crate::asm::disasm::format_instruction;
use crate::cpu::memory::{MEMORY_SIZE, WORD_SIZE};
use std::collections::HashSet;

/// Number of word rows in the stack view.
pub const STACK_ROWS: usize = MEMORY_SIZE / WORD_SIZE;

/// Debugger application state.
pub struct DebuggerApp {
    /// The CPU being debugged.
    pub cpu: Cpu,
    /// Program I/O: queued `readr` input and captured `printr` output.
    pub console: BufferedConsole,
    /// Input values the program starts with (restored on reset).
    pub input: Vec<i32>,
    /// Breakpoints (by byte address).
    pub breakpoints: HashSet<u32>,
    /// Is the debugger running continuously?
    pub running: bool,
    /// Should we quit?
    pub should_quit: bool,
    /// Status message to display.
    pub status: String,
    /// Stack view scroll offset, in words.
    pub mem_scroll: usize,
}

impl DebuggerApp {
    /// Create a new debugger with a loaded program.
    pub fn new(program: Vec<Instruction>, input: Vec<i32>) -> Self {
        Self {
            cpu: Cpu::with_program(program),
            console: BufferedConsole::with_input(input.iter().copied()),
            input,
            breakpoints: HashSet::new(),
            running: false,
            should_quit: false,
            status: "Ready. Press 's' to step, 'r' to run, 'q' to quit.".into(),
            // Show the top of the stack first
            mem_scroll: STACK_ROWS.saturating_sub(16),
        }
    }

    /// Step one instruction.
    pub fn step(&mut self) {
        if !self.cpu.is_running() {
            self.status = format!("CPU stopped: {:?}", self.cpu.state);
            self.running = false;
            return;
        }

        let pc = self.cpu.pc;
        let text = self.cpu
            .instruction_at(pc)
            .map(|i| format_instruction(&i))
            .unwrap_or_default();
        match self.cpu.step(&mut self.console) {
            Ok(StepOutcome::Continue(_)) => {
                self.status = format!("PC={:04}: {}", pc, text);
            }
            Ok(StepOutcome::Halted(reason)) => {
                self.status = format!("Halted ({:?}) after {} steps", reason, self.cpu.cycles);
                self.running = false;
            }
            Err(e) => {
                self.status = format!("Error: {}", e);
                self.running = false;
            }
        }
    }

    /// Run until halt, breakpoint, or error.
    pub fn run(&mut self) {
        self.running = true;
        self.status = "Running...".into();
        // Leave a breakpoint we are sitting on
        if self.breakpoints.contains(&self.cpu.pc) {
            self.step();
        }
    }

    /// Run one iteration of continuous execution.
    pub fn tick(&mut self) {
        if !self.running {
            return;
        }

        if !self.cpu.is_running() {
            self.running = false;
            self.status = format!("Stopped after {} steps", self.cpu.cycles);
            return;
        }

        // Check for breakpoint
        let pc = self.cpu.pc;
        if self.breakpoints.contains(&pc) {
            self.running = false;
            self.status = format!("Breakpoint at PC={}", pc);
            return;
        }

        self.step();
    }

    /// Toggle breakpoint at current PC.
    pub fn toggle_breakpoint(&mut self) {
        let pc = self.cpu.pc;
        if self.breakpoints.remove(&pc) {
            self.status = format!("Removed breakpoint at PC={}", pc);
        } else {
            self.breakpoints.insert(pc);
            self.status = format!("Set breakpoint at PC={}", pc);
        }
    }

    /// Reset CPU and console to the initial state.
    pub fn reset(&mut self) {
        self.cpu.reset();
        self.console = BufferedConsole::with_input(self.input.iter().copied());
        self.running = false;
        self.status = "Reset. Ready.".into();
    }

    /// Scroll the stack view by `delta` words.
    pub fn scroll_memory(&mut self, delta: isize) {
        let max = STACK_ROWS.saturating_sub(1);
        self.mem_scroll = self.mem_scroll.saturating_add_signed(delta).min(max);
    }

    /// Get disassembly around current PC as `(address, text, is_current)`.
    pub fn get_disassembly(&self, lines: usize) -> Vec<(u32, String, bool)> {
        let current = (self.cpu.pc / 4) as usize;
        let start = current.saturating_sub(lines / 2);

        self.cpu
            .program()
            .iter()
            .enumerate()
            .skip(start)
            .take(lines)
            .map(|(i, instr)| {
                let addr = (i * 4) as u32;
                (addr, format_instruction(instr), i == current)
            })
            .collect()
    }
}

/// Run the debugger with a program.
pub fn run_debugger(program: Vec<Instruction>, input: Vec<i32>) -> std::io::Result<()> {
    use crossterm::{
        event::{self, Event, KeyCode, KeyEventKind},
        terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
        ExecutableCommand,
    };
    use ratatui::prelude::*;
    use std::io::stdout;
    use std::time::Duration;

    // Setup terminal
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    // Create app
    let mut app = DebuggerApp::new(program, input);

    // Main loop
    loop {
        // Draw
        terminal.draw(|frame| {
            super::ui::draw(frame, &app);
        })?;

        // Handle input
        if event::poll(Duration::from_millis(50))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    match key.code {
                        KeyCode::Char('q') => app.should_quit = true,
                        KeyCode::Char('s') => {
                            app.running = false;
                            app.step();
                        }
                        KeyCode::Char('r') => app.run(),
                        KeyCode::Char('p') => {
                            app.running = false;
                            app.status = "Paused.".into();
                        }
                        KeyCode::Char('b') => app.toggle_breakpoint(),
                        KeyCode::Char('x') => app.reset(),
                        KeyCode::Up => app.scroll_memory(-1),
                        KeyCode::Down => app.scroll_memory(1),
                        KeyCode::PageUp => app.scroll_memory(-16),
                        KeyCode::PageDown => app.scroll_memory(16),
                        _ => {}
                    }
                }
            }
        }

        // Tick for continuous running
        if app.running {
            app.tick();
        }

        if app.should_quit {
            break;
        }
    }

    // Restore terminal
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asm::assemble;
    use crate::cpu::decode::decode_program;

    fn app(source: &str, input: Vec<i32>) -> DebuggerApp {
        DebuggerApp::new(decode_program(&assemble(source).unwrap()), input)
    }

    #[test]
    fn test_step_and_status() {
        let mut app = app("movl $3, %r0\nprintr %r0", vec![]);
        app.step();
        assert_eq!(app.status, "PC=0000: movl $3, %r0");
        app.step();
        assert_eq!(app.console.output, vec!["3 (0x3)"]);
        app.step();
        assert!(app.status.starts_with("Halted (EndOfProgram)"));
    }

    #[test]
    fn test_breakpoint_stops_run() {
        let mut app = app("movl $1, %r0\nmovl $2, %r0\nmovl $3, %r0", vec![]);
        app.step();
        app.toggle_breakpoint(); // at pc 4
        app.reset();
        app.run();
        for _ in 0..10 {
            app.tick();
        }
        assert!(!app.running);
        assert_eq!(app.cpu.pc, 4);
        assert_eq!(app.status, "Breakpoint at PC=4");

        // Running again moves past the breakpoint
        app.run();
        for _ in 0..10 {
            app.tick();
        }
        assert!(app.cpu.is_halted());
        assert_eq!(app.cpu.regs.read(0).unwrap(), 3);
    }

    #[test]
    fn test_reset_restores_input() {
        let mut app = app("readr %r1\nprintr %r1", vec![9]);
        app.step();
        app.step();
        app.reset();
        assert_eq!(app.console.input.len(), 1);
        assert!(app.console.output.is_empty());
        assert_eq!(app.cpu.pc, 0);
    }

    #[test]
    fn test_disassembly_window() {
        let app = app("ret\nret\nret\nret\nret\nret", vec![]);
        let lines = app.get_disassembly(4);
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], (0, "ret".to_string(), true));
    }

    #[test]
    fn test_scroll_clamps() {
        let mut app = app("ret", vec![]);
        app.scroll_memory(-10_000);
        assert_eq!(app.mem_scroll, 0);
        app.scroll_memory(10_000);
        assert_eq!(app.mem_scroll, STACK_ROWS - 1);
    }
}

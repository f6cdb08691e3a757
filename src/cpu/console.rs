//! Program I/O for `printr` and `readr`.
//!
//! The execution engine never touches stdin/stdout directly; it talks to a
//! [`Console`]. [`StdConsole`] wraps any reader/writer pair and behaves like
//! `scanf("%d")`/`printf`, [`BufferedConsole`] queues input and captures
//! output for tests and the debugger.

use std::collections::VecDeque;
use std::io::{BufRead, Write};
use thiserror::Error;

/// Format a value the way `printr` prints it: `<decimal> (0x<hex>)`.
pub fn format_value(value: i32) -> String {
    format!("{} (0x{:x})", value, value)
}

/// I/O device seen by the running program.
pub trait Console {
    /// Emit one printed value.
    fn print(&mut self, value: i32) -> Result<(), ConsoleError>;

    /// Block until one integer is available.
    fn read(&mut self) -> Result<i32, ConsoleError>;
}

/// Console over a buffered reader and a writer.
///
/// Input is split on whitespace, so several integers may share a line.
#[derive(Debug)]
pub struct StdConsole<R, W> {
    input: R,
    output: W,
    pending: VecDeque<String>,
}

impl<R: BufRead, W: Write> StdConsole<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self {
            input,
            output,
            pending: VecDeque::new(),
        }
    }

    /// Recover the writer, e.g. to inspect captured output.
    pub fn into_output(self) -> W {
        self.output
    }

    fn next_token(&mut self) -> Result<String, ConsoleError> {
        loop {
            if let Some(token) = self.pending.pop_front() {
                return Ok(token);
            }
            let mut line = String::new();
            let read = self.input
                .read_line(&mut line)
                .map_err(|e| ConsoleError::Io(e.to_string()))?;
            if read == 0 {
                return Err(ConsoleError::EndOfInput);
            }
            self.pending
                .extend(line.split_whitespace().map(str::to_string));
        }
    }
}

impl StdConsole<std::io::StdinLock<'static>, std::io::Stdout> {
    /// Console bound to the process's standard streams.
    pub fn stdio() -> Self {
        Self::new(std::io::stdin().lock(), std::io::stdout())
    }
}

impl<R: BufRead, W: Write> Console for StdConsole<R, W> {
    fn print(&mut self, value: i32) -> Result<(), ConsoleError> {
        writeln!(self.output, "{}", format_value(value))
            .and_then(|_| self.output.flush())
            .map_err(|e| ConsoleError::Io(e.to_string()))
    }

    fn read(&mut self) -> Result<i32, ConsoleError> {
        let token = self.next_token()?;
        token
            .parse::<i32>()
            .map_err(|_| ConsoleError::InvalidInteger(token))
    }
}

/// In-memory console: input is queued up front, output lines are captured.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BufferedConsole {
    pub input: VecDeque<i32>,
    pub output: Vec<String>,
}

impl BufferedConsole {
    pub fn new() -> Self {
        Self::default()
    }

    /// Console with the given values waiting to be read.
    pub fn with_input(values: impl IntoIterator<Item = i32>) -> Self {
        Self {
            input: values.into_iter().collect(),
            output: Vec::new(),
        }
    }
}

impl Console for BufferedConsole {
    fn print(&mut self, value: i32) -> Result<(), ConsoleError> {
        self.output.push(format_value(value));
        Ok(())
    }

    fn read(&mut self) -> Result<i32, ConsoleError> {
        self.input.pop_front().ok_or(ConsoleError::EndOfInput)
    }
}

/// Errors raised by program I/O.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConsoleError {
    #[error("end of input while reading an integer")]
    EndOfInput,

    #[error("expected an integer, found {0:?}")]
    InvalidInteger(String),

    #[error("I/O error: {0}")]
    Io(String),
}

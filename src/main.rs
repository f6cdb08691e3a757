//! mini86 simulator - CLI Entry Point
//!
//! Commands:
//! - `mini86-emu <program>` / `mini86-emu run <program>` - Run a binary image
//! - `mini86-emu debug <program>` - Interactive debugger
//! - `mini86-emu asm <source>` - Assemble to a binary image
//! - `mini86-emu disasm <image>` - Disassemble a binary image

use clap::{Args, Parser, Subcommand};
use mini86::{ByteOrder, SimConfig, SimError, StdConsole};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "mini86-emu")]
#[command(version)]
#[command(about = "A simulator for a small x86-like instruction set")]
#[command(args_conflicts_with_subcommands = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    #[command(flatten)]
    run: RunArgs,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a program until it halts
    Run(RunArgs),
    /// Interactive debugger
    #[cfg(feature = "tui")]
    Debug {
        /// Path to the binary image to debug
        program: PathBuf,
        /// Values for `readr`, in order
        #[arg(short, long, value_delimiter = ',', allow_hyphen_values = true)]
        input: Vec<i32>,
        /// Image words are big-endian
        #[arg(long)]
        big_endian: bool,
    },
    /// Assemble source to a binary image
    Asm {
        /// Path to the source file
        source: PathBuf,
        /// Output image file
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Write words big-endian
        #[arg(long)]
        big_endian: bool,
    },
    /// Disassemble a binary image to readable text
    Disasm {
        /// Path to the binary image
        image: PathBuf,
        /// Image words are big-endian
        #[arg(long)]
        big_endian: bool,
    },
}

#[derive(Args, Default)]
struct RunArgs {
    /// Path to the binary image to execute
    program: Option<PathBuf>,
    /// JSON settings file
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Stop after this many instructions
    #[arg(short, long)]
    max_steps: Option<u64>,
    /// Log every executed instruction to stderr
    #[arg(short, long)]
    trace: bool,
    /// Image words are big-endian
    #[arg(long)]
    big_endian: bool,
    /// Print the final machine state as JSON
    #[arg(long)]
    dump_state: bool,
}

impl RunArgs {
    /// Settings file (if any) overridden by flags.
    fn config(&self) -> Result<SimConfig, SimError> {
        let mut config = match &self.config {
            Some(path) => SimConfig::load(path)?,
            None => SimConfig::default(),
        };
        if let Some(limit) = self.max_steps {
            config.max_steps = Some(limit);
        }
        config.trace |= self.trace;
        config.dump_state |= self.dump_state;
        if self.big_endian {
            config.byte_order = ByteOrder::Big;
        }
        Ok(config)
    }
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Some(Commands::Run(args)) => run_program(args),
        #[cfg(feature = "tui")]
        Some(Commands::Debug { program, input, big_endian }) => {
            init_logging(false);
            debug_program(program, input, order(big_endian))
        }
        Some(Commands::Asm { source, output, big_endian }) => {
            init_logging(false);
            assemble_file(source, output, order(big_endian))
        }
        Some(Commands::Disasm { image, big_endian }) => {
            init_logging(false);
            disassemble_file(image, order(big_endian))
        }
        None => run_program(cli.run),
    };

    if let Err(e) = result {
        println!("Error: {}", e);
        std::process::exit(1);
    }
}

fn order(big_endian: bool) -> ByteOrder {
    if big_endian {
        ByteOrder::Big
    } else {
        ByteOrder::Little
    }
}

/// Install the stderr subscriber; `RUST_LOG` wins over `--trace`.
fn init_logging(trace: bool) {
    let default = if trace { "warn,mini86=trace" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn run_program(args: RunArgs) -> Result<(), SimError> {
    let config = args.config()?;
    init_logging(config.trace);

    let path = args.program.ok_or(SimError::MissingProgram)?;
    let mut console = StdConsole::stdio();
    let (cpu, report) = mini86::run_file(&path, &config, &mut console)?;

    if report.halt.is_none() {
        eprintln!(
            "warning: stopped after {} steps without halting (raise --max-steps)",
            report.steps
        );
    }

    if config.dump_state {
        let json = serde_json::to_string_pretty(&cpu)
            .map_err(|e| SimError::Dump(e.to_string()))?;
        println!("{}", json);
    }

    Ok(())
}

#[cfg(feature = "tui")]
fn debug_program(path: PathBuf, input: Vec<i32>, order: ByteOrder) -> Result<(), SimError> {
    use mini86::cpu::decode::decode_program;
    use mini86::asm::ImageError;

    let image = mini86::load_image(&path, order)?;
    if image.is_empty() {
        return Err(SimError::Image(ImageError::Read("no instructions to execute".into())));
    }

    mini86::run_debugger(decode_program(&image.words), input)
        .map_err(|e| SimError::Terminal(e.to_string()))
}

fn assemble_file(source: PathBuf, output: Option<PathBuf>, order: ByteOrder) -> Result<(), SimError> {
    use mini86::asm::ImageError;

    let out_path = output.unwrap_or_else(|| source.with_extension("bin"));

    let text = std::fs::read_to_string(&source)
        .map_err(|e| SimError::Image(ImageError::Open(e.to_string())))?;
    let words = mini86::assemble(&text)?;
    mini86::save_image(&out_path, &mini86::ProgramImage::new(words), order)?;

    tracing::info!(source = %source.display(), output = %out_path.display(), "assembled");
    Ok(())
}

/// Raw field listing first, then the mnemonic form.
fn disassemble_file(path: PathBuf, order: ByteOrder) -> Result<(), SimError> {
    use mini86::cpu::decode::decode_program;

    let image = mini86::load_image(&path, order)?;
    print!("{}", mini86::asm::list_fields(&decode_program(&image.words)));
    print!("{}", mini86::disassemble(&image.words));
    Ok(())
}

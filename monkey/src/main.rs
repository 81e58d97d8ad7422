//! Monkey CLI - entry point for the Monkey interpreter.
//!
//! Parses command-line arguments with clap, initializes logging, and either
//! runs a file once or starts the interactive prompt.

mod error;
mod repl;

use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use error::{MonkeyError, Result};
use repl::Mode;

/// An interpreter for the Monkey programming language.
///
/// Without arguments it starts an interactive prompt. Two back-ends are
/// available: a tree-walking evaluator (default) and a bytecode VM
/// (`--compile`); both produce the same values.
#[derive(Parser, Debug)]
#[command(name = "monkey")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "An interpreter for the Monkey programming language", long_about = None)]
struct Cli {
    /// Path to a file to be evaluated
    #[arg(long)]
    file: Option<PathBuf>,

    /// Run the bytecode compiler and VM instead of the evaluator
    #[arg(long)]
    compile: bool,

    /// Print the token stream instead of evaluating
    #[arg(long)]
    lexer: bool,

    /// Print the parsed program with explicit grouping instead of evaluating
    #[arg(long)]
    precedence: bool,

    /// Enable verbose output
    #[arg(short, long, env = "MONKEY_VERBOSE")]
    verbose: bool,
}

impl Cli {
    fn mode(&self) -> Mode {
        if self.lexer {
            Mode::Lexer
        } else if self.precedence {
            Mode::Precedence
        } else if self.compile {
            Mode::Compile
        } else {
            Mode::Eval
        }
    }
}

fn main() {
    let cli = Cli::parse();
    if let Err(err) = run(cli) {
        eprintln!("error: {}", err);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    init_logging(cli.verbose)?;

    let mode = cli.mode();
    let stdout = io::stdout();
    let mut output = stdout.lock();

    if let Some(path) = &cli.file {
        // A missing or unreadable file is reported without failing the
        // process, like any other interpreter diagnostic.
        let source = match std::fs::read_to_string(path) {
            Ok(source) => source,
            Err(err) => {
                eprintln!("Error reading file: {}", err);
                return Ok(());
            }
        };
        repl::evaluate(&source, &mut output, mode)?;
        return Ok(());
    }

    greet(&mut output)?;

    let stdin = io::stdin();
    let mut input = stdin.lock();
    start_prompt(&mut input, &mut output, mode)
}

fn greet(output: &mut dyn Write) -> Result<()> {
    let user = std::env::var("USER")
        .or_else(|_| std::env::var("LOGNAME"))
        .unwrap_or_else(|_| "there".to_string());

    writeln!(
        output,
        "Hello {}! This is the Monkey programming language!",
        user
    )?;
    writeln!(output, "Feel free to type in commands")?;
    Ok(())
}

fn start_prompt(
    input: &mut dyn BufRead,
    output: &mut dyn Write,
    mode: Mode,
) -> Result<()> {
    repl::start(input, output, mode)?;
    Ok(())
}

/// Initialize the logging system.
fn init_logging(verbose: bool) -> Result<()> {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };

    let subscriber = fmt::layer()
        .with_writer(io::stderr)
        .with_target(false);

    tracing_subscriber::registry()
        .with(filter)
        .with(subscriber)
        .try_init()
        .map_err(|err| MonkeyError::Logging(format!("failed to initialize logging: {}", err)))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults_to_eval_mode() {
        let cli = Cli::parse_from(["monkey"]);
        assert_eq!(cli.mode(), Mode::Eval);
        assert!(cli.file.is_none());
    }

    #[test]
    fn test_cli_parse_file() {
        let cli = Cli::parse_from(["monkey", "--file", "script.monkey"]);
        assert_eq!(cli.file, Some(PathBuf::from("script.monkey")));
    }

    #[test]
    fn test_cli_parse_compile() {
        let cli = Cli::parse_from(["monkey", "--compile"]);
        assert_eq!(cli.mode(), Mode::Compile);
    }

    #[test]
    fn test_cli_lexer_wins_over_compile() {
        let cli = Cli::parse_from(["monkey", "--lexer", "--compile"]);
        assert_eq!(cli.mode(), Mode::Lexer);
    }

    #[test]
    fn test_cli_parse_precedence() {
        let cli = Cli::parse_from(["monkey", "--precedence"]);
        assert_eq!(cli.mode(), Mode::Precedence);
    }

    #[test]
    fn test_cli_parse_verbose() {
        let cli = Cli::parse_from(["monkey", "--verbose"]);
        assert!(cli.verbose);
    }
}

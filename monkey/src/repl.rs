//! The interactive prompt and the one-shot source runner.
//!
//! A [`Session`] holds whatever state must survive between lines so the
//! prompt feels like one continuous program: the evaluator keeps a single
//! environment; the VM back-end keeps the constants pool, the globals
//! vector and the symbol table, re-seeding a fresh compiler and machine for
//! every line. Only one line runs at a time; constants grow append-only and
//! global slots stay stable, so bytecode from earlier lines remains valid.

use std::io::{self, BufRead, Write};

use tracing::debug;

use monkey_compiler::{Compiler, SymbolTable};
use monkey_eval::eval_program;
use monkey_lex::{Lexer, TokenKind};
use monkey_object::{Env, Environment, Object};
use monkey_par::Parser;
use monkey_vm::{Vm, GLOBALS_SIZE};

const RESET: &str = "\x1b[0m";
const YELLOW: &str = "\x1b[33m";
const BLUE: &str = "\x1b[34m";

/// What the session does with each line of input.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    /// Tree-walking evaluator (the default).
    Eval,
    /// Bytecode compiler + VM.
    Compile,
    /// Print the token stream instead of evaluating.
    Lexer,
    /// Print the parsed program's canonical form instead of evaluating.
    Precedence,
}

/// Interpreter state that persists across prompt lines.
pub struct Session {
    mode: Mode,
    /// Whether results are wrapped in ANSI colors (prompt use).
    colors: bool,

    // Evaluator state.
    env: Env,

    // Compiler/VM state, threaded through each line.
    constants: Vec<Object>,
    globals: Vec<Object>,
    symbol_table: SymbolTable,
}

impl Session {
    pub fn new(mode: Mode, colors: bool) -> Self {
        Self {
            mode,
            colors,
            env: Environment::new(),
            constants: Vec::new(),
            globals: vec![Object::Null; GLOBALS_SIZE],
            symbol_table: SymbolTable::with_builtins(),
        }
    }

    /// Runs one unit of input (a prompt line or a whole file) and writes
    /// any result to `output`.
    pub fn interpret(&mut self, source: &str, output: &mut dyn Write) -> io::Result<()> {
        debug!(mode = ?self.mode, bytes = source.len(), "interpreting input");

        if self.mode == Mode::Lexer {
            return self.print_tokens(source, output);
        }

        let mut parser = Parser::from_source(source);
        let program = parser.parse_program();
        if !parser.errors().is_empty() {
            print_parser_errors(output, parser.errors())?;
            return Ok(());
        }

        match self.mode {
            Mode::Precedence => writeln!(output, "{}", program),
            Mode::Eval => {
                if let Some(evaluated) = eval_program(&program, &self.env) {
                    self.print_result(output, &evaluated)?;
                }
                Ok(())
            }
            Mode::Compile => self.compile_and_run(&program, output),
            Mode::Lexer => Ok(()),
        }
    }

    fn compile_and_run(
        &mut self,
        program: &monkey_par::ast::Program,
        output: &mut dyn Write,
    ) -> io::Result<()> {
        let symbol_table = std::mem::take(&mut self.symbol_table);
        let constants = std::mem::take(&mut self.constants);

        let mut compiler = Compiler::new_with_state(symbol_table, constants);
        let compiled = compiler.compile(program);
        let bytecode = compiler.bytecode();

        // Keep the state either way so the next line continues from here.
        let (symbol_table, constants) = compiler.into_state();
        self.symbol_table = symbol_table;
        self.constants = constants;

        if let Err(err) = compiled {
            writeln!(output, "Woops! Compilation failed:\n {}", err)?;
            return Ok(());
        }

        debug!(
            constants = self.constants.len(),
            instructions = bytecode.instructions.len(),
            "compiled"
        );

        let mut machine = Vm::new_with_globals(bytecode, std::mem::take(&mut self.globals));
        let outcome = machine.run();
        let result = machine.last_popped().clone();
        self.globals = machine.into_globals();

        if let Err(err) = outcome {
            writeln!(output, "Woops! Executing bytecode failed:\n {}", err)?;
            return Ok(());
        }

        self.print_result(output, &result)
    }

    fn print_tokens(&self, source: &str, output: &mut dyn Write) -> io::Result<()> {
        let mut lexer = Lexer::new(source);
        loop {
            let token = lexer.next_token();
            if token.kind == TokenKind::Eof {
                return Ok(());
            }
            writeln!(output, "{:?}", token)?;
        }
    }

    fn print_result(&self, output: &mut dyn Write, result: &Object) -> io::Result<()> {
        if self.colors {
            writeln!(output, "{}{}{}", YELLOW, result.inspect(), RESET)
        } else {
            writeln!(output, "{}", result.inspect())
        }
    }
}

/// Runs the interactive prompt until end of input.
pub fn start(
    input: &mut dyn BufRead,
    output: &mut dyn Write,
    mode: Mode,
) -> io::Result<()> {
    let mut session = Session::new(mode, true);
    let mut line = String::new();

    loop {
        write!(output, "{}>> {}", BLUE, RESET)?;
        output.flush()?;

        line.clear();
        if input.read_line(&mut line)? == 0 {
            return Ok(());
        }

        session.interpret(line.trim_end(), output)?;
    }
}

/// Runs a whole source text once (the `--file` path), without colors.
pub fn evaluate(source: &str, output: &mut dyn Write, mode: Mode) -> io::Result<()> {
    let mut session = Session::new(mode, false);
    session.interpret(source, output)
}

fn print_parser_errors(output: &mut dyn Write, errors: &[String]) -> io::Result<()> {
    writeln!(output, "Woops!, We ran into some monkey business here!")?;
    writeln!(output, " parser errors:")?;
    for message in errors {
        writeln!(output, "\t{}", message)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn interpret_lines(mode: Mode, lines: &[&str]) -> String {
        let mut session = Session::new(mode, false);
        let mut output = Vec::new();
        for line in lines {
            session.interpret(line, &mut output).unwrap();
        }
        String::from_utf8(output).unwrap()
    }

    #[test]
    fn test_eval_mode_prints_result() {
        assert_eq!(interpret_lines(Mode::Eval, &["1 + 2"]), "3\n");
    }

    #[test]
    fn test_eval_mode_keeps_environment_across_lines() {
        assert_eq!(
            interpret_lines(Mode::Eval, &["let a = 5;", "a + 10"]),
            "15\n"
        );
    }

    #[test]
    fn test_compile_mode_keeps_state_across_lines() {
        assert_eq!(
            interpret_lines(Mode::Compile, &["let a = 5;", "a + 10"]),
            "5\n15\n"
        );
    }

    #[test]
    fn test_compile_mode_survives_undefined_variable() {
        let output = interpret_lines(Mode::Compile, &["nope", "1 + 1"]);
        assert!(output.contains("Woops! Compilation failed:"));
        assert!(output.contains("undefined variable nope"));
        assert!(output.ends_with("2\n"));
    }

    #[test]
    fn test_compile_mode_reports_runtime_errors() {
        let output = interpret_lines(Mode::Compile, &["5 + true"]);
        assert!(output.contains("Woops! Executing bytecode failed:"));
        assert!(output.contains("unsupported types for binary operation: INTEGER BOOLEAN"));
    }

    #[test]
    fn test_parser_errors_use_monkey_business_header() {
        let output = interpret_lines(Mode::Eval, &["let x 5;"]);
        assert_eq!(
            output,
            "Woops!, We ran into some monkey business here!\n \
             parser errors:\n\texpected next token to be =, got INT instead\n"
        );
    }

    #[test]
    fn test_empty_input_prints_nothing() {
        assert_eq!(interpret_lines(Mode::Eval, &[""]), "");
    }

    #[test]
    fn test_precedence_mode_prints_grouping() {
        assert_eq!(
            interpret_lines(Mode::Precedence, &["1 + 2 * 3"]),
            "(1 + (2 * 3))\n"
        );
    }

    #[test]
    fn test_lexer_mode_prints_tokens() {
        let output = interpret_lines(Mode::Lexer, &["let x = 5;"]);
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines.len(), 5);
        assert!(lines[0].contains("Let"));
        assert!(lines[4].contains("Semicolon"));
    }

    #[test]
    fn test_runtime_error_objects_print_in_eval_mode() {
        assert_eq!(
            interpret_lines(Mode::Eval, &["-true"]),
            "ERROR: unknown operator: -BOOLEAN\n"
        );
    }

    #[test]
    fn test_both_backends_agree_on_seed_program() {
        let source = "let newAdder = fn(x) { fn(y) { x + y } }; \
                      let addTwo = newAdder(2); addTwo(3);";
        assert_eq!(interpret_lines(Mode::Eval, &[source]), "5\n");
        // The VM mode also echoes the intermediate let values.
        assert!(interpret_lines(Mode::Compile, &[source]).ends_with("5\n"));
    }

    #[test]
    fn test_start_reads_until_eof() {
        let mut input = io::Cursor::new(b"1 + 1\n".to_vec());
        let mut output = Vec::new();
        start(&mut input, &mut output, Mode::Eval).unwrap();

        let text = String::from_utf8(output).unwrap();
        assert!(text.contains(">> "));
        assert!(text.contains('2'));
    }
}

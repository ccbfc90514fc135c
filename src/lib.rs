//! A tree-walking interpreter for a small dynamically-typed scripting
//! language, built as lexer -> parser -> resolver -> evaluator.

pub mod ast;
pub mod environment;
pub mod interpreter;
pub mod lexer;
pub mod parser;
pub mod report;
pub mod resolver;
pub mod token;
pub mod value;

use std::io::Write;

use environment::Environment;
use interpreter::Interpreter;
use lexer::Lexer;
use parser::Parser;
use resolver::Resolver;

/// Which pipeline stage, if any, produced errors — mirrors the exit-code
/// categories of §6 (`plox [script]`'s CLI contract) without hardcoding
/// process exit codes into the library.
pub enum RunOutcome {
    Ok,
    StaticError,
    RuntimeError(report::RuntimeError),
}

/// Runs one batch of source through the full pipeline against a persistent
/// `Interpreter`, writing diagnostics to `err_out` in the uniform shape of
/// §7 and `print` output through whatever sink the interpreter was built
/// with. This is the single entry point the CLI driver (REPL and file-run
/// modes alike) and the integration tests both call.
pub fn run_source(interpreter: &mut Interpreter, source: &str, err_out: &mut impl Write) -> RunOutcome {
    let (tokens, lex_errors) = Lexer::new(source).scan();
    let (statements, parse_errors) = Parser::new(tokens).parse();
    let (table, resolve_errors) = Resolver::new().resolve(&statements);

    let had_static_error = !lex_errors.is_empty() || !parse_errors.is_empty() || !resolve_errors.is_empty();

    for error in &lex_errors {
        let _ = writeln!(err_out, "{error}");
    }
    for error in &parse_errors {
        let _ = writeln!(err_out, "{error}");
    }
    for error in &resolve_errors {
        let _ = writeln!(err_out, "{error}");
    }

    if had_static_error {
        return RunOutcome::StaticError;
    }

    interpreter.load_resolution(table);
    match interpreter.interpret(&statements) {
        Ok(()) => RunOutcome::Ok,
        Err(error) => {
            let _ = writeln!(err_out, "{error}");
            RunOutcome::RuntimeError(error)
        }
    }
}

/// Builds a fresh root environment with no native functions installed; the
/// driver is responsible for registering `clock` (and any future natives)
/// before constructing the `Interpreter`, per §6.
pub fn new_root_environment() -> Environment {
    Environment::new()
}

//! CLI driver: argument parsing, file reading, the REPL loop, and process
//! exit codes. Everything pipeline-shaped lives in the library; this binary
//! is the "external collaborator" the core neither needs nor sees.

use std::fs;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::{SystemTime, UNIX_EPOCH};

use clap::Parser;
use log::debug;

use plox::environment::Environment;
use plox::interpreter::Interpreter;
use plox::value::{NativeFunction, Value};
use plox::RunOutcome;

/// `plox [script]` — with no path, starts an interactive REPL; with one, runs
/// the file. More than one positional argument is a usage error.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    /// Positional arguments; clap collects all of them so we can apply the
    /// exact "more than one is an error" rule ourselves (see §6's contract),
    /// rather than clap's own arity error.
    args: Vec<PathBuf>,
}

const EXIT_OK: u8 = 0;
const EXIT_USAGE: u8 = 64;
const EXIT_STATIC_ERROR: u8 = 65;
const EXIT_RUNTIME_ERROR: u8 = 70;

fn main() -> ExitCode {
    simple_logger::init_with_level(log::Level::Warn).ok();

    let cli = Cli::parse();

    match cli.args.as_slice() {
        [] => run_repl(),
        [script] => run_file(script),
        _ => {
            eprintln!("Usage: plox [script]");
            ExitCode::from(EXIT_USAGE)
        }
    }
}

fn new_interpreter() -> Interpreter {
    let globals = Environment::new();
    globals.define(
        "clock",
        Value::Native(std::rc::Rc::new(NativeFunction::new("clock", 0, |_interpreter, _args| {
            let now = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default();
            Ok(Value::Number(now.as_secs_f64()))
        }))),
    );
    Interpreter::new(globals)
}

fn run_file(path: &PathBuf) -> ExitCode {
    let source = match fs::read_to_string(path) {
        Ok(source) => source,
        Err(err) => {
            eprintln!("Could not read file '{}': {err}", path.display());
            return ExitCode::from(EXIT_RUNTIME_ERROR);
        }
    };

    let mut interpreter = new_interpreter();
    let mut stderr = io::stderr();
    match plox::run_source(&mut interpreter, &source, &mut stderr) {
        RunOutcome::Ok => ExitCode::from(EXIT_OK),
        RunOutcome::StaticError => ExitCode::from(EXIT_STATIC_ERROR),
        RunOutcome::RuntimeError(_) => ExitCode::from(EXIT_RUNTIME_ERROR),
    }
}

/// Errors on a REPL line never terminate the session; the root environment
/// persists across lines, so a `var` declared on one line is visible on the
/// next.
fn run_repl() -> ExitCode {
    let mut interpreter = new_interpreter();
    let stdin = io::stdin();
    let mut stderr = io::stderr();

    print!("> ");
    let _ = io::stdout().flush();

    for line in stdin.lock().lines() {
        let Ok(line) = line else { break };

        match plox::run_source(&mut interpreter, &line, &mut stderr) {
            RunOutcome::Ok => {}
            RunOutcome::StaticError => debug!("REPL line produced a static error"),
            RunOutcome::RuntimeError(_) => debug!("REPL line produced a runtime error"),
        }

        print!("> ");
        let _ = io::stdout().flush();
    }

    ExitCode::from(EXIT_OK)
}

//! Black-box tests driving the library's pipeline entry point directly,
//! asserting on captured stdout and the resulting run outcome — the
//! in-process analogue of shelling out to the compiled binary.

use std::cell::RefCell;
use std::io::{self, Write};
use std::rc::Rc;

use plox::environment::Environment;
use plox::interpreter::Interpreter;
use plox::value::{NativeFunction, Value};
use plox::RunOutcome;

#[derive(Clone, Default)]
struct SharedBuf(Rc<RefCell<Vec<u8>>>);

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().write(buf)
    }
    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl SharedBuf {
    fn take_string(&self) -> String {
        String::from_utf8(self.0.borrow().clone()).unwrap()
    }
}

fn fresh_interpreter() -> (Interpreter, SharedBuf) {
    let globals = Environment::new();
    globals.define(
        "clock",
        Value::Native(Rc::new(NativeFunction::new("clock", 0, |_, _| Ok(Value::Number(0.0))))),
    );
    let stdout = SharedBuf::default();
    (Interpreter::with_writer(globals, Box::new(stdout.clone())), stdout)
}

fn run(source: &str) -> (String, String, bool) {
    let (mut interpreter, stdout) = fresh_interpreter();
    let mut stderr = SharedBuf::default();
    let outcome = plox::run_source(&mut interpreter, source, &mut stderr);
    (stdout.take_string(), stderr.take_string(), matches!(outcome, RunOutcome::Ok))
}

#[test]
fn print_arithmetic_expression() {
    let (stdout, _, ok) = run("print 1 + 2;");
    assert!(ok);
    assert_eq!(stdout, "3\n");
}

#[test]
fn string_concatenation() {
    let (stdout, _, ok) = run("var a = \"hi\"; print a + \" there\";");
    assert!(ok);
    assert_eq!(stdout, "hi there\n");
}

#[test]
fn for_loop_counts_up() {
    let (stdout, _, ok) = run("for (var i = 0; i < 3; i = i + 1) print i;");
    assert!(ok);
    assert_eq!(stdout, "0\n1\n2\n");
}

#[test]
fn closure_counter_keeps_its_own_state() {
    let source = "fun make() { var n = 0; fun inc() { n = n + 1; return n; } return inc; } \
                  var f = make(); print f(); print f(); print f();";
    let (stdout, _, ok) = run(source);
    assert!(ok);
    assert_eq!(stdout, "1\n2\n3\n");
}

#[test]
fn two_independent_closures_do_not_share_state() {
    let source = "fun make() { var n = 0; fun inc() { n = n + 1; return n; } return inc; } \
                  var a = make(); var b = make(); print a(); print a(); print b();";
    let (stdout, _, ok) = run(source);
    assert!(ok);
    assert_eq!(stdout, "1\n2\n1\n");
}

#[test]
fn recursive_factorial_of_five() {
    let (stdout, _, ok) = run("fun fact(n) { if (n <= 1) return 1; return n * fact(n - 1); } print fact(5);");
    assert!(ok);
    assert_eq!(stdout, "120\n");
}

#[test]
fn division_by_zero_is_a_runtime_error_with_the_exact_message() {
    let (stdout, stderr, ok) = run("print 1 / 0;");
    assert!(!ok);
    assert_eq!(stdout, "");
    assert_eq!(stderr.trim_end(), "Division by zero. [line 1]");
}

#[test]
fn shadowing_initializer_is_a_resolve_error() {
    let (_, stderr, ok) = run("var a = 1; { var a = a + 2; print a; }");
    assert!(!ok);
    assert!(stderr.contains("Cannot read local variable in its own initializer."));
}

#[test]
fn runtime_error_aborts_the_rest_of_the_batch() {
    let (stdout, _, ok) = run("print 1; print 1 / 0; print 2;");
    assert!(!ok);
    // the statement after the error never runs
    assert_eq!(stdout, "1\n");
}

#[test]
fn lex_errors_are_reported_and_do_not_crash_the_pipeline() {
    let (_, stderr, ok) = run("var x = 1; @ print x;");
    assert!(!ok);
    assert!(stderr.contains("Unexpected character"));
}

#[test]
fn parse_errors_use_panic_mode_and_still_run_remaining_sound_statements_detection() {
    // even though the batch as a whole is a static error, the parser collects
    // this one error and keeps parsing past it rather than stopping dead.
    let (_, stderr, ok) = run("var = 1; var x = 2;");
    assert!(!ok);
    assert!(stderr.contains("Expect variable name."));
}

#[test]
fn classes_support_fields_and_methods() {
    let source = "class Counter { get() { return 1; } } \
                  var c = Counter(); c.value = 10; print c.value; print c.get();";
    let (stdout, _, ok) = run(source);
    assert!(ok);
    assert_eq!(stdout, "10\n1\n");
}

#[test]
fn break_only_escapes_the_innermost_loop() {
    let source = "var log = \"\"; \
                  for (var i = 0; i < 2; i = i + 1) { \
                    for (var j = 0; j < 5; j = j + 1) { \
                      if (j == 2) break; \
                      log = log + \"x\"; \
                    } \
                  } \
                  print log;";
    let (stdout, _, ok) = run(source);
    assert!(ok);
    assert_eq!(stdout, "xxxx\n");
}

#[test]
fn native_clock_is_callable_when_registered_by_the_driver() {
    let (stdout, _, ok) = run("print clock() == 0;");
    assert!(ok);
    assert_eq!(stdout, "true\n");
}

#[test]
fn resolution_table_persists_across_multiple_run_source_calls_like_a_repl_line() {
    let (mut interpreter, stdout) = fresh_interpreter();
    let mut stderr = SharedBuf::default();

    assert!(matches!(
        plox::run_source(&mut interpreter, "var a = 1;", &mut stderr),
        RunOutcome::Ok
    ));
    assert!(matches!(
        plox::run_source(&mut interpreter, "print a;", &mut stderr),
        RunOutcome::Ok
    ));

    assert_eq!(stdout.take_string(), "1\n");
}

//! Tree-walking evaluator: executes statements against a chain of lexical
//! environments, implementing the call/return/break protocol.

use std::cell::RefCell;
use std::collections::HashMap;
use std::io::{self, Write};
use std::rc::Rc;

use crate::ast::{Expr, LiteralValue, NodeId, Stmt};
use crate::environment::Environment;
use crate::report::RuntimeError;
use crate::resolver::ResolutionTable;
use crate::token::{Token, TokenKind};
use crate::value::{LoxClass, LoxFunction, LoxInstance, Value};

/// The three non-local signals of the control-flow model, folded into the
/// `Ok` side of every statement-execution result; `Err` carries the fourth
/// (a runtime error). Kept as one sum type so the evaluator's statement
/// dispatch stays total instead of threading exceptions through unrelated
/// code paths.
enum Signal {
    None,
    Return(Value),
    Break,
}

type ExecResult = Result<Signal, RuntimeError>;
type EvalResult = Result<Value, RuntimeError>;

pub struct Interpreter {
    pub globals: Environment,
    environment: Environment,
    locals: ResolutionTable,
    out: Box<dyn Write>,
}

impl Interpreter {
    /// Builds an interpreter writing `print` output to stdout.
    pub fn new(globals: Environment) -> Self {
        Self::with_writer(globals, Box::new(io::stdout()))
    }

    /// Builds an interpreter writing `print` output to an arbitrary sink,
    /// primarily so tests can capture it without touching process stdout.
    pub fn with_writer(globals: Environment, out: Box<dyn Write>) -> Self {
        Self {
            environment: globals.clone(),
            globals,
            locals: ResolutionTable::new(),
            out,
        }
    }

    /// Installs the resolution table produced by a resolver pass. REPL
    /// sessions call this once per line, merging in new entries, since node
    /// ids are unique for the process's lifetime.
    pub fn load_resolution(&mut self, locals: ResolutionTable) {
        self.locals.extend(locals);
    }

    /// Runs a top-level statement batch. On the first runtime error, aborts
    /// the remainder of the batch, matching §4.5's batch-abort rule.
    pub fn interpret(&mut self, statements: &[Stmt]) -> Result<(), RuntimeError> {
        for statement in statements {
            match self.execute(statement)? {
                Signal::None => {}
                Signal::Return(_) | Signal::Break => {
                    // A `return`/`break` that bubbles all the way to the top
                    // of a statement batch is an interpreter bug (the
                    // resolver would have had to miss a boundary check), not
                    // a user-facing condition; treat it as a no-op rather
                    // than panicking on malformed input paths we can't hit
                    // given a sound resolver.
                }
            }
        }
        Ok(())
    }

    fn execute(&mut self, statement: &Stmt) -> ExecResult {
        match statement {
            Stmt::Expression { expression } => {
                self.evaluate(expression)?;
                Ok(Signal::None)
            }
            Stmt::Print { expression } => {
                let value = self.evaluate(expression)?;
                let _ = writeln!(self.out, "{value}");
                Ok(Signal::None)
            }
            Stmt::Var { name, initializer } => {
                let value = match initializer {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::Nil,
                };
                self.environment.define(name.lexeme.clone(), value);
                Ok(Signal::None)
            }
            Stmt::Block { statements } => {
                let previous = self.environment.clone();
                self.environment = previous.child();
                let result = self.execute_block(statements);
                self.environment = previous;
                result
            }
            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.evaluate(condition)?.is_truthy() {
                    self.execute(then_branch)
                } else if let Some(else_branch) = else_branch {
                    self.execute(else_branch)
                } else {
                    Ok(Signal::None)
                }
            }
            Stmt::While { condition, body } => {
                while self.evaluate(condition)?.is_truthy() {
                    match self.execute(body)? {
                        Signal::None => {}
                        Signal::Break => break,
                        Signal::Return(value) => return Ok(Signal::Return(value)),
                    }
                }
                Ok(Signal::None)
            }
            Stmt::Break { .. } => Ok(Signal::Break),
            Stmt::Function { decl } => {
                let function = Value::Function(Rc::new(LoxFunction {
                    decl: decl.clone(),
                    closure: self.environment.clone(),
                }));
                let name = decl.name.as_ref().expect("named function declaration");
                self.environment.define(name.lexeme.clone(), function);
                Ok(Signal::None)
            }
            Stmt::Return { value, .. } => {
                let value = match value {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::Nil,
                };
                Ok(Signal::Return(value))
            }
            Stmt::Class { name, methods } => {
                self.environment.define(name.lexeme.clone(), Value::Nil);

                // A scope for the class' method scope, mirrored from the
                // resolver; currently never populated (see crate design
                // notes on `this`/`super`).
                let method_scope = self.environment.child();
                let mut table = HashMap::new();
                for method in methods {
                    let function = Rc::new(LoxFunction {
                        decl: method.clone(),
                        closure: method_scope.clone(),
                    });
                    table.insert(
                        method.name.as_ref().expect("method declaration").lexeme.clone(),
                        function,
                    );
                }

                let class = Value::Class(Rc::new(LoxClass {
                    name: name.lexeme.clone(),
                    methods: table,
                }));
                self.environment.assign(&name.lexeme, class);
                Ok(Signal::None)
            }
        }
    }

    fn execute_block(&mut self, statements: &[Stmt]) -> ExecResult {
        for statement in statements {
            match self.execute(statement)? {
                Signal::None => {}
                signal => return Ok(signal),
            }
        }
        Ok(Signal::None)
    }

    fn evaluate(&mut self, expr: &Expr) -> EvalResult {
        match expr {
            Expr::Literal { value } => Ok(literal_value(value)),
            Expr::Grouping { expression } => self.evaluate(expression),
            Expr::Unary { operator, right } => self.evaluate_unary(operator, right),
            Expr::Binary { left, operator, right } => self.evaluate_binary(left, operator, right),
            Expr::Logical { left, operator, right } => self.evaluate_logical(left, operator, right),
            Expr::Variable { id, name } => self.look_up_variable(*id, name),
            Expr::Assignment { id, name, value } => {
                let value = self.evaluate(value)?;
                match self.locals.get(id) {
                    Some(&depth) => self.environment.assign_at(depth, &name.lexeme, value.clone()),
                    None => {
                        if !self.globals.assign(&name.lexeme, value.clone()) {
                            return Err(RuntimeError::new(
                                format!("Undefined variable '{}'.", name.lexeme),
                                name.clone(),
                            ));
                        }
                    }
                }
                Ok(value)
            }
            Expr::Call {
                callee,
                paren,
                arguments,
            } => self.evaluate_call(callee, paren, arguments),
            Expr::Get { object, name } => {
                let object = self.evaluate(object)?;
                self.get_property(&object, name)
            }
            Expr::Set { object, name, value } => {
                let object = self.evaluate(object)?;
                let Value::Instance(instance) = &object else {
                    return Err(RuntimeError::new("Only instances have fields.", name.clone()));
                };
                let value = self.evaluate(value)?;
                instance.borrow_mut().fields.insert(name.lexeme.clone(), value.clone());
                Ok(value)
            }
            Expr::AnonymousFn { decl } => Ok(Value::Function(Rc::new(LoxFunction {
                decl: decl.clone(),
                closure: self.environment.clone(),
            }))),
        }
    }

    fn look_up_variable(&self, id: NodeId, name: &Token) -> EvalResult {
        let value = match self.locals.get(&id) {
            Some(&depth) => self.environment.get_at(depth, &name.lexeme),
            None => self.globals.get(&name.lexeme),
        };
        value.ok_or_else(|| RuntimeError::new(format!("Undefined variable '{}'.", name.lexeme), name.clone()))
    }

    fn evaluate_unary(&mut self, operator: &Token, right: &Expr) -> EvalResult {
        let right = self.evaluate(right)?;
        match operator.kind {
            TokenKind::Minus => match right {
                Value::Number(n) => Ok(Value::Number(-n)),
                _ => Err(RuntimeError::new("Operands must be numbers.", operator.clone())),
            },
            TokenKind::Bang => Ok(Value::Bool(!right.is_truthy())),
            _ => unreachable!("parser only ever produces '-'/'!' unary operators"),
        }
    }

    fn evaluate_binary(&mut self, left: &Expr, operator: &Token, right: &Expr) -> EvalResult {
        let left = self.evaluate(left)?;
        let right = self.evaluate(right)?;

        use TokenKind::*;
        match (operator.kind, &left, &right) {
            (Plus, Value::Number(a), Value::Number(b)) => Ok(Value::Number(a + b)),
            (Plus, Value::Str(a), Value::Str(b)) => Ok(Value::Str(format!("{a}{b}"))),
            (Plus, _, _) => Err(RuntimeError::new(
                "Operands must be two numbers or two strings.",
                operator.clone(),
            )),

            (Minus, Value::Number(a), Value::Number(b)) => Ok(Value::Number(a - b)),
            (Star, Value::Number(a), Value::Number(b)) => Ok(Value::Number(a * b)),
            (Slash, Value::Number(a), Value::Number(b)) => {
                if *b == 0.0 {
                    Err(RuntimeError::new("Division by zero.", operator.clone()))
                } else {
                    Ok(Value::Number(a / b))
                }
            }
            (Minus | Star | Slash, _, _) => Err(RuntimeError::new("Operands must be numbers.", operator.clone())),

            (Greater, Value::Number(a), Value::Number(b)) => Ok(Value::Bool(a > b)),
            (GreaterEqual, Value::Number(a), Value::Number(b)) => Ok(Value::Bool(a >= b)),
            (Less, Value::Number(a), Value::Number(b)) => Ok(Value::Bool(a < b)),
            (LessEqual, Value::Number(a), Value::Number(b)) => Ok(Value::Bool(a <= b)),
            (Greater | GreaterEqual | Less | LessEqual, _, _) => {
                Err(RuntimeError::new("Operands must be numbers.", operator.clone()))
            }

            (EqualEqual, a, b) => Ok(Value::Bool(a == b)),
            (BangEqual, a, b) => Ok(Value::Bool(a != b)),

            _ => unreachable!("parser only ever produces binary operators handled above"),
        }
    }

    fn evaluate_logical(&mut self, left: &Expr, operator: &Token, right: &Expr) -> EvalResult {
        let left = self.evaluate(left)?;
        match operator.kind {
            TokenKind::Or if left.is_truthy() => Ok(left),
            TokenKind::Or => self.evaluate(right),
            TokenKind::And if !left.is_truthy() => Ok(left),
            TokenKind::And => self.evaluate(right),
            _ => unreachable!("parser only ever produces 'and'/'or' logical operators"),
        }
    }

    fn evaluate_call(&mut self, callee: &Expr, paren: &Token, arguments: &[Expr]) -> EvalResult {
        let callee = self.evaluate(callee)?;

        let mut args = Vec::with_capacity(arguments.len());
        for argument in arguments {
            args.push(self.evaluate(argument)?);
        }

        match callee {
            Value::Function(function) => self.call_function(&function, &args, paren),
            Value::Native(native) => {
                if args.len() != native.arity {
                    return Err(arity_error(native.arity, args.len(), paren));
                }
                (native.body)(self, &args)
            }
            Value::Class(class) => {
                if !args.is_empty() {
                    return Err(arity_error(0, args.len(), paren));
                }
                Ok(Value::Instance(Rc::new(RefCell::new(LoxInstance::new(class)))))
            }
            _ => Err(RuntimeError::new("Can only call functions and classes.", paren.clone())),
        }
    }

    fn call_function(&mut self, function: &Rc<LoxFunction>, args: &[Value], paren: &Token) -> EvalResult {
        if args.len() != function.arity() {
            return Err(arity_error(function.arity(), args.len(), paren));
        }

        let call_env = function.closure.child();
        for (param, arg) in function.decl.params.iter().zip(args) {
            call_env.define(param.lexeme.clone(), arg.clone());
        }

        let previous = std::mem::replace(&mut self.environment, call_env);
        let result = self.execute_block(&function.decl.body);
        self.environment = previous;

        match result? {
            Signal::Return(value) => Ok(value),
            Signal::None | Signal::Break => Ok(Value::Nil),
        }
    }

    fn get_property(&self, object: &Value, name: &Token) -> EvalResult {
        let Value::Instance(instance) = object else {
            return Err(RuntimeError::new("Only instances have properties.", name.clone()));
        };

        let instance_ref = instance.borrow();
        if let Some(value) = instance_ref.fields.get(&name.lexeme) {
            return Ok(value.clone());
        }
        if let Some(method) = instance_ref.class.find_method(&name.lexeme) {
            return Ok(Value::Function(method));
        }
        Err(RuntimeError::new(format!("Undefined property '{}'.", name.lexeme), name.clone()))
    }
}

fn literal_value(value: &LiteralValue) -> Value {
    match value {
        LiteralValue::Number(n) => Value::Number(*n),
        LiteralValue::String(s) => Value::Str(s.clone()),
        LiteralValue::Bool(b) => Value::Bool(*b),
        LiteralValue::Nil => Value::Nil,
    }
}

fn arity_error(expected: usize, got: usize, at: &Token) -> RuntimeError {
    RuntimeError::new(format!("Expected {expected} arguments but got {got}."), at.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Lexer;
    use crate::parser::Parser;
    use crate::resolver::Resolver;

    /// A `Write` sink backed by a shared buffer, so a test can keep reading
    /// access to captured output after handing the sink's `Box<dyn Write>`
    /// half off to the interpreter.
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

    fn run(source: &str) -> Result<String, RuntimeError> {
        let (tokens, lex_errors) = Lexer::new(source).scan();
        assert!(lex_errors.is_empty(), "{lex_errors:?}");
        let (statements, parse_errors) = Parser::new(tokens).parse();
        assert!(parse_errors.is_empty(), "{parse_errors:?}");
        let (table, resolve_errors) = Resolver::new().resolve(&statements);
        assert!(resolve_errors.is_empty(), "{resolve_errors:?}");

        let globals = Environment::new();
        let sink = SharedBuf::default();
        let mut interpreter = Interpreter::with_writer(globals, Box::new(sink.clone()));
        interpreter.load_resolution(table);
        interpreter.interpret(&statements)?;
        let out = sink.0.borrow().clone();
        Ok(String::from_utf8(out).unwrap())
    }

    #[test]
    fn prints_arithmetic() {
        assert_eq!(run("print 1 + 2;").unwrap(), "3\n");
    }

    #[test]
    fn string_concatenation() {
        assert_eq!(run("var a = \"hi\"; print a + \" there\";").unwrap(), "hi there\n");
    }

    #[test]
    fn for_loop_desugars_and_runs() {
        assert_eq!(
            run("for (var i = 0; i < 3; i = i + 1) print i;").unwrap(),
            "0\n1\n2\n"
        );
    }

    #[test]
    fn closure_counter_preserves_state_across_calls() {
        let source = "fun make() { var n = 0; fun inc() { n = n + 1; return n; } return inc; } var f = make(); print f(); print f(); print f();";
        assert_eq!(run(source).unwrap(), "1\n2\n3\n");
    }

    #[test]
    fn division_by_zero_is_a_runtime_error() {
        let err = run("print 1 / 0;").unwrap_err();
        assert_eq!(err.to_string(), "Division by zero. [line 1]");
    }

    #[test]
    fn recursive_factorial() {
        let source = "fun fact(n) { if (n <= 1) return 1; return n * fact(n - 1); } print fact(5);";
        assert_eq!(run(source).unwrap(), "120\n");
    }

    #[test]
    fn short_circuit_or_skips_right_side() {
        let source = "fun boom() { print \"boom\"; return true; } print true or boom();";
        assert_eq!(run(source).unwrap(), "true\n");
    }

    #[test]
    fn short_circuit_and_skips_right_side() {
        let source = "fun boom() { print \"boom\"; return true; } print false and boom();";
        assert_eq!(run(source).unwrap(), "false\n");
    }

    #[test]
    fn break_exits_innermost_loop_only() {
        let source = "var count = 0; while (true) { count = count + 1; if (count == 3) break; } print count;";
        assert_eq!(run(source).unwrap(), "3\n");
    }

    #[test]
    fn undefined_variable_is_a_runtime_error() {
        let err = run("print missing;").unwrap_err();
        assert!(err.message.contains("Undefined variable"));
    }

    #[test]
    fn wrong_arity_is_a_runtime_error() {
        let err = run("fun f(a, b) { return a; } f(1);").unwrap_err();
        assert_eq!(err.message, "Expected 2 arguments but got 1.");
    }

    #[test]
    fn class_instantiation_and_method_dispatch() {
        let source = "class Greeter { hello() { return \"hi\"; } } var g = Greeter(); print g.hello();";
        assert_eq!(run(source).unwrap(), "hi\n");
    }

    #[test]
    fn instance_field_assignment_and_read() {
        let source = "class Box {} var b = Box(); b.value = 42; print b.value;";
        assert_eq!(run(source).unwrap(), "42\n");
    }

    #[test]
    fn assigning_to_non_instance_is_an_error() {
        let err = run("var x = 1; x.y = 2;").unwrap_err();
        assert_eq!(err.message, "Only instances have fields.");
    }

    #[test]
    fn print_formats_match_spec() {
        assert_eq!(run("print 3.0;").unwrap(), "3\n");
        assert_eq!(run("print 3.5;").unwrap(), "3.5\n");
        assert_eq!(run("print nil;").unwrap(), "nil\n");
        assert_eq!(run("fun f() {} print f;").unwrap(), "<f fn>\n");
        assert_eq!(run("print fun () {};").unwrap(), "<anonymous fn>\n");
        assert_eq!(run("class C {} print C;").unwrap(), "<class C>\n");
        assert_eq!(run("class C {} print C();").unwrap(), "<C instance>\n");
    }
}

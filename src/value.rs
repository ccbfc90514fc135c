//! Runtime value representation and the callable object model.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt::{self, Display};
use std::rc::Rc;

use crate::ast::FunctionDecl;
use crate::environment::Environment;
use crate::interpreter::Interpreter;
use crate::report::RuntimeError;

#[derive(Clone)]
pub enum Value {
    Number(f64),
    Str(String),
    Bool(bool),
    Nil,
    Function(Rc<LoxFunction>),
    Native(Rc<NativeFunction>),
    Class(Rc<LoxClass>),
    Instance(Rc<RefCell<LoxInstance>>),
}

impl Value {
    /// `false` and `nil` are false; everything else is true.
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Bool(false) | Value::Nil)
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Nil, Value::Nil) => true,
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            (Value::Native(a), Value::Native(b)) => Rc::ptr_eq(a, b),
            (Value::Class(a), Value::Class(b)) => Rc::ptr_eq(a, b),
            (Value::Instance(a), Value::Instance(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            // Rust's f64 Display already omits a trailing ".0" for integral
            // values (3.0 -> "3", 3.5 -> "3.5"), matching the print format.
            Value::Number(n) => write!(f, "{n}"),
            Value::Str(s) => write!(f, "{s}"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Nil => write!(f, "nil"),
            Value::Function(fun) => match &fun.decl.name {
                Some(name) => write!(f, "<{} fn>", name.lexeme),
                None => write!(f, "<anonymous fn>"),
            },
            Value::Native(native) => write!(f, "<{} fn>", native.name),
            Value::Class(class) => write!(f, "<class {}>", class.name),
            Value::Instance(instance) => write!(f, "<{} instance>", instance.borrow().class.name),
        }
    }
}

// Callables hold a trait object (`Rc<dyn Fn(...)>`) that can't derive Debug,
// so this delegates to Display instead of `#[derive(Debug)]`.
impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Display::fmt(self, f)
    }
}

/// A user-defined function: parameter list and body (shared with its
/// declaration site) plus the environment it closed over.
pub struct LoxFunction {
    pub decl: Rc<FunctionDecl>,
    pub closure: Environment,
}

impl LoxFunction {
    pub fn arity(&self) -> usize {
        self.decl.params.len()
    }
}

pub type NativeBody = dyn Fn(&mut Interpreter, &[Value]) -> Result<Value, RuntimeError>;

pub struct NativeFunction {
    pub name: String,
    pub arity: usize,
    pub body: Rc<NativeBody>,
}

impl NativeFunction {
    pub fn new(name: impl Into<String>, arity: usize, body: impl Fn(&mut Interpreter, &[Value]) -> Result<Value, RuntimeError> + 'static) -> Self {
        Self {
            name: name.into(),
            arity,
            body: Rc::new(body),
        }
    }
}

pub struct LoxClass {
    pub name: String,
    pub methods: HashMap<String, Rc<LoxFunction>>,
}

impl LoxClass {
    pub fn find_method(&self, name: &str) -> Option<Rc<LoxFunction>> {
        self.methods.get(name).cloned()
    }
}

pub struct LoxInstance {
    pub class: Rc<LoxClass>,
    pub fields: HashMap<String, Value>,
}

impl LoxInstance {
    pub fn new(class: Rc<LoxClass>) -> Self {
        Self {
            class,
            fields: HashMap::new(),
        }
    }
}

//! Static pass computing, for each variable use/assignment site, how many
//! environment links separate it from its binding scope.

use std::collections::HashMap;
use std::fmt::{self, Display};

use crate::ast::{Expr, NodeId, Stmt};
use crate::token::Token;

#[derive(Debug, Clone, PartialEq)]
pub struct ResolveError {
    pub message: String,
    pub line: usize,
}

impl Display for ResolveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[line {}] Error: {}", self.line, self.message)
    }
}

impl std::error::Error for ResolveError {}

#[derive(Clone, Copy, PartialEq)]
enum FunctionKind {
    None,
    Function,
}

/// Side table the evaluator consults: node identity -> scope distance.
pub type ResolutionTable = HashMap<NodeId, usize>;

pub struct Resolver {
    /// The local scope stack; the global scope is never pushed here.
    scopes: Vec<HashMap<String, bool>>,
    locals: ResolutionTable,
    errors: Vec<ResolveError>,
    current_function: FunctionKind,
}

impl Resolver {
    pub fn new() -> Self {
        Self {
            scopes: Vec::new(),
            locals: ResolutionTable::new(),
            errors: Vec::new(),
            current_function: FunctionKind::None,
        }
    }

    pub fn resolve(mut self, statements: &[Stmt]) -> (ResolutionTable, Vec<ResolveError>) {
        self.resolve_statements(statements);
        (self.locals, self.errors)
    }

    fn resolve_statements(&mut self, statements: &[Stmt]) {
        for statement in statements {
            self.resolve_statement(statement);
        }
    }

    fn resolve_statement(&mut self, statement: &Stmt) {
        match statement {
            Stmt::Expression { expression } | Stmt::Print { expression } => {
                self.resolve_expr(expression);
            }
            Stmt::Var { name, initializer } => {
                self.declare(name);
                if let Some(initializer) = initializer {
                    self.resolve_expr(initializer);
                }
                self.define(name);
            }
            Stmt::Block { statements } => {
                self.begin_scope();
                self.resolve_statements(statements);
                self.end_scope();
            }
            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                self.resolve_expr(condition);
                self.resolve_statement(then_branch);
                if let Some(else_branch) = else_branch {
                    self.resolve_statement(else_branch);
                }
            }
            Stmt::While { condition, body } => {
                self.resolve_expr(condition);
                self.resolve_statement(body);
            }
            Stmt::Break { .. } => {}
            Stmt::Function { decl } => {
                if let Some(name) = &decl.name {
                    self.declare(name);
                    self.define(name);
                }
                self.resolve_function(&decl.params, &decl.body, FunctionKind::Function);
            }
            Stmt::Return { keyword, value } => {
                if self.current_function == FunctionKind::None {
                    self.error(keyword, "Can't return from top-level code.");
                }
                if let Some(value) = value {
                    self.resolve_expr(value);
                }
            }
            Stmt::Class { name, methods } => {
                self.declare(name);
                self.define(name);

                // Scope opened for symmetry with the function-nesting rules;
                // no `this` binding lives here (see the crate's design notes).
                self.begin_scope();
                for method in methods {
                    self.resolve_function(&method.params, &method.body, FunctionKind::Function);
                }
                self.end_scope();
            }
        }
    }

    fn resolve_function(&mut self, params: &[Token], body: &[Stmt], kind: FunctionKind) {
        let enclosing_function = self.current_function;
        self.current_function = kind;

        self.begin_scope();
        for param in params {
            self.declare(param);
            self.define(param);
        }
        self.resolve_statements(body);
        self.end_scope();

        self.current_function = enclosing_function;
    }

    fn resolve_expr(&mut self, expr: &Expr) {
        match expr {
            Expr::Binary { left, right, .. } | Expr::Logical { left, right, .. } => {
                self.resolve_expr(left);
                self.resolve_expr(right);
            }
            Expr::Unary { right, .. } => self.resolve_expr(right),
            Expr::Grouping { expression } => self.resolve_expr(expression),
            Expr::Literal { .. } => {}
            Expr::Variable { id, name } => {
                if let Some(scope) = self.scopes.last() {
                    if scope.get(&name.lexeme).copied() == Some(false) {
                        self.error(name, "Cannot read local variable in its own initializer.");
                    }
                }
                self.resolve_local(*id, name);
            }
            Expr::Assignment { id, name, value } => {
                self.resolve_expr(value);
                self.resolve_local(*id, name);
            }
            Expr::Call {
                callee, arguments, ..
            } => {
                self.resolve_expr(callee);
                for argument in arguments {
                    self.resolve_expr(argument);
                }
            }
            Expr::Get { object, .. } => self.resolve_expr(object),
            Expr::Set { object, value, .. } => {
                self.resolve_expr(value);
                self.resolve_expr(object);
            }
            Expr::AnonymousFn { decl } => {
                self.resolve_function(&decl.params, &decl.body, FunctionKind::Function);
            }
        }
    }

    fn resolve_local(&mut self, id: NodeId, name: &Token) {
        for (i, scope) in self.scopes.iter().rev().enumerate() {
            if scope.contains_key(&name.lexeme) {
                self.locals.insert(id, i);
                return;
            }
        }
        // unresolved: falls back to a global lookup at evaluation time.
    }

    fn declare(&mut self, name: &Token) {
        let is_duplicate = match self.scopes.last() {
            Some(scope) => scope.contains_key(&name.lexeme),
            None => return,
        };
        if is_duplicate {
            self.error(name, "Variable with this name already in this scope.");
        }
        self.scopes
            .last_mut()
            .expect("just checked this scope exists")
            .insert(name.lexeme.clone(), false);
    }

    fn define(&mut self, name: &Token) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.lexeme.clone(), true);
        }
    }

    fn begin_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    fn end_scope(&mut self) {
        self.scopes.pop();
    }

    fn error(&mut self, token: &Token, message: &str) {
        self.errors.push(ResolveError {
            message: message.to_string(),
            line: token.line,
        });
    }
}

impl Default for Resolver {
    fn default() -> Self {
        Self::new()
    }
}

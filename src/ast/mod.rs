//! Syntax tree produced by the parser and walked by the resolver/interpreter.
//!
//! Node dispatch is exhaustive `match`, not a Visitor trait: every consumer
//! (resolver, evaluator) owns its own traversal function over these enums.

mod expr;
mod stmt;

pub use expr::{Expr, LiteralValue};
pub use stmt::Stmt;

use std::sync::atomic::{AtomicU32, Ordering};

use crate::token::Token;

/// Stable per-node identity minted at parse time, used to key the resolver's
/// scope-depth table. Two structurally identical `var x;`/`x` expressions in
/// different places get different ids; this is identity, not equality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(u32);

static NEXT_NODE_ID: AtomicU32 = AtomicU32::new(0);

impl NodeId {
    pub fn next() -> Self {
        Self(NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Shared parameter list and body of a function, whether declared with a
/// name (`fun f() {}`) or anonymously (`fun () {}`). A named declaration and
/// the runtime callable it produces hold the same `Rc` of this type, so the
/// body is never cloned per call.
#[derive(Debug)]
pub struct FunctionDecl {
    pub name: Option<Token>,
    pub params: Vec<Token>,
    pub body: Vec<Stmt>,
}

//! Nested lexical scope chain with lookup/assign and by-depth fast paths.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::value::Value;

struct Scope {
    values: HashMap<String, Value>,
    enclosing: Option<Environment>,
}

/// A cheap-to-clone handle onto a scope. Closures capture a clone of the
/// `Environment` active at their declaration site; sibling calls each get
/// their own fresh scope sharing the same enclosing chain.
#[derive(Clone)]
pub struct Environment(Rc<RefCell<Scope>>);

impl Environment {
    /// A fresh environment with no parent — the root/global scope.
    pub fn new() -> Self {
        Self(Rc::new(RefCell::new(Scope {
            values: HashMap::new(),
            enclosing: None,
        })))
    }

    /// A fresh child scope whose parent is `self`.
    pub fn child(&self) -> Self {
        Self(Rc::new(RefCell::new(Scope {
            values: HashMap::new(),
            enclosing: Some(self.clone()),
        })))
    }

    /// Always inserts in this scope, shadowing/overwriting any prior entry.
    pub fn define(&self, name: impl Into<String>, value: Value) {
        self.0.borrow_mut().values.insert(name.into(), value);
    }

    /// Walks parent links to the first scope containing `name`.
    pub fn get(&self, name: &str) -> Option<Value> {
        let scope = self.0.borrow();
        if let Some(value) = scope.values.get(name) {
            return Some(value.clone());
        }
        scope.enclosing.as_ref()?.get(name)
    }

    /// Walks exactly `depth` parent links, then reads `name` there. A miss
    /// at that point is a resolver/evaluator inconsistency, not a user error.
    pub fn get_at(&self, depth: usize, name: &str) -> Option<Value> {
        self.ancestor(depth).0.borrow().values.get(name).cloned()
    }

    /// Walks parents until a scope containing `name` is found, writes there.
    /// Returns `false` if no such scope exists.
    pub fn assign(&self, name: &str, value: Value) -> bool {
        let mut scope = self.0.borrow_mut();
        if scope.values.contains_key(name) {
            scope.values.insert(name.to_string(), value);
            return true;
        }
        match &scope.enclosing {
            Some(parent) => {
                let parent = parent.clone();
                drop(scope);
                parent.assign(name, value)
            }
            None => false,
        }
    }

    /// Like `get_at` but writes.
    pub fn assign_at(&self, depth: usize, name: &str, value: Value) {
        self.ancestor(depth)
            .0
            .borrow_mut()
            .values
            .insert(name.to_string(), value);
    }

    fn ancestor(&self, depth: usize) -> Environment {
        let mut env = self.clone();
        for _ in 0..depth {
            let parent = env
                .0
                .borrow()
                .enclosing
                .clone()
                .expect("resolver-computed depth must stay within the live environment chain");
            env = parent;
        }
        env
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

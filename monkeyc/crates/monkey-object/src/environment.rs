//! Name bindings for the tree-walking evaluator.
//!
//! Environments form a chain through their `outer` reference: lookup walks
//! outward, definition always lands in the innermost frame. A function call
//! pushes a fresh environment whose outer is the function's captured one.

use std::cell::RefCell;
use std::rc::Rc;

use rustc_hash::FxHashMap;

use crate::Object;

/// Shared handle to an environment.
///
/// Closures keep their defining environment alive through this handle, so
/// environments are reference counted and interiorly mutable.
pub type Env = Rc<RefCell<Environment>>;

/// A single scope of name bindings.
#[derive(Debug, Default)]
pub struct Environment {
    store: FxHashMap<String, Object>,
    outer: Option<Env>,
}

impl Environment {
    /// Creates an empty top-level environment.
    pub fn new() -> Env {
        Rc::new(RefCell::new(Environment::default()))
    }

    /// Creates an environment enclosed by `outer`.
    pub fn new_enclosed(outer: Env) -> Env {
        Rc::new(RefCell::new(Environment {
            store: FxHashMap::default(),
            outer: Some(outer),
        }))
    }

    /// Looks up a name, walking outward through the chain.
    pub fn get(&self, name: &str) -> Option<Object> {
        match self.store.get(name) {
            Some(value) => Some(value.clone()),
            None => self
                .outer
                .as_ref()
                .and_then(|outer| outer.borrow().get(name)),
        }
    }

    /// Defines (or overwrites) a name in this scope.
    pub fn set(&mut self, name: impl Into<String>, value: Object) {
        self.store.insert(name.into(), value);
    }
}

//! monkey-object - Runtime value model shared by both back-ends.
//!
//! A Monkey value is a tagged union. Heap-backed variants (strings, arrays,
//! hashes, functions) share their payload through `Rc`, so cloning an
//! `Object` is cheap and values behave immutably: operations that "modify" a
//! collection build a new one.
//!
//! Two variants are control-flow carriers rather than user values:
//! `ReturnValue` wraps a value unwinding out of a function body in the
//! evaluator, and `Error` is the propagated runtime-error sentinel. Neither
//! escapes to the user unwrapped.

pub mod builtins;
pub mod environment;

pub use builtins::{Builtin, BuiltinFunction, BUILTINS};
pub use environment::{Env, Environment};

use std::fmt;
use std::hash::{Hash as _, Hasher};
use std::rc::Rc;

use indexmap::IndexMap;
use monkey_code::Instructions;
use monkey_par::ast::{BlockStatement, Identifier};
use rustc_hash::FxHasher;

/// A runtime value.
#[derive(Clone, Debug)]
pub enum Object {
    Null,
    Integer(i64),
    Boolean(bool),
    Str(Rc<String>),
    Array(Rc<Vec<Object>>),
    Hash(Rc<IndexMap<HashKey, HashPair>>),
    /// Wrapper carrying a `return` out of nested blocks in the evaluator.
    ReturnValue(Rc<Object>),
    /// Runtime error sentinel; short-circuits all further evaluation.
    Error(String),
    /// An evaluator closure: parameters, body, and the captured environment.
    Function(Rc<Function>),
    /// Compiled bytecode of a function literal (VM back-end).
    CompiledFunction(Rc<CompiledFunction>),
    /// A compiled function paired with its captured free values (VM).
    Closure(Rc<Closure>),
    /// A native function from the shared builtins table.
    Builtin(&'static Builtin),
}

impl Object {
    /// The type tag used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Object::Null => "NULL",
            Object::Integer(_) => "INTEGER",
            Object::Boolean(_) => "BOOLEAN",
            Object::Str(_) => "STRING",
            Object::Array(_) => "ARRAY",
            Object::Hash(_) => "HASH",
            Object::ReturnValue(_) => "RETURN_VALUE",
            Object::Error(_) => "ERROR",
            Object::Function(_) => "FUNCTION",
            Object::CompiledFunction(_) => "COMPILED_FUNCTION",
            Object::Closure(_) => "CLOSURE",
            Object::Builtin(_) => "BUILTIN",
        }
    }

    /// The user-visible rendering of the value.
    pub fn inspect(&self) -> String {
        match self {
            Object::Null => "null".to_string(),
            Object::Integer(value) => value.to_string(),
            Object::Boolean(value) => value.to_string(),
            Object::Str(value) => value.as_ref().clone(),
            Object::Array(elements) => {
                let elements: Vec<String> = elements.iter().map(Object::inspect).collect();
                format!("[{}]", elements.join(", "))
            }
            Object::Hash(pairs) => {
                let pairs: Vec<String> = pairs
                    .values()
                    .map(|pair| format!("{}: {}", pair.key.inspect(), pair.value.inspect()))
                    .collect();
                format!("{{{}}}", pairs.join(", "))
            }
            Object::ReturnValue(value) => value.inspect(),
            Object::Error(message) => format!("ERROR: {}", message),
            Object::Function(function) => {
                let parameters: Vec<String> = function
                    .parameters
                    .iter()
                    .map(ToString::to_string)
                    .collect();
                let body: Vec<String> = function
                    .body
                    .statements
                    .iter()
                    .map(ToString::to_string)
                    .collect();
                format!("fn({})\n{}\n}}", parameters.join(", "), body.join(" "))
            }
            Object::CompiledFunction(function) => {
                format!("CompiledFunction[{:p}]", Rc::as_ptr(function))
            }
            Object::Closure(closure) => format!("Closure[{:p}]", Rc::as_ptr(closure)),
            Object::Builtin(_) => "builtin function".to_string(),
        }
    }

    /// Truthiness shared by the evaluator and the VM: everything is truthy
    /// except `false` and `null`.
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Object::Boolean(false) | Object::Null)
    }

    /// Returns true for the error sentinel.
    pub fn is_error(&self) -> bool {
        matches!(self, Object::Error(_))
    }

    /// Derives the hash key for this value, if it is hashable.
    ///
    /// Only integers, booleans and strings are usable as hash keys. The type
    /// tag is part of the key, so `1`, `true` and `"1"` never collide.
    pub fn hash_key(&self) -> Option<HashKey> {
        match self {
            Object::Integer(value) => Some(HashKey {
                kind: HashKind::Integer,
                value: *value as u64,
            }),
            Object::Boolean(value) => Some(HashKey {
                kind: HashKind::Boolean,
                value: u64::from(*value),
            }),
            Object::Str(value) => {
                let mut hasher = FxHasher::default();
                value.as_bytes().hash(&mut hasher);
                Some(HashKey {
                    kind: HashKind::Str,
                    value: hasher.finish(),
                })
            }
            _ => None,
        }
    }
}

impl PartialEq for Object {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Object::Null, Object::Null) => true,
            (Object::Integer(a), Object::Integer(b)) => a == b,
            (Object::Boolean(a), Object::Boolean(b)) => a == b,
            (Object::Str(a), Object::Str(b)) => a == b,
            (Object::Array(a), Object::Array(b)) => a == b,
            (Object::Hash(a), Object::Hash(b)) => a == b,
            (Object::ReturnValue(a), Object::ReturnValue(b)) => a == b,
            (Object::Error(a), Object::Error(b)) => a == b,
            // Function-like values compare by identity. Structural equality
            // would recurse through captured environments, which may be
            // cyclic.
            (Object::Function(a), Object::Function(b)) => Rc::ptr_eq(a, b),
            (Object::CompiledFunction(a), Object::CompiledFunction(b)) => Rc::ptr_eq(a, b),
            (Object::Closure(a), Object::Closure(b)) => Rc::ptr_eq(a, b),
            (Object::Builtin(a), Object::Builtin(b)) => std::ptr::eq(*a, *b),
            _ => false,
        }
    }
}

/// Convenience constructor for string objects.
impl From<&str> for Object {
    fn from(value: &str) -> Self {
        Object::Str(Rc::new(value.to_string()))
    }
}

impl From<String> for Object {
    fn from(value: String) -> Self {
        Object::Str(Rc::new(value))
    }
}

/// The kind component of a hash key; keeps keys of different types apart.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HashKind {
    Integer,
    Boolean,
    Str,
}

/// Hash-map key: a type tag plus a 64-bit hash of the value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct HashKey {
    pub kind: HashKind,
    pub value: u64,
}

/// One entry of a hash object. The original key object is kept so the value
/// can be inspected.
#[derive(Clone, Debug, PartialEq)]
pub struct HashPair {
    pub key: Object,
    pub value: Object,
}

/// An evaluator closure: a function literal plus the environment it was
/// created in. The environment is held by live reference, so bindings
/// mutated after capture are visible inside the function.
pub struct Function {
    pub parameters: Vec<Identifier>,
    pub body: BlockStatement,
    pub env: Env,
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // The environment may contain this function again; keep Debug
        // non-recursive.
        f.debug_struct("Function")
            .field("parameters", &self.parameters)
            .finish_non_exhaustive()
    }
}

/// Bytecode of one compiled function literal.
#[derive(Clone, Debug, PartialEq)]
pub struct CompiledFunction {
    pub instructions: Instructions,
    pub num_locals: usize,
    pub num_parameters: usize,
}

/// A compiled function paired with the concrete values of its free
/// variables, captured by copy at construction time.
#[derive(Clone, Debug, PartialEq)]
pub struct Closure {
    pub func: Rc<CompiledFunction>,
    pub free: Vec<Object>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_hash_keys() {
        let hello1 = Object::from("Hello World");
        let hello2 = Object::from("Hello World");
        let diff = Object::from("My name is johnny");

        assert_eq!(hello1.hash_key(), hello2.hash_key());
        assert_ne!(hello1.hash_key(), diff.hash_key());
    }

    #[test]
    fn test_hash_keys_do_not_collide_across_types() {
        let one = Object::Integer(1).hash_key().unwrap();
        let truthy = Object::Boolean(true).hash_key().unwrap();
        assert_eq!(one.value, truthy.value);
        assert_ne!(one, truthy);
    }

    #[test]
    fn test_unhashable_types() {
        assert!(Object::Null.hash_key().is_none());
        assert!(Object::Array(Rc::new(vec![])).hash_key().is_none());
    }

    #[test]
    fn test_inspect_scalars() {
        assert_eq!(Object::Integer(5).inspect(), "5");
        assert_eq!(Object::Boolean(true).inspect(), "true");
        assert_eq!(Object::Null.inspect(), "null");
        assert_eq!(Object::from("hi").inspect(), "hi");
        assert_eq!(Object::Error("boom".to_string()).inspect(), "ERROR: boom");
    }

    #[test]
    fn test_inspect_array() {
        let array = Object::Array(Rc::new(vec![
            Object::Integer(1),
            Object::from("two"),
            Object::Boolean(false),
        ]));
        assert_eq!(array.inspect(), "[1, two, false]");
    }

    #[test]
    fn test_inspect_hash_preserves_insertion_order() {
        let mut pairs = IndexMap::new();
        for (key, value) in [("b", 2), ("a", 1)] {
            let key_obj = Object::from(key);
            pairs.insert(
                key_obj.hash_key().unwrap(),
                HashPair {
                    key: key_obj,
                    value: Object::Integer(value),
                },
            );
        }
        let hash = Object::Hash(Rc::new(pairs));
        assert_eq!(hash.inspect(), "{b: 2, a: 1}");
    }

    #[test]
    fn test_truthiness() {
        assert!(Object::Integer(0).is_truthy());
        assert!(Object::from("").is_truthy());
        assert!(Object::Boolean(true).is_truthy());
        assert!(!Object::Boolean(false).is_truthy());
        assert!(!Object::Null.is_truthy());
    }

    #[test]
    fn test_return_value_inspects_inner() {
        let wrapped = Object::ReturnValue(Rc::new(Object::Integer(7)));
        assert_eq!(wrapped.inspect(), "7");
    }
}

//! Lexically scoped symbol table with free-variable tracking.
//!
//! Each compiled function gets its own table enclosing the outer one.
//! Resolution walks outward; when it finds a binding that is neither global
//! nor builtin, the binding is promoted into the current scope's free list,
//! one promotion per intermediate scope. This is how closures capture locals
//! from any enclosing function, not just the immediate parent.

use rustc_hash::FxHashMap;

/// Where a resolved name lives at run time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SymbolScope {
    /// Slot in the VM's globals vector.
    Global,
    /// Slot in the current frame's local area.
    Local,
    /// Index into the shared builtins table.
    Builtin,
    /// Index into the executing closure's free list.
    Free,
    /// The name of the function currently being compiled; loads resolve to
    /// the executing closure itself.
    Function,
}

/// A resolved name: where it lives and at which index.
#[derive(Clone, Debug, PartialEq)]
pub struct Symbol {
    pub name: String,
    pub scope: SymbolScope,
    pub index: usize,
}

/// One scope of the symbol table stack.
#[derive(Debug, Default)]
pub struct SymbolTable {
    outer: Option<Box<SymbolTable>>,

    store: FxHashMap<String, Symbol>,

    /// Number of `define` calls in this scope; becomes the function's
    /// `num_locals`.
    pub num_definitions: usize,

    /// Symbols captured from enclosing scopes, in capture order. The order
    /// is the layout of the closure's free list.
    pub free_symbols: Vec<Symbol>,
}

impl SymbolTable {
    /// Creates the outermost (global) table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a global table that already knows the shared builtins, at
    /// the indices the VM resolves them with.
    pub fn with_builtins() -> Self {
        let mut table = Self::new();
        for (index, builtin) in monkey_object::builtins::BUILTINS.iter().enumerate() {
            table.define_builtin(index, builtin.name);
        }
        table
    }

    /// Creates a table enclosed by `outer`.
    pub fn new_enclosed(outer: SymbolTable) -> Self {
        SymbolTable {
            outer: Some(Box::new(outer)),
            ..Self::default()
        }
    }

    /// True for the outermost table.
    pub fn is_global(&self) -> bool {
        self.outer.is_none()
    }

    /// Hands the enclosing table back when a compilation scope is left.
    pub fn into_outer(self) -> Option<SymbolTable> {
        self.outer.map(|outer| *outer)
    }

    /// Defines a name in this scope, allocating the next index.
    pub fn define(&mut self, name: &str) -> Symbol {
        let scope = if self.is_global() {
            SymbolScope::Global
        } else {
            SymbolScope::Local
        };

        let symbol = Symbol {
            name: name.to_string(),
            scope,
            index: self.num_definitions,
        };
        self.store.insert(name.to_string(), symbol.clone());
        self.num_definitions += 1;
        symbol
    }

    /// Records a builtin at its externally assigned table index.
    pub fn define_builtin(&mut self, index: usize, name: &str) -> Symbol {
        let symbol = Symbol {
            name: name.to_string(),
            scope: SymbolScope::Builtin,
            index,
        };
        self.store.insert(name.to_string(), symbol.clone());
        symbol
    }

    /// Makes the enclosing function's own name resolvable, so recursive
    /// references compile to `OpCurrentClosure`. Does not use a local slot.
    pub fn define_function_name(&mut self, name: &str) -> Symbol {
        let symbol = Symbol {
            name: name.to_string(),
            scope: SymbolScope::Function,
            index: 0,
        };
        self.store.insert(name.to_string(), symbol.clone());
        symbol
    }

    fn define_free(&mut self, original: Symbol) -> Symbol {
        self.free_symbols.push(original.clone());

        let symbol = Symbol {
            name: original.name.clone(),
            scope: SymbolScope::Free,
            index: self.free_symbols.len() - 1,
        };
        self.store.insert(symbol.name.clone(), symbol.clone());
        symbol
    }

    /// Resolves a name, promoting outer locals to free symbols on the way.
    pub fn resolve(&mut self, name: &str) -> Option<Symbol> {
        if let Some(symbol) = self.store.get(name) {
            return Some(symbol.clone());
        }

        let resolved = self.outer.as_mut()?.resolve(name)?;
        if matches!(resolved.scope, SymbolScope::Global | SymbolScope::Builtin) {
            return Some(resolved);
        }

        Some(self.define_free(resolved))
    }
}

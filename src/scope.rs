//! Lexical scopes and name bindings.
//!
//! A binding is the resolved meaning of a name: a compiled function handle,
//! a mutable slot (a Cranelift frontend variable), or a builtin operator.
//! Its kind never changes after creation; only a slot's stored value does.
//!
//! Scopes form a stack of frames. Frame 0 is the root holding the builtin
//! operators, frame 1 holds globals, and every function body or `let` body
//! pushes a frame on entry and pops it on exit. Resolution walks
//! innermost-first, so user definitions can shadow builtins but never
//! remove them.

use cranelift_frontend::Variable;
use cranelift_module::FuncId;
use rustc_hash::FxHashMap;

use crate::builtins::{Builtin, TABLE};

/// The resolved meaning of a name within a scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Binding {
    /// A compiled function: constant, directly callable.
    Function { id: FuncId, arity: usize },
    /// A mutable slot. `owner` is the ordinal of the function that
    /// allocated it; slots are only usable from their own function.
    Slot { owner: u32, var: Variable },
    /// A builtin operator, meaningful only as the head of an invocation.
    Builtin(Builtin),
}

/// A chain of lexical scopes, innermost last.
pub struct ScopeStack {
    frames: Vec<FxHashMap<String, Binding>>,
}

impl ScopeStack {
    /// Root frame seeded with the builtin operators, plus an empty
    /// global frame above it.
    pub fn with_builtins() -> Self {
        let mut root = FxHashMap::default();
        for (name, builtin) in TABLE {
            root.insert((*name).to_string(), Binding::Builtin(*builtin));
        }
        ScopeStack {
            frames: vec![root, FxHashMap::default()],
        }
    }

    pub fn push(&mut self) {
        self.frames.push(FxHashMap::default());
    }

    pub fn pop(&mut self) {
        debug_assert!(self.frames.len() > 2, "cannot pop the root or global frame");
        self.frames.pop();
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Insert into the innermost frame. Redefining a name present in the
    /// same frame overwrites it; a name bound only in an outer frame is
    /// shadowed, not touched.
    pub fn define(&mut self, name: &str, binding: Binding) {
        self.frames
            .last_mut()
            .expect("scope stack always has a root frame")
            .insert(name.to_string(), binding);
    }

    /// Walk innermost to root; the nearest definition wins.
    pub fn resolve(&self, name: &str) -> Option<Binding> {
        self.frames
            .iter()
            .rev()
            .find_map(|frame| frame.get(name).copied())
    }
}

//! Dynamic lexical scopes.
//!
//! Each `Scope` is a dictionary of symbol -> value bindings plus an optional
//! link to its enclosing scope. `lambda` captures the scope live at
//! definition time; applying the resulting closure allocates a fresh child
//! scope, binds the formal parameters into it, and evaluates the body there.
//! Lookup and `set!` walk the parent chain outward; `define` always binds
//! into the innermost scope and errors if that scope already has the name.

use std::cmp::Ordering;

use crate::dict::{Keyed, RobinHoodMap};
use crate::error::{InterpError, SchemeResult};
use crate::value::{ScopePtr, SymbolPtr, Value};

impl Keyed for SymbolPtr {
    fn key_hash(&self) -> u64 {
        self.hash
    }

    fn key_order(&self, other: &Self) -> Ordering {
        self.hash
            .cmp(&other.hash)
            .then_with(|| self.name.cmp(&other.name))
    }
}

#[derive(Default)]
pub struct Scope {
    bindings: RobinHoodMap<SymbolPtr, Value>,
    parent: Option<ScopePtr>,
}

impl Scope {
    pub fn set_parent(&mut self, parent: Option<ScopePtr>) {
        self.parent = parent;
    }

    pub fn parent(&self) -> Option<ScopePtr> {
        self.parent
    }

    pub fn bindings(&self) -> &RobinHoodMap<SymbolPtr, Value> {
        &self.bindings
    }

    /// `define`: bind `name` to `value` in this scope. Rebinding an existing
    /// name in the same scope is an error; shadowing an outer scope's
    /// binding of the same name is not.
    pub fn define(&mut self, name: SymbolPtr, value: Value, display_name: &str) -> SchemeResult<()> {
        if self.bindings.contains_key(&name) {
            return Err(InterpError::Rebind(display_name.to_string()));
        }
        self.bindings.insert(name, value);
        Ok(())
    }

    /// Like `define` but permits rebinding -- used when binding parameters
    /// into a fresh call scope, where duplicate formal names would otherwise
    /// spuriously conflict with a stale slot from an earlier GC-recycled use
    /// of the same arena cell.
    pub fn bind(&mut self, name: SymbolPtr, value: Value) {
        self.bindings.insert(name, value);
    }

    /// Look up `name`, searching outward through enclosing scopes.
    pub fn lookup(&self, name: SymbolPtr) -> Option<Value> {
        if let Some(v) = self.bindings.get(&name) {
            return Some(*v);
        }
        self.parent.and_then(|p| p.lookup(name))
    }

    /// `set!`: find the innermost scope in the chain that binds `name` and
    /// overwrite it there. Errors if no scope in the chain binds it.
    pub fn assign(&mut self, name: SymbolPtr, value: Value, display_name: &str) -> SchemeResult<()> {
        if let Some(slot) = self.bindings.get_mut(&name) {
            *slot = value;
            return Ok(());
        }
        match self.parent {
            Some(mut parent) => parent.assign(name, value, display_name),
            None => Err(InterpError::UnboundAssign(display_name.to_string())),
        }
    }
}

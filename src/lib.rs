//! A small Scheme interpreter: a recursive-descent parser, a tree-walking
//! evaluator that trampolines tail calls through a lazy `Thunk`
//! representation, lexically-scoped closures, `syntax-rules` macros, and an
//! arena-allocated mark-and-sweep collector with RAII stack rooting.

pub mod dict;
pub mod error;
pub mod eval;
pub mod heap;
pub mod macros;
pub mod parser;
pub mod primitives;
pub mod repl;
pub mod scope;
pub mod special_forms;
pub mod symbol;
pub mod value;
pub mod writer;

use error::SchemeResult;
use heap::{Heap, Rooted};
use value::{ScopePtr, Value};

/// A whole interpreter instance: a heap plus the root scope every top-level
/// form is evaluated in. Owns the process-wide state that would otherwise be
/// scattered across globals, so embedding or testing the interpreter never
/// needs more than one of these.
pub struct Interpreter {
    heap: Heap,
    root: ScopePtr,
}

impl Interpreter {
    /// Builds a fresh interpreter with every special form and primitive
    /// procedure already bound into the root scope.
    pub fn new() -> Self {
        let mut heap = Heap::new();
        let root = heap.root_scope();
        special_forms::install(&mut heap, root);
        primitives::install(&mut heap, root);
        Interpreter { heap, root }
    }

    pub fn heap(&self) -> &Heap {
        &self.heap
    }

    pub fn heap_mut(&mut self) -> &mut Heap {
        &mut self.heap
    }

    pub fn root_scope(&self) -> ScopePtr {
        self.root
    }

    /// Parses `source` as a sequence of top-level forms and evaluates them
    /// in order, returning the last result. An empty source string
    /// evaluates to `Value::Nil`.
    ///
    /// Every form is rooted up front: evaluating an early form can allocate
    /// enough to trigger a collection, and a later form sitting unrooted in
    /// a plain `Vec` would otherwise be fair game for the sweep.
    pub fn eval_str(&mut self, source: &str) -> SchemeResult<Value> {
        let forms: Vec<Rooted<Value>> = parser::Parser::parse_all(source, &mut self.heap)?
            .into_iter()
            .map(|f| Rooted::new(&mut self.heap, f))
            .collect();
        let mut result = Value::Nil;
        for form in forms {
            result = eval::eval_eager(&mut self.heap, self.root, *form)?;
        }
        Ok(result)
    }

    /// Renders `v` the way `write` would (strings quoted, characters named).
    pub fn write_string(&self, v: Value) -> String {
        writer::write_string(v)
    }

    /// Renders `v` the way `display` would (strings and characters raw).
    pub fn display_string(&self, v: Value) -> String {
        writer::display_string(v)
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Interpreter::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evaluates_a_sequence_of_top_level_forms() {
        let mut interp = Interpreter::new();
        assert_eq!(interp.eval_str("(define x 10) (+ x 5)").unwrap(), Value::Int(15));
    }

    #[test]
    fn empty_source_is_nil() {
        let mut interp = Interpreter::new();
        assert_eq!(interp.eval_str("").unwrap(), Value::Nil);
    }
}

// Copyright 2014 Nick Fitzgerald
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! The universal Scheme value and the heap-allocated structures it can point
//! at.
//!
//! `Value` is a small `Copy` tagged union: the scalar variants (`Nil`,
//! `Bool`, `Int`, `Char`) carry their payload inline, and every other variant
//! is a pointer into one of [`crate::heap::Heap`]'s arenas. `PartialEq` on
//! `Value` is Scheme's `eq?`: scalars compare by value, everything else
//! compares by heap identity. Structural comparison (`equal?`) is a separate
//! free function below, since the two notions of equality diverge for pairs
//! and strings.

use std::fmt;

use crate::heap::{ArenaPtr, Heap};
use crate::scope::Scope;
use crate::symbol::SymbolData;

/// A cons cell: `car` and `cdr`. Per the spec, only `cdr` is mutable after
/// construction (`set-cdr!`); `car` is fixed at `cons` time.
#[derive(Copy, Clone, Default)]
pub struct Cons {
    car: Value,
    cdr: Value,
}

impl Cons {
    pub fn car(&self) -> Value {
        self.car
    }

    pub fn cdr(&self) -> Value {
        self.cdr
    }

    pub fn set_cdr(&mut self, cdr: Value) {
        self.cdr = cdr;
    }
}

pub type ConsPtr = ArenaPtr<Cons>;

/// A Scheme string. Represented as a vector of `char`s rather than raw bytes
/// so that `string-ref`/`string-set!` are simple index operations; nothing in
/// the spec requires the byte-for-byte representation, only that strings are
/// heap objects with element mutation.
#[derive(Clone, Default)]
pub struct SchemeString {
    pub chars: Vec<char>,
}

impl SchemeString {
    pub fn as_string(&self) -> String {
        self.chars.iter().collect()
    }
}

pub type StringPtr = ArenaPtr<SchemeString>;

/// An interned symbol is just a named, hashed string; identity is pointer
/// equality via [`ArenaPtr`].
pub type SymbolPtr = ArenaPtr<SymbolData>;

/// An open input port. `open-output-file` is not part of the surface the
/// spec requires, so only input ports and the two standard streams exist.
#[derive(Default)]
pub enum PortKind {
    #[default]
    Closed,
    Stdin,
    Stdout,
    Input(std::io::BufReader<std::fs::File>),
}

#[derive(Default)]
pub struct Port {
    pub kind: PortKind,
    pub path: Option<String>,
}

pub type PortPtr = ArenaPtr<Port>;

pub type ScopePtr = ArenaPtr<Scope>;

/// A closure: the raw (unevaluated) parameter list and body, plus the scope
/// that was live at `lambda` time. `params` is either a proper list of
/// symbols, a single symbol (variadic), or a dotted list (fixed args plus a
/// rest symbol) -- exactly the shape `read_object` would have produced it in,
/// interpreted by `eval::bind_params` at call time.
///
/// `scope` is `None` only in a freshly-allocated or just-swept slot; every
/// live lambda has it set immediately after allocation.
#[derive(Copy, Clone, Default)]
pub struct Lambda {
    pub params: Value,
    pub body: Value,
    pub scope: Option<ScopePtr>,
}

pub type LambdaPtr = ArenaPtr<Lambda>;

/// A deferred call: the trampoline's unit of work. Forcing a thunk invokes
/// `lambda` with `args` and keeps going until a non-thunk value emerges.
#[derive(Clone, Default)]
pub struct Thunk {
    pub lambda: Option<LambdaPtr>,
    pub args: Vec<Value>,
}

pub type ThunkPtr = ArenaPtr<Thunk>;

pub type NativeFn = fn(&mut Heap, &[Value]) -> crate::error::SchemeResult<Value>;

/// A host-implemented procedure (arithmetic, list operations, I/O, ...).
#[derive(Default)]
pub struct Native {
    pub name: String,
    pub func: Option<NativeFn>,
}

pub type NativePtr = ArenaPtr<Native>;

pub type SyntaxFn = fn(&mut Heap, ScopePtr, Value) -> crate::error::SchemeResult<Value>;

/// A built-in special-form handler. Receives its operand list unevaluated.
#[derive(Default)]
pub struct Syntax {
    pub name: String,
    pub func: Option<SyntaxFn>,
}

pub type SyntaxPtr = ArenaPtr<Syntax>;

/// A user-defined `syntax-rules` macro: literal keywords plus an ordered list
/// of `(pattern, template)` rules, tried in order at each call site.
#[derive(Clone, Default)]
pub struct Macro {
    pub literals: Vec<SymbolPtr>,
    pub rules: Vec<(Value, Value)>,
    pub label: Option<String>,
}

pub type MacroPtr = ArenaPtr<Macro>;

/// The universal Scheme value.
#[derive(Copy, Clone)]
pub enum Value {
    Nil,
    Bool(bool),
    Int(i64),
    Char(char),
    Str(StringPtr),
    Symbol(SymbolPtr),
    Pair(ConsPtr),
    Port(PortPtr),
    Scope(ScopePtr),
    Lambda(LambdaPtr),
    Thunk(ThunkPtr),
    Native(NativePtr),
    Syntax(SyntaxPtr),
    Macro(MacroPtr),
}

impl Default for Value {
    fn default() -> Self {
        Value::Nil
    }
}

/// `eq?`: scalars compare by value, heap variants compare by pointer
/// identity. This is deliberately not structural -- see [`equal`] below.
impl PartialEq for Value {
    fn eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Char(a), Value::Char(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Symbol(a), Value::Symbol(b)) => a == b,
            (Value::Pair(a), Value::Pair(b)) => a == b,
            (Value::Port(a), Value::Port(b)) => a == b,
            (Value::Scope(a), Value::Scope(b)) => a == b,
            (Value::Lambda(a), Value::Lambda(b)) => a == b,
            (Value::Thunk(a), Value::Thunk(b)) => a == b,
            (Value::Native(a), Value::Native(b)) => a == b,
            (Value::Syntax(a), Value::Syntax(b)) => a == b,
            (Value::Macro(a), Value::Macro(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Value({})", crate::writer::write_string(*self))
    }
}

/// Structural equality (Scheme's `equal?`): recurses through pairs and
/// compares string contents, falling back to `eq?` for everything else.
pub fn equal(a: Value, b: Value) -> bool {
    match (a, b) {
        (Value::Pair(p), Value::Pair(q)) => equal(p.car(), q.car()) && equal(p.cdr(), q.cdr()),
        (Value::Str(p), Value::Str(q)) => p.chars == q.chars,
        _ => a == b,
    }
}

/// # `Value` constructors
impl Value {
    pub fn new_pair(heap: &mut Heap, car: Value, cdr: Value) -> Value {
        let mut cons = heap.allocate_cons();
        cons.set_car_init(car);
        cons.set_cdr(cdr);
        Value::Pair(*cons)
    }

    pub fn new_string(heap: &mut Heap, s: &str) -> Value {
        let mut ptr = heap.allocate_string();
        ptr.chars = s.chars().collect();
        Value::Str(*ptr)
    }
}

/// Internal helper: `Cons::car` is otherwise only ever set once, at
/// construction, so there is no public `set_car`.
impl ConsPtr {
    fn set_car_init(&mut self, car: Value) {
        let cons: &mut Cons = &mut *self;
        cons.car = car;
    }
}

/// # `Value` accessors
impl Value {
    pub fn car(&self) -> Option<Value> {
        match self {
            Value::Pair(p) => Some(p.car()),
            _ => None,
        }
    }

    pub fn cdr(&self) -> Option<Value> {
        match self {
            Value::Pair(p) => Some(p.cdr()),
            _ => None,
        }
    }

    pub fn is_pair(&self) -> bool {
        matches!(self, Value::Pair(_))
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    /// Only `#f` is false-ish; every other value, including `0` and `""`, is
    /// true-ish.
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Bool(false))
    }

    pub fn as_symbol(&self) -> Option<SymbolPtr> {
        match self {
            Value::Symbol(s) => Some(*s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Bool(_) => "boolean",
            Value::Int(_) => "integer",
            Value::Char(_) => "character",
            Value::Str(_) => "string",
            Value::Symbol(_) => "symbol",
            Value::Pair(_) => "pair",
            Value::Port(_) => "port",
            Value::Scope(_) => "scope",
            Value::Lambda(_) => "procedure",
            Value::Thunk(_) => "thunk",
            Value::Native(_) => "procedure",
            Value::Syntax(_) => "syntax",
            Value::Macro(_) => "macro",
        }
    }

    pub fn is_callable(&self) -> bool {
        matches!(self, Value::Lambda(_) | Value::Native(_))
    }
}

/// Walk a proper list, applying `f` to each element in order. Returns an
/// error if the list is improper.
pub fn for_each_list<F: FnMut(Value) -> crate::error::SchemeResult<()>>(
    mut list: Value,
    mut f: F,
) -> crate::error::SchemeResult<()> {
    loop {
        match list {
            Value::Nil => return Ok(()),
            Value::Pair(p) => {
                f(p.car())?;
                list = p.cdr();
            }
            other => {
                return Err(crate::error::InterpError::type_error(
                    "list traversal",
                    "pair or nil",
                    other.type_name(),
                    0,
                ))
            }
        }
    }
}

/// Collect a proper list into a `Vec<Value>`.
pub fn list_to_vec(list: Value) -> crate::error::SchemeResult<Vec<Value>> {
    let mut out = Vec::new();
    for_each_list(list, |v| {
        out.push(v);
        Ok(())
    })?;
    Ok(out)
}

/// Build a proper list from a slice of values, innermost (last) cons first.
/// The partial list built so far is rooted across every `new_pair` call --
/// it is otherwise unreferenced, and `new_pair`'s own allocation can trigger
/// a collection before the chain has anywhere else to be found from.
pub fn vec_to_list(heap: &mut Heap, values: &[Value]) -> Value {
    let mut result = crate::heap::Rooted::new(heap, Value::Nil);
    for v in values.iter().rev() {
        let next = Value::new_pair(heap, *v, *result);
        result = crate::heap::Rooted::new(heap, next);
    }
    *result
}

/// The length of a proper list, or `None` if it is improper.
pub fn list_len(list: Value) -> Option<u64> {
    let mut len = 0u64;
    let mut cur = list;
    loop {
        match cur {
            Value::Nil => return Some(len),
            Value::Pair(p) => {
                len += 1;
                cur = p.cdr();
            }
            _ => return None,
        }
    }
}

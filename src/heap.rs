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

//! Memory management for the evaluation engine: arena allocation, precise
//! stack rooting, and mark-and-sweep collection.
//!
//! ## Allocation
//!
//! Every heap-allocated type (cons cells, strings, symbols, scopes, lambdas,
//! thunks, macros, ports, natives, syntax handlers) lives in its own
//! [`Arena`], a pre-sized object pool with a free list of unused slots.
//! Allocating pops an index off the free list; if the pool is full we simply
//! grow it. This removes the need for per-object heap allocation and for any
//! unsafe pointer casting between variants -- each `ArenaPtr<T>` is strongly
//! typed and dispatch happens through ordinary `match` on [`crate::value::Value`].
//!
//! ## Rooting
//!
//! Garbage collection can run on any allocation. A Rust local holding a raw
//! `ArenaPtr<T>` across a call that might allocate is exactly the dangling
//! pointer hazard the GC has to avoid: [`Rooted<T>`] is a smart pointer that
//! roots its referent on construction and unroots it on `Drop`, implementing
//! the specification's "stack-reference counter" as an RAII guard instead of
//! hand-paired `incref`/`decref` calls. This is the one invariant every
//! function that allocates must uphold: wrap anything whose lifetime spans a
//! potentially-allocating call in a `Rooted<T>`.
//!
//! ## Collection
//!
//! `collect_garbage` is a three-phase mark-and-sweep:
//!
//! 1. **Seed**: every GC root -- the REPL scope, every interned symbol, and
//!    every outstanding [`Rooted`] handle -- is pushed onto a work queue.
//! 2. **Propagate**: pop the queue; if an object isn't marked yet, mark it
//!    and push everything its [`Trace`] implementation yields.
//! 3. **Sweep**: each arena resets any never-marked slot back to
//!    `T::default()` (dropping its old contents -- this is how a `Port`'s
//!    underlying file descriptor actually gets closed) and returns the slot
//!    to its free list.

use std::cmp;
use std::collections::HashMap;
use std::fmt;
use std::ops::{Deref, DerefMut};

use log::{debug, trace};

use crate::dict::RobinHoodMap;
use crate::scope::Scope;
use crate::symbol::SymbolData;
use crate::value::{
    Cons, ConsPtr, Lambda, LambdaPtr, Macro, MacroPtr, Native, NativePtr, Port, PortPtr,
    SchemeString, ScopePtr, StringPtr, SymbolPtr, Syntax, SyntaxPtr, Thunk, ThunkPtr, Value,
};

/// A pre-sized object pool for `T`, with a free list of unallocated slots and
/// a per-slot mark bit used during collection.
pub struct Arena<T> {
    pool: Vec<T>,
    free: Vec<usize>,
    marked: Vec<bool>,
}

impl<T: Default> Arena<T> {
    pub fn new(capacity: usize) -> Box<Arena<T>> {
        assert!(capacity > 0);
        let mut pool = Vec::with_capacity(capacity);
        pool.resize_with(capacity, T::default);
        Box::new(Arena {
            pool,
            free: (0..capacity).rev().collect(),
            marked: vec![false; capacity],
        })
    }

    pub fn capacity(&self) -> usize {
        self.pool.len()
    }

    pub fn is_full(&self) -> bool {
        self.free.is_empty()
    }

    pub fn is_empty(&self) -> bool {
        self.free.len() == self.capacity()
    }

    pub fn allocate(&mut self) -> ArenaPtr<T> {
        match self.free.pop() {
            Some(idx) => {
                let self_ptr: *mut Arena<T> = self;
                ArenaPtr::new(self_ptr, idx)
            }
            None => {
                self.grow();
                self.allocate()
            }
        }
    }

    fn grow(&mut self) {
        let old_capacity = self.capacity();
        let new_capacity = cmp::max(old_capacity * 2, 8);
        self.pool.resize_with(new_capacity, T::default);
        self.marked.resize(new_capacity, false);
        self.free.extend((old_capacity..new_capacity).rev());
    }

    /// Reset every unmarked, currently-occupied slot to `T::default()`
    /// (dropping its previous contents -- this is the collector's
    /// `dispose`), return it to the free list, then clear all mark bits for
    /// the next cycle.
    pub fn sweep(&mut self) -> usize {
        let mut survivors = 0;
        let mut on_free_list = vec![false; self.capacity()];
        for &idx in &self.free {
            on_free_list[idx] = true;
        }
        for i in 0..self.capacity() {
            if self.marked[i] {
                survivors += 1;
            } else if !on_free_list[i] {
                self.pool[i] = T::default();
                self.free.push(i);
            }
        }
        self.marked.iter_mut().for_each(|m| *m = false);
        survivors
    }
}

/// A set of same-typed [`Arena`]s, transparently growing by allocating a new
/// arena when every existing one is full. Kept for symmetry with the
/// single-arena-per-type design used here; a single growable `Arena` would
/// serve identically, but this mirrors how a production allocator would
/// actually add capacity without relocating existing objects.
pub struct ArenaSet<T> {
    capacity: usize,
    arenas: Vec<Box<Arena<T>>>,
}

impl<T: Default> ArenaSet<T> {
    pub fn new(capacity: usize) -> ArenaSet<T> {
        ArenaSet {
            capacity,
            arenas: vec![Arena::new(capacity)],
        }
    }

    pub fn allocate(&mut self) -> ArenaPtr<T> {
        for arena in self.arenas.iter_mut() {
            if !arena.is_full() {
                return arena.allocate();
            }
        }
        let mut new_arena = Arena::new(self.capacity);
        let result = new_arena.allocate();
        self.arenas.push(new_arena);
        result
    }

    /// Sweep every arena, returning the total number of surviving objects.
    pub fn sweep(&mut self) -> usize {
        let mut survivors = 0;
        for arena in self.arenas.iter_mut() {
            survivors += arena.sweep();
        }
        survivors
    }
}

/// A strongly typed pointer to a `T` living inside one of its arenas.
///
/// Dereferencing is unsafe under the hood (the arena is reached through a
/// raw pointer, exactly as in the originating design) but the public API is
/// safe: an `ArenaPtr<T>` is only ever handed out by `Arena::allocate`, and
/// the arena it points into outlives every pointer derived from it for the
/// duration of a single-threaded run.
pub struct ArenaPtr<T> {
    arena: *mut Arena<T>,
    index: usize,
}

impl<T> Clone for ArenaPtr<T> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<T> Copy for ArenaPtr<T> {}

impl<T: Default> ArenaPtr<T> {
    fn new(arena: *mut Arena<T>, index: usize) -> ArenaPtr<T> {
        unsafe {
            let arena_ref = arena
                .as_ref()
                .expect("ArenaPtr::new should always be given a valid Arena");
            assert!(index < arena_ref.capacity());
        }
        ArenaPtr { arena, index }
    }

    pub(crate) fn mark(&self) {
        unsafe {
            let arena = self
                .arena
                .as_mut()
                .expect("ArenaPtr should always have a valid Arena");
            arena.marked[self.index] = true;
        }
    }

    pub(crate) fn is_marked(&self) -> bool {
        unsafe {
            let arena = self
                .arena
                .as_ref()
                .expect("ArenaPtr should always have a valid Arena");
            arena.marked[self.index]
        }
    }

    /// A stable-for-this-run identifier used only for opaque `write`
    /// rendering (`[typename@address]`); carries no other meaning.
    pub fn opaque_id(&self) -> usize {
        self.arena as usize + self.index
    }
}

impl<T> Deref for ArenaPtr<T> {
    type Target = T;
    fn deref(&self) -> &T {
        unsafe {
            let arena = self
                .arena
                .as_ref()
                .expect("ArenaPtr::deref should always have an Arena");
            &arena.pool[self.index]
        }
    }
}

impl<T> DerefMut for ArenaPtr<T> {
    fn deref_mut(&mut self) -> &mut T {
        unsafe {
            let arena = self
                .arena
                .as_mut()
                .expect("ArenaPtr::deref_mut should always have an Arena");
            &mut arena.pool[self.index]
        }
    }
}

impl<T> fmt::Debug for ArenaPtr<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "ArenaPtr({:p}, {})", self.arena, self.index)
    }
}

/// Pointer equality, i.e. Scheme's `eq?` for this variant -- not structural
/// comparison.
impl<T> PartialEq for ArenaPtr<T> {
    fn eq(&self, other: &ArenaPtr<T>) -> bool {
        self.index == other.index && std::ptr::eq(self.arena, other.arena)
    }
}
impl<T> Eq for ArenaPtr<T> {}

impl<T> std::hash::Hash for ArenaPtr<T> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        (self.arena as usize).hash(state);
        self.index.hash(state);
    }
}

/// A type that can be coerced to a [`GcThing`] for tracing and rooting. Every
/// heap-pointer `Value` variant implements this; scalar variants return
/// `None` since they have no GC identity of their own.
pub trait ToGcThing {
    fn to_gc_thing(&self) -> Option<GcThing>;
}

/// Lets a bare `ArenaPtr<T>` be rooted directly (`Rooted<ScopePtr>`,
/// `Rooted<LambdaPtr>`, ...) without first wrapping it in a `Value`.
macro_rules! impl_to_gc_thing_for_ptr {
    ($ty:ty, $variant:ident) => {
        impl ToGcThing for $ty {
            fn to_gc_thing(&self) -> Option<GcThing> {
                Some(GcThing::$variant(*self))
            }
        }
    };
}

impl_to_gc_thing_for_ptr!(ConsPtr, Cons);
impl_to_gc_thing_for_ptr!(StringPtr, Str);
impl_to_gc_thing_for_ptr!(SymbolPtr, Symbol);
impl_to_gc_thing_for_ptr!(PortPtr, Port);
impl_to_gc_thing_for_ptr!(ScopePtr, Scope);
impl_to_gc_thing_for_ptr!(LambdaPtr, Lambda);
impl_to_gc_thing_for_ptr!(ThunkPtr, Thunk);
impl_to_gc_thing_for_ptr!(NativePtr, Native);
impl_to_gc_thing_for_ptr!(SyntaxPtr, Syntax);
impl_to_gc_thing_for_ptr!(MacroPtr, Macro);

impl ToGcThing for Value {
    fn to_gc_thing(&self) -> Option<GcThing> {
        match *self {
            Value::Pair(p) => Some(GcThing::Cons(p)),
            Value::Str(p) => Some(GcThing::Str(p)),
            Value::Symbol(p) => Some(GcThing::Symbol(p)),
            Value::Port(p) => Some(GcThing::Port(p)),
            Value::Scope(p) => Some(GcThing::Scope(p)),
            Value::Lambda(p) => Some(GcThing::Lambda(p)),
            Value::Thunk(p) => Some(GcThing::Thunk(p)),
            Value::Native(p) => Some(GcThing::Native(p)),
            Value::Syntax(p) => Some(GcThing::Syntax(p)),
            Value::Macro(p) => Some(GcThing::Macro(p)),
            Value::Nil | Value::Bool(_) | Value::Int(_) | Value::Char(_) => None,
        }
    }
}

/// A GC participant's declaration of everything it directly references.
pub trait Trace {
    fn trace(&self) -> Vec<GcThing>;
}

impl Trace for Cons {
    fn trace(&self) -> Vec<GcThing> {
        let mut out = Vec::with_capacity(2);
        out.extend(self.car().to_gc_thing());
        out.extend(self.cdr().to_gc_thing());
        out
    }
}

impl Trace for SchemeString {
    fn trace(&self) -> Vec<GcThing> {
        Vec::new()
    }
}

impl Trace for SymbolData {
    fn trace(&self) -> Vec<GcThing> {
        Vec::new()
    }
}

impl Trace for Port {
    fn trace(&self) -> Vec<GcThing> {
        Vec::new()
    }
}

impl Trace for Scope {
    fn trace(&self) -> Vec<GcThing> {
        let mut out: Vec<GcThing> = self
            .bindings()
            .values()
            .filter_map(|v| v.to_gc_thing())
            .collect();
        if let Some(parent) = self.parent() {
            out.push(GcThing::Scope(parent));
        }
        out
    }
}

impl Trace for Lambda {
    fn trace(&self) -> Vec<GcThing> {
        let mut out = Vec::new();
        out.extend(self.params.to_gc_thing());
        out.extend(self.body.to_gc_thing());
        if let Some(scope) = self.scope {
            out.push(GcThing::Scope(scope));
        }
        out
    }
}

impl Trace for Thunk {
    fn trace(&self) -> Vec<GcThing> {
        let mut out = Vec::new();
        if let Some(lambda) = self.lambda {
            out.push(GcThing::Lambda(lambda));
        }
        out.extend(self.args.iter().filter_map(|a| a.to_gc_thing()));
        out
    }
}

impl Trace for Native {
    fn trace(&self) -> Vec<GcThing> {
        Vec::new()
    }
}

impl Trace for Syntax {
    fn trace(&self) -> Vec<GcThing> {
        Vec::new()
    }
}

impl Trace for Macro {
    fn trace(&self) -> Vec<GcThing> {
        let mut out: Vec<GcThing> = self.literals.iter().map(|s| GcThing::Symbol(*s)).collect();
        for (pattern, template) in &self.rules {
            out.extend(pattern.to_gc_thing());
            out.extend(template.to_gc_thing());
        }
        out
    }
}

/// The union of every heap-object variant participating in GC.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum GcThing {
    Cons(ConsPtr),
    Str(StringPtr),
    Symbol(SymbolPtr),
    Port(PortPtr),
    Scope(ScopePtr),
    Lambda(LambdaPtr),
    Thunk(ThunkPtr),
    Native(NativePtr),
    Syntax(SyntaxPtr),
    Macro(MacroPtr),
}

impl GcThing {
    fn mark(&self) {
        match self {
            GcThing::Cons(p) => p.mark(),
            GcThing::Str(p) => p.mark(),
            GcThing::Symbol(p) => p.mark(),
            GcThing::Port(p) => p.mark(),
            GcThing::Scope(p) => p.mark(),
            GcThing::Lambda(p) => p.mark(),
            GcThing::Thunk(p) => p.mark(),
            GcThing::Native(p) => p.mark(),
            GcThing::Syntax(p) => p.mark(),
            GcThing::Macro(p) => p.mark(),
        }
    }

    fn is_marked(&self) -> bool {
        match self {
            GcThing::Cons(p) => p.is_marked(),
            GcThing::Str(p) => p.is_marked(),
            GcThing::Symbol(p) => p.is_marked(),
            GcThing::Port(p) => p.is_marked(),
            GcThing::Scope(p) => p.is_marked(),
            GcThing::Lambda(p) => p.is_marked(),
            GcThing::Thunk(p) => p.is_marked(),
            GcThing::Native(p) => p.is_marked(),
            GcThing::Syntax(p) => p.is_marked(),
            GcThing::Macro(p) => p.is_marked(),
        }
    }

    fn trace(&self) -> Vec<GcThing> {
        match self {
            GcThing::Cons(p) => p.trace(),
            GcThing::Str(p) => p.trace(),
            GcThing::Symbol(p) => p.trace(),
            GcThing::Port(p) => p.trace(),
            GcThing::Scope(p) => p.trace(),
            GcThing::Lambda(p) => p.trace(),
            GcThing::Thunk(p) => p.trace(),
            GcThing::Native(p) => p.trace(),
            GcThing::Syntax(p) => p.trace(),
            GcThing::Macro(p) => p.trace(),
        }
    }
}

/// A smart pointer that roots its referent for as long as it is alive,
/// implementing the specification's stack-reference counter as an RAII
/// guard: construction increments the referent's root count, `Drop`
/// decrements it. This is how a Rust local that must survive a
/// potentially-allocating call stays safe to dereference afterwards.
pub struct Rooted<T: ToGcThing> {
    heap: *mut Heap,
    ptr: T,
}

impl<T: ToGcThing + Copy> Rooted<T> {
    pub fn new(heap: &mut Heap, ptr: T) -> Rooted<T> {
        let mut r = Rooted { heap, ptr };
        r.add_root();
        r
    }

    fn add_root(&mut self) {
        if let Some(thing) = self.ptr.to_gc_thing() {
            unsafe {
                (*self.heap).add_root(thing);
            }
        }
    }

    fn drop_root(&mut self) {
        if let Some(thing) = self.ptr.to_gc_thing() {
            unsafe {
                (*self.heap).drop_root(thing);
            }
        }
    }
}

impl<T: ToGcThing> ToGcThing for Rooted<T> {
    fn to_gc_thing(&self) -> Option<GcThing> {
        self.ptr.to_gc_thing()
    }
}

impl<T: ToGcThing> Deref for Rooted<T> {
    type Target = T;
    fn deref(&self) -> &T {
        &self.ptr
    }
}

impl<T: ToGcThing> DerefMut for Rooted<T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.ptr
    }
}

impl<T: ToGcThing + Copy> Clone for Rooted<T> {
    fn clone(&self) -> Self {
        let heap = self.heap;
        unsafe { Rooted::new(&mut *heap, self.ptr) }
    }
}

impl<T: ToGcThing> Drop for Rooted<T> {
    fn drop(&mut self) {
        self.drop_root();
    }
}

/// A rooted [`Value`] -- the handle type almost every evaluator function
/// passes and returns.
pub type RootedValue = Rooted<Value>;

const DEFAULT_CONS_CAPACITY: usize = 1 << 10;
const DEFAULT_STRINGS_CAPACITY: usize = 1 << 9;
const DEFAULT_SYMBOLS_CAPACITY: usize = 1 << 9;
const DEFAULT_SCOPES_CAPACITY: usize = 1 << 7;
const DEFAULT_LAMBDAS_CAPACITY: usize = 1 << 8;
const DEFAULT_THUNKS_CAPACITY: usize = 1 << 8;
const DEFAULT_MACROS_CAPACITY: usize = 1 << 5;
const DEFAULT_PORTS_CAPACITY: usize = 1 << 4;
const DEFAULT_NATIVES_CAPACITY: usize = 1 << 6;
const DEFAULT_SYNTAX_CAPACITY: usize = 1 << 5;

const INITIAL_GC_THRESHOLD: usize = DEFAULT_CONS_CAPACITY
    + DEFAULT_STRINGS_CAPACITY
    + DEFAULT_SYMBOLS_CAPACITY
    + DEFAULT_SCOPES_CAPACITY
    + DEFAULT_LAMBDAS_CAPACITY
    + DEFAULT_THUNKS_CAPACITY;

/// The Scheme heap: one arena set per object type, the symbol pool, the
/// global (REPL) scope, and the bookkeeping that drives garbage collection.
pub struct Heap {
    cons_cells: ArenaSet<Cons>,
    strings: ArenaSet<SchemeString>,
    symbols: ArenaSet<SymbolData>,
    scopes: ArenaSet<Scope>,
    lambdas: ArenaSet<Lambda>,
    thunks: ArenaSet<Thunk>,
    macros: ArenaSet<Macro>,
    ports: ArenaSet<Port>,
    natives: ArenaSet<Native>,
    syntaxes: ArenaSet<Syntax>,

    symbol_pool: RobinHoodMap<String, SymbolPtr>,
    root_scope: ScopePtr,

    /// Explicitly rooted GC things and how many live `Rooted` handles
    /// reference each one -- the stack-reference counter.
    roots: HashMap<GcThing, usize>,

    allocations: usize,
    allocations_threshold: usize,
}

impl Heap {
    pub fn new() -> Heap {
        let cons_cells = ArenaSet::new(DEFAULT_CONS_CAPACITY);
        let strings = ArenaSet::new(DEFAULT_STRINGS_CAPACITY);
        let symbols = ArenaSet::new(DEFAULT_SYMBOLS_CAPACITY);
        let mut scopes = ArenaSet::new(DEFAULT_SCOPES_CAPACITY);
        let lambdas = ArenaSet::new(DEFAULT_LAMBDAS_CAPACITY);
        let thunks = ArenaSet::new(DEFAULT_THUNKS_CAPACITY);
        let macros = ArenaSet::new(DEFAULT_MACROS_CAPACITY);
        let ports = ArenaSet::new(DEFAULT_PORTS_CAPACITY);
        let natives = ArenaSet::new(DEFAULT_NATIVES_CAPACITY);
        let syntaxes = ArenaSet::new(DEFAULT_SYNTAX_CAPACITY);

        let root_scope = scopes.allocate();

        Heap {
            cons_cells,
            strings,
            symbols,
            scopes,
            lambdas,
            thunks,
            macros,
            ports,
            natives,
            syntaxes,
            symbol_pool: RobinHoodMap::new(),
            root_scope,
            roots: HashMap::new(),
            allocations: 0,
            allocations_threshold: INITIAL_GC_THRESHOLD,
        }
    }

    pub fn root_scope(&self) -> ScopePtr {
        self.root_scope
    }
}

impl Default for Heap {
    fn default() -> Self {
        Heap::new()
    }
}

/// ## Allocation
impl Heap {
    pub fn allocate_cons(&mut self) -> ConsPtr {
        self.on_allocation();
        self.cons_cells.allocate()
    }

    pub fn allocate_string(&mut self) -> StringPtr {
        self.on_allocation();
        self.strings.allocate()
    }

    pub fn allocate_scope(&mut self) -> ScopePtr {
        self.on_allocation();
        self.scopes.allocate()
    }

    pub fn allocate_lambda(&mut self) -> LambdaPtr {
        self.on_allocation();
        self.lambdas.allocate()
    }

    pub fn allocate_thunk(&mut self) -> ThunkPtr {
        self.on_allocation();
        self.thunks.allocate()
    }

    pub fn allocate_macro(&mut self) -> MacroPtr {
        self.on_allocation();
        self.macros.allocate()
    }

    pub fn allocate_port(&mut self) -> PortPtr {
        self.on_allocation();
        self.ports.allocate()
    }

    pub fn allocate_native(&mut self) -> NativePtr {
        self.on_allocation();
        self.natives.allocate()
    }

    pub fn allocate_syntax(&mut self) -> SyntaxPtr {
        self.on_allocation();
        self.syntaxes.allocate()
    }

    fn on_allocation(&mut self) {
        self.allocations += 1;
        if self.allocations > self.allocations_threshold {
            self.collect_garbage();
        }
    }
}

/// ## Garbage collection
impl Heap {
    pub fn collect_garbage(&mut self) {
        let mut pending: Vec<GcThing> = self.get_roots();

        while let Some(thing) = pending.pop() {
            if !thing.is_marked() {
                thing.mark();
                pending.extend(thing.trace());
            }
        }

        let survivors = self.cons_cells.sweep()
            + self.strings.sweep()
            + self.symbols.sweep()
            + self.scopes.sweep()
            + self.lambdas.sweep()
            + self.thunks.sweep()
            + self.macros.sweep()
            + self.ports.sweep()
            + self.natives.sweep()
            + self.syntaxes.sweep();

        debug!("gc cycle complete: {survivors} objects survived");
        self.reset_gc_pressure(survivors);
    }

    /// The union of everything permanently reachable (the REPL scope, every
    /// interned symbol) plus every object currently pinned by a live
    /// `Rooted` handle.
    fn get_roots(&self) -> Vec<GcThing> {
        let mut roots = vec![GcThing::Scope(self.root_scope)];
        roots.extend(self.symbol_pool.values().map(|s| GcThing::Symbol(*s)));
        roots.extend(self.roots.keys().copied());
        roots
    }

    pub(crate) fn add_root(&mut self, thing: GcThing) {
        *self.roots.entry(thing).or_insert(0) += 1;
    }

    pub(crate) fn drop_root(&mut self, thing: GcThing) {
        match self.roots.get_mut(&thing) {
            Some(count) if *count > 1 => *count -= 1,
            Some(_) => {
                self.roots.remove(&thing);
            }
            None => {
                // Every call here comes from `Rooted::drop_root`, which only
                // ever fires once per `Rooted::new`/`Clone::clone` -- Rust's
                // ownership rules make a second `Drop` of the same guard
                // impossible in safe code. Reaching this arm means some
                // caller released a root it never acquired: a double-release,
                // fatal per the spec's memory-manager invariants.
                unreachable!("drop_root: released a handle that was never rooted");
            }
        }
    }

    /// Double-on-survive: the next cycle can't trigger again until
    /// allocations exceed `max(initial threshold, 2 * survivors)`.
    fn reset_gc_pressure(&mut self, survivors: usize) {
        let doubled = survivors.saturating_mul(2);
        let new_threshold = cmp::max(INITIAL_GC_THRESHOLD, doubled);
        if new_threshold > self.allocations_threshold {
            trace!("raising gc threshold to {new_threshold}");
        }
        self.allocations = 0;
        self.allocations_threshold = new_threshold;
    }
}

/// ## Symbols
impl Heap {
    /// Intern `name`, returning the canonical symbol for it. Two calls with
    /// byte-equal names always return pointer-equal symbols.
    pub fn wrap_symbol(&mut self, name: &str) -> SymbolPtr {
        if let Some(ptr) = self.symbol_pool.get(&name.to_string()) {
            return *ptr;
        }
        self.on_allocation();
        let mut sym = self.symbols.allocate();
        sym.name = name.to_string();
        sym.hash = crate::dict::scheme_hash(name.as_bytes());
        let ptr = *sym;
        self.symbol_pool.insert(name.to_string(), ptr);
        ptr
    }

    pub fn wrap_symbol_value(&mut self, name: &str) -> Value {
        Value::Symbol(self.wrap_symbol(name))
    }

    pub fn symbol_name(&self, sym: SymbolPtr) -> String {
        sym.name.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symbols_intern() {
        let mut heap = Heap::new();
        let a = heap.wrap_symbol("foo");
        let b = heap.wrap_symbol("foo");
        let c = heap.wrap_symbol("bar");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn gc_reclaims_unrooted_pairs() {
        let mut heap = Heap::new();
        {
            let _unrooted = Value::new_pair(&mut heap, Value::Int(1), Value::Nil);
        }
        heap.collect_garbage();
        let v = Value::new_pair(&mut heap, Value::Int(2), Value::Nil);
        assert_eq!(v.car(), Some(Value::Int(2)));
    }

    #[test]
    fn rooted_value_survives_collection() {
        let mut heap = Heap::new();
        let pair = Value::new_pair(&mut heap, Value::Int(42), Value::Nil);
        let rooted = Rooted::new(&mut heap, pair);
        heap.collect_garbage();
        assert_eq!(rooted.car(), Some(Value::Int(42)));
    }
}

//! Interned symbol storage.
//!
//! A [`crate::value::SymbolPtr`] is an [`crate::heap::ArenaPtr`] into the
//! heap's symbol arena; `SymbolData` is the payload each slot carries. The
//! hash is cached at intern time (see [`crate::heap::Heap::wrap_symbol`]) so
//! every [`crate::dict::RobinHoodMap`] keyed by symbol can use it without
//! rehashing the name on every probe.

#[derive(Clone, Default)]
pub struct SymbolData {
    pub name: String,
    pub hash: u64,
}

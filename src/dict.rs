//! An open-addressed, Robin-Hood-probed dictionary.
//!
//! Used both for the symbol pool (keyed by the interned text) and for every
//! [`crate::scope::Scope`]'s bindings (keyed by interned symbol, comparing by
//! `(hash, name)` so probe decisions are unambiguous even across hash
//! collisions). The probing discipline mirrors the reference dictionary: walk
//! forward from the home slot, and along any occupied run the entries are
//! kept in ascending `(hash, name)` order, so a lookup can stop the moment it
//! meets an entry that ranks after the key being searched for.

use std::cmp::Ordering;

/// A key usable in a [`RobinHoodMap`]. `key_hash` need not be expensive to
/// recompute (callers holding a pre-hashed key, like an interned symbol,
/// should just return the cached value); `key_order` must agree with it: two
/// keys with different `key_hash`es must never compare `Equal`.
pub trait Keyed {
    fn key_hash(&self) -> u64;
    fn key_order(&self, other: &Self) -> Ordering;
}

impl Keyed for String {
    fn key_hash(&self) -> u64 {
        scheme_hash(self.as_bytes())
    }

    fn key_order(&self, other: &Self) -> Ordering {
        self.key_hash()
            .cmp(&other.key_hash())
            .then_with(|| self.cmp(other))
    }
}

/// `h <- h*7 + byte`, the hash used throughout the reference dictionary and
/// the symbol pool. Any stable function with reasonable distribution would
/// do; this one is kept because it is what the reference implementation uses
/// and nothing here depends on a stronger distribution.
pub fn scheme_hash(bytes: &[u8]) -> u64 {
    let mut h: u64 = 0;
    for &b in bytes {
        h = h.wrapping_mul(7).wrapping_add(b as u64);
    }
    h
}

/// An open-addressed hash map with Robin-Hood probing, keeping its load
/// factor below 0.5 by doubling capacity whenever it would otherwise be
/// exceeded.
pub struct RobinHoodMap<K, V> {
    slots: Vec<Option<(K, V)>>,
    len: usize,
}

impl<K: Keyed, V> Default for RobinHoodMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Keyed, V> RobinHoodMap<K, V> {
    pub fn new() -> Self {
        RobinHoodMap {
            slots: Vec::new(),
            len: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn home(hash: u64, size: usize) -> usize {
        (hash % size as u64) as usize
    }

    fn grow(&mut self) {
        let new_size = if self.slots.is_empty() {
            8
        } else {
            self.slots.len() * 2
        };
        let old = std::mem::replace(&mut self.slots, Self::empty_slots(new_size));
        self.len = 0;
        for slot in old.into_iter().flatten() {
            self.raw_insert(slot.0, slot.1);
        }
    }

    fn empty_slots(n: usize) -> Vec<Option<(K, V)>> {
        let mut v = Vec::with_capacity(n);
        v.resize_with(n, || None);
        v
    }

    fn raw_insert(&mut self, mut key: K, mut value: V) -> Option<V> {
        let size = self.slots.len();
        let mut index = Self::home(key.key_hash(), size);
        loop {
            match self.slots[index].take() {
                None => {
                    self.slots[index] = Some((key, value));
                    self.len += 1;
                    return None;
                }
                Some((resident_key, resident_value)) => match key.key_order(&resident_key) {
                    Ordering::Equal => {
                        self.slots[index] = Some((key, value));
                        return Some(resident_value);
                    }
                    Ordering::Greater => {
                        // Resident ranks before `key`; keep it here and probe onward.
                        self.slots[index] = Some((resident_key, resident_value));
                        index = (index + 1) % size;
                    }
                    Ordering::Less => {
                        // `key` outranks the resident; take its slot and carry
                        // the displaced entry forward to find a new home.
                        self.slots[index] = Some((key, value));
                        key = resident_key;
                        value = resident_value;
                        index = (index + 1) % size;
                    }
                },
            }
        }
    }

    /// Insert `key` -> `value`, returning the previous value if `key` was
    /// already present.
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        if self.slots.is_empty() || (self.len + 1) * 2 > self.slots.len() {
            self.grow();
        }
        self.raw_insert(key, value)
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        if self.slots.is_empty() {
            return None;
        }
        let size = self.slots.len();
        let mut index = Self::home(key.key_hash(), size);
        loop {
            match &self.slots[index] {
                None => return None,
                Some((resident_key, value)) => match key.key_order(resident_key) {
                    Ordering::Equal => return Some(value),
                    Ordering::Greater => index = (index + 1) % size,
                    Ordering::Less => return None,
                },
            }
        }
    }

    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        if self.slots.is_empty() {
            return None;
        }
        let size = self.slots.len();
        let mut index = Self::home(key.key_hash(), size);
        loop {
            match self.slots[index].as_mut() {
                None => return None,
                Some((resident_key, value)) => match key.key_order(resident_key) {
                    Ordering::Equal => return Some(value),
                    Ordering::Greater => index = (index + 1) % size,
                    Ordering::Less => return None,
                },
            }
        }
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.get(key).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.slots.iter().filter_map(|s| s.as_ref().map(|(k, v)| (k, v)))
    }

    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.iter().map(|(_, v)| v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_and_get() {
        let mut m: RobinHoodMap<String, i64> = RobinHoodMap::new();
        assert_eq!(m.insert("a".to_string(), 1), None);
        assert_eq!(m.insert("b".to_string(), 2), None);
        assert_eq!(m.get(&"a".to_string()), Some(&1));
        assert_eq!(m.get(&"b".to_string()), Some(&2));
        assert_eq!(m.get(&"c".to_string()), None);
    }

    #[test]
    fn replace_returns_old_value() {
        let mut m: RobinHoodMap<String, i64> = RobinHoodMap::new();
        m.insert("a".to_string(), 1);
        assert_eq!(m.insert("a".to_string(), 2), Some(1));
        assert_eq!(m.get(&"a".to_string()), Some(&2));
    }

    #[test]
    fn survives_growth_and_many_keys() {
        let mut m: RobinHoodMap<String, i64> = RobinHoodMap::new();
        for i in 0..500 {
            m.insert(format!("key-{i}"), i);
        }
        assert_eq!(m.len(), 500);
        for i in 0..500 {
            assert_eq!(m.get(&format!("key-{i}")), Some(&i));
        }
    }

    #[test]
    fn hash_is_stable_and_deterministic() {
        assert_eq!(scheme_hash(b"abc"), scheme_hash(b"abc"));
        assert_ne!(scheme_hash(b"abc"), scheme_hash(b"abd"));
    }
}

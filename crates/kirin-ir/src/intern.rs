//! Key interning with dense integer handles.
//!
//! Symbols and other structured keys are deduplicated into an
//! [`InternTable`], a bijection between keys and compact handles that
//! preserves insertion order. Stage-local symbols live in each
//! [`StageInfo`](crate::StageInfo); pipeline-wide names live in the
//! [`Pipeline`](crate::Pipeline)'s global table.

use std::hash::Hash;

use rustc_hash::FxHashMap;

use crate::arena::{Identifier, RawId};

/// Bijection between keys of type `K` and dense handles of type `H`.
#[derive(Debug, Clone)]
pub struct InternTable<K, H> {
    items: Vec<K>,
    handles: FxHashMap<K, H>,
}

impl<K, H> Default for InternTable<K, H> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            handles: FxHashMap::default(),
        }
    }
}

impl<K, H> InternTable<K, H>
where
    K: Clone + Eq + Hash,
    H: Identifier,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern a key, returning its handle. Interning the same key twice
    /// returns the same handle.
    pub fn intern(&mut self, key: K) -> H {
        if let Some(&handle) = self.handles.get(&key) {
            return handle;
        }
        let handle = H::from(RawId::from_index(self.items.len()));
        self.items.push(key.clone());
        self.handles.insert(key, handle);
        handle
    }

    /// The key a handle was minted for.
    pub fn lookup(&self, handle: H) -> Option<&K> {
        self.items.get(handle.index())
    }

    /// The handle a key was interned under, if any. Does not intern.
    pub fn resolve(&self, key: &K) -> Option<H> {
        self.handles.get(key).copied()
    }

    /// Iterate `(handle, key)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (H, &K)> {
        self.items
            .iter()
            .enumerate()
            .map(|(index, key)| (H::from(RawId::from_index(index)), key))
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identifier;

    identifier! {
        struct TestHandle, "h"
    }

    #[test]
    fn intern_deduplicates() {
        let mut table: InternTable<String, TestHandle> = InternTable::new();
        let a = table.intern("foo".to_owned());
        let b = table.intern("bar".to_owned());
        let c = table.intern("foo".to_owned());
        assert_eq!(a, c);
        assert_ne!(a, b);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn lookup_and_resolve_agree() {
        let mut table: InternTable<String, TestHandle> = InternTable::new();
        let h = table.intern("sym".to_owned());
        assert_eq!(table.lookup(h).map(String::as_str), Some("sym"));
        assert_eq!(table.resolve(&"sym".to_owned()), Some(h));
        assert_eq!(table.resolve(&"missing".to_owned()), None);
    }

    #[test]
    fn iteration_is_insertion_ordered() {
        let mut table: InternTable<String, TestHandle> = InternTable::new();
        table.intern("z".to_owned());
        table.intern("a".to_owned());
        table.intern("m".to_owned());
        let keys: Vec<&str> = table.iter().map(|(_, k)| k.as_str()).collect();
        assert_eq!(keys, vec!["z", "a", "m"]);
    }
}

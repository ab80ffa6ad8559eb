//! Seen-identifier caches for duplicate detection while streaming.
//!
//! Importers and exporters walking large inputs use these to answer "have I
//! already handled this entity?" without a store round trip. Identifiers are
//! scoped by entity type: a UID or name seen under `Gene` says nothing about
//! `Protein`.
//!
//! The in-memory implementations keep every cached identifier in RAM and
//! never evict. They are unsuitable for inputs whose identifier space does
//! not fit in memory.

use rustc_hash::FxHashMap;
use tangle_core::EntityKeySet;

/// Remembers which identifiers have been seen.
pub trait EntityKeyElementCache {
    /// Remember every UID and name of `keys`.
    fn cache_elements_of(&mut self, keys: &EntityKeySet);

    /// True if any UID or name of `keys` was cached under its type.
    fn seen_element_of(&self, keys: &EntityKeySet) -> bool;
}

/// Remembers identifiers together with a caller value, e.g. an exporter's
/// output id for the entity.
pub trait EntityKeyElementCacheWithLookups<U> {
    /// Remember every UID and name of `keys`, associated with `value`.
    fn cache_elements_with(&mut self, keys: &EntityKeySet, value: U);

    /// True if any UID or name of `keys` was cached under its type.
    fn seen_element_of(&self, keys: &EntityKeySet) -> bool;

    /// The value cached for the first known identifier of `keys`. UIDs are
    /// checked before names.
    fn lookup(&self, keys: &EntityKeySet) -> Option<&U>;
}

#[derive(Debug)]
struct Elements<U> {
    uids: FxHashMap<String, U>,
    names: FxHashMap<String, U>,
}

impl<U> Default for Elements<U> {
    fn default() -> Self {
        Self {
            uids: FxHashMap::default(),
            names: FxHashMap::default(),
        }
    }
}

/// In-memory [`EntityKeyElementCacheWithLookups`].
#[derive(Debug)]
pub struct InMemoryEntityKeyElementCacheWithLookups<U> {
    by_type: FxHashMap<Option<String>, Elements<U>>,
}

impl<U> Default for InMemoryEntityKeyElementCacheWithLookups<U> {
    fn default() -> Self {
        Self {
            by_type: FxHashMap::default(),
        }
    }
}

impl<U> InMemoryEntityKeyElementCacheWithLookups<U> {
    /// Empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of cached identifiers across all types.
    pub fn len(&self) -> usize {
        self.by_type
            .values()
            .map(|e| e.uids.len() + e.names.len())
            .sum()
    }

    /// True if nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn elements(&self, keys: &EntityKeySet) -> Option<&Elements<U>> {
        self.by_type.get(&keys.entity_type().map(str::to_string))
    }
}

impl<U: Clone> EntityKeyElementCacheWithLookups<U> for InMemoryEntityKeyElementCacheWithLookups<U> {
    fn cache_elements_with(&mut self, keys: &EntityKeySet, value: U) {
        let elements = self
            .by_type
            .entry(keys.entity_type().map(str::to_string))
            .or_default();
        for uid in keys.uids() {
            elements.uids.insert(uid.clone(), value.clone());
        }
        for name in keys.names() {
            elements.names.insert(name.clone(), value.clone());
        }
    }

    fn seen_element_of(&self, keys: &EntityKeySet) -> bool {
        self.lookup(keys).is_some()
    }

    fn lookup(&self, keys: &EntityKeySet) -> Option<&U> {
        let elements = self.elements(keys)?;
        keys.uids()
            .iter()
            .find_map(|u| elements.uids.get(u))
            .or_else(|| keys.names().iter().find_map(|n| elements.names.get(n)))
    }
}

/// In-memory [`EntityKeyElementCache`].
#[derive(Debug, Default)]
pub struct InMemoryEntityKeyElementCache {
    inner: InMemoryEntityKeyElementCacheWithLookups<()>,
}

impl InMemoryEntityKeyElementCache {
    /// Empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of cached identifiers across all types.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// True if nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl EntityKeyElementCache for InMemoryEntityKeyElementCache {
    fn cache_elements_of(&mut self, keys: &EntityKeySet) {
        self.inner.cache_elements_with(keys, ());
    }

    fn seen_element_of(&self, keys: &EntityKeySet) -> bool {
        self.inner.seen_element_of(keys)
    }
}

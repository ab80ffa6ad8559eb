//! Named document-store handles.
//!
//! The application entry point owns a [`ConnectionRegistry`] and hands it (or
//! stores taken from it) to the components that need persistence. There is
//! no process-wide registry.

use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use tangle_core::{GraphError, GraphResult};

use crate::memory::MemoryDocumentStore;
use crate::store::DocumentStore;

/// Registry of document stores keyed by connection name.
#[derive(Default)]
pub struct ConnectionRegistry {
    stores: RwLock<FxHashMap<String, Arc<dyn DocumentStore>>>,
}

impl ConnectionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a store under `name`, returning any store it replaces.
    pub fn register(
        &self,
        name: impl Into<String>,
        store: Arc<dyn DocumentStore>,
    ) -> Option<Arc<dyn DocumentStore>> {
        let name = name.into();
        tracing::debug!(connection = %name, "document store registered");
        self.stores.write().insert(name, store)
    }

    /// The store registered under `name`.
    pub fn get(&self, name: &str) -> GraphResult<Arc<dyn DocumentStore>> {
        self.stores
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| GraphError::Config(format!("no document store registered as '{name}'")))
    }

    /// The store registered under `name`, registering a fresh in-memory store
    /// first if there is none.
    pub fn get_or_create_memory(&self, name: &str) -> Arc<dyn DocumentStore> {
        let mut stores = self.stores.write();
        let store = stores
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(MemoryDocumentStore::new()) as Arc<dyn DocumentStore>);
        Arc::clone(store)
    }

    /// Unregister a store. Existing handles stay usable.
    pub fn remove(&self, name: &str) -> Option<Arc<dyn DocumentStore>> {
        self.stores.write().remove(name)
    }

    /// Registered connection names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.stores.read().keys().cloned().collect();
        names.sort();
        names
    }
}

//! The document-store seam.
//!
//! Everything above this crate talks to persistence through
//! [`DocumentStore`]. A network driver for a document database implements the
//! same trait; [`MemoryDocumentStore`](crate::MemoryDocumentStore) is the
//! embedded implementation.

use serde_json::Value;
use tangle_core::GraphResult;

use crate::document::Document;
use crate::query::{Filter, QueryPlan, Update};

/// Lazily evaluated query results.
///
/// Holding a cursor does not hold any lock on the store.
pub struct DocumentCursor {
    inner: Box<dyn Iterator<Item = Document> + Send>,
}

impl DocumentCursor {
    /// Wrap an iterator.
    pub fn new<I>(iter: I) -> Self
    where
        I: Iterator<Item = Document> + Send + 'static,
    {
        Self {
            inner: Box::new(iter),
        }
    }

    /// A cursor yielding nothing.
    pub fn empty() -> Self {
        Self::new(std::iter::empty())
    }
}

impl Iterator for DocumentCursor {
    type Item = Document;

    fn next(&mut self) -> Option<Document> {
        self.inner.next()
    }
}

/// A collection-oriented document database.
///
/// Collections are created on first write. Each call is atomic with respect
/// to a single document; there are no multi-document transactions.
pub trait DocumentStore: Send + Sync {
    /// Create a secondary index on `field` if absent. Returns `true` if the
    /// index was created by this call.
    fn ensure_index(&self, collection: &str, field: &str) -> GraphResult<bool>;

    /// Indexed fields of a collection.
    fn indexes(&self, collection: &str) -> Vec<String>;

    /// Insert a document and return its id. A missing `_id` is generated;
    /// an `_id` already present in the collection is an error.
    fn insert(&self, collection: &str, doc: Document) -> GraphResult<String>;

    /// All documents matching `filter`, in insertion order.
    fn find(&self, collection: &str, filter: &Filter) -> GraphResult<DocumentCursor>;

    /// First document matching `filter`.
    fn find_one(&self, collection: &str, filter: &Filter) -> GraphResult<Option<Document>> {
        Ok(self.find(collection, filter)?.next())
    }

    /// Number of documents matching `filter`.
    fn count(&self, collection: &str, filter: &Filter) -> GraphResult<u64>;

    /// Distinct values at `field` among documents matching `filter`.
    fn distinct(&self, collection: &str, field: &str, filter: &Filter) -> GraphResult<Vec<Value>>;

    /// Atomically update the first document matching `filter` and return it
    /// as it was before the update.
    fn find_and_modify(
        &self,
        collection: &str,
        filter: &Filter,
        update: &Update,
    ) -> GraphResult<Option<Document>>;

    /// Update every matching document. Returns the number updated.
    fn update_many(&self, collection: &str, filter: &Filter, update: &Update) -> GraphResult<u64>;

    /// Remove every matching document. Returns the number removed.
    fn remove(&self, collection: &str, filter: &Filter) -> GraphResult<u64>;

    /// Drop a collection with its indexes. Returns `true` if it existed.
    fn drop_collection(&self, collection: &str) -> GraphResult<bool>;

    /// Names of all collections.
    fn collections(&self) -> Vec<String>;

    /// The plan the store would use for `filter`.
    fn explain(&self, collection: &str, filter: &Filter) -> QueryPlan;
}

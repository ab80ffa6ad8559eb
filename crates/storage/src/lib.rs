//! Document storage for the Tangle graph store.
//!
//! The graph layer persists nodes, edges and the revision log as JSON
//! documents in named collections. This crate defines that contract
//! ([`DocumentStore`]), its query model ([`Filter`], [`Update`]) and an
//! embedded implementation with secondary indexes ([`MemoryDocumentStore`]).

#![warn(missing_docs)]

pub mod document;
pub mod memory;
pub mod query;
pub mod registry;
pub mod store;

pub use document::{Document, ID_FIELD};
pub use memory::MemoryDocumentStore;
pub use query::{Filter, QueryPlan, Update};
pub use registry::ConnectionRegistry;
pub use store::{DocumentCursor, DocumentStore};

//! Identity resolution, revision merging and transactional intake for the
//! Tangle graph store.
//!
//! Layering, bottom up:
//! - [`index`]: key indexes and identity query construction
//! - [`revisions`]: append-only revision storage and identity resolution
//! - [`merge`]: merge policies and chronological folding
//! - [`repository`]: node and edge read/write façade over either layout
//! - [`revlog`]: transactions, commits and listeners
//! - [`connection`]: one graph over one store

#![warn(missing_docs)]

pub mod cache;
pub mod codec;
pub mod config;
pub mod connection;
pub mod index;
pub mod merge;
pub mod repository;
pub mod revisions;
pub mod revlog;
pub mod txn;

pub use cache::{
    EntityKeyElementCache, EntityKeyElementCacheWithLookups, InMemoryEntityKeyElementCache,
    InMemoryEntityKeyElementCacheWithLookups,
};
pub use config::{GraphConfig, InsertMode, StorageMode, CONFIG_FILE};
pub use connection::GraphConnection;
pub use repository::{EdgeRepository, EntityStream, NodeRepository, Repository};
pub use revisions::{EntityIter, Resolution, RevisionStore};
pub use revlog::{
    CommitReport, ListenerId, ListenerWarning, LoggedOperation, RevisionContainer, RevisionLog,
    RevisionLogListener, RollbackReport, SubmitOutcome, TransactionRecord,
};

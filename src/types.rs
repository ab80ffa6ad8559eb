//! Public types for the Tangle graph store.
//!
//! This module re-exports types from the internal crates with a flat public
//! interface.

// ============================================================================
// Identity and entities
// ============================================================================

pub use tangle_core::{Content, Edge, EntityKeySet, EntityKind, EntityState, GraphEntity, Node, Resolved};

// Revisions and merging
pub use tangle_core::{MergePolicy, Revision};

// Operations submitted to the revision log
pub use tangle_core::{EdgeUpdate, GraphOperation, NodeUpdate};

// Errors
pub use tangle_core::{GraphError, GraphResult};

// ============================================================================
// Storage
// ============================================================================

pub use tangle_storage::{ConnectionRegistry, Document, DocumentStore, Filter, MemoryDocumentStore};

// ============================================================================
// Graph engine
// ============================================================================

// Configuration
pub use tangle_engine::{GraphConfig, InsertMode, StorageMode};

// Repositories and the revision log
pub use tangle_engine::{
    CommitReport, EdgeRepository, EntityStream, GraphConnection, NodeRepository, RevisionLog,
    RevisionLogListener, RollbackReport, SubmitOutcome, TransactionRecord,
};

// Duplicate detection
pub use tangle_engine::{
    EntityKeyElementCache, EntityKeyElementCacheWithLookups, InMemoryEntityKeyElementCache,
    InMemoryEntityKeyElementCacheWithLookups,
};

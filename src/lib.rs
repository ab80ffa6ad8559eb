//! TangleDB: a versioned property-graph store.
//!
//! Producers write graph fragments whose entities may be identified by any
//! of several UIDs or type + name pairs. TangleDB keeps every fragment as an
//! immutable revision, resolves which fragments describe the same entity, and
//! merges them into one materialized view on read.
//!
//! ```no_run
//! use tangledb::{
//!     EntityKeySet, GraphConfig, GraphConnection, GraphOperation, MemoryDocumentStore,
//!     MergePolicy, Node,
//! };
//! use std::sync::Arc;
//!
//! # fn main() -> tangledb::GraphResult<()> {
//! let graph = GraphConnection::with_store(Arc::new(MemoryDocumentStore::new()), "g", GraphConfig::new())?;
//! graph.submit(vec![GraphOperation::node(
//!     MergePolicy::default(),
//!     Node::new(EntityKeySet::for_name("Gene", "BRCA1")).with_field("chr", "17"),
//! )])?;
//! let gene = graph.nodes().get_by_name("Gene", "BRCA1")?;
//! assert!(gene.is_materialized());
//! # Ok(())
//! # }
//! ```

mod types;

pub use types::*;

/// Lower-level building blocks.
pub mod engine {
    pub use tangle_engine::{cache, codec, config, index, merge, repository, revisions, revlog, txn};
}

/// Document storage layer.
pub mod storage {
    pub use tangle_storage::*;
}

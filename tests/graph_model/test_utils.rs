//! Shared helpers for the graph model suite.

use std::sync::{Arc, Once};

use tangledb::{
    DocumentStore, Edge, EntityKeySet, GraphConfig, GraphConnection, GraphOperation,
    MemoryDocumentStore, MergePolicy, Node,
};

static TRACING: Once = Once::new();

/// Route library logs to the test harness output.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_test_writer()
            .with_max_level(tracing::Level::DEBUG)
            .try_init();
    });
}

/// A fresh graph over a fresh in-memory store.
pub fn graph(config: GraphConfig) -> GraphConnection {
    init_tracing();
    let store: Arc<dyn DocumentStore> = Arc::new(MemoryDocumentStore::new());
    GraphConnection::with_store(store, "test-graph", config).unwrap()
}

/// A graph with default configuration.
pub fn default_graph() -> GraphConnection {
    graph(GraphConfig::new())
}

/// Node keyed by type + name.
pub fn named(entity_type: &str, name: &str) -> Node {
    Node::new(EntityKeySet::for_name(entity_type, name))
}

/// Node update with the default merge policy.
pub fn put_node(node: Node) -> GraphOperation {
    GraphOperation::node(MergePolicy::default(), node)
}

/// Edge update with the default merge policy.
pub fn put_edge(edge_type: &str, uid: &str, from: EntityKeySet, to: EntityKeySet) -> GraphOperation {
    GraphOperation::edge(
        MergePolicy::default(),
        Edge::new(EntityKeySet::create(edge_type).with_uid(uid), from, to),
    )
}

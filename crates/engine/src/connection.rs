//! One graph opened over one document store.

use std::sync::Arc;

use tangle_core::{Edge, EntityKeySet, GraphOperation, GraphResult};
use tangle_storage::{ConnectionRegistry, DocumentStore};

use crate::config::GraphConfig;
use crate::repository::{EdgeRepository, EntityStream, NodeRepository};
use crate::revlog::{CommitReport, RevisionLog};
use crate::txn;

/// A graph: its repositories, its revision log and where they live.
///
/// The edge helpers here expand each endpoint to the node's full identity
/// before querying, so an edge is found whichever of the node's identifiers
/// it was written against.
pub struct GraphConnection {
    graph_id: String,
    store: Arc<dyn DocumentStore>,
    config: GraphConfig,
    nodes: NodeRepository,
    edges: EdgeRepository,
    revision_log: RevisionLog,
}

impl GraphConnection {
    /// Open `graph_id` on the store registered under `store_name`.
    pub fn open(
        registry: &ConnectionRegistry,
        store_name: &str,
        graph_id: impl Into<String>,
        config: GraphConfig,
    ) -> GraphResult<Self> {
        Self::with_store(registry.get(store_name)?, graph_id, config)
    }

    /// Open `graph_id` on `store`.
    pub fn with_store(
        store: Arc<dyn DocumentStore>,
        graph_id: impl Into<String>,
        config: GraphConfig,
    ) -> GraphResult<Self> {
        config.validate()?;
        let graph_id = graph_id.into();
        let nodes = NodeRepository::new(store.clone(), &config.nodes_collection, graph_id.clone(), &config)?;
        let edges = EdgeRepository::new(store.clone(), &config.edges_collection, graph_id.clone(), &config)?;
        let revision_log = RevisionLog::new(store.clone(), &config, nodes.clone(), edges.clone())?;
        tracing::debug!(
            graph = %graph_id,
            storage_mode = ?config.storage_mode,
            insert_mode = ?config.insert_mode,
            "graph opened"
        );
        Ok(Self {
            graph_id,
            store,
            config,
            nodes,
            edges,
            revision_log,
        })
    }

    /// Graph id.
    pub fn graph_id(&self) -> &str {
        &self.graph_id
    }

    /// Underlying store.
    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    /// Configuration the graph was opened with.
    pub fn config(&self) -> &GraphConfig {
        &self.config
    }

    /// Node repository.
    pub fn nodes(&self) -> &NodeRepository {
        &self.nodes
    }

    /// Edge repository.
    pub fn edges(&self) -> &EdgeRepository {
        &self.edges
    }

    /// Revision log.
    pub fn revision_log(&self) -> &RevisionLog {
        &self.revision_log
    }

    /// Submit `operations` as one transaction and commit it.
    pub fn submit(&self, operations: Vec<GraphOperation>) -> GraphResult<CommitReport> {
        txn::submit_as_txn(&self.revision_log, &self.graph_id, operations)
    }

    /// Edges leaving the node `from` refers to.
    pub fn edges_from(&self, from: &EntityKeySet) -> GraphResult<EntityStream<Edge>> {
        let from = self.nodes.populate_full_keyset(from)?;
        self.edges.iterate_edges_from_node(&from)
    }

    /// Edges arriving at the node `to` refers to.
    pub fn edges_to(&self, to: &EntityKeySet) -> GraphResult<EntityStream<Edge>> {
        let to = self.nodes.populate_full_keyset(to)?;
        self.edges.iterate_edges_to_node(&to)
    }

    /// Edges between the nodes `from` and `to` refer to.
    pub fn edges_between(
        &self,
        from: &EntityKeySet,
        to: &EntityKeySet,
    ) -> GraphResult<EntityStream<Edge>> {
        let from = self.nodes.populate_full_keyset(from)?;
        let to = self.nodes.populate_full_keyset(to)?;
        self.edges.iterate_edges_between_nodes(&from, &to)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tangle_core::{GraphError, MergePolicy, Node};

    fn setup() -> GraphConnection {
        let registry = ConnectionRegistry::new();
        registry.get_or_create_memory("local");
        GraphConnection::open(&registry, "local", "g", GraphConfig::new()).unwrap()
    }

    #[test]
    fn unknown_store_is_a_config_error() {
        let registry = ConnectionRegistry::new();
        let err = GraphConnection::open(&registry, "missing", "g", GraphConfig::new())
            .err()
            .unwrap();
        assert!(matches!(err, GraphError::Config(_)));
    }

    #[test]
    fn edge_queries_expand_node_identity() {
        let graph = setup();
        let policy = MergePolicy::default();
        graph
            .submit(vec![
                GraphOperation::node(policy, Node::new(EntityKeySet::for_name("Gene", "BRCA1").with_uid("g1"))),
                GraphOperation::edge(
                    policy,
                    Edge::new(
                        EntityKeySet::create("binds").with_uid("e1"),
                        EntityKeySet::for_uid("p1"),
                        EntityKeySet::for_uid("g1"),
                    ),
                ),
            ])
            .unwrap();

        let by_name = EntityKeySet::for_name("Gene", "BRCA1");
        // the raw repository only matches the identifier the edge used
        assert_eq!(graph.edges().count_edges_to_node(&by_name).unwrap(), 0);
        assert_eq!(graph.edges_to(&by_name).unwrap().count(), 1);
        assert_eq!(
            graph
                .edges_between(&EntityKeySet::for_uid("p1"), &by_name)
                .unwrap()
                .count(),
            1
        );
        assert_eq!(graph.edges_from(&by_name).unwrap().count(), 0);
    }
}

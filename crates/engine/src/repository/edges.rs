//! Edge queries by endpoint.
//!
//! Endpoints are matched however the edge addressed them when it was written:
//! by any shared UID, or by any shared name under the endpoint's type. Callers
//! that only hold part of a node's identity should expand it first (see
//! `GraphConnection`), otherwise edges written against the other identifiers
//! are missed.

use std::collections::BTreeMap;

use tangle_core::{Edge, EntityKeySet, GraphEntity, GraphResult};
use tangle_storage::Filter;

use super::{EdgeRepository, EntityStream};
use crate::index::{self, FROM, KEYS, TO};

fn typed(edge_type: &str, endpoints: Filter) -> Filter {
    Filter::and(vec![index::of_type(KEYS, edge_type), endpoints])
}

impl EdgeRepository {
    /// Edges leaving `from`.
    pub fn iterate_edges_from_node(&self, from: &EntityKeySet) -> GraphResult<EntityStream<Edge>> {
        self.query(&index::addressed_by(FROM, from)?)
    }

    /// Edges arriving at `to`.
    pub fn iterate_edges_to_node(&self, to: &EntityKeySet) -> GraphResult<EntityStream<Edge>> {
        self.query(&index::addressed_by(TO, to)?)
    }

    /// Edges from `from` to `to`.
    pub fn iterate_edges_between_nodes(
        &self,
        from: &EntityKeySet,
        to: &EntityKeySet,
    ) -> GraphResult<EntityStream<Edge>> {
        self.query(&index::between(from, to)?)
    }

    /// Edges of one type leaving `from`.
    pub fn iterate_edges_from_node_of_type(
        &self,
        edge_type: &str,
        from: &EntityKeySet,
    ) -> GraphResult<EntityStream<Edge>> {
        self.query(&typed(edge_type, index::addressed_by(FROM, from)?))
    }

    /// Edges of one type arriving at `to`.
    pub fn iterate_edges_to_node_of_type(
        &self,
        edge_type: &str,
        to: &EntityKeySet,
    ) -> GraphResult<EntityStream<Edge>> {
        self.query(&typed(edge_type, index::addressed_by(TO, to)?))
    }

    /// Edges of one type from `from` to `to`.
    pub fn iterate_edges_between_nodes_of_type(
        &self,
        edge_type: &str,
        from: &EntityKeySet,
        to: &EntityKeySet,
    ) -> GraphResult<EntityStream<Edge>> {
        self.query(&typed(edge_type, index::between(from, to)?))
    }

    /// Number of edges leaving `from`.
    pub fn count_edges_from_node(&self, from: &EntityKeySet) -> GraphResult<u64> {
        self.count_matching(&index::addressed_by(FROM, from)?)
    }

    /// Number of edges arriving at `to`.
    pub fn count_edges_to_node(&self, to: &EntityKeySet) -> GraphResult<u64> {
        self.count_matching(&index::addressed_by(TO, to)?)
    }

    /// Number of edges of one type leaving `from`.
    pub fn count_edges_of_type_from_node(
        &self,
        edge_type: &str,
        from: &EntityKeySet,
    ) -> GraphResult<u64> {
        self.count_matching(&typed(edge_type, index::addressed_by(FROM, from)?))
    }

    /// Number of edges of one type arriving at `to`.
    pub fn count_edges_of_type_to_node(
        &self,
        edge_type: &str,
        to: &EntityKeySet,
    ) -> GraphResult<u64> {
        self.count_matching(&typed(edge_type, index::addressed_by(TO, to)?))
    }

    /// Number of edges of one type from `from` to `to`.
    pub fn count_edges_of_type_between_nodes(
        &self,
        edge_type: &str,
        from: &EntityKeySet,
        to: &EntityKeySet,
    ) -> GraphResult<u64> {
        self.count_matching(&typed(edge_type, index::between(from, to)?))
    }

    /// Edge type histogram of the edges leaving `from`.
    pub fn count_edges_by_type_from_node(
        &self,
        from: &EntityKeySet,
    ) -> GraphResult<BTreeMap<String, u64>> {
        histogram(self.iterate_edges_from_node(from)?)
    }

    /// Edge type histogram of the edges arriving at `to`.
    pub fn count_edges_by_type_to_node(
        &self,
        to: &EntityKeySet,
    ) -> GraphResult<BTreeMap<String, u64>> {
        histogram(self.iterate_edges_to_node(to)?)
    }

    /// True if some edge leaves `from` towards a node of `to_type`.
    ///
    /// Only the destination type recorded on the edge is consulted; an edge
    /// that addressed its destination by UID alone does not count.
    pub fn exists_edge_to_node_of_type(
        &self,
        from: &EntityKeySet,
        to_type: &str,
    ) -> GraphResult<bool> {
        let filter = Filter::and(vec![
            index::addressed_by(FROM, from)?,
            index::of_type(TO, to_type),
        ]);
        Ok(self.query(&filter)?.next().transpose()?.is_some())
    }
}

fn histogram(edges: EntityStream<Edge>) -> GraphResult<BTreeMap<String, u64>> {
    let mut counts = BTreeMap::new();
    for edge in edges {
        let edge = edge?;
        let edge_type = edge.keys().entity_type().unwrap_or_default().to_string();
        *counts.entry(edge_type).or_insert(0) += 1;
    }
    Ok(counts)
}

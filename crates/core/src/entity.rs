//! Graph entities: nodes, edges and their semi-structured content.

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{GraphError, GraphResult};
use crate::keys::EntityKeySet;

/// Content of a node or edge: a JSON object of top-level fields.
///
/// Merging works on top-level fields only. Nested objects and arrays are
/// opaque values. A field that is absent and a field that holds `null` are
/// treated the same.
pub type Content = serde_json::Map<String, Value>;

/// Which kind of graph entity a revision or repository deals with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    /// Graph node.
    Node,
    /// Graph edge.
    Edge,
}

impl EntityKind {
    /// Lowercase name, as persisted.
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Node => "node",
            EntityKind::Edge => "edge",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A graph node.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Identity of the node.
    pub keys: EntityKeySet,
    /// Node properties.
    #[serde(default)]
    pub content: Content,
}

impl Node {
    /// A node with the given identity and no content.
    pub fn new(keys: EntityKeySet) -> Self {
        Self {
            keys,
            content: Content::new(),
        }
    }

    /// Builder: set a content field.
    pub fn with_field(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.content.insert(field.into(), value.into());
        self
    }

    /// A content field, `None` when absent or null.
    pub fn field(&self, field: &str) -> Option<&Value> {
        present(&self.content, field)
    }
}

/// A directed graph edge between two nodes.
///
/// `from` and `to` are key sets, so an endpoint may be addressed by UID or by
/// type + name independently of how the node itself was written.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    /// Identity of the edge. The type is the edge label.
    pub keys: EntityKeySet,
    /// Source node.
    pub from: EntityKeySet,
    /// Destination node.
    pub to: EntityKeySet,
    /// Edge properties.
    #[serde(default)]
    pub content: Content,
}

impl Edge {
    /// An edge with the given identity and endpoints.
    pub fn new(keys: EntityKeySet, from: EntityKeySet, to: EntityKeySet) -> Self {
        Self {
            keys,
            from,
            to,
            content: Content::new(),
        }
    }

    /// Builder: set a content field.
    pub fn with_field(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.content.insert(field.into(), value.into());
        self
    }

    /// A content field, `None` when absent or null.
    pub fn field(&self, field: &str) -> Option<&Value> {
        present(&self.content, field)
    }
}

fn present<'a>(content: &'a Content, field: &str) -> Option<&'a Value> {
    content.get(field).filter(|v| !v.is_null())
}

/// Behaviour shared by [`Node`] and [`Edge`] so repositories, revision
/// storage and merging can be written once.
pub trait GraphEntity:
    Clone + fmt::Debug + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// The kind of entity.
    const KIND: EntityKind;

    /// Identity of the entity.
    fn keys(&self) -> &EntityKeySet;

    /// Mutable identity, for merging.
    fn keys_mut(&mut self) -> &mut EntityKeySet;

    /// Content fields.
    fn content(&self) -> &Content;

    /// Mutable content fields, for merging.
    fn content_mut(&mut self) -> &mut Content;

    /// Check the entity may be persisted.
    fn validate(&self) -> GraphResult<()> {
        self.keys().validate()
    }

    /// Union any identity the entity carries besides its own keys.
    fn merge_references(&mut self, _incoming: &Self) -> GraphResult<()> {
        Ok(())
    }
}

impl GraphEntity for Node {
    const KIND: EntityKind = EntityKind::Node;

    fn keys(&self) -> &EntityKeySet {
        &self.keys
    }

    fn keys_mut(&mut self) -> &mut EntityKeySet {
        &mut self.keys
    }

    fn content(&self) -> &Content {
        &self.content
    }

    fn content_mut(&mut self) -> &mut Content {
        &mut self.content
    }
}

impl GraphEntity for Edge {
    const KIND: EntityKind = EntityKind::Edge;

    fn keys(&self) -> &EntityKeySet {
        &self.keys
    }

    fn keys_mut(&mut self) -> &mut EntityKeySet {
        &mut self.keys
    }

    fn content(&self) -> &Content {
        &self.content
    }

    fn content_mut(&mut self) -> &mut Content {
        &mut self.content
    }

    fn validate(&self) -> GraphResult<()> {
        self.keys.validate()?;
        self.from
            .validate()
            .map_err(|e| GraphError::invalid_key(format!("edge 'from' endpoint: {e}")))?;
        self.to
            .validate()
            .map_err(|e| GraphError::invalid_key(format!("edge 'to' endpoint: {e}")))?;
        Ok(())
    }

    /// Endpoints are identities in their own right: they are unioned the same
    /// way the edge's own keys are.
    fn merge_references(&mut self, incoming: &Self) -> GraphResult<()> {
        merge_endpoint(&mut self.from, &incoming.from)?;
        merge_endpoint(&mut self.to, &incoming.to)
    }
}

fn merge_endpoint(existing: &mut EntityKeySet, incoming: &EntityKeySet) -> GraphResult<()> {
    if let Some(t) = incoming.entity_type() {
        existing.adopt_type(t)?;
    }
    let mut incoming = incoming.clone();
    if let Some(t) = existing.entity_type() {
        incoming.adopt_type(t)?;
    }
    existing.import_identity(&incoming)
}

/// Lifecycle of an entity as seen by a reader.
///
/// An entity nobody has asked about is conceptually unknown. Once queried
/// and not found it is [`Virtual`](EntityState::Virtual); once at least one
/// revision exists it is [`Materialized`](EntityState::Materialized) and
/// stays so.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityState {
    /// Queried, nothing stored.
    Virtual,
    /// At least one revision exists.
    Materialized,
}

/// Result of a key lookup: either the merged entity or a placeholder
/// carrying the key set that was asked for.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolved<E> {
    /// Nothing stored under the queried keys.
    Virtual(EntityKeySet),
    /// The materialized entity.
    Materialized(E),
}

impl<E: GraphEntity> Resolved<E> {
    /// Lifecycle state of the lookup result.
    pub fn state(&self) -> EntityState {
        match self {
            Resolved::Virtual(_) => EntityState::Virtual,
            Resolved::Materialized(_) => EntityState::Materialized,
        }
    }

    /// True for a placeholder.
    pub fn is_virtual(&self) -> bool {
        matches!(self, Resolved::Virtual(_))
    }

    /// True if the entity exists.
    pub fn is_materialized(&self) -> bool {
        matches!(self, Resolved::Materialized(_))
    }

    /// Keys of the entity, or the queried keys for a placeholder.
    pub fn keys(&self) -> &EntityKeySet {
        match self {
            Resolved::Virtual(keys) => keys,
            Resolved::Materialized(e) => e.keys(),
        }
    }

    /// Borrow the entity if it exists.
    pub fn entity(&self) -> Option<&E> {
        match self {
            Resolved::Virtual(_) => None,
            Resolved::Materialized(e) => Some(e),
        }
    }

    /// Take the entity if it exists.
    pub fn into_entity(self) -> Option<E> {
        match self {
            Resolved::Virtual(_) => None,
            Resolved::Materialized(e) => Some(e),
        }
    }
}

//! Read/write façade over nodes and edges.
//!
//! A [`Repository`] hides which layout the entities are stored in:
//! - [`StorageMode::Revisions`]: every write appends a revision; reads
//!   resolve the full identity and merge the history
//! - [`StorageMode::DirectWrite`]: one document per entity, merged on write
//!
//! Lookups never fail for a missing entity. They return
//! [`Resolved::Virtual`] carrying the queried keys, so "not there yet" is
//! distinguishable from a failure.

pub mod direct;
pub mod edges;

use std::sync::Arc;

use serde_json::Value;
use tangle_core::{
    new_id, Edge, EntityKeySet, GraphEntity, GraphError, GraphResult, MergePolicy, Node,
    Resolved, Revision,
};
use tangle_storage::{DocumentStore, Filter};

use crate::config::{GraphConfig, InsertMode, StorageMode};
use crate::index::{self, KEYS};
use crate::revisions::RevisionStore;
use direct::DirectStore;

/// Stream of materialized entities.
pub type EntityStream<E> = Box<dyn Iterator<Item = GraphResult<E>> + Send>;

/// Node repository.
pub type NodeRepository = Repository<Node>;

/// Edge repository.
pub type EdgeRepository = Repository<Edge>;

#[derive(Clone)]
enum Backend<E> {
    Revisions(RevisionStore<E>),
    Direct(DirectStore<E>),
}

/// Entities of one kind in one collection.
///
/// Cloning is cheap and clones share the underlying store.
#[derive(Clone)]
pub struct Repository<E> {
    backend: Backend<E>,
    graph_id: String,
    insert_mode: InsertMode,
}

impl<E: GraphEntity> Repository<E> {
    /// Open a repository over `collection`, creating its key indexes.
    pub fn new(
        store: Arc<dyn DocumentStore>,
        collection: &str,
        graph_id: impl Into<String>,
        config: &GraphConfig,
    ) -> GraphResult<Self> {
        let backend = match config.storage_mode {
            StorageMode::Revisions => Backend::Revisions(RevisionStore::new(
                store,
                collection,
                config.insert_mode,
            )?),
            StorageMode::DirectWrite => Backend::Direct(DirectStore::new(store, collection)?),
        };
        Ok(Self {
            backend,
            graph_id: graph_id.into(),
            insert_mode: config.insert_mode,
        })
    }

    /// Graph the repository writes revisions for.
    pub fn graph_id(&self) -> &str {
        &self.graph_id
    }

    /// Active storage layout.
    pub fn storage_mode(&self) -> StorageMode {
        match self.backend {
            Backend::Revisions(_) => StorageMode::Revisions,
            Backend::Direct(_) => StorageMode::DirectWrite,
        }
    }

    /// Active insert mode.
    pub fn insert_mode(&self) -> InsertMode {
        self.insert_mode
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Store a new entity.
    ///
    /// In consistency mode an entity sharing any identifier with an existing
    /// one is rejected with [`GraphError::AlreadyExists`]; use the revision
    /// log to merge into existing entities.
    pub fn store(&self, entity: E) -> GraphResult<()> {
        entity.validate()?;
        if self.insert_mode == InsertMode::Consistency && self.exists_by_key(entity.keys())? {
            return Err(GraphError::AlreadyExists {
                keys: entity.keys().to_string(),
            });
        }
        match &self.backend {
            Backend::Revisions(revs) => revs.store(&Revision::new(
                self.graph_id.clone(),
                new_id(),
                MergePolicy::default(),
                entity,
            )),
            Backend::Direct(direct) => direct.insert(&entity),
        }
    }

    /// Apply one committed revision: append it, or merge it in place in
    /// direct-write mode.
    pub fn apply(&self, revision: &Revision<E>) -> GraphResult<()> {
        match &self.backend {
            Backend::Revisions(revs) => revs.store(revision),
            Backend::Direct(direct) => direct.apply(revision.merge_policy, &revision.entity),
        }
    }

    /// Set one content field of an existing entity.
    ///
    /// A `null` value clears the field, in both layouts. In revision mode
    /// that is written as an `OVERWRITE_ALL` revision carrying the current
    /// content without the field.
    ///
    /// Fails with [`GraphError::InvalidKey`] if no entity matches.
    pub fn set_property(&self, keys: &EntityKeySet, field: &str, value: Value) -> GraphResult<()> {
        let updated = match &self.backend {
            Backend::Revisions(revs) => match revs.fetch(keys)? {
                Some(existing) => {
                    let mut patch = existing;
                    let policy = if value.is_null() {
                        patch.content_mut().remove(field);
                        MergePolicy::OverwriteAll
                    } else {
                        patch.content_mut().clear();
                        patch.content_mut().insert(field.to_string(), value);
                        MergePolicy::AppendNewOverwriteExisting
                    };
                    revs.store(&Revision::new(self.graph_id.clone(), new_id(), policy, patch))?;
                    true
                }
                None => false,
            },
            Backend::Direct(direct) => direct.set_property(keys, field, value)?,
        };
        if updated {
            Ok(())
        } else {
            Err(GraphError::invalid_key(format!("no entity matches {keys}")))
        }
    }

    /// Delete the entity `keys` refers to. Returns the number of documents
    /// removed.
    ///
    /// `keys` must carry a UID, or names together with a type.
    pub fn delete(&self, keys: &EntityKeySet) -> GraphResult<u64> {
        if keys.is_empty() {
            return Err(GraphError::invalid_key(
                "delete needs at least one UID or name",
            ));
        }
        if keys.uids().is_empty() && keys.entity_type().is_none() {
            return Err(GraphError::invalid_key(
                "delete by name needs the entity type",
            ));
        }
        let removed = match &self.backend {
            Backend::Revisions(revs) => revs.delete_entity(keys)?,
            Backend::Direct(direct) => direct.delete(keys)?,
        };
        tracing::debug!(graph = %self.graph_id, keys = %keys, removed, "entity deleted");
        Ok(removed)
    }

    /// Remove everything written under one transaction id. A no-op in
    /// direct-write mode, where writes are merged and cannot be undone.
    pub fn remove_patch(&self, patch_id: &str) -> GraphResult<u64> {
        match &self.backend {
            Backend::Revisions(revs) => revs.remove_patch(patch_id),
            Backend::Direct(_) => Ok(0),
        }
    }

    // =========================================================================
    // Lookups
    // =========================================================================

    /// The entity `keys` refers to, or a virtual placeholder.
    ///
    /// UIDs are tried first, then type + name.
    pub fn get_by_key(&self, keys: &EntityKeySet) -> GraphResult<Resolved<E>> {
        let found = match &self.backend {
            Backend::Revisions(revs) => revs.fetch(keys)?,
            Backend::Direct(direct) => {
                validate_lookup(keys)?;
                direct.get(keys)?
            }
        };
        Ok(match found {
            Some(entity) => Resolved::Materialized(entity),
            None => Resolved::Virtual(keys.clone()),
        })
    }

    /// Lookup by a single UID.
    pub fn get_by_uid(&self, uid: &str) -> GraphResult<Resolved<E>> {
        self.get_by_key(&EntityKeySet::for_uid(uid))
    }

    /// Lookup by any of several UIDs.
    pub fn get_by_any_uid<I, S>(&self, uids: I) -> GraphResult<Resolved<E>>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut keys = EntityKeySet::new();
        keys.add_uids(uids);
        self.get_by_key(&keys)
    }

    /// Lookup by type + name.
    pub fn get_by_name(&self, entity_type: &str, name: &str) -> GraphResult<Resolved<E>> {
        self.get_by_key(&EntityKeySet::for_name(entity_type, name))
    }

    /// Lookup by any of several names of one type.
    pub fn get_by_any_name<I, S>(&self, entity_type: &str, names: I) -> GraphResult<Resolved<E>>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut keys = EntityKeySet::create(entity_type);
        keys.add_names(names);
        self.get_by_key(&keys)
    }

    /// True if any revision or document matches `keys`.
    pub fn exists_by_key(&self, keys: &EntityKeySet) -> GraphResult<bool> {
        match &self.backend {
            Backend::Revisions(revs) => {
                validate_lookup(keys)?;
                revs.count_revisions(&index::addressed_by(KEYS, keys)?)
                    .map(|n| n > 0)
            }
            Backend::Direct(direct) => Ok(direct.get(keys)?.is_some()),
        }
    }

    /// The complete identity of the entity `partial` refers to. Returns
    /// `partial` unchanged if nothing matches.
    pub fn populate_full_keyset(&self, partial: &EntityKeySet) -> GraphResult<EntityKeySet> {
        match &self.backend {
            Backend::Revisions(revs) => revs.populate_full_keyset(partial),
            Backend::Direct(_) => Ok(self
                .get_by_key(partial)?
                .into_entity()
                .map(|e| e.keys().clone())
                .unwrap_or_else(|| partial.clone())),
        }
    }

    /// Full key set of the entity owning `uid`, if it exists.
    pub fn entity_keyset_for_uid(&self, uid: &str) -> GraphResult<Option<EntityKeySet>> {
        Ok(self.get_by_uid(uid)?.into_entity().map(|e| e.keys().clone()))
    }

    /// Full key set of the entity named `name` in `entity_type`, if it exists.
    pub fn entity_keyset_for_name(
        &self,
        entity_type: &str,
        name: &str,
    ) -> GraphResult<Option<EntityKeySet>> {
        Ok(self
            .get_by_name(entity_type, name)?
            .into_entity()
            .map(|e| e.keys().clone()))
    }

    // =========================================================================
    // Iteration and counting
    // =========================================================================

    /// Materialized entities with at least one document matching `filter`.
    pub(crate) fn query(&self, filter: &Filter) -> GraphResult<EntityStream<E>> {
        Ok(match &self.backend {
            Backend::Revisions(revs) => Box::new(revs.entities(filter)?),
            Backend::Direct(direct) => Box::new(direct.entities(filter)?),
        })
    }

    /// Number of entities with at least one document matching `filter`.
    pub(crate) fn count_matching(&self, filter: &Filter) -> GraphResult<u64> {
        match &self.backend {
            Backend::Revisions(_) => {
                let mut n = 0;
                for entity in self.query(filter)? {
                    entity?;
                    n += 1;
                }
                Ok(n)
            }
            Backend::Direct(direct) => direct.count(filter),
        }
    }

    /// Every entity.
    pub fn iterate_all(&self) -> GraphResult<EntityStream<E>> {
        self.query(&Filter::All)
    }

    /// Every entity of one type.
    pub fn iterate_by_type(&self, entity_type: &str) -> GraphResult<EntityStream<E>> {
        self.query(&index::of_type(KEYS, entity_type))
    }

    /// One page of key sets of entities of one type.
    pub fn iterate_keys_by_type(
        &self,
        entity_type: &str,
        offset: usize,
        limit: usize,
    ) -> GraphResult<Vec<EntityKeySet>> {
        self.iterate_by_type(entity_type)?
            .skip(offset)
            .take(limit)
            .map(|e| e.map(|e| e.keys().clone()))
            .collect()
    }

    /// Number of entities of one type.
    ///
    /// In revision mode this resolves every identity of the type.
    pub fn count_by_type(&self, entity_type: &str) -> GraphResult<u64> {
        self.count_matching(&index::of_type(KEYS, entity_type))
    }

    /// Number of entities.
    pub fn count(&self) -> GraphResult<u64> {
        self.count_matching(&Filter::All)
    }

    /// Entity types present, sorted.
    pub fn list_types(&self) -> GraphResult<Vec<String>> {
        let mut types = match &self.backend {
            Backend::Revisions(revs) => revs.types()?,
            Backend::Direct(direct) => direct.types()?,
        };
        types.sort();
        Ok(types)
    }
}

fn validate_lookup(keys: &EntityKeySet) -> GraphResult<()> {
    if keys.is_empty() {
        return Err(GraphError::invalid_key(
            "lookup needs at least one UID or name",
        ));
    }
    if keys.uids().is_empty() && keys.entity_type().is_none() {
        return Err(GraphError::invalid_key(
            "lookup by name needs the entity type",
        ));
    }
    Ok(())
}

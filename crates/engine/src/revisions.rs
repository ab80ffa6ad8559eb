//! Append-only revision storage and identity resolution.
//!
//! Each revision is one document. Identity is never stored explicitly: two
//! revisions describe the same entity when they share a UID, or share a name
//! under the same type, directly or through a chain of other revisions. A
//! revision carrying `{a, b}` links every revision with `a` to every revision
//! with `b`.
//!
//! Resolving an identity is a breadth-first walk over that co-occurrence
//! graph. The walk keeps every visited identifier in memory, so it is bounded
//! by the size of one entity's identity, not by the collection.

use std::collections::VecDeque;
use std::marker::PhantomData;
use std::sync::Arc;

use rustc_hash::{FxHashMap, FxHashSet};
use serde_json::Value;
use tangle_core::{
    sort_chronologically, EntityKeySet, GraphEntity, GraphError, GraphResult, Revision,
};
use tangle_storage::{DocumentCursor, DocumentStore, Filter};

use crate::codec::{from_document, to_document};
use crate::config::InsertMode;
use crate::index::{self, KeyFields, KEYS};
use crate::merge;

/// Field holding the transaction a revision belongs to.
pub const PATCH_ID: &str = "patch_id";

/// One identifier of an entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Identifier {
    Uid(String),
    Name(String),
}

/// The closed identity of an entity and every revision contributing to it.
#[derive(Debug, Clone)]
pub struct Resolution<E> {
    /// Union of all identifiers reachable from the query.
    pub keys: EntityKeySet,
    /// Contributing revisions, in chronological order.
    pub revisions: Vec<Revision<E>>,
}

impl<E: GraphEntity> Resolution<E> {
    /// True if no revision matched.
    pub fn is_empty(&self) -> bool {
        self.revisions.is_empty()
    }

    /// Fold the revisions into the materialized entity.
    pub fn materialize(self) -> GraphResult<Option<E>> {
        merge::fold(self.revisions)
    }
}

/// Revision documents of one entity kind in one collection.
#[derive(Clone)]
pub struct RevisionStore<E> {
    store: Arc<dyn DocumentStore>,
    collection: String,
    insert_mode: InsertMode,
    _entity: PhantomData<fn() -> E>,
}

impl<E: GraphEntity> RevisionStore<E> {
    /// Open the store, creating its indexes if needed.
    pub fn new(
        store: Arc<dyn DocumentStore>,
        collection: impl Into<String>,
        insert_mode: InsertMode,
    ) -> GraphResult<Self> {
        let collection = collection.into();
        index::ensure_entity_indexes(store.as_ref(), &collection, E::KIND)?;
        store.ensure_index(&collection, PATCH_ID)?;
        Ok(Self {
            store,
            collection,
            insert_mode,
            _entity: PhantomData,
        })
    }

    /// Collection name.
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Append a revision.
    ///
    /// In consistency mode a UID already used by an entity of a different
    /// type is rejected with [`GraphError::DuplicateIdentity`]. UIDs are
    /// global, so such a revision would fuse two unrelated entities. Sharing
    /// identifiers with revisions of the same entity is the normal case and
    /// is always accepted.
    pub fn store(&self, revision: &Revision<E>) -> GraphResult<()> {
        revision.entity.validate()?;
        if self.insert_mode == InsertMode::Consistency {
            self.check_uid_ownership(revision.entity.keys())?;
        }
        self.store
            .insert(&self.collection, to_document(revision)?)
            .map(|_| ())
    }

    fn check_uid_ownership(&self, keys: &EntityKeySet) -> GraphResult<()> {
        let (Some(entity_type), false) = (keys.entity_type(), keys.uids().is_empty()) else {
            return Ok(());
        };
        let fields = KeyFields::under(KEYS);
        let clash = Filter::and(vec![
            index::any_uid(KEYS, keys.uids()),
            Filter::exists(fields.entity_type.clone()),
        ]);
        for doc in self.store.find(&self.collection, &clash)? {
            let other: Revision<E> = from_document(doc)?;
            let other_keys = other.entity.keys();
            if other_keys.entity_type().map_or(false, |t| t != entity_type) {
                let uid = keys
                    .uids()
                    .intersection(other_keys.uids())
                    .next()
                    .cloned()
                    .unwrap_or_default();
                return Err(GraphError::DuplicateIdentity {
                    collection: self.collection.clone(),
                    identifier: format!("uid:{uid}"),
                });
            }
        }
        Ok(())
    }

    /// Every revision of the entity owning `uid`.
    pub fn find_by_uid(&self, uid: &str) -> GraphResult<Vec<Revision<E>>> {
        Ok(self.resolve(&EntityKeySet::for_uid(uid))?.revisions)
    }

    /// Every revision of the entity named `name` within `entity_type`.
    pub fn find_by_name(&self, entity_type: &str, name: &str) -> GraphResult<Vec<Revision<E>>> {
        Ok(self.resolve(&EntityKeySet::for_name(entity_type, name))?.revisions)
    }

    /// The transitively closed key set of the entity `partial` refers to.
    ///
    /// With no matching revision the result is `partial` itself.
    pub fn populate_full_keyset(&self, partial: &EntityKeySet) -> GraphResult<EntityKeySet> {
        Ok(self.resolve(partial)?.keys)
    }

    /// Resolve `partial` to its full identity and all contributing revisions.
    ///
    /// UIDs are followed before names. Name matches are filtered by type
    /// here, after the by-name lookup.
    pub fn resolve(&self, partial: &EntityKeySet) -> GraphResult<Resolution<E>> {
        if partial.is_empty() {
            return Err(GraphError::invalid_key(
                "lookup needs at least one UID or name",
            ));
        }
        if !partial.names().is_empty() && partial.entity_type().is_none() {
            return Err(GraphError::invalid_key(format!(
                "names {:?} cannot be resolved without a type",
                partial.names()
            )));
        }

        let fields = KeyFields::under(KEYS);
        let mut entity_type = partial.entity_type().map(str::to_string);
        let mut seen: FxHashSet<Identifier> = FxHashSet::default();
        let mut queue: VecDeque<Identifier> = VecDeque::new();
        for uid in partial.uids() {
            enqueue(&mut seen, &mut queue, Identifier::Uid(uid.clone()));
        }
        for name in partial.names() {
            enqueue(&mut seen, &mut queue, Identifier::Name(name.clone()));
        }

        let mut found: FxHashMap<String, Revision<E>> = FxHashMap::default();
        while let Some(ident) = queue.pop_front() {
            let filter = match &ident {
                Identifier::Uid(uid) => Filter::eq(fields.uids.clone(), uid.as_str()),
                Identifier::Name(name) => Filter::eq(fields.names.clone(), name.as_str()),
            };
            for doc in self.store.find(&self.collection, &filter)? {
                let rev: Revision<E> = from_document(doc)?;
                if found.contains_key(&rev.id) {
                    continue;
                }
                let rev_type = rev.entity.keys().entity_type().map(str::to_string);
                if matches!(ident, Identifier::Name(_)) && rev_type != entity_type {
                    continue;
                }
                if let (Some(expected), Some(actual)) = (&entity_type, &rev_type) {
                    if expected != actual {
                        tracing::warn!(
                            collection = %self.collection,
                            revision = %rev.id,
                            expected = %expected,
                            actual = %actual,
                            "skipping revision sharing a UID with an entity of another type"
                        );
                        continue;
                    }
                }
                if entity_type.is_none() {
                    entity_type = rev_type;
                }
                for uid in rev.entity.keys().uids() {
                    enqueue(&mut seen, &mut queue, Identifier::Uid(uid.clone()));
                }
                for name in rev.entity.keys().names() {
                    enqueue(&mut seen, &mut queue, Identifier::Name(name.clone()));
                }
                found.insert(rev.id.clone(), rev);
            }
        }

        let mut keys = match &entity_type {
            Some(t) => EntityKeySet::create(t.clone()),
            None => EntityKeySet::new(),
        };
        for ident in seen {
            match ident {
                Identifier::Uid(uid) => keys.add_uid(uid),
                Identifier::Name(name) => keys.add_name(name),
            };
        }
        let mut revisions: Vec<Revision<E>> = found.into_values().collect();
        sort_chronologically(&mut revisions);
        tracing::trace!(
            collection = %self.collection,
            query = %partial,
            resolved = %keys,
            revisions = revisions.len(),
            "identity resolved"
        );
        Ok(Resolution { keys, revisions })
    }

    /// Resolve and merge the entity `partial` refers to.
    pub fn fetch(&self, partial: &EntityKeySet) -> GraphResult<Option<E>> {
        self.resolve(partial)?.materialize()
    }

    /// Delete every revision of the entity `keys` refers to. Returns the
    /// number of revisions removed.
    pub fn delete_entity(&self, keys: &EntityKeySet) -> GraphResult<u64> {
        let resolution = self.resolve(keys)?;
        if resolution.is_empty() {
            return Ok(0);
        }
        let ids: Vec<Value> = resolution
            .revisions
            .iter()
            .map(|r| Value::String(r.id.clone()))
            .collect();
        self.store
            .remove(&self.collection, &Filter::In(tangle_storage::ID_FIELD.to_string(), ids))
    }

    /// Remove every revision written by one transaction.
    pub fn remove_patch(&self, patch_id: &str) -> GraphResult<u64> {
        self.store
            .remove(&self.collection, &Filter::eq(PATCH_ID, patch_id))
    }

    /// Materialized entities owning at least one revision matching `filter`,
    /// each yielded once.
    pub fn entities(&self, filter: &Filter) -> GraphResult<EntityIter<E>> {
        Ok(EntityIter {
            revisions: self.clone(),
            cursor: self.store.find(&self.collection, filter)?,
            seen_uids: FxHashSet::default(),
            seen_names: FxHashSet::default(),
        })
    }

    /// Distinct entity types present.
    pub fn types(&self) -> GraphResult<Vec<String>> {
        let values = self.store.distinct(
            &self.collection,
            &KeyFields::under(KEYS).entity_type,
            &Filter::All,
        )?;
        Ok(values
            .into_iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect())
    }

    /// Number of revision documents matching `filter`.
    pub fn count_revisions(&self, filter: &Filter) -> GraphResult<u64> {
        self.store.count(&self.collection, filter)
    }
}

fn enqueue(seen: &mut FxHashSet<Identifier>, queue: &mut VecDeque<Identifier>, ident: Identifier) {
    if seen.insert(ident.clone()) {
        queue.push_back(ident);
    }
}

/// Streams materialized entities, resolving each identity cluster once.
///
/// The identifiers of every emitted entity are remembered so later revisions
/// of the same entity are skipped. Memory grows with the number of distinct
/// identifiers emitted.
pub struct EntityIter<E> {
    revisions: RevisionStore<E>,
    cursor: DocumentCursor,
    seen_uids: FxHashSet<String>,
    seen_names: FxHashSet<(Option<String>, String)>,
}

impl<E: GraphEntity> EntityIter<E> {
    fn already_emitted(&self, keys: &EntityKeySet) -> bool {
        keys.uids().iter().any(|u| self.seen_uids.contains(u))
            || keys.names().iter().any(|n| {
                self.seen_names
                    .contains(&(keys.entity_type().map(str::to_string), n.clone()))
            })
    }

    fn remember(&mut self, keys: &EntityKeySet) {
        let t = keys.entity_type().map(str::to_string);
        self.seen_uids.extend(keys.uids().iter().cloned());
        self.seen_names
            .extend(keys.names().iter().map(|n| (t.clone(), n.clone())));
    }
}

impl<E: GraphEntity> Iterator for EntityIter<E> {
    type Item = GraphResult<E>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let doc = self.cursor.next()?;
            let rev: Revision<E> = match from_document(doc) {
                Ok(rev) => rev,
                Err(e) => return Some(Err(e)),
            };
            if self.already_emitted(rev.entity.keys()) {
                continue;
            }
            let resolution = match self.revisions.resolve(rev.entity.keys()) {
                Ok(r) => r,
                Err(e) => return Some(Err(e)),
            };
            self.remember(&resolution.keys);
            match resolution.materialize() {
                Ok(Some(entity)) => return Some(Ok(entity)),
                Ok(None) => continue,
                Err(e) => return Some(Err(e)),
            }
        }
    }
}

//! Direct-write layout: one document per entity, merged on write.
//!
//! Faster to read than the revision layout, at the cost of history. A write
//! whose keys match several existing documents fuses them into the first
//! one and removes the rest.

use std::marker::PhantomData;
use std::sync::Arc;

use rustc_hash::FxHashSet;
use serde_json::Value;
use tangle_core::{EntityKeySet, GraphEntity, GraphResult, MergePolicy};
use tangle_storage::{document, DocumentStore, Filter, Update};

use crate::codec::{from_document, to_document};
use crate::index::{self, KEYS};
use crate::merge;

/// Entity documents of one kind in one collection.
#[derive(Clone)]
pub struct DirectStore<E> {
    store: Arc<dyn DocumentStore>,
    collection: String,
    _entity: PhantomData<fn() -> E>,
}

impl<E: GraphEntity> DirectStore<E> {
    /// Open the store, creating its indexes if needed.
    pub fn new(store: Arc<dyn DocumentStore>, collection: impl Into<String>) -> GraphResult<Self> {
        let collection = collection.into();
        index::ensure_entity_indexes(store.as_ref(), &collection, E::KIND)?;
        Ok(Self {
            store,
            collection,
            _entity: PhantomData,
        })
    }

    fn decode(doc: tangle_storage::Document) -> GraphResult<(String, E)> {
        let id = document::document_id(&doc).unwrap_or_default().to_string();
        Ok((id, from_document(doc)?))
    }

    /// Every stored entity sharing an identifier with `keys`.
    fn matching(&self, keys: &EntityKeySet) -> GraphResult<Vec<(String, E)>> {
        let mut seen = FxHashSet::default();
        let mut out = Vec::new();
        if !keys.uids().is_empty() {
            for doc in self.store.find(&self.collection, &index::any_uid(KEYS, keys.uids()))? {
                let (id, entity) = Self::decode(doc)?;
                if seen.insert(id.clone()) {
                    out.push((id, entity));
                }
            }
        }
        if let (false, Some(t)) = (keys.names().is_empty(), keys.entity_type()) {
            for doc in self.store.find(&self.collection, &index::any_name(KEYS, keys.names()))? {
                let (id, entity) = Self::decode(doc)?;
                if entity.keys().entity_type() == Some(t) && seen.insert(id.clone()) {
                    out.push((id, entity));
                }
            }
        }
        Ok(out)
    }

    /// The entity `keys` refers to, looked up by UID first, then by name.
    pub fn get(&self, keys: &EntityKeySet) -> GraphResult<Option<E>> {
        if !keys.uids().is_empty() {
            let found = self
                .store
                .find_one(&self.collection, &index::any_uid(KEYS, keys.uids()))?;
            if let Some(doc) = found {
                return from_document(doc).map(Some);
            }
        }
        if let (false, Some(t)) = (keys.names().is_empty(), keys.entity_type()) {
            for doc in self.store.find(&self.collection, &index::any_name(KEYS, keys.names()))? {
                let entity: E = from_document(doc)?;
                if entity.keys().entity_type() == Some(t) {
                    return Ok(Some(entity));
                }
            }
        }
        Ok(None)
    }

    /// Insert a new entity document.
    pub fn insert(&self, entity: &E) -> GraphResult<()> {
        entity.validate()?;
        self.store
            .insert(&self.collection, to_document(entity)?)
            .map(|_| ())
    }

    /// Merge `incoming` into whatever it matches, or insert it.
    pub fn apply(&self, policy: MergePolicy, incoming: &E) -> GraphResult<()> {
        incoming.validate()?;
        let mut matches = self.matching(incoming.keys())?.into_iter();
        let Some((primary_id, mut merged)) = matches.next() else {
            return self.insert(incoming);
        };
        // the whole merge must succeed before any document is touched
        let mut absorbed = Vec::new();
        for (id, other) in matches {
            merged = merge::merge(MergePolicy::AppendNewLeaveExisting, &merged, &other)?;
            absorbed.push(id);
        }
        merged = merge::merge(policy, &merged, incoming)?;
        let replacement = to_document(&merged)?;

        self.store.find_and_modify(
            &self.collection,
            &Filter::id(primary_id.clone()),
            &Update::Replace(replacement),
        )?;
        for id in absorbed {
            self.store.remove(&self.collection, &Filter::id(id.clone()))?;
            tracing::debug!(
                collection = %self.collection,
                kept = %primary_id,
                removed = %id,
                "fused entity documents joined by a new identifier"
            );
        }
        Ok(())
    }

    /// Remove documents matching any UID of `keys`, and documents matching
    /// any of its names under its type.
    pub fn delete(&self, keys: &EntityKeySet) -> GraphResult<u64> {
        let mut removed = 0;
        if !keys.uids().is_empty() {
            removed += self
                .store
                .remove(&self.collection, &index::any_uid(KEYS, keys.uids()))?;
        }
        if let (false, Some(t)) = (keys.names().is_empty(), keys.entity_type()) {
            let by_name = Filter::and(vec![
                index::any_name(KEYS, keys.names()),
                index::of_type(KEYS, t),
            ]);
            removed += self.store.remove(&self.collection, &by_name)?;
        }
        Ok(removed)
    }

    /// Set one content field in place; `null` removes it. Returns `false`
    /// if nothing matched.
    pub fn set_property(&self, keys: &EntityKeySet, field: &str, value: Value) -> GraphResult<bool> {
        let filter = index::addressed_by(KEYS, keys)?;
        let path = format!("content.{field}");
        let update = if value.is_null() {
            Update::Unset(path)
        } else {
            Update::Set(path, value)
        };
        let prior = self.store.find_and_modify(&self.collection, &filter, &update)?;
        Ok(prior.is_some())
    }

    /// Entities matching `filter`.
    pub fn entities(
        &self,
        filter: &Filter,
    ) -> GraphResult<impl Iterator<Item = GraphResult<E>> + Send + 'static> {
        Ok(self
            .store
            .find(&self.collection, filter)?
            .map(from_document::<E>))
    }

    /// Number of entities matching `filter`.
    pub fn count(&self, filter: &Filter) -> GraphResult<u64> {
        self.store.count(&self.collection, filter)
    }

    /// Distinct entity types present.
    pub fn types(&self) -> GraphResult<Vec<String>> {
        let field = index::KeyFields::under(KEYS).entity_type;
        Ok(self
            .store
            .distinct(&self.collection, &field, &Filter::All)?
            .into_iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect())
    }
}

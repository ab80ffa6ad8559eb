//! Embedded in-memory document store.
//!
//! # Design
//!
//! - DashMap of collections: different collections never contend
//! - One `RwLock` per collection guarding its documents and indexes together,
//!   so a document and its index postings always change as one unit
//! - FxHashMap postings: index key -> ordered set of document sequence numbers
//! - Documents keep insertion order through a monotonically increasing
//!   sequence number
//!
//! # Thread Safety
//!
//! Every trait method takes the collection lock once, so each call is atomic
//! for the documents it touches. Cursors only hold sequence numbers and
//! re-read each document on demand; a document removed after the query ran is
//! skipped.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::RwLock;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tangle_core::{GraphError, GraphResult};

use crate::document::{document_id, index_key, values_at, Document, ID_FIELD};
use crate::query::{Filter, QueryPlan, Update};
use crate::store::{DocumentCursor, DocumentStore};

/// Postings of one secondary index.
type Postings = FxHashMap<String, BTreeSet<u64>>;

/// Documents and indexes of a single collection.
#[derive(Debug, Default)]
struct Collection {
    docs: BTreeMap<u64, Document>,
    ids: FxHashMap<String, u64>,
    indexes: FxHashMap<String, Postings>,
    next_seq: u64,
}

impl Collection {
    fn ensure_index(&mut self, field: &str) -> bool {
        if self.indexes.contains_key(field) {
            return false;
        }
        let mut postings = Postings::default();
        for (seq, doc) in &self.docs {
            for key in index_keys(doc, field) {
                postings.entry(key).or_default().insert(*seq);
            }
        }
        self.indexes.insert(field.to_string(), postings);
        true
    }

    fn insert(&mut self, mut doc: Document) -> GraphResult<String> {
        let seq = self.next_seq;
        self.next_seq += 1;

        let id = match document_id(&doc) {
            Some(id) => id.to_string(),
            None => {
                let mut n = seq;
                let mut candidate = format!("doc-{n}");
                while self.ids.contains_key(&candidate) {
                    n += 1;
                    candidate = format!("doc-{n}");
                }
                doc.insert(ID_FIELD.to_string(), Value::String(candidate.clone()));
                candidate
            }
        };
        if self.ids.contains_key(&id) {
            return Err(GraphError::storage(format!("duplicate document id '{id}'")));
        }

        add_postings(&mut self.indexes, seq, &doc);
        self.ids.insert(id.clone(), seq);
        self.docs.insert(seq, doc);
        Ok(id)
    }

    fn remove_seq(&mut self, seq: u64) -> Option<Document> {
        let doc = self.docs.remove(&seq)?;
        remove_postings(&mut self.indexes, seq, &doc);
        if let Some(id) = document_id(&doc) {
            self.ids.remove(id);
        }
        Some(doc)
    }

    /// Apply `update` to one document, returning the prior version.
    fn modify(&mut self, seq: u64, update: &Update) -> Option<Document> {
        let mut doc = self.docs.remove(&seq)?;
        let prior = doc.clone();
        remove_postings(&mut self.indexes, seq, &doc);
        update.apply(&mut doc);
        add_postings(&mut self.indexes, seq, &doc);
        self.docs.insert(seq, doc);
        Some(prior)
    }

    /// Candidate sequence numbers from indexes, `None` if a full scan is
    /// required. Candidates are a superset of the matches.
    fn candidates(&self, filter: &Filter) -> Option<BTreeSet<u64>> {
        match filter {
            Filter::Eq(path, value) => self.lookup(path, std::slice::from_ref(value)),
            Filter::In(path, values) => self.lookup(path, values),
            Filter::Or(clauses) => {
                let mut all = BTreeSet::new();
                for clause in clauses {
                    all.extend(self.candidates(clause)?);
                }
                Some(all)
            }
            Filter::And(clauses) => {
                let mut result: Option<BTreeSet<u64>> = None;
                for set in clauses.iter().filter_map(|c| self.candidates(c)) {
                    result = Some(match result {
                        None => set,
                        Some(acc) => acc.intersection(&set).copied().collect(),
                    });
                }
                result
            }
            Filter::All | Filter::Exists(_) => None,
        }
    }

    fn lookup(&self, path: &str, values: &[Value]) -> Option<BTreeSet<u64>> {
        if path == ID_FIELD {
            return Some(
                values
                    .iter()
                    .filter_map(Value::as_str)
                    .filter_map(|id| self.ids.get(id).copied())
                    .collect(),
            );
        }
        let postings = self.indexes.get(path)?;
        let mut out = BTreeSet::new();
        for value in values {
            if let Some(seqs) = postings.get(&index_key(value)) {
                out.extend(seqs.iter().copied());
            }
        }
        Some(out)
    }

    fn plan(&self, filter: &Filter) -> QueryPlan {
        let indexed = |path: &str| path == ID_FIELD || self.indexes.contains_key(path);
        match filter {
            Filter::Eq(path, _) if indexed(path) => QueryPlan::IndexScan {
                field: path.clone(),
            },
            Filter::In(path, values) if indexed(path) => {
                if values.is_empty() {
                    QueryPlan::Empty
                } else {
                    QueryPlan::IndexScan {
                        field: path.clone(),
                    }
                }
            }
            Filter::Or(clauses) => {
                if clauses.is_empty() {
                    return QueryPlan::Empty;
                }
                let plans: Vec<QueryPlan> = clauses.iter().map(|c| self.plan(c)).collect();
                if plans.iter().all(QueryPlan::uses_index) {
                    QueryPlan::Union(plans)
                } else {
                    QueryPlan::FullScan
                }
            }
            Filter::And(clauses) => {
                let plans: Vec<QueryPlan> = clauses
                    .iter()
                    .map(|c| self.plan(c))
                    .filter(QueryPlan::uses_index)
                    .collect();
                match plans.len() {
                    0 => QueryPlan::FullScan,
                    1 => plans.into_iter().next().unwrap_or(QueryPlan::FullScan),
                    _ => QueryPlan::Intersect(plans),
                }
            }
            _ => QueryPlan::FullScan,
        }
    }

    fn matching(&self, filter: &Filter) -> Vec<u64> {
        match self.candidates(filter) {
            Some(seqs) => seqs
                .into_iter()
                .filter(|seq| self.docs.get(seq).map_or(false, |d| filter.matches(d)))
                .collect(),
            None => {
                tracing::trace!(?filter, docs = self.docs.len(), "full collection scan");
                self.docs
                    .iter()
                    .filter(|(_, d)| filter.matches(d))
                    .map(|(seq, _)| *seq)
                    .collect()
            }
        }
    }
}

fn index_keys(doc: &Document, field: &str) -> FxHashSet<String> {
    values_at(doc, field)
        .into_iter()
        .filter(|v| !v.is_null())
        .map(index_key)
        .collect()
}

fn add_postings(indexes: &mut FxHashMap<String, Postings>, seq: u64, doc: &Document) {
    for (field, postings) in indexes.iter_mut() {
        for key in index_keys(doc, field) {
            postings.entry(key).or_default().insert(seq);
        }
    }
}

fn remove_postings(indexes: &mut FxHashMap<String, Postings>, seq: u64, doc: &Document) {
    for (field, postings) in indexes.iter_mut() {
        for key in index_keys(doc, field) {
            if let Some(seqs) = postings.get_mut(&key) {
                seqs.remove(&seq);
                if seqs.is_empty() {
                    postings.remove(&key);
                }
            }
        }
    }
}

type SharedCollection = Arc<RwLock<Collection>>;

/// Cursor over a fixed list of sequence numbers.
struct SeqCursor {
    collection: SharedCollection,
    seqs: std::vec::IntoIter<u64>,
}

impl Iterator for SeqCursor {
    type Item = Document;

    fn next(&mut self) -> Option<Document> {
        loop {
            let seq = self.seqs.next()?;
            if let Some(doc) = self.collection.read().docs.get(&seq).cloned() {
                return Some(doc);
            }
        }
    }
}

/// On-disk form written by [`MemoryDocumentStore::save_snapshot`].
#[derive(Debug, Serialize, Deserialize)]
struct SnapshotFile {
    collections: BTreeMap<String, CollectionSnapshot>,
}

#[derive(Debug, Serialize, Deserialize)]
struct CollectionSnapshot {
    indexes: Vec<String>,
    documents: Vec<Document>,
}

/// In-memory [`DocumentStore`] with secondary indexes.
///
/// # Example
///
/// ```ignore
/// use tangle_storage::{DocumentStore, Filter, MemoryDocumentStore};
///
/// let store = MemoryDocumentStore::new();
/// store.ensure_index("nodes", "keys.uids")?;
/// let hits = store.find("nodes", &Filter::eq("keys.uids", "g1"))?;
/// ```
#[derive(Debug, Default)]
pub struct MemoryDocumentStore {
    collections: DashMap<String, SharedCollection>,
}

impl MemoryDocumentStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn collection(&self, name: &str) -> Option<SharedCollection> {
        self.collections.get(name).map(|c| Arc::clone(c.value()))
    }

    fn collection_or_create(&self, name: &str) -> SharedCollection {
        Arc::clone(self.collections.entry(name.to_string()).or_default().value())
    }

    /// Number of documents in a collection.
    pub fn len(&self, collection: &str) -> usize {
        self.collection(collection)
            .map(|c| c.read().docs.len())
            .unwrap_or(0)
    }

    /// Total number of documents across all collections.
    pub fn total_documents(&self) -> usize {
        self.collections
            .iter()
            .map(|entry| entry.value().read().docs.len())
            .sum()
    }

    /// Write every collection, with its index definitions, to `path` as JSON.
    ///
    /// The file is written next to `path` first and renamed into place.
    pub fn save_snapshot(&self, path: impl AsRef<Path>) -> GraphResult<()> {
        let path = path.as_ref();
        let mut collections = BTreeMap::new();
        for entry in self.collections.iter() {
            let coll = entry.value().read();
            let mut indexes: Vec<String> = coll.indexes.keys().cloned().collect();
            indexes.sort();
            collections.insert(
                entry.key().clone(),
                CollectionSnapshot {
                    indexes,
                    documents: coll.docs.values().cloned().collect(),
                },
            );
        }
        let bytes = serde_json::to_vec(&SnapshotFile { collections })?;
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, bytes)?;
        fs::rename(&tmp, path)?;
        tracing::debug!(path = %path.display(), "document store snapshot written");
        Ok(())
    }

    /// Load a store previously written by [`save_snapshot`](Self::save_snapshot).
    pub fn open_snapshot(path: impl AsRef<Path>) -> GraphResult<Self> {
        let bytes = fs::read(path.as_ref())?;
        let file: SnapshotFile = serde_json::from_slice(&bytes)?;
        let store = Self::new();
        for (name, snapshot) in file.collections {
            let shared = store.collection_or_create(&name);
            let mut coll = shared.write();
            for field in &snapshot.indexes {
                coll.ensure_index(field);
            }
            for doc in snapshot.documents {
                coll.insert(doc)?;
            }
        }
        Ok(store)
    }
}

impl DocumentStore for MemoryDocumentStore {
    fn ensure_index(&self, collection: &str, field: &str) -> GraphResult<bool> {
        let created = self.collection_or_create(collection).write().ensure_index(field);
        if created {
            tracing::debug!(collection, field, "index created");
        }
        Ok(created)
    }

    fn indexes(&self, collection: &str) -> Vec<String> {
        let mut fields: Vec<String> = self
            .collection(collection)
            .map(|c| c.read().indexes.keys().cloned().collect())
            .unwrap_or_default();
        fields.sort();
        fields
    }

    fn insert(&self, collection: &str, doc: Document) -> GraphResult<String> {
        self.collection_or_create(collection).write().insert(doc)
    }

    fn find(&self, collection: &str, filter: &Filter) -> GraphResult<DocumentCursor> {
        let Some(shared) = self.collection(collection) else {
            return Ok(DocumentCursor::empty());
        };
        let seqs = shared.read().matching(filter);
        Ok(DocumentCursor::new(SeqCursor {
            collection: shared,
            seqs: seqs.into_iter(),
        }))
    }

    fn count(&self, collection: &str, filter: &Filter) -> GraphResult<u64> {
        Ok(self
            .collection(collection)
            .map(|c| c.read().matching(filter).len() as u64)
            .unwrap_or(0))
    }

    fn distinct(&self, collection: &str, field: &str, filter: &Filter) -> GraphResult<Vec<Value>> {
        let Some(shared) = self.collection(collection) else {
            return Ok(Vec::new());
        };
        let coll = shared.read();
        let mut seen = FxHashSet::default();
        let mut out = Vec::new();
        for seq in coll.matching(filter) {
            if let Some(doc) = coll.docs.get(&seq) {
                for v in values_at(doc, field) {
                    if !v.is_null() && seen.insert(index_key(v)) {
                        out.push(v.clone());
                    }
                }
            }
        }
        Ok(out)
    }

    fn find_and_modify(
        &self,
        collection: &str,
        filter: &Filter,
        update: &Update,
    ) -> GraphResult<Option<Document>> {
        let Some(shared) = self.collection(collection) else {
            return Ok(None);
        };
        let mut coll = shared.write();
        let first = coll.matching(filter).into_iter().next();
        Ok(first.and_then(|seq| coll.modify(seq, update)))
    }

    fn update_many(&self, collection: &str, filter: &Filter, update: &Update) -> GraphResult<u64> {
        let Some(shared) = self.collection(collection) else {
            return Ok(0);
        };
        let mut coll = shared.write();
        let mut n = 0;
        for seq in coll.matching(filter) {
            if coll.modify(seq, update).is_some() {
                n += 1;
            }
        }
        Ok(n)
    }

    fn remove(&self, collection: &str, filter: &Filter) -> GraphResult<u64> {
        let Some(shared) = self.collection(collection) else {
            return Ok(0);
        };
        let mut coll = shared.write();
        let mut n = 0;
        for seq in coll.matching(filter) {
            if coll.remove_seq(seq).is_some() {
                n += 1;
            }
        }
        Ok(n)
    }

    fn drop_collection(&self, collection: &str) -> GraphResult<bool> {
        Ok(self.collections.remove(collection).is_some())
    }

    fn collections(&self) -> Vec<String> {
        let mut names: Vec<String> = self.collections.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    fn explain(&self, collection: &str, filter: &Filter) -> QueryPlan {
        self.collection(collection)
            .map(|c| c.read().plan(filter))
            .unwrap_or(QueryPlan::Empty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn doc(v: Value) -> Document {
        v.as_object().cloned().unwrap()
    }

    fn setup() -> MemoryDocumentStore {
        let store = MemoryDocumentStore::new();
        store.ensure_index("nodes", "keys.uids").unwrap();
        store.ensure_index("nodes", "keys.names").unwrap();
        store
            .insert("nodes", doc(json!({"keys": {"type": "Gene", "uids": ["g1"], "names": ["BRCA1"]}})))
            .unwrap();
        store
            .insert("nodes", doc(json!({"keys": {"type": "Gene", "uids": ["g2"], "names": ["TP53"]}})))
            .unwrap();
        store
            .insert("nodes", doc(json!({"keys": {"type": "Protein", "names": ["BRCA1"]}})))
            .unwrap();
        store
    }

    #[test]
    fn ensure_index_is_idempotent() {
        let store = setup();
        assert!(!store.ensure_index("nodes", "keys.uids").unwrap());
        assert!(store.ensure_index("nodes", "keys.type").unwrap());
        assert_eq!(store.indexes("nodes"), vec!["keys.names", "keys.type", "keys.uids"]);
    }

    #[test]
    fn insert_generates_and_rejects_duplicate_ids() {
        let store = MemoryDocumentStore::new();
        let id = store.insert("c", doc(json!({"a": 1}))).unwrap();
        assert!(!id.is_empty());
        store.insert("c", doc(json!({"_id": "x"}))).unwrap();
        assert!(store.insert("c", doc(json!({"_id": "x"}))).is_err());
        assert_eq!(store.len("c"), 2);
    }

    #[test]
    fn indexed_lookup_matches_scan() {
        let store = setup();
        let by_name: Vec<_> = store
            .find("nodes", &Filter::eq("keys.names", "BRCA1"))
            .unwrap()
            .collect();
        assert_eq!(by_name.len(), 2);
        let typed = Filter::and(vec![
            Filter::eq("keys.names", "BRCA1"),
            Filter::eq("keys.type", "Gene"),
        ]);
        assert_eq!(store.count("nodes", &typed).unwrap(), 1);
        assert_eq!(
            store.explain("nodes", &typed),
            QueryPlan::IndexScan {
                field: "keys.names".into()
            }
        );
    }

    #[test]
    fn or_uses_union_only_when_every_branch_is_indexed() {
        let store = setup();
        let indexed = Filter::or(vec![
            Filter::eq("keys.uids", "g1"),
            Filter::eq("keys.names", "TP53"),
        ]);
        assert!(matches!(store.explain("nodes", &indexed), QueryPlan::Union(_)));
        assert_eq!(store.count("nodes", &indexed).unwrap(), 2);

        let mixed = Filter::or(vec![
            Filter::eq("keys.uids", "g1"),
            Filter::eq("keys.type", "Protein"),
        ]);
        assert_eq!(store.explain("nodes", &mixed), QueryPlan::FullScan);
        assert_eq!(store.count("nodes", &mixed).unwrap(), 2);
    }

    #[test]
    fn find_and_modify_reindexes() {
        let store = setup();
        let prior = store
            .find_and_modify(
                "nodes",
                &Filter::eq("keys.uids", "g2"),
                &Update::set("keys.uids", json!(["g2", "g2-alt"])),
            )
            .unwrap()
            .unwrap();
        assert_eq!(prior["keys"]["uids"], json!(["g2"]));
        assert_eq!(store.count("nodes", &Filter::eq("keys.uids", "g2-alt")).unwrap(), 1);

        let missing = store
            .find_and_modify("nodes", &Filter::eq("keys.uids", "nope"), &Update::set("a", 1))
            .unwrap();
        assert!(missing.is_none());
    }

    #[test]
    fn remove_and_distinct() {
        let store = setup();
        let types = store.distinct("nodes", "keys.type", &Filter::All).unwrap();
        assert_eq!(types, vec![json!("Gene"), json!("Protein")]);
        assert_eq!(store.remove("nodes", &Filter::eq("keys.type", "Gene")).unwrap(), 2);
        assert_eq!(store.count("nodes", &Filter::eq("keys.uids", "g1")).unwrap(), 0);
        assert_eq!(store.len("nodes"), 1);
    }

    #[test]
    fn cursor_skips_documents_removed_after_query() {
        let store = setup();
        let mut cursor = store.find("nodes", &Filter::All).unwrap();
        store.remove("nodes", &Filter::eq("keys.uids", "g2")).unwrap();
        let first = cursor.next().unwrap();
        assert_eq!(first["keys"]["uids"], json!(["g1"]));
        assert_eq!(cursor.count(), 1);
    }

    #[test]
    fn snapshot_round_trip_keeps_indexes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        let store = setup();
        store.save_snapshot(&path).unwrap();

        let reopened = MemoryDocumentStore::open_snapshot(&path).unwrap();
        assert_eq!(reopened.total_documents(), 3);
        assert_eq!(reopened.indexes("nodes"), vec!["keys.names", "keys.uids"]);
        assert!(reopened
            .explain("nodes", &Filter::eq("keys.uids", "g1"))
            .uses_index());
        assert_eq!(reopened.count("nodes", &Filter::eq("keys.uids", "g1")).unwrap(), 1);
    }

    #[test]
    fn missing_collection_reads_are_empty() {
        let store = MemoryDocumentStore::new();
        assert_eq!(store.count("none", &Filter::All).unwrap(), 0);
        assert!(store.find_one("none", &Filter::All).unwrap().is_none());
        assert!(!store.drop_collection("none").unwrap());
        assert!(store.collections().is_empty());
    }

    proptest! {
        #[test]
        fn index_plans_agree_with_full_scans(
            docs in proptest::collection::vec(
                (proptest::collection::vec("[a-d]", 0..3), "[a-c]"),
                0..12,
            ),
            uid in "[a-d]",
            name in "[a-c]",
        ) {
            let indexed = MemoryDocumentStore::new();
            indexed.ensure_index("c", "uids").unwrap();
            indexed.ensure_index("c", "name").unwrap();
            let plain = MemoryDocumentStore::new();
            for (uids, n) in &docs {
                let d = doc(json!({"uids": uids, "name": n}));
                indexed.insert("c", d.clone()).unwrap();
                plain.insert("c", d).unwrap();
            }
            let filters = [
                Filter::eq("uids", uid.as_str()),
                Filter::or(vec![Filter::eq("uids", uid.as_str()), Filter::eq("name", name.as_str())]),
                Filter::and(vec![Filter::eq("uids", uid.as_str()), Filter::eq("name", name.as_str())]),
            ];
            for f in &filters {
                prop_assert!(indexed.explain("c", f).uses_index());
                prop_assert_eq!(indexed.count("c", f).unwrap(), plain.count("c", f).unwrap());
            }
        }
    }
}

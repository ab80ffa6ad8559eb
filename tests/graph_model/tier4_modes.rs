//! Tier 4: storage modes, insert modes and persistence.

use std::sync::Arc;

use serde_json::json;
use tangledb::{
    DocumentStore, EntityKeySet, GraphConfig, GraphConnection, InsertMode, MemoryDocumentStore,
    MergePolicy, Node, StorageMode,
};

use crate::test_utils::*;

#[test]
fn both_layouts_materialize_the_same_entity() {
    let mut results = Vec::new();
    for mode in [StorageMode::Revisions, StorageMode::DirectWrite] {
        let graph = graph(GraphConfig::new().storage_mode(mode));
        graph.submit(vec![put_node(named("Gene", "BRCA1").with_field("a", 1))]).unwrap();
        graph
            .submit(vec![tangledb::GraphOperation::node(
                MergePolicy::AppendNewLeaveExisting,
                Node::new(EntityKeySet::for_name("Gene", "BRCA1").with_uid("g1"))
                    .with_field("a", 2)
                    .with_field("b", 2),
            )])
            .unwrap();
        let node = graph.nodes().get_by_uid("g1").unwrap().into_entity().unwrap();
        results.push((json!(node.content), node.keys));
    }
    assert_eq!(results[0], results[1]);
    assert_eq!(results[0].0, json!({"a": 1, "b": 2}));
}

#[test]
fn direct_write_keeps_one_document_per_entity() {
    let mem = Arc::new(MemoryDocumentStore::new());
    let store: Arc<dyn DocumentStore> = mem.clone();
    let graph =
        GraphConnection::with_store(store, "g", GraphConfig::new().storage_mode(StorageMode::DirectWrite))
            .unwrap();
    for i in 0..5 {
        graph.submit(vec![put_node(named("Gene", "BRCA1").with_field("v", i))]).unwrap();
    }
    assert_eq!(mem.len("nodes"), 1);
    let node = graph.nodes().get_by_name("Gene", "BRCA1").unwrap().into_entity().unwrap();
    assert_eq!(node.content["v"], 4);
}

#[test]
fn performance_mode_skips_collision_checks() {
    let graph = graph(GraphConfig::new().insert_mode(InsertMode::Performance));
    graph.nodes().store(named("Gene", "BRCA1")).unwrap();
    graph.nodes().store(named("Gene", "BRCA1")).unwrap();
    assert_eq!(graph.nodes().count().unwrap(), 1);
}

#[test]
fn prefixed_graphs_share_a_store() {
    let store: Arc<dyn DocumentStore> = Arc::new(MemoryDocumentStore::new());
    let a = GraphConnection::with_store(store.clone(), "a", GraphConfig::new().collection_prefix("a_")).unwrap();
    let b = GraphConnection::with_store(store.clone(), "b", GraphConfig::new().collection_prefix("b_")).unwrap();
    a.submit(vec![put_node(named("Gene", "X"))]).unwrap();
    assert!(b.nodes().get_by_name("Gene", "X").unwrap().is_virtual());
    let mut collections = store.collections();
    collections.sort();
    assert!(collections.contains(&"a_nodes".to_string()));
    assert!(collections.contains(&"b_revisions".to_string()));
}

#[test]
fn snapshot_and_config_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let snapshot = dir.path().join("graph.json");
    let config_path = dir.path().join(tangledb::engine::config::CONFIG_FILE);

    let config = GraphConfig::new().collection_prefix("kg_");
    config.save(&config_path).unwrap();

    let mem = Arc::new(MemoryDocumentStore::new());
    let graph = GraphConnection::with_store(mem.clone(), "g", config.clone()).unwrap();
    graph
        .submit(vec![put_node(Node::new(EntityKeySet::for_name("Gene", "BRCA1").with_uid("g1")))])
        .unwrap();
    mem.save_snapshot(&snapshot).unwrap();
    drop(graph);

    let reopened = Arc::new(MemoryDocumentStore::open_snapshot(&snapshot).unwrap());
    let loaded = GraphConfig::load(&config_path).unwrap();
    assert_eq!(loaded, config);
    let graph = GraphConnection::with_store(reopened, "g", loaded).unwrap();
    let node = graph.nodes().get_by_name("Gene", "BRCA1").unwrap().into_entity().unwrap();
    assert!(node.keys.uids().contains("g1"));
    assert!(graph.revision_log().transaction("missing").unwrap().is_none());
}

//! Tier 2: repository reads and writes.

use serde_json::json;
use tangledb::{EntityKeySet, GraphError, Node, NodeRepository};

use crate::test_utils::*;

fn populate(nodes: &NodeRepository) {
    for (t, n) in [("Gene", "BRCA1"), ("Gene", "TP53"), ("Gene", "EGFR"), ("Protein", "P53")] {
        nodes.store(named(t, n)).unwrap();
    }
}

#[test]
fn store_rejects_colliding_keys_in_consistency_mode() {
    let graph = default_graph();
    graph.nodes().store(named("Gene", "BRCA1")).unwrap();
    let err = graph
        .nodes()
        .store(Node::new(EntityKeySet::for_name("Gene", "BRCA1").with_uid("g1")))
        .unwrap_err();
    assert!(err.is_identity_collision());
    // the revision log merges instead
    graph
        .submit(vec![put_node(Node::new(
            EntityKeySet::for_name("Gene", "BRCA1").with_uid("g1"),
        ))])
        .unwrap();
    assert!(graph.nodes().get_by_uid("g1").unwrap().is_materialized());
}

#[test]
fn iterate_and_count_by_type() {
    let graph = default_graph();
    populate(graph.nodes());
    assert_eq!(graph.nodes().count_by_type("Gene").unwrap(), 3);
    assert_eq!(graph.nodes().count_by_type("Drug").unwrap(), 0);
    assert_eq!(graph.nodes().list_types().unwrap(), vec!["Gene", "Protein"]);

    let mut names: Vec<String> = graph
        .nodes()
        .iterate_by_type("Gene")
        .unwrap()
        .map(|n| n.unwrap().keys.names().iter().next().cloned().unwrap())
        .collect();
    names.sort();
    assert_eq!(names, vec!["BRCA1", "EGFR", "TP53"]);
    assert_eq!(graph.nodes().iterate_all().unwrap().count(), 4);
}

#[test]
fn paging_keys_by_type() {
    let graph = default_graph();
    populate(graph.nodes());
    let first = graph.nodes().iterate_keys_by_type("Gene", 0, 2).unwrap();
    let rest = graph.nodes().iterate_keys_by_type("Gene", 2, 2).unwrap();
    assert_eq!(first.len(), 2);
    assert_eq!(rest.len(), 1);
    assert!(first.iter().all(|k| !k.same_entity_as(&rest[0], false)));
}

#[test]
fn delete_by_uid_or_typed_name() {
    let graph = default_graph();
    graph
        .submit(vec![
            put_node(Node::new(EntityKeySet::for_name("Gene", "BRCA1").with_uid("g1"))),
            put_node(named("Gene", "TP53")),
        ])
        .unwrap();
    assert!(graph.nodes().delete(&EntityKeySet::for_uid("g1")).unwrap() > 0);
    assert!(graph.nodes().get_by_name("Gene", "BRCA1").unwrap().is_virtual());
    assert!(graph.nodes().delete(&EntityKeySet::for_name("Gene", "TP53")).unwrap() > 0);
    assert_eq!(graph.nodes().count().unwrap(), 0);

    let err = graph.nodes().delete(&EntityKeySet::new()).unwrap_err();
    assert!(matches!(err, GraphError::InvalidKey { .. }));
}

#[test]
fn set_property_adds_a_revision() {
    let graph = default_graph();
    graph.nodes().store(named("Gene", "BRCA1").with_field("chr", "17")).unwrap();
    let keys = EntityKeySet::for_name("Gene", "BRCA1");
    graph.nodes().set_property(&keys, "chr", json!("17q21")).unwrap();
    let node = graph.nodes().get_by_key(&keys).unwrap().into_entity().unwrap();
    assert_eq!(node.content["chr"], "17q21");
    assert!(graph
        .nodes()
        .set_property(&EntityKeySet::for_uid("nope"), "chr", json!(1))
        .is_err());
}

//! Tier 1: identity resolution through the public API.

use proptest::prelude::*;
use tangledb::{EntityKeySet, GraphError, Node};

use crate::test_utils::*;

fn gene_uids(uids: &[&str]) -> Node {
    let mut keys = EntityKeySet::create("Gene");
    keys.add_uids(uids.iter().copied());
    Node::new(keys)
}

#[test]
fn chain_closes_from_any_member() {
    let graph = default_graph();
    graph
        .submit(vec![
            put_node(gene_uids(&["u1"])),
            put_node(gene_uids(&["u1", "u2"])),
            put_node(gene_uids(&["u2", "u3"])),
        ])
        .unwrap();

    for start in ["u1", "u2", "u3"] {
        let keys = graph
            .nodes()
            .populate_full_keyset(&EntityKeySet::for_uid(start))
            .unwrap();
        assert_eq!(keys.uids().len(), 3, "from {start}");
    }
    assert_eq!(graph.nodes().count().unwrap(), 1);
}

#[test]
fn chain_across_transactions_joins_clusters() {
    let graph = default_graph();
    graph.submit(vec![put_node(gene_uids(&["a"]).with_field("x", 1))]).unwrap();
    graph.submit(vec![put_node(gene_uids(&["b"]).with_field("y", 2))]).unwrap();
    assert_eq!(graph.nodes().count().unwrap(), 2);

    // a later revision naming both UIDs fuses the two entities
    graph.submit(vec![put_node(gene_uids(&["a", "b"]))]).unwrap();
    assert_eq!(graph.nodes().count().unwrap(), 1);
    let node = graph.nodes().get_by_uid("b").unwrap().into_entity().unwrap();
    assert_eq!(node.content["x"], 1);
    assert_eq!(node.content["y"], 2);
}

#[test]
fn name_and_uid_spellings_merge() {
    let graph = default_graph();
    graph
        .submit(vec![
            put_node(named("Gene", "BRCA1")),
            put_node(Node::new(EntityKeySet::for_name("Gene", "BRCA1").with_uid("g1"))),
        ])
        .unwrap();
    let node = graph.nodes().get_by_uid("g1").unwrap().into_entity().unwrap();
    assert!(node.keys.uids().contains("g1"));
    assert!(node.keys.names().contains("BRCA1"));
}

#[test]
fn missing_entity_is_virtual_not_an_error() {
    let graph = default_graph();
    graph.submit(vec![put_node(named("Gene", "BRCA1"))]).unwrap();
    assert!(graph.nodes().get_by_name("Gene", "BRCA1").unwrap().is_materialized());
    let missing = graph.nodes().get_by_name("Gene", "NOTEXIST").unwrap();
    assert!(missing.is_virtual());
    assert_eq!(missing.keys(), &EntityKeySet::for_name("Gene", "NOTEXIST"));
}

#[test]
fn lookups_need_a_usable_identifier() {
    let graph = default_graph();
    let err = graph.nodes().get_by_key(&EntityKeySet::new()).unwrap_err();
    assert!(matches!(err, GraphError::InvalidKey { .. }));
    let err = graph
        .nodes()
        .get_by_key(&EntityKeySet::new().with_name("BRCA1"))
        .unwrap_err();
    assert!(matches!(err, GraphError::InvalidKey { .. }));
}

#[test]
fn import_identity_rejects_other_types() {
    let mut gene = EntityKeySet::for_name("Gene", "BRCA1");
    let err = gene
        .import_identity(&EntityKeySet::for_name("Protein", "BRCA1"))
        .unwrap_err();
    assert!(matches!(err, GraphError::IdentityMismatch { .. }));
    assert_eq!(gene.names().len(), 1);
}

fn ident() -> impl Strategy<Value = String> {
    "[a-e]"
}

proptest! {
    #[test]
    fn shared_identifier_means_same_entity(
        shared in ident(),
        a in proptest::collection::btree_set(ident(), 0..3),
        b in proptest::collection::btree_set(ident(), 0..3),
        by_uid in any::<bool>(),
    ) {
        let mut x = EntityKeySet::create("T");
        let mut y = EntityKeySet::create("T");
        if by_uid {
            x.add_uid(shared.clone());
            y.add_uid(shared);
        } else {
            x.add_name(shared.clone());
            y.add_name(shared);
        }
        x.add_uids(a);
        y.add_names(b);
        prop_assert!(x.same_entity_as(&y, false));
        prop_assert!(y.same_entity_as(&x, false));
    }

    #[test]
    fn disjoint_identifiers_mean_different_entities(
        a in proptest::collection::btree_set("[a-c]", 1..3),
        b in proptest::collection::btree_set("[x-z]", 1..3),
    ) {
        let mut x = EntityKeySet::create("T");
        x.add_uids(a.iter().cloned());
        x.add_names(a);
        let mut y = EntityKeySet::create("T");
        y.add_uids(b.iter().cloned());
        y.add_names(b);
        prop_assert!(!x.same_entity_as(&y, false));
        prop_assert!(!x.same_entity_as(&y, true));
    }
}

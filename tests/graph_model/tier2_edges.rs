//! Tier 2: edge addressing.

use tangledb::{Edge, EntityKeySet, GraphConnection, Node};

use crate::test_utils::*;

fn uid(u: &str) -> EntityKeySet {
    EntityKeySet::for_uid(u)
}

fn name(t: &str, n: &str) -> EntityKeySet {
    EntityKeySet::for_name(t, n)
}

/// One edge per addressing combination between the same two nodes.
fn four_ways(graph: &GraphConnection) {
    graph
        .submit(vec![
            put_node(Node::new(name("Protein", "a").with_uid("a1"))),
            put_node(Node::new(name("T", "b").with_uid("b1"))),
            put_edge("rel", "uu", uid("a1"), uid("b1")),
            put_edge("rel", "un", uid("a1"), name("T", "b")),
            put_edge("rel", "nu", name("Protein", "a"), uid("b1")),
            put_edge("rel", "nn", name("Protein", "a"), name("T", "b")),
        ])
        .unwrap();
}

#[test]
fn uid_to_name_query_matches_stored_addressing() {
    let graph = default_graph();
    graph
        .submit(vec![put_edge("rel", "e1", uid("a"), name("T", "b"))])
        .unwrap();
    let edges: Vec<Edge> = graph
        .edges()
        .iterate_edges_between_nodes(&uid("a"), &name("T", "b"))
        .unwrap()
        .map(Result::unwrap)
        .collect();
    assert_eq!(edges.len(), 1);
    assert!(edges[0].to.names().contains("b"));
}

#[test]
fn full_identity_finds_every_addressing_combination() {
    let graph = default_graph();
    four_ways(&graph);
    let from = name("Protein", "a").with_uid("a1");
    let to = name("T", "b").with_uid("b1");
    assert_eq!(graph.edges().iterate_edges_between_nodes(&from, &to).unwrap().count(), 4);
    // a partial identity only sees the edges written against it
    assert_eq!(graph.edges().iterate_edges_between_nodes(&uid("a1"), &uid("b1")).unwrap().count(), 1);
    // the connection expands partial identities through the nodes
    assert_eq!(graph.edges_between(&uid("a1"), &uid("b1")).unwrap().count(), 4);
    assert_eq!(graph.edges_from(&name("Protein", "a")).unwrap().count(), 4);
    assert_eq!(graph.edges_to(&uid("b1")).unwrap().count(), 4);
}

#[test]
fn typed_counts_and_histograms() {
    let graph = default_graph();
    graph
        .submit(vec![
            put_edge("binds", "e1", uid("p"), uid("g1")),
            put_edge("binds", "e2", uid("p"), uid("g2")),
            put_edge("inhibits", "e3", uid("p"), name("Gene", "g3")),
        ])
        .unwrap();
    let p = uid("p");
    assert_eq!(graph.edges().count_edges_from_node(&p).unwrap(), 3);
    assert_eq!(graph.edges().count_edges_of_type_from_node("binds", &p).unwrap(), 2);
    let histogram = graph.edges().count_edges_by_type_from_node(&p).unwrap();
    assert_eq!(histogram.into_iter().collect::<Vec<_>>(), vec![
        ("binds".to_string(), 2),
        ("inhibits".to_string(), 1),
    ]);
    assert!(graph.edges().exists_edge_to_node_of_type(&p, "Gene").unwrap());
    assert_eq!(graph.edges().count_edges_to_node(&uid("g2")).unwrap(), 1);
}

#[test]
fn edge_revisions_merge_endpoints() {
    let graph = default_graph();
    graph.submit(vec![put_edge("binds", "e1", uid("p1"), uid("g1"))]).unwrap();
    graph
        .submit(vec![put_edge("binds", "e1", name("Protein", "P53"), name("Gene", "BRCA1"))])
        .unwrap();
    let edge = graph.edges().get_by_uid("e1").unwrap().into_entity().unwrap();
    assert!(edge.from.uids().contains("p1") && edge.from.names().contains("P53"));
    assert!(edge.to.uids().contains("g1") && edge.to.names().contains("BRCA1"));
    assert_eq!(graph.edges().count().unwrap(), 1);
}

//! Tier 1: merge policies applied through committed revisions.

use serde_json::json;
use tangledb::{GraphError, GraphOperation, MergePolicy};

use crate::test_utils::*;

fn submit_with(graph: &tangledb::GraphConnection, policy: MergePolicy, fields: serde_json::Value) {
    let mut node = named("Gene", "X");
    node.content = fields.as_object().cloned().unwrap();
    graph.submit(vec![GraphOperation::node(policy, node)]).unwrap();
}

fn content(graph: &tangledb::GraphConnection) -> serde_json::Value {
    let node = graph.nodes().get_by_name("Gene", "X").unwrap().into_entity().unwrap();
    json!(node.content)
}

#[test]
fn later_transactions_apply_their_own_policy() {
    let graph = default_graph();
    submit_with(&graph, MergePolicy::default(), json!({"a": 1, "b": 1}));
    submit_with(&graph, MergePolicy::AppendNewLeaveExisting, json!({"a": 2, "c": 2}));
    assert_eq!(content(&graph), json!({"a": 1, "b": 1, "c": 2}));

    submit_with(&graph, MergePolicy::AppendNewOverwriteExisting, json!({"a": 3, "b": null}));
    assert_eq!(content(&graph), json!({"a": 3, "b": 1, "c": 2}));

    submit_with(&graph, MergePolicy::None, json!({"a": 4}));
    assert_eq!(content(&graph), json!({"a": 3, "b": 1, "c": 2}));

    submit_with(&graph, MergePolicy::OverwriteAll, json!({"z": true}));
    assert_eq!(content(&graph), json!({"z": true}));
}

#[test]
fn err_policy_surfaces_on_read() {
    let graph = default_graph();
    submit_with(&graph, MergePolicy::default(), json!({"a": 1}));
    submit_with(&graph, MergePolicy::Err, json!({"a": 2}));
    let err = graph.nodes().get_by_name("Gene", "X").unwrap_err();
    assert!(matches!(err, GraphError::MergeConflict { .. }));
}

#[test]
fn reads_are_repeatable() {
    let graph = default_graph();
    for i in 0..5 {
        submit_with(&graph, MergePolicy::default(), json!({ "v": i }));
    }
    let first = content(&graph);
    for _ in 0..3 {
        assert_eq!(content(&graph), first);
    }
    assert_eq!(first["v"], 4);
}

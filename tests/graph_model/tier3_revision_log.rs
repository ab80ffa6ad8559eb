//! Tier 3: revision log transactions and listeners.

use std::sync::Arc;

use parking_lot::Mutex;
use tangledb::engine::txn;
use tangledb::{
    GraphError, GraphOperation, GraphResult, RevisionLogListener, SubmitOutcome, TransactionRecord,
};

use crate::test_utils::*;

#[derive(Default)]
struct IndexRefresher {
    committed: Mutex<Vec<(String, usize)>>,
    broken: bool,
}

impl RevisionLogListener for IndexRefresher {
    fn notify_post_commit(&self, txn: &TransactionRecord) -> GraphResult<()> {
        if self.broken {
            return Err(GraphError::storage("refresh failed"));
        }
        self.committed.lock().push((txn.id.clone(), txn.operations.len()));
        Ok(())
    }
}

#[test]
fn explicit_transaction_lifecycle() {
    let graph = default_graph();
    let log = graph.revision_log();
    let listener = Arc::new(IndexRefresher::default());
    log.add_listener(listener.clone());

    assert_eq!(
        log.submit_revision("test-graph", "t1", 0, GraphOperation::begin("t1")).unwrap(),
        SubmitOutcome::Began
    );
    log.submit_revisions(
        "test-graph",
        "t1",
        0,
        vec![put_node(named("Gene", "A")), put_node(named("Gene", "B"))],
    )
    .unwrap();
    log.submit_revision("test-graph", "t1", 1, put_node(named("Gene", "C")))
        .unwrap();
    assert_eq!(graph.nodes().count().unwrap(), 0);
    assert_eq!(log.iterate_uncommitted_revisions("t1").unwrap().len(), 2);

    let outcome = log
        .submit_revision("test-graph", "t1", 0, GraphOperation::commit("t1"))
        .unwrap();
    assert!(matches!(outcome, SubmitOutcome::Committed(ref r) if r.operations_applied == 3));
    assert_eq!(graph.nodes().count().unwrap(), 3);
    assert_eq!(*listener.committed.lock(), vec![("t1".to_string(), 3)]);

    let record = log.transaction("t1").unwrap().unwrap();
    assert!(record.committed);
    assert_eq!(log.iterate_revisions_for_transaction("t1").unwrap().len(), 2);
}

#[test]
fn broken_listener_commits_with_warnings() {
    let graph = default_graph();
    graph.revision_log().add_listener(Arc::new(IndexRefresher {
        broken: true,
        ..Default::default()
    }));
    let report = graph.submit(vec![put_node(named("Gene", "A"))]).unwrap();
    assert!(report.has_warnings());
    assert!(report.warnings[0].error.contains("refresh failed"));
    assert!(graph.nodes().get_by_name("Gene", "A").unwrap().is_materialized());
}

#[test]
fn helpers_roll_back_on_failure() {
    let graph = default_graph();
    let log = graph.revision_log();
    let txn_id = txn::begin_new_transaction(log, "test-graph").unwrap();
    txn::submit_txn_part(log, "test-graph", &txn_id, 0, vec![put_node(named("Gene", "A"))]).unwrap();
    txn::rollback_transaction(log, "test-graph", &txn_id).unwrap();
    assert!(log.transaction(&txn_id).unwrap().is_none());

    let err = txn::submit_as_txn(
        log,
        "test-graph",
        vec![put_node(named("Gene", "B")), GraphOperation::rollback("other")],
    )
    .unwrap_err();
    assert!(matches!(err, GraphError::GraphOperationUnsupported { .. }));
    assert_eq!(graph.nodes().count().unwrap(), 0);
}

#[test]
fn committed_history_is_queryable_per_graph() {
    let graph = default_graph();
    graph.submit(vec![put_node(named("Gene", "A"))]).unwrap();
    graph
        .submit(vec![put_node(named("Gene", "B")), put_node(named("Gene", "C"))])
        .unwrap();
    let ops: usize = graph
        .revision_log()
        .iterate_committed_revisions_for_graph("test-graph")
        .unwrap()
        .map(|c| c.unwrap().operations.len())
        .sum();
    assert_eq!(ops, 3);
    assert_eq!(
        graph
            .revision_log()
            .iterate_committed_revisions_for_graph("elsewhere")
            .unwrap()
            .count(),
        0
    );
}

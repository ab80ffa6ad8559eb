//! Transaction helpers over [`RevisionLog`].
//!
//! Every helper goes through [`RevisionLog::submit_revision`] with the
//! matching transaction control operation, so listeners and logging behave
//! exactly as for producers driving the log directly.

use tangle_core::{new_id, GraphError, GraphOperation, GraphResult};

use crate::revlog::{CommitReport, RevisionLog, RollbackReport, SubmitOutcome};

/// Open a transaction under a fresh id and return the id.
pub fn begin_new_transaction(log: &RevisionLog, graph_id: &str) -> GraphResult<String> {
    let txn_id = new_id();
    log.submit_revision(graph_id, &txn_id, 0, GraphOperation::begin(txn_id.clone()))?;
    Ok(txn_id)
}

/// Record one batch of a transaction.
pub fn submit_txn_part(
    log: &RevisionLog,
    graph_id: &str,
    txn_id: &str,
    patch_index: u32,
    operations: Vec<GraphOperation>,
) -> GraphResult<usize> {
    log.submit_revisions(graph_id, txn_id, patch_index, operations)
}

/// Commit a transaction.
pub fn commit_transaction(
    log: &RevisionLog,
    graph_id: &str,
    txn_id: &str,
) -> GraphResult<CommitReport> {
    match log.submit_revision(graph_id, txn_id, 0, GraphOperation::commit(txn_id))? {
        SubmitOutcome::Committed(report) => Ok(report),
        other => Err(unexpected(txn_id, &other)),
    }
}

/// Roll a transaction back.
pub fn rollback_transaction(
    log: &RevisionLog,
    graph_id: &str,
    txn_id: &str,
) -> GraphResult<RollbackReport> {
    match log.submit_revision(graph_id, txn_id, 0, GraphOperation::rollback(txn_id))? {
        SubmitOutcome::RolledBack(report) => Ok(report),
        other => Err(unexpected(txn_id, &other)),
    }
}

/// Roll a transaction back, logging instead of returning any failure.
///
/// Meant for error paths where the original error is the one to report.
pub fn silent_rollback(log: &RevisionLog, graph_id: &str, txn_id: &str) {
    if let Err(e) = rollback_transaction(log, graph_id, txn_id) {
        tracing::warn!(txn = %txn_id, graph = %graph_id, error = %e, "silent rollback failed");
    }
}

/// Submit `operations` as one self-contained transaction.
///
/// On any failure the transaction is rolled back and the failure returned.
pub fn submit_as_txn(
    log: &RevisionLog,
    graph_id: &str,
    operations: Vec<GraphOperation>,
) -> GraphResult<CommitReport> {
    let txn_id = begin_new_transaction(log, graph_id)?;
    let result = submit_txn_part(log, graph_id, &txn_id, 0, operations)
        .and_then(|_| commit_transaction(log, graph_id, &txn_id));
    if result.is_err() {
        silent_rollback(log, graph_id, &txn_id);
    }
    result
}

fn unexpected(txn_id: &str, outcome: &SubmitOutcome) -> GraphError {
    GraphError::transaction(txn_id, format!("unexpected submit outcome {outcome:?}"))
}

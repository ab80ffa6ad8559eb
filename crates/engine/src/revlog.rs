//! Revision log: transactional intake of graph operations.
//!
//! Producers submit operations under a transaction (patch) id. Each
//! submission is recorded as one *container* document in the log collection
//! and is invisible to readers until the transaction commits. Commit applies
//! every recorded operation to the node and edge repositories in
//! `(patch_index, position)` order, then marks the log entries committed.
//! All revisions of one transaction carry the commit time as their timestamp.
//!
//! # Lifecycle
//!
//! ```text
//! TxnBegin ──► NodeUpdate / EdgeUpdate ... ──► TxnCommit   (applied, listeners notified)
//!                                         └──► TxnRollback (log entries discarded)
//! ```
//!
//! Submitting operations for an unknown transaction opens it implicitly.
//!
//! # Listeners
//!
//! [`RevisionLogListener`]s are called synchronously. A pre-commit failure
//! aborts the commit. Post-commit and post-rollback failures cannot undo
//! anything, so they are logged and handed back as warnings on the report.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tangle_core::{
    new_id, now_millis, GraphEntity, GraphError, GraphOperation, GraphResult, MergePolicy,
    Revision,
};
use tangle_storage::{DocumentStore, Filter, Update};

use crate::codec::{from_document, to_document};
use crate::config::GraphConfig;
use crate::repository::{EdgeRepository, NodeRepository};
use crate::revisions::PATCH_ID;

const RECORD: &str = "record";
const GRAPH_ID: &str = "graph_id";
const COMMITTED: &str = "committed";
const DATE_COMMITTED: &str = "date_committed";

/// Kind of a log document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
enum RecordKind {
    Transaction,
    Revisions,
}

impl RecordKind {
    fn as_str(self) -> &'static str {
        match self {
            RecordKind::Transaction => "transaction",
            RecordKind::Revisions => "revisions",
        }
    }
}

/// One transaction header document.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct TxnHeader {
    #[serde(rename = "_id")]
    id: String,
    record: RecordKind,
    patch_id: String,
    graph_id: String,
    created: i64,
    committed: bool,
    date_committed: Option<DateTime<Utc>>,
}

fn header_id(txn_id: &str) -> String {
    format!("txn:{txn_id}")
}

/// One recorded submission: a batch of operations sharing a patch index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RevisionContainer {
    /// Document id in the log collection.
    #[serde(rename = "_id", default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    record: RecordKind,
    /// Graph the operations belong to.
    pub graph_id: String,
    /// Transaction id.
    pub patch_id: String,
    /// Position of this batch within the transaction.
    pub patch_index: u32,
    /// Submission time, milliseconds since the epoch.
    pub timestamp: i64,
    /// Whether the transaction has been committed.
    pub committed: bool,
    /// When the transaction was committed.
    pub date_committed: Option<DateTime<Utc>>,
    /// The operations, in submission order.
    pub operations: Vec<GraphOperation>,
}

impl RevisionContainer {
    fn new(graph_id: &str, patch_id: &str, patch_index: u32, operations: Vec<GraphOperation>) -> Self {
        Self {
            id: String::new(),
            record: RecordKind::Revisions,
            graph_id: graph_id.to_string(),
            patch_id: patch_id.to_string(),
            patch_index,
            timestamp: now_millis(),
            committed: false,
            date_committed: None,
            operations,
        }
    }

    /// The revision the operation at `op_index` becomes when committed at
    /// `timestamp`.
    fn revision<E: GraphEntity>(
        &self,
        timestamp: i64,
        op_index: usize,
        policy: MergePolicy,
        entity: E,
    ) -> Revision<E> {
        Revision {
            id: new_id(),
            graph_id: self.graph_id.clone(),
            patch_id: self.patch_id.clone(),
            patch_index: self.patch_index,
            op_index: op_index as u32,
            timestamp,
            merge_policy: policy,
            entity,
        }
    }
}

/// One operation of a transaction with its position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggedOperation {
    /// Batch position within the transaction.
    pub patch_index: u32,
    /// Position within the batch.
    pub op_index: u32,
    /// Submission time of the batch.
    pub timestamp: i64,
    /// The operation.
    pub operation: GraphOperation,
}

/// A transaction and everything recorded under it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    /// Transaction id.
    pub id: String,
    /// Graph the transaction writes to.
    pub graph_id: String,
    /// Recorded operations in application order.
    pub operations: Vec<LoggedOperation>,
    /// Whether the transaction has been committed.
    pub committed: bool,
    /// When it was committed.
    pub date_committed: Option<DateTime<Utc>>,
}

/// Observer of transaction outcomes.
///
/// Every callback defaults to doing nothing.
pub trait RevisionLogListener: Send + Sync {
    /// Name used in logs and warnings.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Called before a commit is applied. An error aborts the commit.
    fn notify_pre_commit(&self, _txn: &TransactionRecord) -> GraphResult<()> {
        Ok(())
    }

    /// Called after a commit is applied.
    fn notify_post_commit(&self, _txn: &TransactionRecord) -> GraphResult<()> {
        Ok(())
    }

    /// Called after a transaction is rolled back.
    fn notify_post_rollback(&self, _txn: &TransactionRecord) -> GraphResult<()> {
        Ok(())
    }
}

/// Handle for removing a registered listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// A listener failure that did not stop the transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenerWarning {
    /// Listener name.
    pub listener: String,
    /// Error message.
    pub error: String,
}

/// Outcome of a commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitReport {
    /// Transaction id.
    pub txn_id: String,
    /// Number of node and edge operations applied.
    pub operations_applied: usize,
    /// Post-commit listener failures.
    pub warnings: Vec<ListenerWarning>,
}

impl CommitReport {
    /// True if the transaction committed but some listener failed.
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}

/// Outcome of a rollback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RollbackReport {
    /// Transaction id.
    pub txn_id: String,
    /// Number of recorded operations discarded.
    pub operations_discarded: usize,
    /// Post-rollback listener failures.
    pub warnings: Vec<ListenerWarning>,
}

/// What a single submitted operation did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// A node or edge update was recorded for later commit.
    Recorded,
    /// A transaction was opened.
    Began,
    /// A transaction was committed.
    Committed(CommitReport),
    /// A transaction was rolled back.
    RolledBack(RollbackReport),
}

/// Transactional intake of graph operations.
pub struct RevisionLog {
    store: Arc<dyn DocumentStore>,
    collection: String,
    nodes: NodeRepository,
    edges: EdgeRepository,
    listeners: RwLock<Vec<(ListenerId, Arc<dyn RevisionLogListener>)>>,
    next_listener: AtomicU64,
}

impl RevisionLog {
    /// Open the log for the repositories it commits into.
    pub fn new(
        store: Arc<dyn DocumentStore>,
        config: &GraphConfig,
        nodes: NodeRepository,
        edges: EdgeRepository,
    ) -> GraphResult<Self> {
        let collection = config.revlog_collection.clone();
        for field in [PATCH_ID, GRAPH_ID, RECORD] {
            store.ensure_index(&collection, field)?;
        }
        Ok(Self {
            store,
            collection,
            nodes,
            edges,
            listeners: RwLock::new(Vec::new()),
            next_listener: AtomicU64::new(1),
        })
    }

    /// Log collection name.
    pub fn collection(&self) -> &str {
        &self.collection
    }

    // =========================================================================
    // Listeners
    // =========================================================================

    /// Register a listener. Listeners run in registration order.
    pub fn add_listener(&self, listener: Arc<dyn RevisionLogListener>) -> ListenerId {
        let id = ListenerId(self.next_listener.fetch_add(1, Ordering::Relaxed));
        self.listeners.write().push((id, listener));
        id
    }

    /// Unregister a listener. Returns `false` if it was not registered.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|(l, _)| *l != id);
        listeners.len() != before
    }

    fn listeners(&self) -> Vec<Arc<dyn RevisionLogListener>> {
        self.listeners.read().iter().map(|(_, l)| l.clone()).collect()
    }

    /// Run a best-effort notification on every listener.
    fn notify_best_effort<F>(&self, txn_id: &str, stage: &str, notify: F) -> Vec<ListenerWarning>
    where
        F: Fn(&dyn RevisionLogListener) -> GraphResult<()>,
    {
        let mut warnings = Vec::new();
        for listener in self.listeners() {
            if let Err(e) = notify(listener.as_ref()) {
                tracing::warn!(
                    txn = %txn_id,
                    listener = %listener.name(),
                    stage,
                    error = %e,
                    "Revision log listener failed"
                );
                warnings.push(ListenerWarning {
                    listener: listener.name().to_string(),
                    error: e.to_string(),
                });
            }
        }
        warnings
    }

    // =========================================================================
    // Submission
    // =========================================================================

    /// Submit one operation.
    ///
    /// Transaction control operations act on the transaction they name;
    /// `patch_id` and `patch_index` only apply to node and edge updates.
    pub fn submit_revision(
        &self,
        graph_id: &str,
        patch_id: &str,
        patch_index: u32,
        operation: GraphOperation,
    ) -> GraphResult<SubmitOutcome> {
        match operation {
            GraphOperation::TxnBegin { txn_id } => {
                self.begin(graph_id, &txn_id)?;
                Ok(SubmitOutcome::Began)
            }
            GraphOperation::TxnCommit { txn_id } => self.commit(&txn_id).map(SubmitOutcome::Committed),
            GraphOperation::TxnRollback { txn_id } => {
                self.rollback(&txn_id).map(SubmitOutcome::RolledBack)
            }
            op => {
                self.submit_revisions(graph_id, patch_id, patch_index, vec![op])?;
                Ok(SubmitOutcome::Recorded)
            }
        }
    }

    /// Record a batch of node and edge updates under `patch_id`.
    ///
    /// Opens the transaction if it does not exist yet. Returns the number of
    /// operations recorded; an empty batch records nothing. Transaction
    /// control operations are not allowed inside a batch.
    pub fn submit_revisions(
        &self,
        graph_id: &str,
        patch_id: &str,
        patch_index: u32,
        operations: Vec<GraphOperation>,
    ) -> GraphResult<usize> {
        if let Some(op) = operations.iter().find(|op| op.is_transaction_control()) {
            return Err(GraphError::unsupported(format!(
                "{} cannot be batched with revisions",
                op.name()
            )));
        }
        for op in &operations {
            match op {
                GraphOperation::NodeUpdate(u) => u.node.validate()?,
                GraphOperation::EdgeUpdate(u) => u.edge.validate()?,
                _ => {}
            }
        }
        if operations.is_empty() {
            return Ok(0);
        }
        match self.header(patch_id)? {
            Some(h) if h.committed => {
                return Err(GraphError::transaction(patch_id, "already committed"))
            }
            Some(_) => {}
            None => {
                tracing::debug!(txn = %patch_id, graph = %graph_id, "transaction created on submit");
                self.insert_header(graph_id, patch_id)?;
            }
        }
        let n = operations.len();
        let container = RevisionContainer::new(graph_id, patch_id, patch_index, operations);
        self.store.insert(&self.collection, to_document(&container)?)?;
        tracing::trace!(txn = %patch_id, patch_index, operations = n, "revisions recorded");
        Ok(n)
    }

    // =========================================================================
    // Transaction control
    // =========================================================================

    /// Open a transaction. Opening an open transaction again is a no-op.
    pub fn begin(&self, graph_id: &str, txn_id: &str) -> GraphResult<()> {
        match self.header(txn_id)? {
            Some(h) if h.committed => Err(GraphError::transaction(txn_id, "already committed")),
            Some(_) => Ok(()),
            None => {
                self.insert_header(graph_id, txn_id)?;
                tracing::debug!(txn = %txn_id, graph = %graph_id, "transaction begun");
                Ok(())
            }
        }
    }

    /// Apply a transaction and mark it committed.
    ///
    /// If applying fails, revisions already written for the transaction are
    /// removed and it stays open. Direct-write merges cannot be undone this
    /// way.
    pub fn commit(&self, txn_id: &str) -> GraphResult<CommitReport> {
        let header = self.open_header(txn_id)?;
        let containers = self.containers(txn_id, false)?;
        let mut record = assemble(&header, &containers);

        for listener in self.listeners() {
            listener
                .notify_pre_commit(&record)
                .map_err(|e| GraphError::Listener {
                    listener: listener.name().to_string(),
                    txn_id: txn_id.to_string(),
                    reason: e.to_string(),
                })?;
        }

        // one timestamp for the whole transaction, so its own operations
        // order by (patch_index, op_index)
        let timestamp = now_millis();
        let mut applied = 0;
        for container in &containers {
            match self.apply_container(container, timestamp) {
                Ok(n) => applied += n,
                Err(e) => {
                    self.compensate(txn_id);
                    return Err(e);
                }
            }
        }

        let date = Utc::now();
        let date_value = serde_json::to_value(date)?;
        self.store.update_many(
            &self.collection,
            &Filter::eq(PATCH_ID, txn_id),
            &Update::Many(vec![
                Update::set(COMMITTED, true),
                Update::Set(DATE_COMMITTED.to_string(), date_value),
            ]),
        )?;
        record.committed = true;
        record.date_committed = Some(date);
        tracing::info!(txn = %txn_id, graph = %header.graph_id, operations = applied, "transaction committed");

        let warnings =
            self.notify_best_effort(txn_id, "post_commit", |l| l.notify_post_commit(&record));
        Ok(CommitReport {
            txn_id: txn_id.to_string(),
            operations_applied: applied,
            warnings,
        })
    }

    /// Discard an open transaction and everything recorded under it.
    pub fn rollback(&self, txn_id: &str) -> GraphResult<RollbackReport> {
        let header = self.open_header(txn_id)?;
        let record = assemble(&header, &self.containers(txn_id, false)?);
        self.store
            .remove(&self.collection, &Filter::eq(PATCH_ID, txn_id))?;
        tracing::info!(
            txn = %txn_id,
            graph = %header.graph_id,
            operations = record.operations.len(),
            "transaction rolled back"
        );
        let warnings =
            self.notify_best_effort(txn_id, "post_rollback", |l| l.notify_post_rollback(&record));
        Ok(RollbackReport {
            txn_id: txn_id.to_string(),
            operations_discarded: record.operations.len(),
            warnings,
        })
    }

    fn apply_container(&self, container: &RevisionContainer, timestamp: i64) -> GraphResult<usize> {
        for (op_index, op) in container.operations.iter().enumerate() {
            match op {
                GraphOperation::NodeUpdate(u) => self
                    .nodes
                    .apply(&container.revision(timestamp, op_index, u.merge_policy, u.node.clone()))?,
                GraphOperation::EdgeUpdate(u) => self
                    .edges
                    .apply(&container.revision(timestamp, op_index, u.merge_policy, u.edge.clone()))?,
                other => {
                    return Err(GraphError::unsupported(format!(
                        "{} recorded inside a revision batch",
                        other.name()
                    )))
                }
            }
        }
        Ok(container.operations.len())
    }

    fn compensate(&self, txn_id: &str) {
        for result in [self.nodes.remove_patch(txn_id), self.edges.remove_patch(txn_id)] {
            if let Err(e) = result {
                tracing::warn!(txn = %txn_id, error = %e, "failed to remove partially applied revisions");
            }
        }
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// A transaction with its recorded operations, if it exists.
    pub fn transaction(&self, txn_id: &str) -> GraphResult<Option<TransactionRecord>> {
        let Some(header) = self.header(txn_id)? else {
            return Ok(None);
        };
        let containers = self.iterate_revisions_for_transaction(txn_id)?;
        Ok(Some(assemble(&header, &containers)))
    }

    /// Recorded batches of a transaction that are not committed yet.
    pub fn iterate_uncommitted_revisions(&self, txn_id: &str) -> GraphResult<Vec<RevisionContainer>> {
        self.containers(txn_id, false)
    }

    /// Every recorded batch of a transaction.
    pub fn iterate_revisions_for_transaction(
        &self,
        txn_id: &str,
    ) -> GraphResult<Vec<RevisionContainer>> {
        self.collect_containers(Filter::and(vec![
            kind(RecordKind::Revisions),
            Filter::eq(PATCH_ID, txn_id),
        ]))
    }

    /// Committed batches of a graph, streamed.
    pub fn iterate_committed_revisions_for_graph(
        &self,
        graph_id: &str,
    ) -> GraphResult<impl Iterator<Item = GraphResult<RevisionContainer>> + Send + 'static> {
        let filter = Filter::and(vec![
            kind(RecordKind::Revisions),
            Filter::eq(GRAPH_ID, graph_id),
            Filter::eq(COMMITTED, true),
        ]);
        Ok(self
            .store
            .find(&self.collection, &filter)?
            .map(from_document::<RevisionContainer>))
    }

    fn containers(&self, txn_id: &str, committed: bool) -> GraphResult<Vec<RevisionContainer>> {
        self.collect_containers(Filter::and(vec![
            kind(RecordKind::Revisions),
            Filter::eq(PATCH_ID, txn_id),
            Filter::eq(COMMITTED, committed),
        ]))
    }

    fn collect_containers(&self, filter: Filter) -> GraphResult<Vec<RevisionContainer>> {
        let mut out: Vec<RevisionContainer> = self
            .store
            .find(&self.collection, &filter)?
            .map(from_document)
            .collect::<GraphResult<_>>()?;
        // stable: batches sharing an index keep submission order
        out.sort_by_key(|c| c.patch_index);
        Ok(out)
    }

    fn header(&self, txn_id: &str) -> GraphResult<Option<TxnHeader>> {
        self.store
            .find_one(&self.collection, &Filter::id(header_id(txn_id)))?
            .map(from_document)
            .transpose()
    }

    fn open_header(&self, txn_id: &str) -> GraphResult<TxnHeader> {
        match self.header(txn_id)? {
            None => Err(GraphError::transaction(txn_id, "unknown transaction")),
            Some(h) if h.committed => Err(GraphError::transaction(txn_id, "already committed")),
            Some(h) => Ok(h),
        }
    }

    fn insert_header(&self, graph_id: &str, txn_id: &str) -> GraphResult<()> {
        let header = TxnHeader {
            id: header_id(txn_id),
            record: RecordKind::Transaction,
            patch_id: txn_id.to_string(),
            graph_id: graph_id.to_string(),
            created: now_millis(),
            committed: false,
            date_committed: None,
        };
        self.store
            .insert(&self.collection, to_document(&header)?)
            .map(|_| ())
    }
}

fn kind(record: RecordKind) -> Filter {
    Filter::eq(RECORD, record.as_str())
}

fn assemble(header: &TxnHeader, containers: &[RevisionContainer]) -> TransactionRecord {
    let operations = containers
        .iter()
        .flat_map(|c| {
            c.operations
                .iter()
                .enumerate()
                .map(move |(i, op)| LoggedOperation {
                    patch_index: c.patch_index,
                    op_index: i as u32,
                    timestamp: c.timestamp,
                    operation: op.clone(),
                })
        })
        .collect();
    TransactionRecord {
        id: header.patch_id.clone(),
        graph_id: header.graph_id.clone(),
        operations,
        committed: header.committed,
        date_committed: header.date_committed,
    }
}

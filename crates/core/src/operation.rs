//! Operations submitted to the revision log.

use serde::{Deserialize, Serialize};

use crate::entity::{Edge, Node};
use crate::policy::MergePolicy;

/// A node mutation and the policy to merge it with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeUpdate {
    /// How content merges into an existing node.
    pub merge_policy: MergePolicy,
    /// The node fragment.
    pub node: Node,
}

/// An edge mutation and the policy to merge it with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeUpdate {
    /// How content merges into an existing edge.
    pub merge_policy: MergePolicy,
    /// The edge fragment.
    pub edge: Edge,
}

/// Everything a producer can submit to the revision log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum GraphOperation {
    /// Create or merge a node.
    NodeUpdate(NodeUpdate),
    /// Create or merge an edge.
    EdgeUpdate(EdgeUpdate),
    /// Open a transaction.
    TxnBegin {
        /// Transaction id.
        txn_id: String,
    },
    /// Commit a transaction.
    TxnCommit {
        /// Transaction id.
        txn_id: String,
    },
    /// Discard a transaction.
    TxnRollback {
        /// Transaction id.
        txn_id: String,
    },
}

impl GraphOperation {
    /// Node update with the given policy.
    pub fn node(merge_policy: MergePolicy, node: Node) -> Self {
        GraphOperation::NodeUpdate(NodeUpdate { merge_policy, node })
    }

    /// Edge update with the given policy.
    pub fn edge(merge_policy: MergePolicy, edge: Edge) -> Self {
        GraphOperation::EdgeUpdate(EdgeUpdate { merge_policy, edge })
    }

    /// Transaction begin marker.
    pub fn begin(txn_id: impl Into<String>) -> Self {
        GraphOperation::TxnBegin {
            txn_id: txn_id.into(),
        }
    }

    /// Transaction commit marker.
    pub fn commit(txn_id: impl Into<String>) -> Self {
        GraphOperation::TxnCommit {
            txn_id: txn_id.into(),
        }
    }

    /// Transaction rollback marker.
    pub fn rollback(txn_id: impl Into<String>) -> Self {
        GraphOperation::TxnRollback {
            txn_id: txn_id.into(),
        }
    }

    /// True for begin/commit/rollback.
    pub fn is_transaction_control(&self) -> bool {
        matches!(
            self,
            GraphOperation::TxnBegin { .. }
                | GraphOperation::TxnCommit { .. }
                | GraphOperation::TxnRollback { .. }
        )
    }

    /// Short name for logs and error messages.
    pub fn name(&self) -> &'static str {
        match self {
            GraphOperation::NodeUpdate(_) => "node_update",
            GraphOperation::EdgeUpdate(_) => "edge_update",
            GraphOperation::TxnBegin { .. } => "txn_begin",
            GraphOperation::TxnCommit { .. } => "txn_commit",
            GraphOperation::TxnRollback { .. } => "txn_rollback",
        }
    }
}

//! Error type shared by every layer of the graph store.
//!
//! All failures surface as a single [`GraphError`] wrapping the specific
//! cause. Only listener notifications after a commit are allowed to fail
//! without failing the caller; those are reported as warnings instead.

use thiserror::Error;

/// Result alias used throughout the workspace.
pub type GraphResult<T> = Result<T, GraphError>;

/// Errors raised by the graph model, its storage and its revision log.
#[derive(Debug, Error)]
pub enum GraphError {
    /// Attempted to import identifiers from a key set of another type.
    #[error("identity mismatch: cannot import keys of type {found:?} into a key set of type {expected:?}")]
    IdentityMismatch {
        /// Type of the receiving key set.
        expected: Option<String>,
        /// Type of the key set being imported.
        found: Option<String>,
    },

    /// Consistency-mode insert found an identifier owned by another entity.
    #[error("duplicate identity: {identifier} already belongs to another entity in '{collection}'")]
    DuplicateIdentity {
        /// Collection holding the clashing entity.
        collection: String,
        /// The identifier that collided.
        identifier: String,
    },

    /// Consistency-mode store of an entity that already exists.
    #[error("entity already exists: {keys}")]
    AlreadyExists {
        /// Display form of the offending key set.
        keys: String,
    },

    /// A key set without a usable identifier.
    #[error("invalid key: {reason}")]
    InvalidKey {
        /// What is wrong with the key set.
        reason: String,
    },

    /// The `ERR` merge policy was triggered.
    #[error("merge conflict: entity {keys} already exists and the merge policy forbids merging")]
    MergeConflict {
        /// Display form of the existing entity's keys.
        keys: String,
    },

    /// Two key sets describing the same entity disagree on its type.
    #[error("type conflict: existing type {existing:?} differs from incoming type {incoming:?}")]
    TypeConflict {
        /// Type of the existing entity.
        existing: Option<String>,
        /// Type of the incoming entity.
        incoming: Option<String>,
    },

    /// An operation the receiving component cannot process.
    #[error("unsupported graph operation: {reason}")]
    GraphOperationUnsupported {
        /// Why the operation was rejected.
        reason: String,
    },

    /// Transaction lifecycle violation (unknown id, double commit, ...).
    #[error("transaction {txn_id}: {reason}")]
    Transaction {
        /// The transaction (patch set) id.
        txn_id: String,
        /// What went wrong.
        reason: String,
    },

    /// A pre-commit listener vetoed a commit.
    #[error("listener '{listener}' rejected transaction {txn_id}: {reason}")]
    Listener {
        /// Listener name.
        listener: String,
        /// The transaction being committed.
        txn_id: String,
        /// Reason given by the listener.
        reason: String,
    },

    /// Failure inside the document store.
    #[error("storage error: {0}")]
    Storage(String),

    /// Failure converting between entities and documents.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Invalid or unreadable configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// I/O failure while persisting snapshots or configuration.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl GraphError {
    /// Build an [`GraphError::InvalidKey`].
    pub fn invalid_key(reason: impl Into<String>) -> Self {
        GraphError::InvalidKey {
            reason: reason.into(),
        }
    }

    /// Build a [`GraphError::Serialization`].
    pub fn serialization(msg: impl Into<String>) -> Self {
        GraphError::Serialization(msg.into())
    }

    /// Build a [`GraphError::Storage`].
    pub fn storage(msg: impl Into<String>) -> Self {
        GraphError::Storage(msg.into())
    }

    /// Build a [`GraphError::GraphOperationUnsupported`].
    pub fn unsupported(reason: impl Into<String>) -> Self {
        GraphError::GraphOperationUnsupported {
            reason: reason.into(),
        }
    }

    /// Build a [`GraphError::Transaction`].
    pub fn transaction(txn_id: impl Into<String>, reason: impl Into<String>) -> Self {
        GraphError::Transaction {
            txn_id: txn_id.into(),
            reason: reason.into(),
        }
    }

    /// True for the identity-collision family of errors raised in
    /// consistency mode.
    pub fn is_identity_collision(&self) -> bool {
        matches!(
            self,
            GraphError::DuplicateIdentity { .. } | GraphError::AlreadyExists { .. }
        )
    }
}

impl From<serde_json::Error> for GraphError {
    fn from(e: serde_json::Error) -> Self {
        GraphError::Serialization(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_cause() {
        let e = GraphError::invalid_key("no identifiers");
        assert_eq!(e.to_string(), "invalid key: no identifiers");

        let e = GraphError::DuplicateIdentity {
            collection: "nodes".into(),
            identifier: "uid:g1".into(),
        };
        assert!(e.to_string().contains("uid:g1"));
        assert!(e.is_identity_collision());
        assert!(!GraphError::storage("x").is_identity_collision());
    }

    #[test]
    fn serde_errors_convert() {
        let err = serde_json::from_str::<u32>("not json").unwrap_err();
        let e: GraphError = err.into();
        assert!(matches!(e, GraphError::Serialization(_)));
    }
}

//! Immutable revision records.

use std::cmp::Ordering;
use std::sync::atomic::{self, AtomicI64};

use serde::{Deserialize, Serialize};

use crate::policy::MergePolicy;

/// One immutable mutation of a node or edge.
///
/// Revisions are persisted one per document with the entity fields
/// (`keys`, `content`, and for edges `from`/`to`) flattened to the top level,
/// so the key indexes address them directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Revision<E> {
    /// Unique revision id, used as the document id.
    #[serde(rename = "_id")]
    pub id: String,
    /// Graph the revision belongs to.
    pub graph_id: String,
    /// Transaction (patch set) that produced the revision.
    pub patch_id: String,
    /// Position of the submitting batch inside its transaction.
    pub patch_index: u32,
    /// Position of the operation inside its batch.
    #[serde(default)]
    pub op_index: u32,
    /// Submission time, milliseconds since the Unix epoch.
    pub timestamp: i64,
    /// Policy used when this revision is folded onto earlier ones.
    pub merge_policy: MergePolicy,
    /// The entity fragment.
    #[serde(flatten)]
    pub entity: E,
}

impl<E> Revision<E> {
    /// A revision with a fresh id, stamped now.
    pub fn new(
        graph_id: impl Into<String>,
        patch_id: impl Into<String>,
        merge_policy: MergePolicy,
        entity: E,
    ) -> Self {
        Self {
            id: new_id(),
            graph_id: graph_id.into(),
            patch_id: patch_id.into(),
            patch_index: 0,
            op_index: 0,
            timestamp: now_millis(),
            merge_policy,
            entity,
        }
    }

    /// Chronological comparison: timestamp, then patch id, then patch index,
    /// then position within the batch.
    pub fn chronological_cmp(&self, other: &Self) -> Ordering {
        self.timestamp
            .cmp(&other.timestamp)
            .then_with(|| self.patch_id.cmp(&other.patch_id))
            .then_with(|| self.patch_index.cmp(&other.patch_index))
            .then_with(|| self.op_index.cmp(&other.op_index))
    }
}

/// Sort revisions into the order they must be folded in.
///
/// The revision id breaks any remaining tie so the order never depends on
/// the order the store returned documents in.
pub fn sort_chronologically<E>(revisions: &mut [Revision<E>]) {
    revisions.sort_by(|a, b| a.chronological_cmp(b).then_with(|| a.id.cmp(&b.id)));
}

static LAST_TIMESTAMP: AtomicI64 = AtomicI64::new(0);

/// Current time in milliseconds since the Unix epoch.
///
/// Strictly increasing within the process: a call in the same millisecond
/// as the previous one returns the previous value plus one, so revisions
/// written back to back keep their write order.
pub fn now_millis() -> i64 {
    let now = chrono::Utc::now().timestamp_millis();
    let prev = LAST_TIMESTAMP
        .fetch_update(atomic::Ordering::SeqCst, atomic::Ordering::SeqCst, |last| {
            Some(now.max(last + 1))
        })
        .unwrap_or_else(|last| last);
    now.max(prev + 1)
}

/// A fresh random identifier for revisions, transactions and containers.
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::Node;
    use crate::keys::EntityKeySet;

    fn rev(ts: i64, patch: &str, idx: u32, op: u32) -> Revision<Node> {
        let mut r = Revision::new(
            "g",
            patch,
            MergePolicy::default(),
            Node::new(EntityKeySet::for_uid("u")),
        );
        r.timestamp = ts;
        r.patch_index = idx;
        r.op_index = op;
        r
    }

    #[test]
    fn ordering_breaks_ties_by_patch_then_index() {
        let mut revs = vec![
            rev(2, "a", 0, 0),
            rev(1, "b", 0, 0),
            rev(1, "a", 2, 0),
            rev(1, "a", 1, 1),
            rev(1, "a", 1, 0),
        ];
        sort_chronologically(&mut revs);
        let order: Vec<_> = revs
            .iter()
            .map(|r| (r.timestamp, r.patch_id.as_str(), r.patch_index, r.op_index))
            .collect();
        assert_eq!(
            order,
            vec![
                (1, "a", 1, 0),
                (1, "a", 1, 1),
                (1, "a", 2, 0),
                (1, "b", 0, 0),
                (2, "a", 0, 0),
            ]
        );
    }

    #[test]
    fn timestamps_strictly_increase() {
        let stamps: Vec<i64> = (0..1000).map(|_| now_millis()).collect();
        assert!(stamps.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn document_form_is_flat() {
        let r = rev(5, "p", 1, 0);
        let v = serde_json::to_value(&r).unwrap();
        assert_eq!(v["_id"], serde_json::json!(r.id));
        assert_eq!(v["keys"]["uids"], serde_json::json!(["u"]));
        assert_eq!(v["merge_policy"], "APPEND_NEW__OVERWRITE_EXISTING");
        let back: Revision<Node> = serde_json::from_value(v).unwrap();
        assert_eq!(back, r);
    }
}

//! Deterministic merging of entity revisions.
//!
//! Merging works in two parts:
//! 1. Key sets (and edge endpoints) are unioned, whatever the policy.
//!    Two different types is a [`GraphError::TypeConflict`].
//! 2. Content is combined field by field according to the [`MergePolicy`].
//!    Only top-level fields take part; nested values are replaced whole.
//!
//! A history is merged by sorting it chronologically and folding left, each
//! revision merged onto the result so far with its own policy.

use serde_json::Value;
use tangle_core::{
    sort_chronologically, Content, EntityKeySet, GraphEntity, GraphError, GraphResult,
    MergePolicy, Revision,
};

/// Union `incoming` into `existing`.
///
/// An untyped key set takes on the type of the other one. Two different
/// types cannot describe the same entity.
pub fn merge_keys(existing: &mut EntityKeySet, incoming: &EntityKeySet) -> GraphResult<()> {
    match (existing.entity_type(), incoming.entity_type()) {
        (Some(a), Some(b)) if a != b => {
            return Err(GraphError::TypeConflict {
                existing: Some(a.to_string()),
                incoming: Some(b.to_string()),
            })
        }
        (None, Some(b)) => existing.adopt_type(b)?,
        _ => {}
    }
    existing.add_uids(incoming.uids().iter().cloned());
    existing.add_names(incoming.names().iter().cloned());
    Ok(())
}

/// Combine content under `policy`. `keys` only labels a conflict error.
pub fn merge_content(
    policy: MergePolicy,
    existing: &Content,
    incoming: &Content,
    keys: &EntityKeySet,
) -> GraphResult<Content> {
    match policy {
        MergePolicy::None => Ok(existing.clone()),
        MergePolicy::Err => Err(GraphError::MergeConflict {
            keys: keys.to_string(),
        }),
        MergePolicy::AppendNewLeaveExisting => {
            let mut merged = existing.clone();
            for (field, value) in incoming {
                if value.is_null() {
                    continue;
                }
                let missing = merged.get(field).map_or(true, Value::is_null);
                if missing {
                    merged.insert(field.clone(), value.clone());
                }
            }
            Ok(merged)
        }
        MergePolicy::AppendNewOverwriteExisting => {
            let mut merged = existing.clone();
            for (field, value) in incoming {
                if !value.is_null() {
                    merged.insert(field.clone(), value.clone());
                }
            }
            Ok(merged)
        }
        MergePolicy::OverwriteAll => Ok(incoming.clone()),
    }
}

/// Merge `incoming` onto `existing`.
pub fn merge<E: GraphEntity>(policy: MergePolicy, existing: &E, incoming: &E) -> GraphResult<E> {
    let mut merged = existing.clone();
    merge_keys(merged.keys_mut(), incoming.keys())?;
    merged.merge_references(incoming)?;
    let content = merge_content(policy, existing.content(), incoming.content(), existing.keys())?;
    *merged.content_mut() = content;
    Ok(merged)
}

/// Fold a revision history into one entity, or `None` for no revisions.
///
/// The first revision in chronological order is the base; its policy is not
/// consulted.
pub fn fold<E: GraphEntity>(mut revisions: Vec<Revision<E>>) -> GraphResult<Option<E>> {
    sort_chronologically(&mut revisions);
    let mut iter = revisions.into_iter();
    let Some(first) = iter.next() else {
        return Ok(None);
    };
    let mut acc = first.entity;
    for rev in iter {
        acc = merge(rev.merge_policy, &acc, &rev.entity)?;
    }
    Ok(Some(acc))
}

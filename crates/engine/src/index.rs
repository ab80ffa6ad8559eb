//! Key index definitions and identity query construction.
//!
//! Every collection holding keyed entities carries three single-field
//! indexes: `keys.uids`, `keys.names` and `keys.type`. Edge collections carry
//! the same three for each endpoint (`from.*`, `to.*`).
//!
//! There is no compound type + name index. Multikey compound indexes degrade
//! into collection scans on common document stores, so name lookups go
//! through the names index and the type is checked afterwards.

use serde_json::Value;
use tangle_core::{EntityKeySet, EntityKind, GraphError, GraphResult};
use tangle_storage::{DocumentStore, Filter};

/// Field holding an entity's own key set.
pub const KEYS: &str = "keys";
/// Field holding an edge's source key set.
pub const FROM: &str = "from";
/// Field holding an edge's destination key set.
pub const TO: &str = "to";

/// Dotted paths of the three key fields under a prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyFields {
    /// `<prefix>.type`
    pub entity_type: String,
    /// `<prefix>.uids`
    pub uids: String,
    /// `<prefix>.names`
    pub names: String,
}

impl KeyFields {
    /// Key fields under `prefix` (`keys`, `from` or `to`).
    pub fn under(prefix: &str) -> Self {
        Self {
            entity_type: format!("{prefix}.type"),
            uids: format!("{prefix}.uids"),
            names: format!("{prefix}.names"),
        }
    }

    /// The three paths, in index creation order.
    pub fn all(&self) -> [&str; 3] {
        [&self.uids, &self.names, &self.entity_type]
    }
}

// =============================================================================
// Index maintenance
// =============================================================================

/// Create the three key indexes under `prefix`. Idempotent.
pub fn ensure_key_indexes(
    store: &dyn DocumentStore,
    collection: &str,
    prefix: &str,
) -> GraphResult<()> {
    for field in KeyFields::under(prefix).all() {
        store.ensure_index(collection, field)?;
    }
    Ok(())
}

/// Create every index an entity collection needs: its own keys, and for
/// edges both endpoints.
pub fn ensure_entity_indexes(
    store: &dyn DocumentStore,
    collection: &str,
    kind: EntityKind,
) -> GraphResult<()> {
    ensure_key_indexes(store, collection, KEYS)?;
    if kind == EntityKind::Edge {
        ensure_key_indexes(store, collection, FROM)?;
        ensure_key_indexes(store, collection, TO)?;
    }
    Ok(())
}

// =============================================================================
// Query construction
// =============================================================================

fn strings<'a>(values: impl IntoIterator<Item = &'a String>) -> Vec<Value> {
    values.into_iter().map(|s| Value::String(s.clone())).collect()
}

/// Documents whose key set under `prefix` holds any of `uids`.
pub fn any_uid(prefix: &str, uids: impl IntoIterator<Item = impl AsRef<str>>) -> Filter {
    Filter::In(
        KeyFields::under(prefix).uids,
        uids.into_iter()
            .map(|u| Value::String(u.as_ref().to_string()))
            .collect(),
    )
}

/// Documents whose key set under `prefix` holds any of `names`, whatever
/// their type.
pub fn any_name(prefix: &str, names: impl IntoIterator<Item = impl AsRef<str>>) -> Filter {
    Filter::In(
        KeyFields::under(prefix).names,
        names
            .into_iter()
            .map(|n| Value::String(n.as_ref().to_string()))
            .collect(),
    )
}

/// Documents whose key set under `prefix` has the given type.
pub fn of_type(prefix: &str, entity_type: &str) -> Filter {
    Filter::eq(KeyFields::under(prefix).entity_type, entity_type)
}

/// Documents addressed by `keys` under `prefix`: any shared UID, or any
/// shared name together with the same type.
///
/// Fails with [`GraphError::InvalidKey`] if `keys` has no usable identifier.
pub fn addressed_by(prefix: &str, keys: &EntityKeySet) -> GraphResult<Filter> {
    let fields = KeyFields::under(prefix);
    let mut branches = Vec::with_capacity(2);
    if !keys.uids().is_empty() {
        branches.push(Filter::In(fields.uids.clone(), strings(keys.uids())));
    }
    if !keys.names().is_empty() {
        if let Some(t) = keys.entity_type() {
            branches.push(Filter::And(vec![
                Filter::In(fields.names.clone(), strings(keys.names())),
                Filter::eq(fields.entity_type.clone(), t),
            ]));
        }
    }
    if branches.is_empty() {
        return Err(GraphError::invalid_key(format!(
            "{prefix} key set {keys} has no UID and no typed name"
        )));
    }
    Ok(Filter::or(branches))
}

/// Edges between `from` and `to`, matching however each endpoint was
/// addressed when the edge was written.
///
/// The result is a disjunction over uid->uid, uid->name, name->uid and
/// name->name, leaving out combinations an endpoint has no identifiers for.
pub fn between(from: &EntityKeySet, to: &EntityKeySet) -> GraphResult<Filter> {
    let from_sides = endpoint_sides(FROM, from);
    let to_sides = endpoint_sides(TO, to);
    if from_sides.is_empty() || to_sides.is_empty() {
        return Err(GraphError::invalid_key(format!(
            "edge endpoints {from} -> {to} need a UID or a typed name each"
        )));
    }
    let mut combos = Vec::with_capacity(from_sides.len() * to_sides.len());
    for f in &from_sides {
        for t in &to_sides {
            let mut clauses = f.clone();
            clauses.extend(t.iter().cloned());
            combos.push(Filter::And(clauses));
        }
    }
    Ok(Filter::or(combos))
}

/// Conjunction clauses for each way an endpoint can be addressed.
fn endpoint_sides(prefix: &str, keys: &EntityKeySet) -> Vec<Vec<Filter>> {
    let fields = KeyFields::under(prefix);
    let mut sides = Vec::with_capacity(2);
    if !keys.uids().is_empty() {
        sides.push(vec![Filter::In(fields.uids.clone(), strings(keys.uids()))]);
    }
    if let (false, Some(t)) = (keys.names().is_empty(), keys.entity_type()) {
        sides.push(vec![
            Filter::In(fields.names.clone(), strings(keys.names())),
            Filter::eq(fields.entity_type.clone(), t),
        ]);
    }
    sides
}

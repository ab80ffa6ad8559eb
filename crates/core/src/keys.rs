//! Multi-valued entity identity.
//!
//! A graph entity has no single primary key. Producers may refer to the same
//! gene as `uid:ENSG00000012048` in one file and as `Gene/BRCA1` in another.
//! [`EntityKeySet`] carries every identifier known for one logical entity:
//! an optional type, a set of globally unique UIDs and a set of names that
//! are only unique within the type.
//!
//! Identifiers are append-only. There is no removal operation; identity
//! grows as revisions are merged and never shrinks.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{GraphError, GraphResult};

/// The identity of one logical graph entity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityKeySet {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    entity_type: Option<String>,
    #[serde(default)]
    uids: BTreeSet<String>,
    #[serde(default)]
    names: BTreeSet<String>,
}

impl EntityKeySet {
    /// An untyped key set with no identifiers.
    pub fn new() -> Self {
        Self::default()
    }

    /// An empty key set of the given type.
    pub fn create(entity_type: impl Into<String>) -> Self {
        Self {
            entity_type: Some(entity_type.into()),
            ..Self::default()
        }
    }

    /// Key set addressing an entity by a single UID, type unknown.
    pub fn for_uid(uid: impl Into<String>) -> Self {
        let mut keys = Self::new();
        keys.add_uid(uid);
        keys
    }

    /// Key set addressing an entity by `type` + `name`.
    pub fn for_name(entity_type: impl Into<String>, name: impl Into<String>) -> Self {
        let mut keys = Self::create(entity_type);
        keys.add_name(name);
        keys
    }

    /// Builder form of [`add_uid`](Self::add_uid).
    pub fn with_uid(mut self, uid: impl Into<String>) -> Self {
        self.add_uid(uid);
        self
    }

    /// Builder form of [`add_name`](Self::add_name).
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.add_name(name);
        self
    }

    /// The entity type, if known.
    pub fn entity_type(&self) -> Option<&str> {
        self.entity_type.as_deref()
    }

    /// All UIDs.
    pub fn uids(&self) -> &BTreeSet<String> {
        &self.uids
    }

    /// All names (unique within [`entity_type`](Self::entity_type)).
    pub fn names(&self) -> &BTreeSet<String> {
        &self.names
    }

    /// Add a UID. Returns `true` if it was not already present.
    pub fn add_uid(&mut self, uid: impl Into<String>) -> bool {
        self.uids.insert(uid.into())
    }

    /// Add several UIDs.
    pub fn add_uids<I, S>(&mut self, uids: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.uids.extend(uids.into_iter().map(Into::into));
    }

    /// Add a name. Returns `true` if it was not already present.
    pub fn add_name(&mut self, name: impl Into<String>) -> bool {
        self.names.insert(name.into())
    }

    /// Add several names.
    pub fn add_names<I, S>(&mut self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.names.extend(names.into_iter().map(Into::into));
    }

    /// Union the identifiers of `other` into this key set.
    ///
    /// Both key sets must carry the same type (including both being
    /// untyped), otherwise [`GraphError::IdentityMismatch`] is returned and
    /// `self` is left untouched.
    pub fn import_identity(&mut self, other: &EntityKeySet) -> GraphResult<()> {
        if self.entity_type != other.entity_type {
            return Err(GraphError::IdentityMismatch {
                expected: self.entity_type.clone(),
                found: other.entity_type.clone(),
            });
        }
        self.uids.extend(other.uids.iter().cloned());
        self.names.extend(other.names.iter().cloned());
        Ok(())
    }

    /// Set the type of an untyped key set.
    ///
    /// A type, once known, is part of the identity and cannot change.
    pub fn adopt_type(&mut self, entity_type: &str) -> GraphResult<()> {
        match &self.entity_type {
            None => {
                self.entity_type = Some(entity_type.to_string());
                Ok(())
            }
            Some(existing) if existing == entity_type => Ok(()),
            Some(existing) => Err(GraphError::TypeConflict {
                existing: Some(existing.clone()),
                incoming: Some(entity_type.to_string()),
            }),
        }
    }

    /// True if both key sets refer to the same logical entity.
    ///
    /// Types must match unless `ignore_type` is set, and the UID sets or the
    /// name sets must intersect.
    pub fn same_entity_as(&self, other: &EntityKeySet, ignore_type: bool) -> bool {
        if !ignore_type && self.entity_type != other.entity_type {
            return false;
        }
        !self.uids.is_disjoint(&other.uids) || !self.names.is_disjoint(&other.names)
    }

    /// True if the key set carries no identifier at all.
    pub fn is_empty(&self) -> bool {
        self.uids.is_empty() && self.names.is_empty()
    }

    /// True if `other`'s identifiers are all contained in this key set.
    pub fn covers(&self, other: &EntityKeySet) -> bool {
        other.uids.is_subset(&self.uids) && other.names.is_subset(&self.names)
    }

    /// Check the persisted-form invariants: at least one identifier, no
    /// blank identifiers, and a type whenever names are present.
    pub fn validate(&self) -> GraphResult<()> {
        if self.is_empty() {
            return Err(GraphError::invalid_key(
                "key set must contain at least one UID or name",
            ));
        }
        if !self.names.is_empty() && self.entity_type.as_deref().map_or(true, str::is_empty) {
            return Err(GraphError::invalid_key(format!(
                "key set with names {:?} must specify a type",
                self.names
            )));
        }
        if self.uids.iter().chain(self.names.iter()).any(|s| s.is_empty()) {
            return Err(GraphError::invalid_key("identifiers must not be empty strings"));
        }
        Ok(())
    }
}

impl fmt::Display for EntityKeySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{{uids={:?}, names={:?}}}",
            self.entity_type.as_deref().unwrap_or("?"),
            self.uids,
            self.names
        )
    }
}

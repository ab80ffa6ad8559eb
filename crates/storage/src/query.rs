//! Query and update model understood by every [`DocumentStore`].
//!
//! [`DocumentStore`]: crate::DocumentStore

use serde_json::Value;

use crate::document::{set_path, unset_path, values_at, Document, ID_FIELD};

/// A predicate over documents.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Every document.
    All,
    /// Some value at the path equals the given value.
    Eq(String, Value),
    /// Some value at the path equals one of the given values.
    In(String, Vec<Value>),
    /// The path holds a non-null value.
    Exists(String),
    /// Every clause matches. An empty conjunction matches everything.
    And(Vec<Filter>),
    /// At least one clause matches. An empty disjunction matches nothing.
    Or(Vec<Filter>),
}

impl Filter {
    /// `path == value`.
    pub fn eq(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Eq(path.into(), value.into())
    }

    /// `path` holds any of `values`.
    pub fn any_of<I, V>(path: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Filter::In(path.into(), values.into_iter().map(Into::into).collect())
    }

    /// `path` is present and non-null.
    pub fn exists(path: impl Into<String>) -> Self {
        Filter::Exists(path.into())
    }

    /// Match the document with this id.
    pub fn id(id: impl Into<String>) -> Self {
        Filter::Eq(ID_FIELD.to_string(), Value::String(id.into()))
    }

    /// Conjunction, flattening trivial cases.
    pub fn and(mut clauses: Vec<Filter>) -> Self {
        clauses.retain(|c| *c != Filter::All);
        match clauses.len() {
            0 => Filter::All,
            1 => clauses.remove(0),
            _ => Filter::And(clauses),
        }
    }

    /// Disjunction, flattening the single-clause case.
    pub fn or(mut clauses: Vec<Filter>) -> Self {
        if clauses.len() == 1 {
            clauses.remove(0)
        } else {
            Filter::Or(clauses)
        }
    }

    /// Evaluate the filter against a document.
    pub fn matches(&self, doc: &Document) -> bool {
        match self {
            Filter::All => true,
            Filter::Eq(path, value) => values_at(doc, path).into_iter().any(|v| v == value),
            Filter::In(path, values) => values_at(doc, path)
                .into_iter()
                .any(|v| values.iter().any(|candidate| candidate == v)),
            Filter::Exists(path) => values_at(doc, path).into_iter().any(|v| !v.is_null()),
            Filter::And(clauses) => clauses.iter().all(|c| c.matches(doc)),
            Filter::Or(clauses) => clauses.iter().any(|c| c.matches(doc)),
        }
    }
}

/// A modification applied to a single document.
#[derive(Debug, Clone, PartialEq)]
pub enum Update {
    /// Set a (possibly nested) field.
    Set(String, Value),
    /// Remove a (possibly nested) field.
    Unset(String),
    /// Replace the whole document, keeping its id.
    Replace(Document),
    /// Apply several updates in order.
    Many(Vec<Update>),
}

impl Update {
    /// `$set` shorthand.
    pub fn set(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Update::Set(path.into(), value.into())
    }

    /// Apply to a document in place. The `_id` field is never changed.
    pub fn apply(&self, doc: &mut Document) {
        match self {
            Update::Set(path, value) => {
                if path != ID_FIELD {
                    set_path(doc, path, value.clone());
                }
            }
            Update::Unset(path) => {
                if path != ID_FIELD {
                    unset_path(doc, path);
                }
            }
            Update::Replace(replacement) => {
                let id = doc.remove(ID_FIELD);
                *doc = replacement.clone();
                doc.remove(ID_FIELD);
                if let Some(id) = id {
                    doc.insert(ID_FIELD.to_string(), id);
                }
            }
            Update::Many(updates) => {
                for u in updates {
                    u.apply(doc);
                }
            }
        }
    }
}

/// How a store intends to evaluate a filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryPlan {
    /// Look up the given index.
    IndexScan {
        /// Indexed field.
        field: String,
    },
    /// Intersect several index scans (conjunction).
    Intersect(Vec<QueryPlan>),
    /// Union several index scans (disjunction).
    Union(Vec<QueryPlan>),
    /// Nothing can match.
    Empty,
    /// Visit every document.
    FullScan,
}

impl QueryPlan {
    /// True unless the plan visits every document.
    pub fn uses_index(&self) -> bool {
        !matches!(self, QueryPlan::FullScan)
    }

    /// Indexed fields the plan touches.
    pub fn index_fields(&self) -> Vec<&str> {
        match self {
            QueryPlan::IndexScan { field } => vec![field.as_str()],
            QueryPlan::Intersect(plans) | QueryPlan::Union(plans) => {
                plans.iter().flat_map(|p| p.index_fields()).collect()
            }
            QueryPlan::Empty | QueryPlan::FullScan => Vec::new(),
        }
    }
}

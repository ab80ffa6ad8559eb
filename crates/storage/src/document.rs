//! Document representation and dotted-path access.
//!
//! Paths follow document-database conventions: `keys.uids` walks into the
//! `keys` object and then the `uids` field. When a path crosses an array,
//! every element is visited, and a terminal array contributes each of its
//! elements rather than the array itself.

use serde_json::{Map, Value};

/// A stored document: a JSON object.
pub type Document = Map<String, Value>;

/// Field holding the document id.
pub const ID_FIELD: &str = "_id";

/// The document id, if it is a string.
pub fn document_id(doc: &Document) -> Option<&str> {
    doc.get(ID_FIELD).and_then(Value::as_str)
}

/// All values reachable at `path`, with terminal arrays flattened.
pub fn values_at<'a>(doc: &'a Document, path: &str) -> Vec<&'a Value> {
    let mut out = Vec::new();
    let mut segments = path.split('.');
    if let Some(first) = segments.next() {
        let rest: Vec<&str> = segments.collect();
        if let Some(v) = doc.get(first) {
            collect(v, &rest, &mut out);
        }
    }
    out
}

fn collect<'a>(value: &'a Value, rest: &[&str], out: &mut Vec<&'a Value>) {
    match (rest.split_first(), value) {
        (None, Value::Array(items)) => out.extend(items.iter()),
        (None, v) => out.push(v),
        (Some((head, tail)), Value::Object(map)) => {
            if let Some(v) = map.get(*head) {
                collect(v, tail, out);
            }
        }
        (Some(_), Value::Array(items)) => {
            for item in items {
                collect(item, rest, out);
            }
        }
        (Some(_), _) => {}
    }
}

/// Set `path` to `value`, creating intermediate objects as needed.
///
/// A non-object value standing where an intermediate object is required is
/// replaced.
pub fn set_path(doc: &mut Document, path: &str, value: Value) {
    let segments: Vec<&str> = path.split('.').collect();
    let Some((last, parents)) = segments.split_last() else {
        return;
    };
    let mut current = doc;
    for seg in parents {
        let slot = current
            .entry((*seg).to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if !slot.is_object() {
            *slot = Value::Object(Map::new());
        }
        current = match slot {
            Value::Object(map) => map,
            _ => return,
        };
    }
    current.insert((*last).to_string(), value);
}

/// Remove `path`. Returns the removed value.
pub fn unset_path(doc: &mut Document, path: &str) -> Option<Value> {
    let segments: Vec<&str> = path.split('.').collect();
    let (last, parents) = segments.split_last()?;
    let mut current = doc;
    for seg in parents {
        current = current.get_mut(*seg)?.as_object_mut()?;
    }
    current.remove(*last)
}

/// Key under which a scalar is stored in a secondary index.
///
/// Strings are tagged so that `"1"` and `1` land under different keys.
pub fn index_key(value: &Value) -> String {
    match value {
        Value::String(s) => format!("s:{s}"),
        other => format!("j:{other}"),
    }
}

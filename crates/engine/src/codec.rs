//! Conversion between typed records and store documents.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tangle_core::{GraphError, GraphResult};
use tangle_storage::Document;

/// Serialize a record into a document. The record must serialize to a JSON
/// object.
pub fn to_document<T: Serialize>(value: &T) -> GraphResult<Document> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        other => Err(GraphError::serialization(format!(
            "expected a JSON object, got {other}"
        ))),
    }
}

/// Deserialize a document into a record.
pub fn from_document<T: DeserializeOwned>(doc: Document) -> GraphResult<T> {
    serde_json::from_value(Value::Object(doc)).map_err(GraphError::from)
}

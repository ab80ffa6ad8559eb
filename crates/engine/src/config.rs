//! Graph store configuration.
//!
//! Configuration can be built in code with the builder methods or loaded from
//! a `tangle.toml` file:
//!
//! ```toml
//! nodes_collection = "nodes"
//! edges_collection = "edges"
//! revlog_collection = "revisions"
//! insert_mode = "consistency"
//! storage_mode = "revisions"
//! ```

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tangle_core::{GraphError, GraphResult};

/// Conventional file name for persisted configuration.
pub const CONFIG_FILE: &str = "tangle.toml";

/// Whether inserts check for identity collisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsertMode {
    /// Check every insert for identifiers already owned by another entity.
    #[default]
    Consistency,
    /// Skip collision checks for bulk loading throughput.
    Performance,
}

/// How entities are laid out in their collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageMode {
    /// One immutable document per revision; entities are merged at read time.
    #[default]
    Revisions,
    /// One document per entity, merged at write time. No history.
    DirectWrite,
}

/// Settings for one graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    /// Collection holding node documents.
    pub nodes_collection: String,
    /// Collection holding edge documents.
    pub edges_collection: String,
    /// Collection holding the revision (transaction) log.
    pub revlog_collection: String,
    /// Collision checking on insert.
    pub insert_mode: InsertMode,
    /// Revision-per-document or direct-write layout.
    pub storage_mode: StorageMode,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            nodes_collection: "nodes".to_string(),
            edges_collection: "edges".to_string(),
            revlog_collection: "revisions".to_string(),
            insert_mode: InsertMode::default(),
            storage_mode: StorageMode::default(),
        }
    }
}

impl GraphConfig {
    /// Default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the insert mode.
    pub fn insert_mode(mut self, mode: InsertMode) -> Self {
        self.insert_mode = mode;
        self
    }

    /// Set the storage mode.
    pub fn storage_mode(mut self, mode: StorageMode) -> Self {
        self.storage_mode = mode;
        self
    }

    /// Prefix every collection name, e.g. to keep several graphs in one store.
    pub fn collection_prefix(mut self, prefix: &str) -> Self {
        self.nodes_collection = format!("{prefix}{}", self.nodes_collection);
        self.edges_collection = format!("{prefix}{}", self.edges_collection);
        self.revlog_collection = format!("{prefix}{}", self.revlog_collection);
        self
    }

    /// Collection names must be non-empty and pairwise distinct.
    pub fn validate(&self) -> GraphResult<()> {
        let names = [
            &self.nodes_collection,
            &self.edges_collection,
            &self.revlog_collection,
        ];
        if names.iter().any(|n| n.is_empty()) {
            return Err(GraphError::Config("collection names must not be empty".into()));
        }
        if names[0] == names[1] || names[0] == names[2] || names[1] == names[2] {
            return Err(GraphError::Config(format!(
                "collection names must be distinct, got {names:?}"
            )));
        }
        Ok(())
    }

    /// Parse and validate TOML configuration. Missing keys take defaults.
    pub fn from_toml_str(s: &str) -> GraphResult<Self> {
        let config: GraphConfig =
            toml::from_str(s).map_err(|e| GraphError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Render as TOML.
    pub fn to_toml_string(&self) -> GraphResult<String> {
        toml::to_string(self).map_err(|e| GraphError::Config(e.to_string()))
    }

    /// Load from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> GraphResult<Self> {
        Self::from_toml_str(&fs::read_to_string(path)?)
    }

    /// Write to a TOML file.
    pub fn save(&self, path: impl AsRef<Path>) -> GraphResult<()> {
        fs::write(path, self.to_toml_string()?)?;
        Ok(())
    }
}

//! Core types for the Tangle graph store.
//!
//! This crate holds the vocabulary every other layer speaks:
//! - [`EntityKeySet`]: multi-valued entity identity
//! - [`Node`], [`Edge`] and their JSON [`Content`]
//! - [`MergePolicy`] and [`GraphOperation`]
//! - [`Revision`]: immutable, chronologically ordered mutation records
//! - [`GraphError`]: the single error type

#![warn(missing_docs)]

pub mod entity;
pub mod error;
pub mod keys;
pub mod operation;
pub mod policy;
pub mod revision;

pub use entity::{Content, Edge, EntityKind, EntityState, GraphEntity, Node, Resolved};
pub use error::{GraphError, GraphResult};
pub use keys::EntityKeySet;
pub use operation::{EdgeUpdate, GraphOperation, NodeUpdate};
pub use policy::MergePolicy;
pub use revision::{new_id, now_millis, sort_chronologically, Revision};

//! Graph Model Test Suite
//!
//! End-to-end tests through the public `tangledb` API.
//!
//! ## Test Tiers
//!
//! - **Tier 1**: Identity and merge laws
//! - **Tier 2**: Repository reads and writes, edge addressing
//! - **Tier 3**: Revision log transactions and listeners
//! - **Tier 4**: Storage and insert modes, persistence
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test --test graph_model
//! ```

// Test modules
mod test_utils;

// Tier 1: Identity and merge laws
mod tier1_identity;
mod tier1_merge;

// Tier 2: Repository behaviour
mod tier2_edges;
mod tier2_repository;

// Tier 3: Revision log
mod tier3_revision_log;

// Tier 4: Modes and persistence
mod tier4_modes;

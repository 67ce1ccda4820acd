//! # Address Manager - New/Tried Bucket System
//!
//! Implements Bitcoin's `addrman` pattern for Eclipse Attack resistance.
//!
//! ## Design (Bitcoin-Inspired)
//!
//! - **New Table**: Addresses heard about but never successfully connected to
//! - **Tried Table**: Addresses we've successfully connected to
//!
//! ## Anti-Eclipse Properties
//!
//! 1. Keyed two-stage bucketing bounds how many buckets one source group reaches
//! 2. Segregation prevents poisoning Tried with unverified addresses
//! 3. Tried evictions can wait for the incumbent to be tested (collisions)
//!
//! Reference: Bitcoin Core's `addrman.h`

// Semantic submodules
mod bucket;
mod config;
mod manager;
mod security;
mod snapshot;
mod table;
mod types;

// Re-export public API
pub use bucket::{BucketPlacement, TableKind};
pub use config::{
    AddressManagerConfig, BUCKET_SIZE, MAX_COLLISIONS, MAX_NEW_REFS_PER_RECORD, NEW_BUCKET_COUNT,
    NEW_GROUPS_PER_SOURCE, TRIED_BUCKET_COUNT, TRIED_GROUPS_PER_KEY,
};
pub use manager::AddressManager;
pub use security::{keyed_hash64, NodeKey, NODE_KEY_LEN};
pub use snapshot::{AddressManagerSnapshot, RecordSnapshot, SlotSnapshot, SNAPSHOT_VERSION};
pub use table::BucketMatrix;
pub use types::{AddressManagerStats, AddressRecord, RecordId};

//! # Peer Address Manager
//!
//! **Subsystem ID:** 1
//!
//! This crate keeps the node's book of candidate peer addresses, split into
//! a "new" table (heard about via gossip) and a "tried" table (connected to
//! successfully), following Bitcoin Core's `addrman` design.
//!
//! ## Anti-Eclipse Design
//!
//! - Bucket placement is keyed by a per-node secret, so an attacker cannot
//!   target specific buckets
//! - One source group reaches a bounded number of new buckets, one address
//!   group a bounded number of tried buckets
//! - Tried evictions can wait until the incumbent has been test-connected
//!
//! ## Architecture
//!
//! The crate follows Hexagonal Architecture with:
//! - **Domain Layer:** Identity, keyed placement, the table store
//! - **Ports Layer:** Trait definitions for consumers and external dependencies
//! - **Service Layer:** Single-lock concurrency wrapper with an injected clock
//! - **Adapters Layer:** System clock, TOML config, snapshot files (feature-gated)
//!
//! ## Example
//!
//! ```rust
//! use qc_01_address_manager::{AddressManager, AddressManagerConfig, PeerAddress, Timestamp};
//!
//! let mut manager = AddressManager::with_seed(AddressManagerConfig::for_testing(), 7).unwrap();
//! let now = Timestamp::new(1_700_000_000);
//!
//! let peer: PeerAddress = "1.2.3.4:8444".parse().unwrap();
//! let source: PeerAddress = "5.6.7.8:8444".parse().unwrap();
//!
//! // Gossip puts the address in the new table
//! assert!(manager.upsert_source(&peer, &source, 0, now).unwrap());
//!
//! // A successful connection promotes it to the tried table
//! manager.mark_good(&peer, false, now).unwrap();
//! assert_eq!(manager.stats().tried_count, 1);
//! ```

// =============================================================================
// CORE MODULES
// =============================================================================

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod service;

/// Test utilities (ManualTimeSource)
/// Requires feature: `test-utils`
#[cfg(feature = "test-utils")]
pub mod test_utils;

// =============================================================================
// CORE RE-EXPORTS (Always Available)
// =============================================================================

// Domain entities
pub use domain::{AddressManagerError, AddressManagerResult, IpAddr, PeerAddress, Timestamp};

// Address manager
pub use domain::{
    AddressManager, AddressManagerConfig, AddressManagerSnapshot, AddressManagerStats,
    AddressRecord, BucketPlacement, NodeKey, RecordId, TableKind,
};

// Port traits
pub use ports::{AddressManagerApi, ConfigProvider, SnapshotStore, StoreError, TimeSource};

// Service
pub use service::AddressManagerService;

// Adapters
pub use adapters::{StaticConfigProvider, SystemTimeSource};

#[cfg(feature = "toml-config")]
pub use adapters::{ConfigError, TomlConfigProvider};

#[cfg(feature = "persistence")]
pub use adapters::FileSnapshotStore;

// =============================================================================
// TEST UTILITIES (Requires `test-utils` feature)
// =============================================================================

#[cfg(feature = "test-utils")]
pub use test_utils::ManualTimeSource;

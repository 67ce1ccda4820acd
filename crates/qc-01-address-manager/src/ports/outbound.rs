//! # Driven Ports (Outbound SPI)
//!
//! These are the interfaces the address manager **requires** the host
//! application to implement.

use thiserror::Error;

use crate::domain::{AddressManagerConfig, AddressManagerSnapshot, PeerAddress, Timestamp};

/// Abstract interface for time-related operations.
///
/// Enables deterministic testing by injecting controllable time sources.
/// Production implementations use system time; tests use manual clocks.
pub trait TimeSource: Send + Sync {
    /// Get the current timestamp.
    fn now(&self) -> Timestamp;
}

/// Abstract interface for configuration loading.
///
/// Allows different configuration sources (file, environment, etc.)
pub trait ConfigProvider: Send + Sync {
    /// Table dimensions and policy thresholds.
    fn address_manager_config(&self) -> AddressManagerConfig;

    /// Addresses to seed an empty table with.
    fn seed_peers(&self) -> Vec<PeerAddress>;
}

/// Durable storage for address manager snapshots.
pub trait SnapshotStore: Send + Sync {
    /// Persist `snapshot`, replacing any previous one.
    fn save(&self, snapshot: &AddressManagerSnapshot) -> Result<(), StoreError>;

    /// Load the last saved snapshot, `None` if nothing was saved yet.
    fn load(&self) -> Result<Option<AddressManagerSnapshot>, StoreError>;
}

/// Errors from snapshot storage.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// File I/O error.
    #[error("Snapshot I/O failed for {path}: {error}")]
    Io {
        /// Path of the snapshot file.
        path: String,
        /// Error message from the I/O operation.
        error: String,
    },
    /// Snapshot bytes could not be encoded or decoded.
    #[error("Snapshot encoding failed: {0}")]
    Codec(String),
}

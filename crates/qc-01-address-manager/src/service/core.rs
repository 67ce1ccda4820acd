use std::sync::Arc;

use parking_lot::Mutex;
use tracing::info;

use crate::domain::{
    AddressManager, AddressManagerConfig, AddressManagerError, AddressManagerResult,
    AddressManagerSnapshot, Timestamp,
};
use crate::ports::{SnapshotStore, StoreError, TimeSource};

/// Address Manager Service implementing the driving port.
///
/// Every operation locks the whole table for its duration. Selection and
/// gossip sampling mutate the shuffle order and the random state, so even
/// "read" operations need exclusive access.
///
/// # Example
///
/// ```rust,ignore
/// use std::sync::Arc;
/// use qc_01_address_manager::{AddressManagerApi, AddressManagerConfig, AddressManagerService, SystemTimeSource};
///
/// let service = AddressManagerService::new(
///     AddressManagerConfig::default(),
///     Arc::new(SystemTimeSource::new()),
/// )?;
/// let peer = service.select_peer(false)?;
/// ```
pub struct AddressManagerService {
    /// The underlying table store (domain layer)
    pub(crate) inner: Mutex<AddressManager>,
    /// Time source for operations requiring timestamps
    pub(crate) time_source: Arc<dyn TimeSource>,
}

impl AddressManagerService {
    /// Create a service around a fresh manager with a random node key.
    pub fn new(
        config: AddressManagerConfig,
        time_source: Arc<dyn TimeSource>,
    ) -> AddressManagerResult<Self> {
        Ok(Self::with_manager(AddressManager::new(config)?, time_source))
    }

    /// Wrap an existing manager (seeded or restored).
    pub fn with_manager(manager: AddressManager, time_source: Arc<dyn TimeSource>) -> Self {
        Self {
            inner: Mutex::new(manager),
            time_source,
        }
    }

    /// Get the current timestamp from the time source.
    pub(crate) fn now(&self) -> Timestamp {
        self.time_source.now()
    }

    /// Capture the complete table state under the lock.
    pub fn snapshot(&self) -> AddressManagerSnapshot {
        self.inner.lock().snapshot()
    }

    /// Replace the table state with `snapshot`.
    ///
    /// The current configuration must match the snapshot's dimensions. On
    /// error the existing state is kept.
    pub fn restore(&self, snapshot: &AddressManagerSnapshot) -> AddressManagerResult<()> {
        let mut guard = self.inner.lock();
        let restored = AddressManager::from_snapshot(guard.config().clone(), snapshot)?;
        *guard = restored;
        info!(
            addresses = snapshot.records.len(),
            "[qc-01] Restored address table from snapshot"
        );
        Ok(())
    }

    /// Persist the current state to `store`.
    pub fn save_to(&self, store: &dyn SnapshotStore) -> Result<(), StoreError> {
        let snapshot = self.snapshot();
        store.save(&snapshot)
    }

    /// Restore from `store` if it holds a snapshot.
    ///
    /// Returns `false` when the store is empty.
    pub fn load_from(&self, store: &dyn SnapshotStore) -> AddressManagerResult<bool> {
        let snapshot = store
            .load()
            .map_err(|e| AddressManagerError::Snapshot(e.to_string()))?;
        match snapshot {
            Some(snapshot) => self.restore(&snapshot).map(|()| true),
            None => Ok(false),
        }
    }

    /// Verify the table's structural invariants.
    pub fn check_invariants(&self) -> AddressManagerResult<()> {
        self.inner.lock().check_invariants()
    }

    /// Number of known addresses.
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    /// Whether no address is known.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}

//! # Driving Ports (Inbound API)
//!
//! These are the public APIs the address manager exposes to the node's
//! connection logic and gossip handlers.

use std::time::Duration;

use crate::domain::{
    AddressManagerError, AddressManagerResult, AddressManagerStats, AddressRecord, PeerAddress,
};

/// Primary API for interacting with the address manager.
///
/// All methods take `&self`: implementations serialize access internally,
/// so one instance can be shared between tasks behind an `Arc`. The
/// current time is taken from the implementation's clock.
///
/// # Example
///
/// ```rust,ignore
/// use qc_01_address_manager::ports::AddressManagerApi;
///
/// fn dial_next<T: AddressManagerApi>(api: &T) {
///     if let Ok(Some(record)) = api.select_peer(false) {
///         println!("dialing {}", record.address());
///     }
/// }
/// ```
pub trait AddressManagerApi: Send + Sync {
    /// Register addresses gossiped by `source`.
    ///
    /// `penalty` ages the stored `last_seen` of addresses relayed by a
    /// third party. Returns how many previously unknown addresses were kept.
    fn add_addresses(
        &self,
        addresses: &[PeerAddress],
        source: &PeerAddress,
        penalty: Duration,
    ) -> AddressManagerResult<usize>;

    /// Record a successful connection.
    ///
    /// With `test_before_evict`, an occupied Tried slot produces a pending
    /// collision instead of an immediate eviction.
    fn mark_good(&self, address: &PeerAddress, test_before_evict: bool) -> AddressManagerResult<()>;

    /// Record a connection attempt; `count_failure` counts it against the address.
    fn record_attempt(&self, address: &PeerAddress, count_failure: bool) -> AddressManagerResult<()>;

    /// Settle pending Tried collisions.
    fn resolve_collisions(&self) -> AddressManagerResult<()>;

    /// A Tried incumbent that should be test-connected to settle a collision.
    fn pick_collision_candidate(&self) -> AddressManagerResult<Option<AddressRecord>>;

    /// Choose an address to connect to.
    fn select_peer(&self, new_only: bool) -> AddressManagerResult<Option<AddressRecord>>;

    /// A random sample of addresses suitable for gossip.
    fn get_addresses(&self) -> AddressManagerResult<Vec<AddressRecord>>;

    /// Note that the node is currently connected to `address`.
    fn record_connected(&self, address: &PeerAddress) -> AddressManagerResult<()>;

    /// Update the advertised service bits of a known address.
    fn set_services(&self, _address: &PeerAddress, _services: u64) -> AddressManagerResult<()> {
        Err(AddressManagerError::NotImplemented("set_services"))
    }

    /// Table statistics.
    fn stats(&self) -> AddressManagerStats;
}

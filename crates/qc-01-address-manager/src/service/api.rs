use std::time::Duration;

use crate::domain::{AddressManagerResult, AddressManagerStats, AddressRecord, PeerAddress};
use crate::ports::AddressManagerApi;
use crate::service::AddressManagerService;

impl AddressManagerApi for AddressManagerService {
    fn add_addresses(
        &self,
        addresses: &[PeerAddress],
        source: &PeerAddress,
        penalty: Duration,
    ) -> AddressManagerResult<usize> {
        let now = self.now();
        self.inner
            .lock()
            .add_addresses(addresses, source, penalty.as_secs(), now)
    }

    fn mark_good(&self, address: &PeerAddress, test_before_evict: bool) -> AddressManagerResult<()> {
        let now = self.now();
        self.inner.lock().mark_good(address, test_before_evict, now)
    }

    fn record_attempt(&self, address: &PeerAddress, count_failure: bool) -> AddressManagerResult<()> {
        let now = self.now();
        self.inner.lock().record_attempt(address, count_failure, now)
    }

    fn resolve_collisions(&self) -> AddressManagerResult<()> {
        let now = self.now();
        self.inner.lock().resolve_collisions(now)
    }

    fn pick_collision_candidate(&self) -> AddressManagerResult<Option<AddressRecord>> {
        self.inner.lock().pick_collision_candidate()
    }

    fn select_peer(&self, new_only: bool) -> AddressManagerResult<Option<AddressRecord>> {
        let now = self.now();
        self.inner.lock().select_peer(new_only, now)
    }

    fn get_addresses(&self) -> AddressManagerResult<Vec<AddressRecord>> {
        let now = self.now();
        self.inner.lock().get_addresses(now)
    }

    fn record_connected(&self, address: &PeerAddress) -> AddressManagerResult<()> {
        let now = self.now();
        self.inner.lock().record_connected(address, now)
    }

    fn stats(&self) -> AddressManagerStats {
        self.inner.lock().stats()
    }
}

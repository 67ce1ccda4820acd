//! # Service Flows
//!
//! Gossip, dial and feedback cycles driven through `AddressManagerApi`,
//! including a restart through the on-disk snapshot store.

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use qc_01_address_manager::{
        AddressManager, AddressManagerApi, AddressManagerConfig, AddressManagerService,
        FileSnapshotStore, IpAddr, ManualTimeSource, PeerAddress, Timestamp,
    };

    // =============================================================================
    // TEST FIXTURES
    // =============================================================================

    const START: u64 = 1_700_000_000;

    fn service_with_clock(seed: u64) -> (Arc<AddressManagerService>, Arc<ManualTimeSource>) {
        let clock = Arc::new(ManualTimeSource::new(START));
        let manager = AddressManager::with_seed(AddressManagerConfig::default(), seed).unwrap();
        let service = AddressManagerService::with_manager(manager, clock.clone());
        (Arc::new(service), clock)
    }

    fn peer(a: u8, b: u8, c: u8) -> PeerAddress {
        PeerAddress::new(IpAddr::v4(a, b, c, 1), 8444)
    }

    // =============================================================================
    // GOSSIP → DIAL → PROMOTE
    // =============================================================================

    #[test]
    fn test_gossiped_address_is_dialed_and_promoted() {
        let (service, clock) = service_with_clock(1);
        let target: PeerAddress = "1.2.3.4:8444".parse().unwrap();
        let source: PeerAddress = "5.6.7.8:8444".parse().unwrap();

        assert_eq!(
            service.add_addresses(&[target], &source, Duration::ZERO).unwrap(),
            1
        );
        assert_eq!(service.stats().new_count, 1);

        let dial = service.select_peer(false).unwrap().unwrap();
        assert_eq!(dial.address(), &target);
        assert_eq!(dial.source(), &source);

        clock.advance(5);
        service.record_attempt(&target, true).unwrap();
        clock.advance(5);
        service.mark_good(&target, true).unwrap();

        let stats = service.stats();
        assert_eq!(stats.tried_count, 1);
        assert_eq!(stats.new_count, 0);
        assert_eq!(stats.total, 1);

        // Only the tried table holds anything now
        assert!(service.select_peer(true).unwrap().is_none());
        let promoted = service.select_peer(false).unwrap().unwrap();
        assert_eq!(promoted.last_success(), Some(Timestamp::new(START + 10)));
        assert_eq!(promoted.attempts(), 0);

        let gossip = service.get_addresses().unwrap();
        assert_eq!(gossip.len(), 1);
        assert_eq!(gossip[0].address(), &target);
    }

    #[test]
    fn test_unknown_addresses_are_ignored_by_feedback() {
        let (service, _clock) = service_with_clock(2);
        let stranger = peer(9, 9, 9);

        service.mark_good(&stranger, false).unwrap();
        service.record_attempt(&stranger, true).unwrap();
        service.record_connected(&stranger).unwrap();

        assert!(service.is_empty());
        assert!(service.select_peer(false).unwrap().is_none());
        assert!(service.get_addresses().unwrap().is_empty());
    }

    #[test]
    fn test_failed_dials_make_address_unsendable() {
        let (service, clock) = service_with_clock(3);
        let target = peer(1, 2, 3);
        service
            .add_addresses(&[target], &peer(5, 6, 7), Duration::ZERO)
            .unwrap();

        // A failure only counts once per good cycle, so some other peer
        // must connect between attempts.
        for i in 0..3u8 {
            clock.advance(120);
            service.record_attempt(&target, true).unwrap();
            clock.advance(1);
            service.mark_good(&peer(40 + i, i, 0), false).unwrap();
        }
        clock.advance(120);

        let record = service.select_peer(false).unwrap().unwrap();
        assert_eq!(record.attempts(), 3);

        let gossip = service.get_addresses().unwrap();
        assert!(gossip.iter().all(|r| r.address() != &target));
        service.check_invariants().unwrap();
    }

    // =============================================================================
    // CONCURRENT CALLERS
    // =============================================================================

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_tasks_share_one_service() {
        let (service, clock) = service_with_clock(4);

        let mut handles = Vec::new();
        for worker in 0..8u8 {
            let service = Arc::clone(&service);
            let clock = Arc::clone(&clock);
            handles.push(tokio::spawn(async move {
                let source = peer(200, worker, 0);
                for i in 0..200u8 {
                    let target = peer(10 + (i % 50), worker, i);
                    service
                        .add_addresses(&[target], &source, Duration::from_secs(60))
                        .unwrap();
                    if i % 3 == 0 {
                        service.mark_good(&target, i % 2 == 0).unwrap();
                    }
                    if i % 7 == 0 {
                        service.select_peer(false).unwrap();
                        service.resolve_collisions().unwrap();
                        clock.advance(30);
                    }
                    tokio::task::yield_now().await;
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        service.check_invariants().unwrap();
        let stats = service.stats();
        assert_eq!(stats.total, stats.new_count + stats.tried_count);
        assert!(stats.tried_count > 0);
    }

    // =============================================================================
    // RESTART
    // =============================================================================

    #[test]
    fn test_restart_from_snapshot_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSnapshotStore::new(dir.path().join("peers.dat"));

        let (before, clock) = service_with_clock(5);
        for i in 0..100u8 {
            before
                .add_addresses(&[peer(20 + i, i, 1)], &peer(5, i % 8, 0), Duration::ZERO)
                .unwrap();
        }
        for i in 0..10u8 {
            before.mark_good(&peer(20 + i, i, 1), false).unwrap();
        }
        before.save_to(&store).unwrap();

        let after = AddressManagerService::new(AddressManagerConfig::default(), clock).unwrap();
        assert!(after.load_from(&store).unwrap());

        assert_eq!(after.stats(), before.stats());
        assert_eq!(after.snapshot(), before.snapshot());
        after.check_invariants().unwrap();
    }
}

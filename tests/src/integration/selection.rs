//! # Selection Behaviour
//!
//! Statistical checks on `select_peer` and `get_addresses` over many draws.

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use qc_01_address_manager::{
        AddressManager, AddressManagerApi, AddressManagerConfig, AddressManagerService, IpAddr,
        ManualTimeSource, PeerAddress, Timestamp,
    };

    const START: u64 = 1_700_000_000;

    fn service(seed: u64) -> (AddressManagerService, Arc<ManualTimeSource>) {
        let clock = Arc::new(ManualTimeSource::new(START));
        let manager = AddressManager::with_seed(AddressManagerConfig::for_testing(), seed).unwrap();
        (AddressManagerService::with_manager(manager, clock.clone()), clock)
    }

    #[test]
    fn test_tables_are_chosen_evenly() {
        let (service, clock) = service(21);
        let tried: PeerAddress = "1.2.3.4:8444".parse().unwrap();
        let fresh: PeerAddress = "9.8.7.6:8444".parse().unwrap();
        let source: PeerAddress = "5.6.7.8:8444".parse().unwrap();

        // Promote first so the two never compete for a new slot
        service.add_addresses(&[tried], &source, Duration::ZERO).unwrap();
        service.mark_good(&tried, false).unwrap();
        service.add_addresses(&[fresh], &source, Duration::ZERO).unwrap();

        // Past the hot-retry window of the promoted peer
        clock.advance(3_600);

        let stats = service.stats();
        assert_eq!((stats.tried_count, stats.new_count), (1, 1));

        let mut tried_hits = 0;
        for _ in 0..10_000 {
            let picked = service.select_peer(false).unwrap().unwrap();
            if picked.address() == &tried {
                tried_hits += 1;
            } else {
                assert_eq!(picked.address(), &fresh);
            }
        }
        assert!(
            (4_500..=5_500).contains(&tried_hits),
            "tried picked {tried_hits} times out of 10000"
        );
    }

    #[test]
    fn test_equally_fresh_addresses_are_sampled_uniformly() {
        let mut manager =
            AddressManager::with_seed(AddressManagerConfig::for_testing(), 24).unwrap();
        let now = Timestamp::new(START);
        let source: PeerAddress = "5.6.7.8:8444".parse().unwrap();

        let kept: Vec<_> = (0..8u8)
            .map(|i| PeerAddress::new(IpAddr::v4(40 + i, i, 1, 1), 8444))
            .filter(|addr| manager.upsert_source(addr, &source, 0, now).unwrap())
            .collect();
        // Later inserts may have displaced earlier ones
        let kept: Vec<_> = kept.into_iter().filter(|a| manager.get(a).is_some()).collect();
        assert!(!kept.is_empty());
        for addr in &kept {
            assert_eq!(manager.get(addr).unwrap().ref_count(), 1);
        }

        let draws = 10_000;
        let mut hits = vec![0u32; kept.len()];
        for _ in 0..draws {
            let picked = manager.select_peer(false, now).unwrap().unwrap();
            let index = kept.iter().position(|a| a == picked.address()).unwrap();
            hits[index] += 1;
        }

        let expected = draws as f64 / kept.len() as f64;
        for (addr, &count) in kept.iter().zip(&hits) {
            let deviation = (count as f64 - expected).abs() / expected;
            assert!(deviation < 0.2, "{addr} picked {count} times, expected ~{expected}");
        }
    }

    #[test]
    fn test_gossip_sample_is_bounded_and_distinct() {
        let (service, _clock) = service(22);
        let source: PeerAddress = "5.6.7.8:8444".parse().unwrap();
        let batch: Vec<_> = (0..2_000u32)
            .map(|i| PeerAddress::new(IpAddr::v4(10 + (i % 200) as u8, (i / 200) as u8, 3, 4), 8444))
            .collect();
        service.add_addresses(&batch, &source, Duration::ZERO).unwrap();

        let total = service.stats().total;
        let sample = service.get_addresses().unwrap();
        assert_eq!(sample.len(), (total * 23).div_ceil(100));

        let mut seen: Vec<_> = sample.iter().map(|r| *r.address()).collect();
        seen.sort();
        seen.dedup();
        assert_eq!(seen.len(), sample.len());
    }

    #[test]
    fn test_new_only_never_returns_tried() {
        let (service, _clock) = service(23);
        let source: PeerAddress = "5.6.7.8:8444".parse().unwrap();
        let peers: Vec<_> = (0..50u8)
            .map(|i| PeerAddress::new(IpAddr::v4(30 + i, i, 1, 1), 8444))
            .collect();
        service.add_addresses(&peers, &source, Duration::ZERO).unwrap();
        for addr in peers.iter().step_by(2) {
            service.mark_good(addr, false).unwrap();
        }

        for _ in 0..500 {
            if let Some(record) = service.select_peer(true).unwrap() {
                assert!(!record.is_tried());
            }
        }
    }
}

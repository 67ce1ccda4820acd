//! # Tried Poisoning
//!
//! The tried table only fills through `mark_good`, i.e. through real
//! connections. An attacker who gets some of its addresses connected still
//! lands in at most `tried_groups_per_key` buckets per /16, and with
//! test-before-evict it cannot displace an incumbent that answered recently.

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use qc_01_address_manager::{
        AddressManager, AddressManagerConfig, IpAddr, PeerAddress, TableKind, Timestamp,
    };

    const NOW: Timestamp = Timestamp::new(1_700_000_000);

    #[test]
    fn test_gossip_alone_never_reaches_tried() {
        let mut manager =
            AddressManager::with_seed(AddressManagerConfig::default(), 0x7001).unwrap();
        for relay in 0..50u8 {
            let source = PeerAddress::new(IpAddr::v4(66, relay, 0, 1), 8444);
            let batch: Vec<_> = (0..100u8)
                .map(|i| PeerAddress::new(IpAddr::v4(77, relay, i, 1), 8444))
                .collect();
            manager.add_addresses(&batch, &source, 0, NOW).unwrap();
        }

        let stats = manager.stats();
        assert!(stats.new_count > 0);
        assert_eq!(stats.tried_count, 0);
    }

    #[test]
    fn test_one_group_is_confined_to_few_tried_buckets() {
        let config = AddressManagerConfig::default();
        let fan_out = config.tried_groups_per_key;
        let mut manager = AddressManager::with_seed(config, 0x7002).unwrap();

        // Attacker addresses all in 77.77.0.0/16, relayed by many networks
        let attackers: Vec<_> = (0..=255u8)
            .map(|i| PeerAddress::new(IpAddr::v4(77, 77, i, 1), 8444))
            .collect();
        for (i, addr) in attackers.iter().enumerate() {
            let relay = PeerAddress::new(IpAddr::v4(20 + (i % 200) as u8, 1, 1, 1), 8444);
            manager.upsert_source(addr, &relay, 0, NOW).unwrap();
        }
        for addr in &attackers {
            manager.mark_good(addr, false, NOW).unwrap();
        }
        assert!(manager.stats().tried_count > 0);

        let placement = manager.placement();
        let buckets: HashSet<_> = attackers
            .iter()
            .filter(|addr| manager.get(addr).is_some_and(|r| r.is_tried()))
            .map(|addr| placement.tried_bucket(addr))
            .collect();
        assert!(buckets.len() <= fan_out);
        manager.check_invariants().unwrap();
    }

    #[test]
    fn test_recently_good_incumbent_survives_collision() {
        let mut manager =
            AddressManager::with_seed(AddressManagerConfig::for_testing(), 0x7003).unwrap();
        let source: PeerAddress = "8.8.8.8:8444".parse().unwrap();

        let honest: PeerAddress = "1.2.3.4:8444".parse().unwrap();
        manager.upsert_source(&honest, &source, 0, NOW).unwrap();
        manager.mark_good(&honest, true, NOW).unwrap();

        let placement = manager.placement().clone();
        let position = |addr: &PeerAddress| {
            let bucket = placement.tried_bucket(addr);
            (bucket, placement.bucket_slot(addr, TableKind::Tried, bucket))
        };
        let target = position(&honest);

        // Search the attacker's space for an address aimed at the same slot
        let attacker = (0..=255u8)
            .flat_map(|a| (0..=255u8).map(move |b| PeerAddress::new(IpAddr::v4(a, b, 9, 9), 8444)))
            .filter(|addr| addr != &honest && position(addr) == target)
            .find(|addr| manager.upsert_source(addr, &source, 0, NOW).unwrap_or(false))
            .unwrap();

        manager.mark_good(&attacker, true, NOW.add_secs(5)).unwrap();
        assert_eq!(manager.stats().pending_collisions, 1);
        assert_eq!(
            manager.pick_collision_candidate().unwrap().unwrap().address(),
            &honest
        );

        manager.resolve_collisions(NOW.add_secs(10)).unwrap();

        assert_eq!(manager.stats().pending_collisions, 0);
        assert!(manager.get(&honest).unwrap().is_tried());
        assert!(!manager.get(&attacker).unwrap().is_tried());
        assert_eq!(manager.tried_slot(target.0, target.1), manager.record_id(&honest));
    }
}

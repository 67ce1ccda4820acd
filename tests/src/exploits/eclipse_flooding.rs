//! # Eclipse Flooding
//!
//! An attacker controlling one source network gossips as many fabricated
//! addresses as it likes. Keyed two-stage placement must confine everything
//! it sends to `new_groups_per_source` buckets, leaving the rest of the new
//! table to honest sources.

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use qc_01_address_manager::{
        AddressManager, AddressManagerConfig, IpAddr, PeerAddress, Timestamp,
    };

    const NOW: Timestamp = Timestamp::new(1_700_000_000);

    fn occupied_new_buckets(manager: &AddressManager) -> HashSet<usize> {
        let config = manager.config();
        (0..config.new_bucket_count)
            .filter(|&bucket| {
                (0..config.bucket_size).any(|slot| manager.new_slot(bucket, slot).is_some())
            })
            .collect()
    }

    /// Addresses spread over many /16s, as a botnet would provide.
    fn fabricated(count: u32) -> Vec<PeerAddress> {
        (0..count)
            .map(|i| {
                let [_, a, b, c] = i.to_be_bytes();
                PeerAddress::new(IpAddr::v4(a.wrapping_add(11), b, c, 7), 8444)
            })
            .collect()
    }

    #[test]
    fn test_single_source_flood_stays_in_bounded_buckets() {
        let config = AddressManagerConfig::default();
        let fan_out = config.new_groups_per_source;
        let mut manager = AddressManager::with_seed(config, 0xEC11).unwrap();

        let attacker: PeerAddress = "66.66.1.1:8444".parse().unwrap();
        manager
            .add_addresses(&fabricated(20_000), &attacker, 0, NOW)
            .unwrap();

        let buckets = occupied_new_buckets(&manager);
        assert!(!buckets.is_empty());
        assert!(
            buckets.len() <= fan_out,
            "one source reached {} buckets",
            buckets.len()
        );
        assert!(manager.len() <= fan_out * manager.config().bucket_size);
        manager.check_invariants().unwrap();
    }

    #[test]
    fn test_rotating_hosts_in_one_source_group_do_not_help() {
        let config = AddressManagerConfig::default();
        let fan_out = config.new_groups_per_source;
        let mut manager = AddressManager::with_seed(config, 0xEC12).unwrap();

        // Every relay lives in 66.66.0.0/16
        let batch = fabricated(200);
        for host in 0..100u8 {
            let relay = PeerAddress::new(IpAddr::v4(66, 66, host, 1), 8444);
            manager.add_addresses(&batch, &relay, 0, NOW).unwrap();
        }

        assert!(occupied_new_buckets(&manager).len() <= fan_out);
        manager.check_invariants().unwrap();
    }

    #[test]
    fn test_flood_cannot_evict_honest_tried_peers() {
        let mut manager =
            AddressManager::with_seed(AddressManagerConfig::default(), 0xEC13).unwrap();

        let honest_source: PeerAddress = "8.8.8.8:8444".parse().unwrap();
        let honest: Vec<_> = (0..20u8)
            .map(|i| PeerAddress::new(IpAddr::v4(100 + i, i, 0, 1), 8444))
            .collect();
        for addr in &honest {
            manager.upsert_source(addr, &honest_source, 0, NOW).unwrap();
            manager.mark_good(addr, false, NOW).unwrap();
        }
        let tried_before: Vec<_> = honest
            .iter()
            .filter(|addr| manager.get(addr).is_some_and(|r| r.is_tried()))
            .copied()
            .collect();
        assert!(!tried_before.is_empty());

        let attacker: PeerAddress = "66.66.1.1:8444".parse().unwrap();
        manager
            .add_addresses(&fabricated(20_000), &attacker, 0, NOW)
            .unwrap();

        assert_eq!(manager.stats().tried_count, tried_before.len());
        for addr in &tried_before {
            assert!(manager.get(addr).unwrap().is_tried());
        }
    }
}

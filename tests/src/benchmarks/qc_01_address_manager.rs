//! # QC-01 Address Manager Benchmarks
//!
//! Hot paths of a busy node:
//! - Keyed placement (two SHA-256 rounds per bucket, one per slot)
//! - Gossip ingestion into full-size tables
//! - Peer selection over a populated table, including the retry walk
//! - Gossip sampling
//!
//! Brutal Conditions:
//! - Default table dimensions (1024 new + 256 tried buckets × 64 slots)
//! - Single-source floods that keep hitting occupied slots
//! - Mostly-failed records that push selection through many rejections

use criterion::{black_box, BenchmarkId, Criterion, Throughput};
use qc_01_address_manager::{
    AddressManager, AddressManagerConfig, IpAddr, PeerAddress, TableKind, Timestamp,
};
use rand::Rng;
use std::time::Duration;

const NOW: Timestamp = Timestamp::new(1_700_000_000);

fn random_peer<R: Rng>(rng: &mut R) -> PeerAddress {
    PeerAddress::new(IpAddr::v4(rng.gen(), rng.gen(), rng.gen(), rng.gen()), 8444)
}

/// Manager with `count` gossiped addresses from 256 sources and every
/// tenth one promoted.
fn populated(count: usize, seed: u64) -> AddressManager {
    let mut manager = AddressManager::with_seed(AddressManagerConfig::default(), seed)
        .expect("default config is valid");
    let mut rng = rand::thread_rng();
    let mut peers = Vec::with_capacity(count);
    for i in 0..count {
        let addr = random_peer(&mut rng);
        let source = PeerAddress::new(IpAddr::v4((i % 256) as u8, 1, 1, 1), 8444);
        manager.upsert_source(&addr, &source, 0, NOW).expect("insert");
        peers.push(addr);
    }
    for addr in peers.iter().step_by(10) {
        manager.mark_good(addr, false, NOW).expect("promote");
    }
    manager
}

pub fn brutal_placement(c: &mut Criterion) {
    let mut group = c.benchmark_group("qc-01/brutal/placement");
    group.measurement_time(Duration::from_secs(10));

    let manager = populated(0, 1);
    let placement = manager.placement();
    let addr: PeerAddress = "1.2.3.4:8444".parse().expect("literal");
    let source: PeerAddress = "5.6.7.8:8444".parse().expect("literal");

    group.bench_function("tried_bucket", |b| {
        b.iter(|| black_box(placement.tried_bucket(black_box(&addr))))
    });

    group.bench_function("new_bucket", |b| {
        b.iter(|| black_box(placement.new_bucket(black_box(&addr), black_box(&source))))
    });

    group.bench_function("bucket_slot", |b| {
        b.iter(|| black_box(placement.bucket_slot(black_box(&addr), TableKind::New, 17)))
    });

    group.finish();
}

pub fn brutal_ingestion(c: &mut Criterion) {
    let mut group = c.benchmark_group("qc-01/brutal/ingestion");
    group.measurement_time(Duration::from_secs(10));

    for size in [100usize, 1_000] {
        group.throughput(Throughput::Elements(size as u64));

        group.bench_with_input(BenchmarkId::new("spread_sources", size), &size, |b, &size| {
            let mut rng = rand::thread_rng();
            b.iter(|| {
                let mut manager = populated(0, 2);
                for i in 0..size {
                    let source = PeerAddress::new(IpAddr::v4((i % 251) as u8, 2, 2, 2), 8444);
                    manager
                        .upsert_source(&random_peer(&mut rng), &source, 0, NOW)
                        .expect("insert");
                }
                black_box(manager.len())
            })
        });

        // Adversarial: one source group, so every insert lands in 64 buckets
        group.bench_with_input(BenchmarkId::new("single_source_flood", size), &size, |b, &size| {
            let mut rng = rand::thread_rng();
            let attacker: PeerAddress = "66.66.1.1:8444".parse().expect("literal");
            b.iter(|| {
                let mut manager = populated(0, 3);
                let batch: Vec<_> = (0..size).map(|_| random_peer(&mut rng)).collect();
                black_box(manager.add_addresses(&batch, &attacker, 0, NOW).expect("flood"))
            })
        });
    }

    group.finish();
}

pub fn brutal_selection(c: &mut Criterion) {
    let mut group = c.benchmark_group("qc-01/brutal/selection");
    group.measurement_time(Duration::from_secs(10));

    let mut healthy = populated(10_000, 4);
    group.bench_function("select_peer_10k", |b| {
        b.iter(|| black_box(healthy.select_peer(false, NOW).expect("select")))
    });

    group.bench_function("select_new_only_10k", |b| {
        b.iter(|| black_box(healthy.select_peer(true, NOW).expect("select")))
    });

    // Every record recently tried and failing, so the walk must reject many times
    let mut failing = populated(2_000, 5);
    let addrs: Vec<_> = failing
        .get_addresses(NOW)
        .expect("sample")
        .iter()
        .map(|r| *r.address())
        .collect();
    let later = NOW.add_secs(30);
    for addr in &addrs {
        failing.record_attempt(addr, true, later).expect("attempt");
    }
    group.bench_function("select_peer_hot_retry", |b| {
        b.iter(|| black_box(failing.select_peer(false, later).expect("select")))
    });

    group.bench_function("get_addresses_10k", |b| {
        b.iter(|| black_box(healthy.get_addresses(NOW).expect("sample").len()))
    });

    group.finish();
}

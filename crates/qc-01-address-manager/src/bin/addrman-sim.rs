//! # Address Manager Simulation
//!
//! Drives an `AddressManagerService` with simulated gossip, outbound
//! dialing and collision testing running as concurrent tokio tasks.
//!
//! ## Environment
//!
//! - `QC_ADDRMAN_CONFIG` - optional TOML config file
//! - `QC_ADDRMAN_SNAPSHOT` - optional snapshot file, loaded at start and saved at exit
//! - `QC_ADDRMAN_PEERS` - size of the simulated network (default 2000)
//! - `RUST_LOG` - log filter (default `info`)

use std::env;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use qc_01_address_manager::{
    AddressManager, AddressManagerApi, AddressManagerService, ConfigProvider, FileSnapshotStore,
    IpAddr, ManualTimeSource, PeerAddress, StaticConfigProvider, SystemTimeSource, TimeSource,
    TomlConfigProvider,
};

const DEFAULT_PEERS: usize = 2_000;
const GOSSIP_ROUNDS: usize = 500;
const DIAL_ROUNDS: usize = 1_000;
const GOSSIP_BATCH: usize = 10;
const RELAY_PENALTY: Duration = Duration::from_secs(2 * 60 * 60);

/// Whether a simulated peer accepts connections.
fn reachable(addr: &PeerAddress) -> bool {
    addr.key().iter().map(|b| *b as u32).sum::<u32>() % 3 != 0
}

fn simulated_network(size: usize, seed: u64) -> Vec<PeerAddress> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..size)
        .map(|_| {
            PeerAddress::new(
                IpAddr::v4(rng.gen_range(1..224), rng.gen(), rng.gen(), rng.gen_range(1..255)),
                8444,
            )
        })
        .collect()
}

async fn gossip(service: Arc<AddressManagerService>, network: Arc<Vec<PeerAddress>>) -> Result<()> {
    let mut rng = StdRng::seed_from_u64(1);
    let mut added = 0;
    for _ in 0..GOSSIP_ROUNDS {
        let source = network[rng.gen_range(0..network.len())];
        let batch: Vec<PeerAddress> = (0..GOSSIP_BATCH)
            .map(|_| network[rng.gen_range(0..network.len())])
            .collect();
        added += service.add_addresses(&batch, &source, RELAY_PENALTY)?;
        tokio::task::yield_now().await;
    }
    info!(added, "[qc-01] Gossip finished");
    Ok(())
}

async fn dial(service: Arc<AddressManagerService>, clock: Arc<ManualTimeSource>) -> Result<()> {
    let (mut connected, mut failed) = (0usize, 0usize);
    for _ in 0..DIAL_ROUNDS {
        clock.advance(30);
        if let Some(record) = service.select_peer(false)? {
            let addr = *record.address();
            if reachable(&addr) {
                service.mark_good(&addr, true)?;
                service.record_connected(&addr)?;
                connected += 1;
            } else {
                service.record_attempt(&addr, true)?;
                failed += 1;
            }
        }
        tokio::task::yield_now().await;
    }
    info!(connected, failed, "[qc-01] Dialing finished");
    Ok(())
}

async fn test_collisions(service: Arc<AddressManagerService>) -> Result<()> {
    for _ in 0..DIAL_ROUNDS / 10 {
        if let Some(incumbent) = service.pick_collision_candidate()? {
            let addr = *incumbent.address();
            if reachable(&addr) {
                service.mark_good(&addr, false)?;
            } else {
                service.record_attempt(&addr, true)?;
            }
        }
        service.resolve_collisions()?;
        tokio::task::yield_now().await;
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let provider: Box<dyn ConfigProvider> = match env::var("QC_ADDRMAN_CONFIG") {
        Ok(path) => Box::new(
            TomlConfigProvider::load(&path).with_context(|| format!("loading config {path}"))?,
        ),
        Err(_) => Box::new(StaticConfigProvider::new()),
    };
    let peers = match env::var("QC_ADDRMAN_PEERS") {
        Ok(value) => value.parse().context("QC_ADDRMAN_PEERS must be a number")?,
        Err(_) => DEFAULT_PEERS,
    };
    let store = env::var("QC_ADDRMAN_SNAPSHOT").ok().map(FileSnapshotStore::new);

    let clock = Arc::new(ManualTimeSource::new(SystemTimeSource::new().now().as_secs()));
    let manager = AddressManager::new(provider.address_manager_config())?;
    let service = Arc::new(AddressManagerService::with_manager(manager, clock.clone()));

    if let Some(store) = &store {
        if service.load_from(store)? {
            info!(path = %store.path().display(), "[qc-01] Loaded snapshot");
        }
    }

    for seed in provider.seed_peers() {
        service.add_addresses(&[seed], &seed, Duration::ZERO)?;
    }

    let network = Arc::new(simulated_network(peers.max(1), 42));
    info!(peers = network.len(), "[qc-01] Starting address manager simulation");

    let (gossiped, dialed, tested) = tokio::join!(
        tokio::spawn(gossip(service.clone(), network.clone())),
        tokio::spawn(dial(service.clone(), clock.clone())),
        tokio::spawn(test_collisions(service.clone())),
    );
    gossiped??;
    dialed??;
    tested??;

    if let Err(e) = service.check_invariants() {
        warn!(error = %e, "[qc-01] Invariant check failed after simulation");
    }

    let stats = service.stats();
    let snapshot = service.snapshot();
    info!(
        new = stats.new_count,
        tried = stats.tried_count,
        collisions = stats.pending_collisions,
        key = %hex::encode(&snapshot.node_key[..4]),
        "[qc-01] Simulation complete"
    );

    if let Some(store) = &store {
        service.save_to(store)?;
        info!(path = %store.path().display(), "[qc-01] Saved snapshot");
    }
    Ok(())
}

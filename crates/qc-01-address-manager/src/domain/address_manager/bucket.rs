//! Bucket placement engine.
//!
//! Pure functions of the node key, the table dimensions and an address
//! (plus its source for the New table). Identical inputs always yield
//! identical placements.

use super::config::AddressManagerConfig;
use super::security::{keyed_hash64, NodeKey};
use crate::domain::PeerAddress;

/// Which table a slot position is computed for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TableKind {
    /// Addresses heard about but never confirmed.
    New,
    /// Addresses we have connected to.
    Tried,
}

impl TableKind {
    /// Domain-separation tag mixed into slot hashes.
    fn tag(self) -> u8 {
        match self {
            TableKind::New => b'N',
            TableKind::Tried => b'K',
        }
    }
}

/// Keyed, collision-resistant placement of addresses into buckets.
///
/// # Security (Anti-Eclipse)
///
/// Both bucket functions are two-stage: the first hash reduces to a small
/// fan-out (`tried_groups_per_key` / `new_groups_per_source`) and the second
/// spreads that over the table. An attacker controlling one group therefore
/// reaches at most that many buckets, whatever addresses it invents.
#[derive(Debug, Clone)]
pub struct BucketPlacement {
    key: NodeKey,
    tried_groups_per_key: u64,
    new_groups_per_source: u64,
    tried_bucket_count: u64,
    new_bucket_count: u64,
    bucket_size: u64,
}

impl BucketPlacement {
    /// Placement for the given key and (validated) table dimensions.
    pub fn new(key: NodeKey, config: &AddressManagerConfig) -> Self {
        Self {
            key,
            tried_groups_per_key: config.tried_groups_per_key as u64,
            new_groups_per_source: config.new_groups_per_source as u64,
            tried_bucket_count: config.tried_bucket_count as u64,
            new_bucket_count: config.new_bucket_count as u64,
            bucket_size: config.bucket_size as u64,
        }
    }

    /// The node key salting every placement.
    pub fn key(&self) -> &NodeKey {
        &self.key
    }

    /// Tried bucket for `addr`.
    pub fn tried_bucket(&self, addr: &PeerAddress) -> usize {
        let h1 = keyed_hash64(&self.key, &[&addr.key()]) % self.tried_groups_per_key;
        let h2 = keyed_hash64(&self.key, &[&addr.group(), &h1.to_be_bytes()]);
        (h2 % self.tried_bucket_count) as usize
    }

    /// New bucket for `addr` as introduced by `source`.
    pub fn new_bucket(&self, addr: &PeerAddress, source: &PeerAddress) -> usize {
        let source_group = source.group();
        let h1 = keyed_hash64(&self.key, &[&addr.group(), &source_group])
            % self.new_groups_per_source;
        let h2 = keyed_hash64(&self.key, &[&source_group, &h1.to_be_bytes()]);
        (h2 % self.new_bucket_count) as usize
    }

    /// Slot of `addr` inside `bucket` of the given table.
    pub fn bucket_slot(&self, addr: &PeerAddress, table: TableKind, bucket: usize) -> usize {
        let bucket_bytes = (bucket as u32).to_be_bytes();
        let h = keyed_hash64(&self.key, &[&[table.tag()], &bucket_bytes, &addr.key()]);
        (h % self.bucket_size) as usize
    }
}

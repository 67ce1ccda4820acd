//! Main AddressManager implementation.
//!
//! Reference: Bitcoin Core's `addrman.h` (`CAddrMan`)
//!
//! All methods here assume exclusive access; `AddressManagerService` wraps
//! the store in a single lock for concurrent callers.

use std::collections::HashMap;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, error, warn};

use super::bucket::{BucketPlacement, TableKind};
use super::config::AddressManagerConfig;
use super::security::NodeKey;
use super::snapshot::{AddressManagerSnapshot, RecordSnapshot, SlotSnapshot, SNAPSHOT_VERSION};
use super::table::BucketMatrix;
use super::types::{AddressManagerStats, AddressRecord, RecordId};
use crate::domain::errors::{AddressManagerError, AddressManagerResult};
use crate::domain::{PeerAddress, Timestamp};

/// Incumbent connected this recently wins a collision (seconds).
const REPLACEMENT_SECS: u64 = 4 * 60 * 60;
/// Incumbent gets this long to answer a test connection (seconds).
const TEST_GRACE_SECS: u64 = 60;
/// Contender without success for this long replaces the incumbent (seconds).
const TEST_WINDOW_SECS: u64 = 40 * 60;
/// `last_seen` refresh interval for addresses seen within a day (seconds).
const ONLINE_UPDATE_SECS: u64 = 60 * 60;
/// `last_seen` refresh interval otherwise (seconds).
const OFFLINE_UPDATE_SECS: u64 = 24 * 60 * 60;
/// `record_connected` refresh interval (seconds).
const CONNECTED_UPDATE_SECS: u64 = 20 * 60;
/// Selection acceptance factor growth per rejection.
const CHANCE_FACTOR_GROWTH: f64 = 1.2;

/// How a pending collision is settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Resolution {
    /// Forget the collision; the incumbent stays.
    Drop,
    /// Move the contender into Tried, evicting the incumbent.
    Promote,
    /// Keep waiting for more information.
    Pending,
}

/// Address manager with New/Tried segregation
///
/// # Anti-Eclipse Defense
///
/// 1. New addresses go to New table, bucketed by source group + address group
/// 2. Only after successful connection do addresses move to Tried table
/// 3. Tried evictions can be deferred (collisions) until the incumbent is tested
/// 4. Placement is keyed by a per-node secret, so buckets cannot be targeted
///
/// Records live in an arena keyed by `RecordId`; both bucket matrices and
/// the shuffle array store ids only.
#[derive(Debug)]
pub struct AddressManager {
    /// Configuration
    config: AddressManagerConfig,
    /// Keyed bucket placement
    placement: BucketPlacement,
    /// Randomness for stochastic acceptance and sampling
    rng: StdRng,
    /// Last id handed out
    last_id: u64,
    /// Record arena
    records: HashMap<RecordId, AddressRecord>,
    /// Address -> id (bijection with `records`)
    addr_index: HashMap<PeerAddress, RecordId>,
    /// Every live id; `AddressRecord::random_pos` indexes into this
    shuffle_order: Vec<RecordId>,
    /// Addresses we've successfully connected to
    tried_table: BucketMatrix,
    /// Addresses we've heard about but never connected to
    new_table: BucketMatrix,
    /// Records in the Tried table
    tried_count: usize,
    /// Records not in the Tried table
    new_count: usize,
    /// Contenders waiting for a Tried slot
    collisions: Vec<RecordId>,
    /// Last time any address was marked good
    last_good: Timestamp,
    /// Set once an invariant violation has been observed
    corrupted: bool,
}

impl AddressManager {
    /// Create an address manager with a fresh random node key.
    pub fn new(config: AddressManagerConfig) -> AddressManagerResult<Self> {
        let mut rng = StdRng::from_entropy();
        let key = NodeKey::random(&mut rng);
        Self::with_key(config, key, rng)
    }

    /// Create a fully deterministic manager (key and sampling derive from `seed`).
    pub fn with_seed(config: AddressManagerConfig, seed: u64) -> AddressManagerResult<Self> {
        let mut rng = StdRng::seed_from_u64(seed);
        let key = NodeKey::random(&mut rng);
        Self::with_key(config, key, rng)
    }

    /// Create a manager with an injected node key and random source.
    pub fn with_key(
        config: AddressManagerConfig,
        key: NodeKey,
        rng: StdRng,
    ) -> AddressManagerResult<Self> {
        config.validate()?;
        Ok(Self {
            placement: BucketPlacement::new(key, &config),
            rng,
            last_id: 0,
            records: HashMap::new(),
            addr_index: HashMap::new(),
            shuffle_order: Vec::new(),
            tried_table: BucketMatrix::new(config.tried_bucket_count, config.bucket_size),
            new_table: BucketMatrix::new(config.new_bucket_count, config.bucket_size),
            tried_count: 0,
            new_count: 0,
            collisions: Vec::new(),
            last_good: Timestamp::new(1),
            corrupted: false,
            config,
        })
    }

    // =========================================================================
    // Public operations
    // =========================================================================

    /// Register addresses gossiped by `source`.
    ///
    /// Returns how many previously unknown addresses were stored.
    pub fn add_addresses(
        &mut self,
        addresses: &[PeerAddress],
        source: &PeerAddress,
        penalty_secs: u64,
        now: Timestamp,
    ) -> AddressManagerResult<usize> {
        let mut added = 0;
        for addr in addresses {
            if self.upsert_source(addr, source, penalty_secs, now)? {
                added += 1;
            }
        }
        Ok(added)
    }

    /// Find or create the record for `addr` and try to reference it from
    /// the New bucket chosen by `source`.
    ///
    /// `penalty_secs` only ages the stored `last_seen`. Whether a repeat
    /// sighting carries news is judged against the unpenalized `now`.
    ///
    /// Returns `true` only when a new record was created and kept.
    pub fn upsert_source(
        &mut self,
        addr: &PeerAddress,
        source: &PeerAddress,
        penalty_secs: u64,
        now: Timestamp,
    ) -> AddressManagerResult<bool> {
        self.ensure_usable()?;
        let result = self.upsert_source_inner(addr, source, penalty_secs, now);
        self.latch(result)
    }

    /// Record a successful connection to `addr`.
    ///
    /// Moves the address to Tried, or registers a collision when
    /// `test_before_evict` is set and its Tried slot is taken.
    pub fn mark_good(
        &mut self,
        addr: &PeerAddress,
        test_before_evict: bool,
        now: Timestamp,
    ) -> AddressManagerResult<()> {
        self.ensure_usable()?;
        let result = self.mark_good_inner(addr, test_before_evict, now);
        self.latch(result)
    }

    /// Record a connection attempt to `addr`.
    pub fn record_attempt(
        &mut self,
        addr: &PeerAddress,
        count_failure: bool,
        now: Timestamp,
    ) -> AddressManagerResult<()> {
        self.ensure_usable()?;
        let last_good = self.last_good;
        let Some(id) = self.find(addr) else {
            return Ok(());
        };
        let record = match self.records.get_mut(&id) {
            Some(record) => record,
            None => return self.latch(Err(dangling(id))),
        };
        record.last_try = Some(now);
        if count_failure && record.last_counted_attempt.map_or(true, |t| t < last_good) {
            record.last_counted_attempt = Some(now);
            record.attempts = record.attempts.saturating_add(1);
        }
        Ok(())
    }

    /// Settle pending Tried collisions whose outcome is now known.
    pub fn resolve_collisions(&mut self, now: Timestamp) -> AddressManagerResult<()> {
        self.ensure_usable()?;
        let result = self.resolve_collisions_inner(now);
        self.latch(result)
    }

    /// A random Tried incumbent that some contender wants to evict.
    ///
    /// The caller is expected to test-connect to it and report back.
    pub fn pick_collision_candidate(&mut self) -> AddressManagerResult<Option<AddressRecord>> {
        self.ensure_usable()?;
        if self.collisions.is_empty() {
            return Ok(None);
        }

        let index = self.rng.gen_range(0..self.collisions.len());
        let contender = self.collisions[index];
        let Some(record) = self.records.get(&contender) else {
            self.collisions.swap_remove(index);
            return Ok(None);
        };

        let (bucket, slot) = self.tried_position(&record.address);
        match self.tried_table.get(bucket, slot) {
            None => Ok(None),
            Some(incumbent) => {
                let result = self
                    .records
                    .get(&incumbent)
                    .cloned()
                    .map(Some)
                    .ok_or_else(|| dangling(incumbent));
                self.latch(result)
            }
        }
    }

    /// Choose an address to connect to.
    pub fn select_peer(
        &mut self,
        new_only: bool,
        now: Timestamp,
    ) -> AddressManagerResult<Option<AddressRecord>> {
        self.ensure_usable()?;
        let result = self.select_peer_inner(new_only, now);
        self.latch(result)
    }

    /// A random sample of non-terrible addresses for gossip.
    pub fn get_addresses(&mut self, now: Timestamp) -> AddressManagerResult<Vec<AddressRecord>> {
        self.ensure_usable()?;
        let result = self.get_addresses_inner(now);
        self.latch(result)
    }

    /// Note that we are currently connected to `addr`.
    pub fn record_connected(
        &mut self,
        addr: &PeerAddress,
        now: Timestamp,
    ) -> AddressManagerResult<()> {
        self.ensure_usable()?;
        let Some(id) = self.find(addr) else {
            return Ok(());
        };
        let record = match self.records.get_mut(&id) {
            Some(record) => record,
            None => return self.latch(Err(dangling(id))),
        };
        if record
            .last_seen
            .map_or(true, |t| now.secs_since(t) > CONNECTED_UPDATE_SECS)
        {
            record.last_seen = Some(now);
        }
        Ok(())
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Get statistics
    pub fn stats(&self) -> AddressManagerStats {
        AddressManagerStats {
            new_count: self.new_count,
            tried_count: self.tried_count,
            total: self.records.len(),
            pending_collisions: self.collisions.len(),
            new_bucket_count: self.config.new_bucket_count,
            tried_bucket_count: self.config.tried_bucket_count,
        }
    }

    /// Number of known addresses.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether no address is known.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Record for `addr`, if known.
    pub fn get(&self, addr: &PeerAddress) -> Option<&AddressRecord> {
        self.find(addr).and_then(|id| self.records.get(&id))
    }

    /// Id of the record for `addr`, if known.
    pub fn record_id(&self, addr: &PeerAddress) -> Option<RecordId> {
        self.find(addr)
    }

    /// Occupant of a Tried slot.
    pub fn tried_slot(&self, bucket: usize, slot: usize) -> Option<RecordId> {
        self.tried_table.get(bucket, slot)
    }

    /// Occupant of a New slot.
    pub fn new_slot(&self, bucket: usize, slot: usize) -> Option<RecordId> {
        self.new_table.get(bucket, slot)
    }

    /// Bucket placement used by this manager.
    pub fn placement(&self) -> &BucketPlacement {
        &self.placement
    }

    /// Active configuration.
    pub fn config(&self) -> &AddressManagerConfig {
        &self.config
    }

    /// Contenders waiting for a Tried slot.
    pub fn pending_collisions(&self) -> &[RecordId] {
        &self.collisions
    }

    /// Whether an invariant violation has disabled this store.
    pub fn is_corrupted(&self) -> bool {
        self.corrupted
    }

    // =========================================================================
    // Internal table operations
    // =========================================================================

    fn ensure_usable(&self) -> AddressManagerResult<()> {
        if self.corrupted {
            return Err(AddressManagerError::Corrupted);
        }
        Ok(())
    }

    /// Latch the store as corrupted if `result` reports a violation.
    fn latch<T>(&mut self, result: AddressManagerResult<T>) -> AddressManagerResult<T> {
        if let Err(AddressManagerError::InvariantViolation(reason)) = &result {
            error!(%reason, "[qc-01] Address table corrupted; halting mutations");
            self.corrupted = true;
        }
        result
    }

    fn find(&self, addr: &PeerAddress) -> Option<RecordId> {
        self.addr_index.get(addr).copied()
    }

    fn record(&self, id: RecordId) -> AddressManagerResult<&AddressRecord> {
        self.records.get(&id).ok_or_else(|| dangling(id))
    }

    fn record_mut(&mut self, id: RecordId) -> AddressManagerResult<&mut AddressRecord> {
        self.records.get_mut(&id).ok_or_else(|| dangling(id))
    }

    fn tried_position(&self, addr: &PeerAddress) -> (usize, usize) {
        let bucket = self.placement.tried_bucket(addr);
        (bucket, self.placement.bucket_slot(addr, TableKind::Tried, bucket))
    }

    fn new_position(&self, addr: &PeerAddress, source: &PeerAddress) -> (usize, usize) {
        let bucket = self.placement.new_bucket(addr, source);
        (bucket, self.placement.bucket_slot(addr, TableKind::New, bucket))
    }

    /// Allocate a record and append it to the shuffle array.
    fn create(&mut self, addr: PeerAddress, source: PeerAddress) -> AddressManagerResult<RecordId> {
        self.last_id += 1;
        let id = RecordId::from_raw(self.last_id).ok_or_else(|| {
            AddressManagerError::InvariantViolation("record id space exhausted".to_string())
        })?;
        let record = AddressRecord::new(addr, source, self.shuffle_order.len());
        self.records.insert(id, record);
        self.addr_index.insert(addr, id);
        self.shuffle_order.push(id);
        Ok(id)
    }

    /// Swap two shuffle positions, keeping `random_pos` in sync.
    fn swap_random(&mut self, pos1: usize, pos2: usize) -> AddressManagerResult<()> {
        if pos1 == pos2 {
            return Ok(());
        }
        let out_of_range = || {
            AddressManagerError::InvariantViolation(format!(
                "shuffle positions {pos1}/{pos2} out of range"
            ))
        };
        let id1 = *self.shuffle_order.get(pos1).ok_or_else(out_of_range)?;
        let id2 = *self.shuffle_order.get(pos2).ok_or_else(out_of_range)?;

        self.record_mut(id1)?.random_pos = pos2;
        self.record_mut(id2)?.random_pos = pos1;
        self.shuffle_order.swap(pos1, pos2);
        Ok(())
    }

    /// Remove an unreferenced New record from every index.
    fn delete_record(&mut self, id: RecordId) -> AddressManagerResult<()> {
        let record = self.record(id)?;
        if record.is_tried || record.ref_count != 0 {
            return Err(AddressManagerError::InvariantViolation(format!(
                "deleting record {} that is still referenced",
                id.get()
            )));
        }
        let (pos, addr) = (record.random_pos, record.address);

        let last = self.shuffle_order.len().checked_sub(1).ok_or_else(|| {
            AddressManagerError::InvariantViolation("shuffle array is empty".to_string())
        })?;
        self.swap_random(pos, last)?;
        self.shuffle_order.pop();
        self.addr_index.remove(&addr);
        self.records.remove(&id);
        self.new_count = self.new_count.checked_sub(1).ok_or_else(|| {
            AddressManagerError::InvariantViolation("new count underflow".to_string())
        })?;
        debug!(address = %addr, "[qc-01] Deleted unreferenced address");
        Ok(())
    }

    /// Drop the occupant of a New slot, deleting it if this was its last reference.
    fn clear_new_slot(&mut self, bucket: usize, slot: usize) -> AddressManagerResult<()> {
        let Some(id) = self.new_table.take(bucket, slot) else {
            return Ok(());
        };
        let record = self.record_mut(id)?;
        if record.ref_count == 0 {
            return Err(AddressManagerError::InvariantViolation(format!(
                "record {} occupied a new slot with zero references",
                id.get()
            )));
        }
        record.ref_count -= 1;
        if record.ref_count == 0 {
            self.delete_record(id)?;
        }
        Ok(())
    }

    fn upsert_source_inner(
        &mut self,
        addr: &PeerAddress,
        source: &PeerAddress,
        penalty_secs: u64,
        now: Timestamp,
    ) -> AddressManagerResult<bool> {
        // self-announcements are not penalised
        let penalty = if addr == source { 0 } else { penalty_secs };
        let seen = now.sub_secs(penalty);

        let (id, created) = match self.find(addr) {
            Some(id) => {
                let max_refs = self.config.max_new_refs;
                let record = self.record_mut(id)?;

                let online = record
                    .last_seen
                    .is_some_and(|t| now.secs_since(t) < OFFLINE_UPDATE_SECS);
                let interval = if online {
                    ONLINE_UPDATE_SECS
                } else {
                    OFFLINE_UPDATE_SECS
                };
                if record
                    .last_seen
                    .map_or(true, |t| t < seen.sub_secs(interval))
                {
                    record.last_seen = Some(seen);
                }

                // no new information: the sighting itself is not newer than what we hold
                let has_news = record.last_seen.map_or(true, |t| now > t);
                if !has_news || record.is_tried || record.ref_count >= max_refs {
                    return Ok(false);
                }

                // stochastic test: previous ref_count == N: 2^N times harder to increase it
                let refs = record.ref_count;
                if refs > 0 && self.rng.gen_range(0..(1u64 << refs)) != 0 {
                    return Ok(false);
                }
                (id, false)
            }
            None => {
                let id = self.create(*addr, *source)?;
                self.record_mut(id)?.last_seen = Some(seen);
                self.new_count += 1;
                (id, true)
            }
        };

        let (bucket, slot) = self.new_position(addr, source);
        let occupant = self.new_table.get(bucket, slot);
        if occupant == Some(id) {
            return Ok(created);
        }

        let refs = self.record(id)?.ref_count;
        let insert = match occupant {
            None => true,
            Some(existing) => {
                let existing = self.record(existing)?;
                existing.is_terrible(now, &self.config) || (existing.ref_count > 1 && refs == 0)
            }
        };

        if insert {
            self.clear_new_slot(bucket, slot)?;
            self.record_mut(id)?.ref_count += 1;
            self.new_table.set(bucket, slot, id);
            debug!(address = %addr, source = %source, bucket, slot, "[qc-01] Placed address in new table");
            Ok(created)
        } else {
            if refs == 0 {
                self.delete_record(id)?;
            }
            Ok(false)
        }
    }

    fn mark_good_inner(
        &mut self,
        addr: &PeerAddress,
        test_before_evict: bool,
        now: Timestamp,
    ) -> AddressManagerResult<()> {
        self.last_good = now;

        let Some(id) = self.find(addr) else {
            return Ok(());
        };
        let record = self.record_mut(id)?;
        record.last_success = Some(now);
        record.last_try = Some(now);
        record.attempts = 0;
        // last_seen is not updated here, to avoid leaking information about
        // currently-connected peers.

        if record.is_tried {
            return Ok(());
        }
        let address = record.address;

        let in_new_table = (0..self.config.new_bucket_count).any(|bucket| {
            let slot = self.placement.bucket_slot(&address, TableKind::New, bucket);
            self.new_table.get(bucket, slot) == Some(id)
        });
        if !in_new_table {
            warn!(address = %address, "[qc-01] Good address missing from new table; not promoting");
            return Ok(());
        }

        let (bucket, slot) = self.tried_position(&address);
        if test_before_evict && self.tried_table.get(bucket, slot).is_some() {
            if self.collisions.len() < self.config.max_collisions && !self.collisions.contains(&id)
            {
                self.collisions.push(id);
                debug!(address = %address, bucket, slot, "[qc-01] Tried slot taken; collision pending");
            }
            return Ok(());
        }

        self.promote_to_tried(id)
    }

    /// Move a New record into its Tried slot, evicting any incumbent back to New.
    fn promote_to_tried(&mut self, id: RecordId) -> AddressManagerResult<()> {
        let address = self.record(id)?.address;

        // remove the entry from all new buckets
        let mut removed = 0u32;
        for bucket in 0..self.config.new_bucket_count {
            let slot = self.placement.bucket_slot(&address, TableKind::New, bucket);
            if self.new_table.get(bucket, slot) == Some(id) {
                self.new_table.take(bucket, slot);
                removed += 1;
            }
        }
        let record = self.record_mut(id)?;
        if record.ref_count != removed {
            return Err(AddressManagerError::InvariantViolation(format!(
                "record {} counted {} new references but {} slots held it",
                id.get(),
                record.ref_count,
                removed
            )));
        }
        record.ref_count = 0;
        self.new_count = self.new_count.checked_sub(1).ok_or_else(|| {
            AddressManagerError::InvariantViolation("new count underflow".to_string())
        })?;

        let (bucket, slot) = self.tried_position(&address);
        if let Some(evicted) = self.tried_table.take(bucket, slot) {
            let old = self.record_mut(evicted)?;
            old.is_tried = false;
            let (old_addr, old_source) = (old.address, old.source);
            self.tried_count = self.tried_count.checked_sub(1).ok_or_else(|| {
                AddressManagerError::InvariantViolation("tried count underflow".to_string())
            })?;

            let (new_bucket, new_slot) = self.new_position(&old_addr, &old_source);
            self.clear_new_slot(new_bucket, new_slot)?;
            self.record_mut(evicted)?.ref_count = 1;
            self.new_table.set(new_bucket, new_slot, evicted);
            self.new_count += 1;
            debug!(
                evicted = %old_addr,
                promoted = %address,
                bucket = new_bucket,
                slot = new_slot,
                "[qc-01] Evicted tried address back to new table"
            );
        }

        self.tried_table.set(bucket, slot, id);
        self.tried_count += 1;
        self.record_mut(id)?.is_tried = true;
        debug!(address = %address, bucket, slot, "[qc-01] Promoted address to tried table");
        Ok(())
    }

    fn resolve_collisions_inner(&mut self, now: Timestamp) -> AddressManagerResult<()> {
        let pending = self.collisions.clone();
        for id in pending {
            let resolution = self.collision_resolution(id, now)?;
            if resolution == Resolution::Promote {
                let address = self.records.get(&id).map(|r| r.address);
                if let Some(address) = address {
                    self.mark_good_inner(&address, false, now)?;
                }
            }
            if resolution != Resolution::Pending {
                self.collisions.retain(|c| *c != id);
            }
        }
        Ok(())
    }

    fn collision_resolution(&self, id: RecordId, now: Timestamp) -> AddressManagerResult<Resolution> {
        let Some(contender) = self.records.get(&id) else {
            return Ok(Resolution::Drop);
        };
        if contender.is_terrible(now, &self.config) {
            return Ok(Resolution::Drop);
        }

        let (bucket, slot) = self.tried_position(&contender.address);
        let Some(incumbent_id) = self.tried_table.get(bucket, slot) else {
            return Ok(Resolution::Promote);
        };
        let incumbent = self.record(incumbent_id)?;
        let since = |t: Option<Timestamp>| t.map(|t| now.secs_since(t));

        // has successfully connected in last X hours
        if since(incumbent.last_success).is_some_and(|s| s < REPLACEMENT_SECS) {
            return Ok(Resolution::Drop);
        }
        // attempted to connect and failed in last X hours
        if let Some(s) = since(incumbent.last_try).filter(|s| *s < REPLACEMENT_SECS) {
            // give the incumbent at least a minute to answer
            return Ok(if s > TEST_GRACE_SECS {
                Resolution::Promote
            } else {
                Resolution::Pending
            });
        }
        // the incumbent was never tested; stop waiting once the contender goes stale
        if since(contender.last_success).map_or(true, |s| s > TEST_WINDOW_SECS) {
            return Ok(Resolution::Promote);
        }
        Ok(Resolution::Pending)
    }

    fn select_peer_inner(
        &mut self,
        new_only: bool,
        now: Timestamp,
    ) -> AddressManagerResult<Option<AddressRecord>> {
        if self.shuffle_order.is_empty() {
            return Ok(None);
        }
        if new_only && self.new_count == 0 {
            return Ok(None);
        }

        // Use a 50% chance for choosing between tried and new table entries.
        let use_tried = !new_only
            && self.tried_count > 0
            && (self.new_count == 0 || self.rng.gen_bool(0.5));
        let table = if use_tried {
            &self.tried_table
        } else {
            &self.new_table
        };

        let mut chance_factor = 1.0;
        loop {
            let id = walk_to_occupied(table, &mut self.rng)?;
            let record = self.records.get(&id).ok_or_else(|| dangling(id))?;
            if self.rng.gen::<f64>() < chance_factor * record.selection_chance(now) {
                return Ok(Some(record.clone()));
            }
            chance_factor *= CHANCE_FACTOR_GROWTH;
        }
    }

    fn get_addresses_inner(&mut self, now: Timestamp) -> AddressManagerResult<Vec<AddressRecord>> {
        let total = self.shuffle_order.len();
        let limit = (total * self.config.get_addr_max_pct)
            .div_ceil(100)
            .min(self.config.get_addr_max);

        let mut out = Vec::with_capacity(limit);
        for n in 0..total {
            if out.len() >= limit {
                break;
            }
            let pick = self.rng.gen_range(n..total);
            self.swap_random(n, pick)?;
            let id = self.shuffle_order[n];
            let record = self.record(id)?;
            if !record.is_terrible(now, &self.config) {
                out.push(record.clone());
            }
        }
        Ok(out)
    }

    // =========================================================================
    // Consistency
    // =========================================================================

    /// Verify every structural invariant of the store.
    ///
    /// Checks the records/index bijection, shuffle positions, slot
    /// placements, tried/new exclusivity, reference counts and the cached
    /// counters.
    pub fn check_invariants(&self) -> AddressManagerResult<()> {
        let fail = |msg: String| Err(AddressManagerError::InvariantViolation(msg));

        if self.records.len() != self.addr_index.len()
            || self.records.len() != self.shuffle_order.len()
        {
            return fail(format!(
                "index sizes differ: records={} index={} shuffle={}",
                self.records.len(),
                self.addr_index.len(),
                self.shuffle_order.len()
            ));
        }

        for (pos, id) in self.shuffle_order.iter().enumerate() {
            let record = self.record(*id)?;
            if record.random_pos != pos {
                return fail(format!("record {} at shuffle {pos} thinks {}", id.get(), record.random_pos));
            }
            if self.addr_index.get(&record.address) != Some(id) {
                return fail(format!("address index disagrees for record {}", id.get()));
            }
        }

        let mut tried_refs: HashMap<RecordId, u32> = HashMap::new();
        for (bucket, slot, id) in self.tried_table.iter_occupied() {
            let record = self.record(id)?;
            if !record.is_tried || self.tried_position(&record.address) != (bucket, slot) {
                return fail(format!("record {} misplaced in tried table", id.get()));
            }
            *tried_refs.entry(id).or_insert(0) += 1;
        }

        let mut new_refs: HashMap<RecordId, u32> = HashMap::new();
        for (bucket, slot, id) in self.new_table.iter_occupied() {
            let record = self.record(id)?;
            let expected = self.placement.bucket_slot(&record.address, TableKind::New, bucket);
            if record.is_tried || expected != slot {
                return fail(format!("record {} misplaced in new table", id.get()));
            }
            *new_refs.entry(id).or_insert(0) += 1;
        }

        let mut tried = 0;
        for (id, record) in &self.records {
            let in_tried = tried_refs.get(id).copied().unwrap_or(0);
            let in_new = new_refs.get(id).copied().unwrap_or(0);
            if record.is_tried {
                tried += 1;
                if in_tried != 1 || in_new != 0 {
                    return fail(format!(
                        "tried record {} has {in_tried} tried and {in_new} new slots",
                        id.get()
                    ));
                }
            } else if in_tried != 0 || record.ref_count != in_new {
                return fail(format!(
                    "new record {} counts {} refs but holds {in_new} new and {in_tried} tried slots",
                    id.get(),
                    record.ref_count
                ));
            }
            if record.ref_count > self.config.max_new_refs {
                return fail(format!("record {} exceeds the reference ceiling", id.get()));
            }
        }

        if tried != self.tried_count || self.records.len() - tried != self.new_count {
            return fail(format!(
                "cached counters tried={} new={} disagree with records",
                self.tried_count, self.new_count
            ));
        }
        if self.collisions.len() > self.config.max_collisions {
            return fail("collision set exceeds its bound".to_string());
        }
        Ok(())
    }

    // =========================================================================
    // Snapshots
    // =========================================================================

    /// Capture the complete table state.
    pub fn snapshot(&self) -> AddressManagerSnapshot {
        let records = self
            .shuffle_order
            .iter()
            .filter_map(|id| self.records.get(id).map(|r| (*id, r)))
            .map(|(id, r)| RecordSnapshot {
                id,
                address: r.address,
                source: r.source,
                last_seen: r.last_seen,
                last_try: r.last_try,
                last_success: r.last_success,
                last_counted_attempt: r.last_counted_attempt,
                attempts: r.attempts,
            })
            .collect();
        let slots = |table: &BucketMatrix| -> Vec<SlotSnapshot> {
            table
                .iter_occupied()
                .map(|(bucket, slot, id)| SlotSnapshot {
                    bucket: bucket as u32,
                    slot: slot as u32,
                    id,
                })
                .collect()
        };

        AddressManagerSnapshot {
            version: SNAPSHOT_VERSION,
            new_bucket_count: self.config.new_bucket_count as u32,
            tried_bucket_count: self.config.tried_bucket_count as u32,
            bucket_size: self.config.bucket_size as u32,
            node_key: *self.placement.key().as_bytes(),
            last_good: self.last_good,
            last_id: self.last_id,
            records,
            tried: slots(&self.tried_table),
            new: slots(&self.new_table),
            collisions: self.collisions.clone(),
        }
    }

    /// Rebuild a manager from a snapshot taken with the same table dimensions.
    pub fn from_snapshot(
        config: AddressManagerConfig,
        snapshot: &AddressManagerSnapshot,
    ) -> AddressManagerResult<Self> {
        let reject = |msg: String| Err(AddressManagerError::Snapshot(msg));

        if snapshot.version != SNAPSHOT_VERSION {
            return reject(format!("unsupported version {}", snapshot.version));
        }
        if snapshot.new_bucket_count as usize != config.new_bucket_count
            || snapshot.tried_bucket_count as usize != config.tried_bucket_count
            || snapshot.bucket_size as usize != config.bucket_size
        {
            return reject("table dimensions differ from configuration".to_string());
        }

        let key = NodeKey::new(snapshot.node_key);
        let mut manager = Self::with_key(config, key, StdRng::from_entropy())?;
        manager.last_good = snapshot.last_good;
        manager.last_id = snapshot.last_id;

        for entry in &snapshot.records {
            if entry.id.get() > snapshot.last_id {
                return reject(format!("record id {} beyond last id", entry.id.get()));
            }
            let mut record =
                AddressRecord::new(entry.address, entry.source, manager.shuffle_order.len());
            record.last_seen = entry.last_seen;
            record.last_try = entry.last_try;
            record.last_success = entry.last_success;
            record.last_counted_attempt = entry.last_counted_attempt;
            record.attempts = entry.attempts;

            if manager.records.insert(entry.id, record).is_some()
                || manager.addr_index.insert(entry.address, entry.id).is_some()
            {
                return reject(format!("duplicate record {}", entry.address));
            }
            manager.shuffle_order.push(entry.id);
        }

        for slot in &snapshot.tried {
            let (bucket, pos) = (slot.bucket as usize, slot.slot as usize);
            if bucket >= manager.config.tried_bucket_count || pos >= manager.config.bucket_size {
                return reject("tried slot out of range".to_string());
            }
            let Some(record) = manager.records.get_mut(&slot.id) else {
                return reject(format!("tried slot references unknown record {}", slot.id.get()));
            };
            record.is_tried = true;
            manager.tried_table.set(bucket, pos, slot.id);
        }
        for slot in &snapshot.new {
            let (bucket, pos) = (slot.bucket as usize, slot.slot as usize);
            if bucket >= manager.config.new_bucket_count || pos >= manager.config.bucket_size {
                return reject("new slot out of range".to_string());
            }
            let Some(record) = manager.records.get_mut(&slot.id) else {
                return reject(format!("new slot references unknown record {}", slot.id.get()));
            };
            record.ref_count += 1;
            manager.new_table.set(bucket, pos, slot.id);
        }

        manager.tried_count = manager.records.values().filter(|r| r.is_tried).count();
        manager.new_count = manager.records.len() - manager.tried_count;
        manager.collisions = snapshot
            .collisions
            .iter()
            .copied()
            .filter(|id| manager.records.contains_key(id))
            .take(manager.config.max_collisions)
            .collect();

        if let Some((id, _)) = manager
            .records
            .iter()
            .find(|(_, r)| !r.is_tried && r.ref_count == 0)
        {
            return reject(format!("record {} is not placed in any table", id.get()));
        }
        manager
            .check_invariants()
            .map_err(|e| AddressManagerError::Snapshot(e.to_string()))?;
        Ok(manager)
    }

    #[cfg(test)]
    pub(crate) fn force_ref_count(&mut self, addr: &PeerAddress, ref_count: u32) {
        if let Some(id) = self.find(addr) {
            if let Some(record) = self.records.get_mut(&id) {
                record.ref_count = ref_count;
            }
        }
    }
}

fn dangling(id: RecordId) -> AddressManagerError {
    AddressManagerError::InvariantViolation(format!("dangling record id {}", id.get()))
}

/// Random walk over a bucket matrix until an occupied slot is hit.
///
/// Starts at a uniformly random slot and jumps by random offsets with
/// wraparound, so every occupied slot is equally likely to be the stop.
fn walk_to_occupied(table: &BucketMatrix, rng: &mut StdRng) -> AddressManagerResult<RecordId> {
    let (buckets, size) = (table.bucket_count(), table.bucket_size());
    let mut bucket = rng.gen_range(0..buckets);
    let mut slot = rng.gen_range(0..size);
    let max_steps = buckets.saturating_mul(size).saturating_mul(64);

    for _ in 0..max_steps {
        if let Some(id) = table.get(bucket, slot) {
            return Ok(id);
        }
        bucket = (bucket + rng.gen_range(0..buckets)) % buckets;
        slot = (slot + rng.gen_range(0..size)) % size;
    }
    Err(AddressManagerError::InvariantViolation(
        "selection walk found no occupied slot in a non-empty table".to_string(),
    ))
}

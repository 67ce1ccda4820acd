//! Address manager type definitions.

use std::num::NonZeroU64;

#[cfg(feature = "persistence")]
use serde::{Deserialize, Serialize};

use super::config::AddressManagerConfig;
use crate::domain::{PeerAddress, Timestamp};

/// Addresses tried this recently are never terrible (seconds).
const RECENT_TRY_GRACE_SECS: u64 = 60;
/// `last_seen` this far in the future marks an address terrible (seconds).
const MAX_FUTURE_SKEW_SECS: u64 = 10 * 60;
/// Attempts this recent cut the selection chance to 1% (seconds).
const HOT_RETRY_SECS: u64 = 10 * 60;
/// Selection chance multiplier per counted failure.
const FAILURE_BACKOFF: f64 = 0.66;
/// Failures beyond this count no longer lower the chance.
const MAX_BACKOFF_FAILURES: u32 = 8;

/// Stable arena id of a record.
///
/// Ids are assigned densely from 1 and never reused while the record lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "persistence", derive(Serialize, Deserialize))]
pub struct RecordId(NonZeroU64);

impl RecordId {
    /// Build an id from its raw value; zero is reserved.
    pub fn from_raw(raw: u64) -> Option<Self> {
        NonZeroU64::new(raw).map(Self)
    }

    /// Raw id value.
    pub fn get(&self) -> u64 {
        self.0.get()
    }
}

/// Metadata the manager keeps for one known address.
///
/// A record is either tried (occupies exactly one Tried slot, `ref_count`
/// is 0) or new (occupies `ref_count` New slots). Position fields are only
/// written by the manager's swap/delete routines.
#[derive(Debug, Clone, PartialEq)]
pub struct AddressRecord {
    pub(crate) address: PeerAddress,
    pub(crate) source: PeerAddress,
    pub(crate) last_seen: Option<Timestamp>,
    pub(crate) last_try: Option<Timestamp>,
    pub(crate) last_success: Option<Timestamp>,
    pub(crate) last_counted_attempt: Option<Timestamp>,
    pub(crate) attempts: u32,
    pub(crate) ref_count: u32,
    pub(crate) is_tried: bool,
    pub(crate) random_pos: usize,
}

impl AddressRecord {
    /// Create a record that is not yet placed in any table.
    pub(crate) fn new(address: PeerAddress, source: PeerAddress, random_pos: usize) -> Self {
        Self {
            address,
            source,
            last_seen: None,
            last_try: None,
            last_success: None,
            last_counted_attempt: None,
            attempts: 0,
            ref_count: 0,
            is_tried: false,
            random_pos,
        }
    }

    /// The peer this record describes.
    pub fn address(&self) -> &PeerAddress {
        &self.address
    }

    /// The peer that first introduced this address.
    pub fn source(&self) -> &PeerAddress {
        &self.source
    }

    /// When the address was last advertised or seen connected.
    pub fn last_seen(&self) -> Option<Timestamp> {
        self.last_seen
    }

    /// When we last tried to connect.
    pub fn last_try(&self) -> Option<Timestamp> {
        self.last_try
    }

    /// When we last connected successfully.
    pub fn last_success(&self) -> Option<Timestamp> {
        self.last_success
    }

    /// When a failed attempt was last counted.
    pub fn last_counted_attempt(&self) -> Option<Timestamp> {
        self.last_counted_attempt
    }

    /// Counted failed attempts since the last success.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// New table slots referencing this record.
    pub fn ref_count(&self) -> u32 {
        self.ref_count
    }

    /// Whether the record occupies a Tried slot.
    pub fn is_tried(&self) -> bool {
        self.is_tried
    }

    /// Relative probability of accepting this record during selection.
    ///
    /// Recently tried addresses are cut to 1%, and every counted failure
    /// multiplies by 0.66 (capped at 8 failures, ~3.6% of baseline).
    pub fn selection_chance(&self, now: Timestamp) -> f64 {
        let mut chance = 1.0;

        if let Some(last_try) = self.last_try {
            if now.secs_since(last_try) < HOT_RETRY_SECS {
                chance *= 0.01;
            }
        }

        chance * FAILURE_BACKOFF.powi(self.attempts.min(MAX_BACKOFF_FAILURES) as i32)
    }

    /// Whether the address is too stale or unreliable to select or gossip.
    pub fn is_terrible(&self, now: Timestamp, config: &AddressManagerConfig) -> bool {
        // never remove things tried in the last minute
        if let Some(last_try) = self.last_try {
            if now.secs_since(last_try) < RECENT_TRY_GRACE_SECS {
                return false;
            }
        }

        let Some(last_seen) = self.last_seen else {
            return true;
        };

        // came in a flying DeLorean
        if last_seen > now.add_secs(MAX_FUTURE_SKEW_SECS) {
            return true;
        }

        // not seen in recent history
        if now.secs_since(last_seen) > config.horizon_secs {
            return true;
        }

        match self.last_success {
            // tried N times and never a success
            None => self.attempts >= config.retries,
            // N successive failures in the last week
            Some(last_success) => {
                now.secs_since(last_success) > config.min_fail_secs
                    && self.attempts >= config.max_failures
            }
        }
    }
}

/// Statistics about the address manager.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddressManagerStats {
    /// Number of records in the New table.
    pub new_count: usize,
    /// Number of records in the Tried table.
    pub tried_count: usize,
    /// Number of known records.
    pub total: usize,
    /// Pending tried-table collisions.
    pub pending_collisions: usize,
    /// Number of buckets in the New table.
    pub new_bucket_count: usize,
    /// Number of buckets in the Tried table.
    pub tried_bucket_count: usize,
}

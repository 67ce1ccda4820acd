//! Serializable image of the complete table state.
//!
//! Slots store record ids; `ref_count`, `is_tried` and shuffle positions
//! are rebuilt from the slot lists on restore.

#[cfg(feature = "persistence")]
use serde::{Deserialize, Serialize};

use super::types::RecordId;
use crate::domain::{PeerAddress, Timestamp};

/// Current snapshot format version.
pub const SNAPSHOT_VERSION: u32 = 1;

/// Full address manager state.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "persistence", derive(Serialize, Deserialize))]
pub struct AddressManagerSnapshot {
    /// Format version
    pub version: u32,
    /// New table bucket count at capture time
    pub new_bucket_count: u32,
    /// Tried table bucket count at capture time
    pub tried_bucket_count: u32,
    /// Slots per bucket at capture time
    pub bucket_size: u32,
    /// Placement key; without it the slot lists are meaningless
    pub node_key: [u8; 32],
    /// Last time any address was marked good
    pub last_good: Timestamp,
    /// Highest id handed out
    pub last_id: u64,
    /// Records in shuffle order
    pub records: Vec<RecordSnapshot>,
    /// Occupied Tried slots
    pub tried: Vec<SlotSnapshot>,
    /// Occupied New slots
    pub new: Vec<SlotSnapshot>,
    /// Pending collision contenders
    pub collisions: Vec<RecordId>,
}

/// Persisted fields of one record.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "persistence", derive(Serialize, Deserialize))]
pub struct RecordSnapshot {
    pub id: RecordId,
    pub address: PeerAddress,
    pub source: PeerAddress,
    pub last_seen: Option<Timestamp>,
    pub last_try: Option<Timestamp>,
    pub last_success: Option<Timestamp>,
    pub last_counted_attempt: Option<Timestamp>,
    pub attempts: u32,
}

/// One occupied slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "persistence", derive(Serialize, Deserialize))]
pub struct SlotSnapshot {
    pub bucket: u32,
    pub slot: u32,
    pub id: RecordId,
}

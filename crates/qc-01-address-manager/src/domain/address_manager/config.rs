//! Address Manager configuration.

#[cfg(feature = "toml-config")]
use serde::Deserialize;

use crate::domain::errors::AddressManagerError;

/// Tried buckets an address's key can spread over within its group.
pub const TRIED_GROUPS_PER_KEY: usize = 8;
/// New buckets one source group can spread its addresses over.
pub const NEW_GROUPS_PER_SOURCE: usize = 64;
/// Number of buckets in the Tried table.
pub const TRIED_BUCKET_COUNT: usize = 256;
/// Number of buckets in the New table.
pub const NEW_BUCKET_COUNT: usize = 1024;
/// Slots per bucket in both tables.
pub const BUCKET_SIZE: usize = 64;
/// Bound on pending tried-table collisions.
pub const MAX_COLLISIONS: usize = 10;
/// New-table references one record may hold.
pub const MAX_NEW_REFS_PER_RECORD: u32 = 8;

/// Configuration for the address manager
///
/// Table dimensions and group fan-out feed the bucket placement; the
/// remaining fields tune the `is_terrible` policy and gossip sampling.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "toml-config", derive(Deserialize), serde(default, deny_unknown_fields))]
pub struct AddressManagerConfig {
    /// Number of buckets in the New table
    pub new_bucket_count: usize,
    /// Number of buckets in the Tried table
    pub tried_bucket_count: usize,
    /// Slots per bucket
    pub bucket_size: usize,
    /// Tried buckets per address group
    pub tried_groups_per_key: usize,
    /// New buckets per source group
    pub new_groups_per_source: usize,
    /// Maximum pending tried collisions
    pub max_collisions: usize,
    /// Maximum New table references per record
    pub max_new_refs: u32,
    /// Addresses not seen for this long are terrible (seconds)
    pub horizon_secs: u64,
    /// Failed attempts without any success before an address is terrible
    pub retries: u32,
    /// Failed attempts since the last success before an address is terrible
    pub max_failures: u32,
    /// Minimum age of the last success for `max_failures` to apply (seconds)
    pub min_fail_secs: u64,
    /// Upper bound on addresses returned for gossip
    pub get_addr_max: usize,
    /// Percentage of known addresses returned for gossip
    pub get_addr_max_pct: usize,
}

impl Default for AddressManagerConfig {
    fn default() -> Self {
        Self {
            new_bucket_count: NEW_BUCKET_COUNT,
            tried_bucket_count: TRIED_BUCKET_COUNT,
            bucket_size: BUCKET_SIZE,
            tried_groups_per_key: TRIED_GROUPS_PER_KEY,
            new_groups_per_source: NEW_GROUPS_PER_SOURCE,
            max_collisions: MAX_COLLISIONS,
            max_new_refs: MAX_NEW_REFS_PER_RECORD,
            horizon_secs: 30 * 24 * 60 * 60,
            retries: 3,
            max_failures: 10,
            min_fail_secs: 7 * 24 * 60 * 60,
            get_addr_max: 2500,
            get_addr_max_pct: 23,
        }
    }
}

impl AddressManagerConfig {
    /// Testing config with smaller tables
    pub fn for_testing() -> Self {
        Self {
            new_bucket_count: 16,
            tried_bucket_count: 8,
            bucket_size: 8,
            tried_groups_per_key: 4,
            new_groups_per_source: 8,
            ..Self::default()
        }
    }

    /// Reject dimensions the placement engine cannot work with.
    pub fn validate(&self) -> Result<(), AddressManagerError> {
        let nonzero = [
            ("new_bucket_count", self.new_bucket_count),
            ("tried_bucket_count", self.tried_bucket_count),
            ("bucket_size", self.bucket_size),
            ("tried_groups_per_key", self.tried_groups_per_key),
            ("new_groups_per_source", self.new_groups_per_source),
        ];
        if let Some((name, _)) = nonzero.iter().find(|(_, v)| *v == 0) {
            return Err(AddressManagerError::InvalidConfig(format!(
                "{name} must be non-zero"
            )));
        }
        if self.max_new_refs == 0 || self.max_new_refs > 31 {
            return Err(AddressManagerError::InvalidConfig(
                "max_new_refs must be in 1..=31".to_string(),
            ));
        }
        if self.get_addr_max_pct > 100 {
            return Err(AddressManagerError::InvalidConfig(
                "get_addr_max_pct must be at most 100".to_string(),
            ));
        }
        if self.new_bucket_count > u32::MAX as usize || self.tried_bucket_count > u32::MAX as usize
        {
            return Err(AddressManagerError::InvalidConfig(
                "bucket counts must fit in 32 bits".to_string(),
            ));
        }
        Ok(())
    }
}

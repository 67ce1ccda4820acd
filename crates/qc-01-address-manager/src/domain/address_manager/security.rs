//! Address manager security types.
//!
//! SECURITY-CRITICAL: the node key salts every bucket computation.
//! Isolate for security audits.

use rand::RngCore;
use sha2::{Digest, Sha256};
use std::fmt;

/// Length of the bucket-placement secret in bytes.
pub const NODE_KEY_LEN: usize = 32;

/// Per-node 256-bit secret salting every bucket hash.
///
/// # Security (Anti-Eclipse)
///
/// The placement algorithm is public. Without the key an attacker cannot
/// compute which bucket or slot an address will land in, so it cannot
/// craft addresses that all target (and evict) the same slots.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct NodeKey([u8; NODE_KEY_LEN]);

impl NodeKey {
    /// Wrap an existing key (restored from a snapshot or injected in tests).
    pub fn new(bytes: [u8; NODE_KEY_LEN]) -> Self {
        Self(bytes)
    }

    /// Draw a fresh key from `rng`.
    pub fn random<R: RngCore + ?Sized>(rng: &mut R) -> Self {
        let mut bytes = [0u8; NODE_KEY_LEN];
        rng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Raw key bytes.
    pub fn as_bytes(&self) -> &[u8; NODE_KEY_LEN] {
        &self.0
    }
}

impl fmt::Debug for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("NodeKey(..)")
    }
}

/// Keyed digest used for bucket placement.
///
/// Computes `SHA-256(key ∥ parts...)` and reads the first 8 bytes as a
/// big-endian integer.
pub fn keyed_hash64(key: &NodeKey, parts: &[&[u8]]) -> u64 {
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    for part in parts {
        hasher.update(part);
    }
    let digest = hasher.finalize();
    let mut head = [0u8; 8];
    head.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(head)
}

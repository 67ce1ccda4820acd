//! Test utilities for the address manager.
//!
//! This module provides controllable implementations of ports for
//! deterministic testing. Enable with the `test-utils` feature flag.
//!
//! # Example
//!
//! ```rust
//! use qc_01_address_manager::test_utils::ManualTimeSource;
//! use qc_01_address_manager::TimeSource;
//!
//! let clock = ManualTimeSource::new(1000);
//! clock.advance(60);
//! assert_eq!(clock.now().as_secs(), 1060);
//! ```

use std::sync::atomic::{AtomicU64, Ordering};

use crate::domain::Timestamp;
use crate::ports::outbound::TimeSource;

/// A time source that only moves when told to.
///
/// Shared between tasks behind an `Arc`; all updates are atomic.
#[derive(Debug, Default)]
pub struct ManualTimeSource {
    secs: AtomicU64,
}

impl ManualTimeSource {
    /// Create a clock reading `secs`.
    pub fn new(secs: u64) -> Self {
        Self {
            secs: AtomicU64::new(secs),
        }
    }

    /// Move the clock forward by `secs`.
    pub fn advance(&self, secs: u64) {
        self.secs.fetch_add(secs, Ordering::SeqCst);
    }

    /// Jump to an absolute time.
    pub fn set(&self, secs: u64) {
        self.secs.store(secs, Ordering::SeqCst);
    }
}

impl TimeSource for ManualTimeSource {
    fn now(&self) -> Timestamp {
        Timestamp::new(self.secs.load(Ordering::SeqCst))
    }
}

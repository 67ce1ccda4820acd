//! # Address Manager Service
//!
//! High-level service implementing the `AddressManagerApi` port.
//!
//! This service wraps the domain `AddressManager` in a single exclusive
//! lock and supplies the current time from a `TimeSource`, so callers on
//! any thread see each operation as one atomic step over the whole table.

// Semantic submodules
mod api;
mod core;

// Re-export public API
pub use core::AddressManagerService;

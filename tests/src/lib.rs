//! # Address Manager Test Suite
//!
//! Unified test crate containing:
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! ├── benchmarks/       # Criterion groups for the address manager
//! │   └── qc_01_address_manager.rs
//! │
//! ├── exploits/         # Attack simulations against the tables
//! │   ├── eclipse_flooding.rs
//! │   └── tried_poisoning.rs
//! │
//! └── integration/      # Service-level flows through the public API
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! # All tests
//! cargo test -p qc-tests
//!
//! # By category
//! cargo test -p qc-tests integration::
//! cargo test -p qc-tests exploits::
//!
//! # Benchmarks
//! cargo bench -p qc-tests
//! ```

pub mod benchmarks;
pub mod exploits;
pub mod integration;

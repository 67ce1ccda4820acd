//! # Address Manager Benchmarks
//!
//! Run with: `cargo bench -p qc-tests --bench addrman_benchmarks`

use criterion::{criterion_group, criterion_main};
use qc_tests::benchmarks::qc_01_address_manager::{
    brutal_ingestion, brutal_placement, brutal_selection,
};

criterion_group!(
    benches,
    brutal_placement,
    brutal_ingestion,
    brutal_selection,
);

criterion_main!(benches);

//! # Address Manager Benchmarks
//!
//! Stress benchmarks over full-size tables.

pub mod qc_01_address_manager;

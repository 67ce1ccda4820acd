//! # Ports Layer - Hexagonal Architecture Boundaries
//!
//! This module defines the port interfaces (traits) for the Address Manager.
//!
//! ## Architecture
//!
//! - **Driving Ports (Inbound):** APIs the address manager exposes to the node
//! - **Driven Ports (Outbound):** SPIs it requires from adapters (clock, snapshot storage)

pub mod inbound;
pub mod outbound;

pub use inbound::AddressManagerApi;
pub use outbound::{ConfigProvider, SnapshotStore, StoreError, TimeSource};

//! Domain Layer - Pure business logic with no I/O
//!
//! This module contains the core address-management logic:
//! - Peer identity, routing groups and identity keys
//! - Keyed bucket placement (new/tried tables)
//! - The table store: insertion, promotion, eviction, collisions, selection
//! - Snapshot images for persistence adapters

pub mod address_manager;
pub mod entities;
pub mod errors;

pub use address_manager::*;
pub use entities::*;
pub use errors::*;

//! # Integration Flows
//!
//! Exercises `AddressManagerService` the way a connection manager would:
//! gossip in, dial out, report results, all behind one shared handle.

pub mod flows;
pub mod selection;

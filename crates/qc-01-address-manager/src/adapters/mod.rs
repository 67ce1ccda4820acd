//! # Adapters
//!
//! Concrete implementations of the driven ports.
//!
//! ## Adapters Provided
//!
//! - `SystemTimeSource` - Production time source using system clock
//! - `StaticConfigProvider` - In-memory configuration
//! - `TomlConfigProvider` - Config file loading (requires "toml-config" feature)
//! - `FileSnapshotStore` - bincode snapshot file (requires "persistence" feature)

// Semantic submodules
/// Configuration providers
pub mod config;
/// Snapshot storage
#[cfg(feature = "persistence")]
pub mod store;
/// Time source adapters
pub mod time;

// Re-export public API
pub use config::StaticConfigProvider;
pub use time::SystemTimeSource;

#[cfg(feature = "toml-config")]
pub use config::{ConfigError, TomlConfigProvider};

#[cfg(feature = "persistence")]
pub use store::FileSnapshotStore;

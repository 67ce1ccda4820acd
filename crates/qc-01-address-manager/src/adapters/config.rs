use crate::domain::{AddressManagerConfig, PeerAddress};
use crate::ports::ConfigProvider;

// ============================================================================
// StaticConfigProvider - Hardcoded config for testing/development
// ============================================================================

/// Static configuration provider with hardcoded values.
///
/// Useful for testing and development. For production, use `TomlConfigProvider`.
#[derive(Debug, Clone)]
pub struct StaticConfigProvider {
    seed_peers: Vec<PeerAddress>,
    config: AddressManagerConfig,
}

impl StaticConfigProvider {
    /// Create with default config and no seed peers.
    #[must_use]
    pub fn new() -> Self {
        Self {
            seed_peers: Vec::new(),
            config: AddressManagerConfig::default(),
        }
    }

    /// Create with specified seed peers.
    #[must_use]
    pub fn with_seed_peers(mut self, peers: Vec<PeerAddress>) -> Self {
        self.seed_peers = peers;
        self
    }

    /// Create with specified address manager config.
    #[must_use]
    pub fn with_config(mut self, config: AddressManagerConfig) -> Self {
        self.config = config;
        self
    }
}

impl Default for StaticConfigProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigProvider for StaticConfigProvider {
    fn address_manager_config(&self) -> AddressManagerConfig {
        self.config.clone()
    }

    fn seed_peers(&self) -> Vec<PeerAddress> {
        self.seed_peers.clone()
    }
}

// ============================================================================
// TomlConfigProvider - Production Config Loading (requires "toml-config" feature)
// ============================================================================

#[cfg(feature = "toml-config")]
mod toml_config {
    use super::*;
    use serde::Deserialize;
    use std::fs;
    use std::path::Path;
    use thiserror::Error;

    /// Configuration file structure.
    #[derive(Debug, Deserialize)]
    struct ConfigFile {
        #[serde(default)]
        address_manager: AddressManagerConfig,
        #[serde(default)]
        seeds: SeedsConfig,
    }

    #[derive(Debug, Deserialize, Default)]
    struct SeedsConfig {
        #[serde(default)]
        peers: Vec<String>,
    }

    /// TOML-based configuration provider.
    ///
    /// Loads address manager configuration from a TOML file. Every key is
    /// optional; missing keys take the defaults.
    ///
    /// # Config File Format
    ///
    /// ```toml
    /// [address_manager]
    /// new_bucket_count = 1024
    /// tried_bucket_count = 256
    /// bucket_size = 64
    /// max_collisions = 10
    /// horizon_secs = 2592000
    ///
    /// [seeds]
    /// peers = [
    ///     "192.168.1.100:8444",
    ///     "[2001:db8::1]:8444"
    /// ]
    /// ```
    #[derive(Debug, Clone)]
    pub struct TomlConfigProvider {
        seed_peers: Vec<PeerAddress>,
        config: AddressManagerConfig,
    }

    impl TomlConfigProvider {
        /// Load configuration from a TOML file.
        ///
        /// # Errors
        ///
        /// Returns error if the file cannot be read, parsed, or validated.
        pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
            let content = fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Io {
                path: path.as_ref().display().to_string(),
                error: e.to_string(),
            })?;

            Self::parse(&content)
        }

        /// Parse configuration from a TOML string.
        pub fn parse(content: &str) -> Result<Self, ConfigError> {
            let file: ConfigFile =
                toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;

            file.address_manager
                .validate()
                .map_err(|e| ConfigError::Invalid(e.to_string()))?;

            let seed_peers = file
                .seeds
                .peers
                .iter()
                .map(|peer| {
                    peer.parse::<PeerAddress>()
                        .map_err(|_| ConfigError::InvalidPeer(peer.clone()))
                })
                .collect::<Result<Vec<_>, _>>()?;

            Ok(Self {
                seed_peers,
                config: file.address_manager,
            })
        }
    }

    impl ConfigProvider for TomlConfigProvider {
        fn address_manager_config(&self) -> AddressManagerConfig {
            self.config.clone()
        }

        fn seed_peers(&self) -> Vec<PeerAddress> {
            self.seed_peers.clone()
        }
    }

    /// Errors that can occur during config loading.
    #[derive(Debug, Clone, PartialEq, Eq, Error)]
    pub enum ConfigError {
        /// File I/O error.
        #[error("Failed to read {path}: {error}")]
        Io {
            /// Path of the file that failed to load.
            path: String,
            /// Error message from the I/O operation.
            error: String,
        },
        /// TOML parsing error.
        #[error("Failed to parse config: {0}")]
        Parse(String),
        /// Values parsed but out of range.
        #[error("Invalid config: {0}")]
        Invalid(String),
        /// A seed peer is not a valid `host:port`.
        #[error("Invalid seed peer: {0}")]
        InvalidPeer(String),
    }
}

#[cfg(feature = "toml-config")]
pub use toml_config::{ConfigError, TomlConfigProvider};

//! Core Domain Entities for the Address Manager
//!
//! `PeerAddress` is the immutable identity every table slot ultimately
//! refers to. Its `key()` and `group()` feed the keyed bucket placement.

use std::fmt;
use std::str::FromStr;

#[cfg(any(feature = "persistence", feature = "toml-config"))]
use serde::{Deserialize, Serialize};

use super::errors::AddressManagerError;

/// IP address enum supporting both IPv4 and IPv6.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(
    any(feature = "persistence", feature = "toml-config"),
    derive(Serialize, Deserialize),
    serde(from = "WireIpAddr", into = "WireIpAddr")
)]
pub enum IpAddr {
    /// IPv4 address (4 bytes).
    V4([u8; 4]),
    /// IPv6 address (16 bytes).
    V6([u8; 16]),
}

impl IpAddr {
    /// Create an IPv4 address
    pub fn v4(a: u8, b: u8, c: u8, d: u8) -> Self {
        IpAddr::V4([a, b, c, d])
    }

    /// Create an IPv6 address from bytes
    ///
    /// IPv4-mapped bytes (`::ffff:a.b.c.d`) become `V4`, so one peer has
    /// exactly one representation.
    pub fn v6(bytes: [u8; 16]) -> Self {
        std::net::IpAddr::from(bytes).into()
    }

    /// Check if this is an IPv4 address
    pub fn is_ipv4(&self) -> bool {
        matches!(self, IpAddr::V4(_))
    }

    /// Check if this is an IPv6 address
    pub fn is_ipv6(&self) -> bool {
        matches!(self, IpAddr::V6(_))
    }

    /// The embedded IPv4 address, for plain IPv4 and `::ffff:a.b.c.d`.
    pub fn as_ipv4(&self) -> Option<[u8; 4]> {
        match self {
            IpAddr::V4(octets) => Some(*octets),
            IpAddr::V6(bytes) => std::net::Ipv6Addr::from(*bytes)
                .to_ipv4_mapped()
                .map(|v4| v4.octets()),
        }
    }

    /// 16-byte IPv6 form; IPv4 is mapped into `::ffff:0:0/96`.
    pub fn to_ipv6_octets(&self) -> [u8; 16] {
        match self {
            IpAddr::V4(octets) => std::net::Ipv4Addr::from(*octets).to_ipv6_mapped().octets(),
            IpAddr::V6(bytes) => *bytes,
        }
    }
}

/// Serialized form of [`IpAddr`]; decoding goes through [`IpAddr::v6`].
#[cfg(any(feature = "persistence", feature = "toml-config"))]
#[derive(Serialize, Deserialize)]
enum WireIpAddr {
    V4([u8; 4]),
    V6([u8; 16]),
}

#[cfg(any(feature = "persistence", feature = "toml-config"))]
impl From<WireIpAddr> for IpAddr {
    fn from(wire: WireIpAddr) -> Self {
        match wire {
            WireIpAddr::V4(octets) => IpAddr::V4(octets),
            WireIpAddr::V6(bytes) => IpAddr::v6(bytes),
        }
    }
}

#[cfg(any(feature = "persistence", feature = "toml-config"))]
impl From<IpAddr> for WireIpAddr {
    fn from(ip: IpAddr) -> Self {
        match ip {
            IpAddr::V4(octets) => WireIpAddr::V4(octets),
            IpAddr::V6(bytes) => WireIpAddr::V6(bytes),
        }
    }
}

impl From<std::net::IpAddr> for IpAddr {
    fn from(ip: std::net::IpAddr) -> Self {
        match ip.to_canonical() {
            std::net::IpAddr::V4(v4) => IpAddr::V4(v4.octets()),
            std::net::IpAddr::V6(v6) => IpAddr::V6(v6.octets()),
        }
    }
}

impl From<IpAddr> for std::net::IpAddr {
    fn from(ip: IpAddr) -> Self {
        match ip {
            IpAddr::V4(octets) => std::net::IpAddr::from(octets),
            IpAddr::V6(bytes) => std::net::IpAddr::from(bytes),
        }
    }
}

impl fmt::Display for IpAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        std::net::IpAddr::from(*self).fmt(f)
    }
}

/// Unix timestamp in seconds
///
/// # Security
///
/// Timestamps are clamped to a reasonable maximum to prevent overflow
/// attacks in comparison and age arithmetic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(
    any(feature = "persistence", feature = "toml-config"),
    derive(Serialize, Deserialize)
)]
pub struct Timestamp(u64);

impl Timestamp {
    /// Maximum reasonable timestamp (year 9999).
    pub const MAX_REASONABLE: u64 = 253_402_300_799;

    /// Create a new timestamp, clamping to MAX_REASONABLE.
    pub const fn new(secs: u64) -> Self {
        if secs > Self::MAX_REASONABLE {
            Self(Self::MAX_REASONABLE)
        } else {
            Self(secs)
        }
    }

    /// Get the underlying seconds value.
    pub fn as_secs(&self) -> u64 {
        self.0
    }

    /// Add seconds to timestamp (saturating at MAX_REASONABLE).
    pub fn add_secs(&self, secs: u64) -> Self {
        Self(self.0.saturating_add(secs).min(Self::MAX_REASONABLE))
    }

    /// Subtract seconds from timestamp (saturating at 0).
    pub fn sub_secs(&self, secs: u64) -> Self {
        Self(self.0.saturating_sub(secs))
    }

    /// Seconds elapsed from `earlier` to `self`, zero if `earlier` is later.
    pub fn secs_since(&self, earlier: Timestamp) -> u64 {
        self.0.saturating_sub(earlier.0)
    }
}

/// Network identity of a peer: host plus port.
///
/// Two `PeerAddress` values are the same peer exactly when both host and
/// port match; this is the key of the manager's address index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(
    any(feature = "persistence", feature = "toml-config"),
    derive(Serialize, Deserialize)
)]
pub struct PeerAddress {
    /// IP address (v4 or v6).
    pub ip: IpAddr,
    /// Port number.
    pub port: u16,
}

/// Length of [`PeerAddress::key`].
pub const ADDRESS_KEY_LEN: usize = 18;

/// Length of [`PeerAddress::group`].
pub const ADDRESS_GROUP_LEN: usize = 3;

impl PeerAddress {
    /// Create a new peer address from IP and port.
    pub fn new(ip: IpAddr, port: u16) -> Self {
        Self { ip, port }
    }

    /// Parse a textual host (IPv4 or IPv6 literal) and a port.
    pub fn parse(host: &str, port: u16) -> Result<Self, AddressManagerError> {
        let trimmed = host.trim_start_matches('[').trim_end_matches(']');
        let ip: std::net::IpAddr = trimmed
            .parse()
            .map_err(|_| AddressManagerError::InvalidAddress(host.to_string()))?;
        Ok(Self::new(ip.into(), port))
    }

    /// Identity key: IPv6-normalized address followed by the big-endian port.
    pub fn key(&self) -> [u8; ADDRESS_KEY_LEN] {
        let mut key = [0u8; ADDRESS_KEY_LEN];
        key[..16].copy_from_slice(&self.ip.to_ipv6_octets());
        key[16..].copy_from_slice(&self.port.to_be_bytes());
        key
    }

    /// Routing group: IPv4 flag byte plus the first two octets.
    ///
    /// # Security (Anti-Eclipse)
    ///
    /// Addresses sharing a group are treated as one network for bucket
    /// placement, so a single /16 cannot spread across the whole table.
    pub fn group(&self) -> [u8; ADDRESS_GROUP_LEN] {
        match self.ip.as_ipv4() {
            Some(octets) => [1, octets[0], octets[1]],
            None => {
                let bytes = self.ip.to_ipv6_octets();
                [0, bytes[0], bytes[1]]
            }
        }
    }
}

impl From<std::net::SocketAddr> for PeerAddress {
    fn from(addr: std::net::SocketAddr) -> Self {
        Self::new(addr.ip().into(), addr.port())
    }
}

impl From<PeerAddress> for std::net::SocketAddr {
    fn from(addr: PeerAddress) -> Self {
        std::net::SocketAddr::new(addr.ip.into(), addr.port)
    }
}

impl FromStr for PeerAddress {
    type Err = AddressManagerError;

    /// Parse `"1.2.3.4:8444"` or `"[2001:db8::1]:8444"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let addr: std::net::SocketAddr = s
            .parse()
            .map_err(|_| AddressManagerError::InvalidAddress(s.to_string()))?;
        Ok(addr.into())
    }
}

impl fmt::Display for PeerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        std::net::SocketAddr::from(*self).fmt(f)
    }
}

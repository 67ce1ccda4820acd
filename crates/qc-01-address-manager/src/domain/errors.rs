//! Domain Errors for the Address Manager
//!
//! Not-found targets and failed stochastic acceptance are not errors; they
//! surface as `Ok(None)` / `Ok(false)`. What remains here is invalid input,
//! corrupted bookkeeping, and surface that is not implemented yet.

use thiserror::Error;

/// Errors that can occur during address manager operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressManagerError {
    /// Host could not be parsed as an IPv4/IPv6 literal.
    #[error("Invalid peer address: {0}")]
    InvalidAddress(String),

    /// Configuration values are out of range.
    #[error("Invalid address manager config: {0}")]
    InvalidConfig(String),

    /// Internal bookkeeping is inconsistent (ref-count mismatch, dangling id).
    ///
    /// Returned by the operation that detected it. The store latches
    /// itself as corrupted afterwards.
    #[error("Address table invariant violated: {0}")]
    InvariantViolation(String),

    /// A previous operation detected an invariant violation.
    #[error("Address table is corrupted; refusing further operations")]
    Corrupted,

    /// Operation is part of the address-management surface but not implemented.
    #[error("Not implemented: {0}")]
    NotImplemented(&'static str),

    /// Snapshot could not be applied to this manager.
    #[error("Snapshot rejected: {0}")]
    Snapshot(String),
}

/// Result alias for address manager operations.
pub type AddressManagerResult<T> = Result<T, AddressManagerError>;

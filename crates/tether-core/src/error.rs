//! Error types for Tether

use thiserror::Error;

/// Errors related to hardware addresses
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AddressError {
    #[error("Invalid address format: {0}")]
    InvalidFormat(String),

    #[error("Invalid address length: expected {expected} octets, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("Invalid octet '{0}' in address")]
    InvalidOctet(String),
}

//! Hardware (MAC) address value type
//!
//! [`MacAddress`] is a 6-octet EUI-48 address. It parses the usual
//! colon-separated hex form (case-insensitive) and displays in the
//! canonical uppercase form, so it can be used directly as a map key.

use std::fmt::{self, Display};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AddressError;

/// Number of octets in an EUI-48 address
pub const MAC_ADDRESS_LEN: usize = 6;

/// A 6-octet hardware address
///
/// Equality and hashing are on the raw octets, so `"aa:bb:cc:dd:ee:ff"`
/// and `"AA:BB:CC:DD:EE:FF"` parse to the same key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MacAddress([u8; MAC_ADDRESS_LEN]);

impl MacAddress {
    /// Create an address from raw octets
    pub const fn new(octets: [u8; MAC_ADDRESS_LEN]) -> Self {
        Self(octets)
    }

    /// Get the raw octets
    pub const fn octets(&self) -> [u8; MAC_ADDRESS_LEN] {
        self.0
    }

    /// Create an address from a byte slice
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, AddressError> {
        if bytes.len() != MAC_ADDRESS_LEN {
            return Err(AddressError::InvalidLength {
                expected: MAC_ADDRESS_LEN,
                actual: bytes.len(),
            });
        }
        let mut octets = [0u8; MAC_ADDRESS_LEN];
        octets.copy_from_slice(bytes);
        Ok(Self(octets))
    }
}

impl Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02X}:{b:02X}:{c:02X}:{d:02X}:{e:02X}:{g:02X}")
    }
}

impl FromStr for MacAddress {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut octets = [0u8; MAC_ADDRESS_LEN];
        let mut parts = s.split(':');

        for octet in octets.iter_mut() {
            let part = parts
                .next()
                .ok_or_else(|| AddressError::InvalidFormat(s.to_string()))?;
            if part.len() != 2 || !part.bytes().all(|b| b.is_ascii_hexdigit()) {
                return Err(AddressError::InvalidOctet(part.to_string()));
            }
            *octet = u8::from_str_radix(part, 16)
                .map_err(|_| AddressError::InvalidOctet(part.to_string()))?;
        }

        if parts.next().is_some() {
            return Err(AddressError::InvalidFormat(s.to_string()));
        }

        Ok(Self(octets))
    }
}

impl Serialize for MacAddress {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for MacAddress {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

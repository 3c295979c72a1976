//! # Address Codec
//!
//! Addresses are 20 bytes on the wire and `0x` + 40 hex characters on
//! screen. The chat front end hands us whatever the user typed, so parsing
//! is strict: wrong length or a non-hex character is an error, never a
//! silent truncation.
//!
//! The one place truncation *is* the rule is key-derived addresses. When
//! an address comes from a longer key, it is the trailing 20 bytes of that
//! key, and the discarded prefix is not looked at.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use crate::config::ADDRESS_LENGTH;

/// Errors from parsing or deriving an address.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    #[error("invalid address length: expected {expected} hex characters after 0x, got {got}")]
    InvalidLength { expected: usize, got: usize },

    #[error("address is not valid hex: {0}")]
    InvalidHex(String),

    #[error("key too short to derive an address: {got} bytes, need at least {ADDRESS_LENGTH}")]
    KeyTooShort { got: usize },
}

/// A 20-byte ledger address.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address([u8; ADDRESS_LENGTH]);

impl Address {
    pub const fn from_bytes(bytes: [u8; ADDRESS_LENGTH]) -> Self {
        Self(bytes)
    }

    /// Derives an address from key bytes by keeping the last 20 bytes.
    ///
    /// Anything in front of those 20 bytes is ignored. A 32-byte public key
    /// and the same key with arbitrary junk prepended give the same address.
    pub fn from_key_bytes(key: &[u8]) -> Result<Self, AddressError> {
        if key.len() < ADDRESS_LENGTH {
            return Err(AddressError::KeyTooShort { got: key.len() });
        }
        let mut bytes = [0u8; ADDRESS_LENGTH];
        bytes.copy_from_slice(&key[key.len() - ADDRESS_LENGTH..]);
        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; ADDRESS_LENGTH] {
        &self.0
    }

    /// Lowercase hex without the `0x` prefix. This is how the node echoes
    /// addresses back in transaction info.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl FromStr for Address {
    type Err = AddressError;

    /// Parses `0x` + 40 hex characters. The prefix is optional, the length
    /// is not.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let digits = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);

        if digits.len() != ADDRESS_LENGTH * 2 {
            return Err(AddressError::InvalidLength {
                expected: ADDRESS_LENGTH * 2,
                got: digits.len(),
            });
        }

        let mut bytes = [0u8; ADDRESS_LENGTH];
        hex::decode_to_slice(digits, &mut bytes)
            .map_err(|e| AddressError::InvalidHex(e.to_string()))?;
        Ok(Self(bytes))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", self.to_hex())
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self)
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

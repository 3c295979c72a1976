//! Value types shared by the submitter, the tracker and the RPC layer.
//!
//! The node is loose about numbers: depending on the endpoint and version
//! an unsigned value arrives as a JSON number or as a decimal string. Every
//! `u64` read from a response goes through [`serde_uint`] so both work.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use crate::config::{SMIDGE_PER_SMH, TRANSACTION_ID_LENGTH};

// ---------------------------------------------------------------------------
// TransactionId
// ---------------------------------------------------------------------------

/// Errors from parsing a transaction id.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransactionIdError {
    #[error("invalid transaction id length: expected 64 hex characters, got {0}")]
    InvalidLength(usize),

    #[error("transaction id is not valid hex")]
    InvalidHex,
}

/// A 32-byte transaction hash as assigned by the node.
///
/// Shown as 64 lowercase hex characters without a prefix, which is how the
/// node hands ids back. Parsing accepts an optional `0x`.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct TransactionId([u8; TRANSACTION_ID_LENGTH]);

impl TransactionId {
    pub const fn from_bytes(bytes: [u8; TRANSACTION_ID_LENGTH]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; TRANSACTION_ID_LENGTH] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl FromStr for TransactionId {
    type Err = TransactionIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let digits = trimmed.strip_prefix("0x").unwrap_or(trimmed);
        if digits.len() != TRANSACTION_ID_LENGTH * 2 {
            return Err(TransactionIdError::InvalidLength(digits.len()));
        }
        let mut bytes = [0u8; TRANSACTION_ID_LENGTH];
        hex::decode_to_slice(digits, &mut bytes).map_err(|_| TransactionIdError::InvalidHex)?;
        Ok(Self(bytes))
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TransactionId({})", self.to_hex())
    }
}

impl Serialize for TransactionId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TransactionId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// Submission
// ---------------------------------------------------------------------------

/// What the faucet knows about a transfer the node accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubmissionResult {
    pub id: TransactionId,
    /// Raw status string from the node. Always `"ok"` here; anything else
    /// is reported as a rejection instead.
    pub status: String,
    /// Nonce the transfer was signed with.
    pub nonce: u64,
    pub amount: u64,
    pub gas_limit: u64,
    pub fee: u64,
}

// ---------------------------------------------------------------------------
// Transaction info
// ---------------------------------------------------------------------------

/// `{"address": "..."}` as nested inside node responses.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountRef {
    #[serde(default)]
    pub address: String,
}

/// A transaction as reported by `gettransaction`.
///
/// Fields the faucet does not interpret are kept in `extra` so an account
/// dump can write the node's view back out unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionInfo {
    #[serde(default)]
    pub sender: AccountRef,
    #[serde(default)]
    pub receiver: AccountRef,
    #[serde(default, deserialize_with = "serde_uint::deserialize")]
    pub amount: u64,
    #[serde(default, deserialize_with = "serde_uint::deserialize")]
    pub fee: u64,
    #[serde(default)]
    pub status: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl TransactionInfo {
    pub fn is_confirmed(&self) -> bool {
        self.status == crate::config::CONFIRMED_STATUS
    }
}

/// `nodestatus` reply.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeStatus {
    #[serde(default, deserialize_with = "serde_uint::deserialize")]
    pub peers: u64,
    #[serde(default)]
    pub synced: bool,
    #[serde(
        default,
        rename = "currentLayer",
        deserialize_with = "serde_uint::deserialize"
    )]
    pub current_layer: u64,
    #[serde(
        default,
        rename = "syncedLayer",
        deserialize_with = "serde_uint::deserialize"
    )]
    pub synced_layer: u64,
}

// ---------------------------------------------------------------------------
// Display helpers
// ---------------------------------------------------------------------------

/// Renders a smidge amount in display units with three decimals.
///
/// Integer arithmetic only; digits past the third decimal are dropped.
pub fn format_smh(smidge: u64) -> String {
    let whole = smidge / SMIDGE_PER_SMH;
    let millis = (smidge % SMIDGE_PER_SMH) / (SMIDGE_PER_SMH / 1_000);
    format!("{}.{:03}", whole, millis)
}

// ---------------------------------------------------------------------------
// Lenient integers
// ---------------------------------------------------------------------------

/// Deserializers for node integers that may be numbers or decimal strings.
pub mod serde_uint {
    use serde::{de, Deserialize, Deserializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(u64),
        Text(String),
    }

    fn from_raw<E: de::Error>(raw: Raw) -> Result<u64, E> {
        match raw {
            Raw::Number(n) => Ok(n),
            Raw::Text(s) => s
                .trim()
                .parse()
                .map_err(|_| E::custom(format!("expected unsigned integer, got {:?}", s))),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
        from_raw(Raw::deserialize(deserializer)?)
    }

    /// Same as [`deserialize`], but `null` becomes `None`.
    pub fn option<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u64>, D::Error> {
        Option::<Raw>::deserialize(deserializer)?
            .map(from_raw)
            .transpose()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

//! Canonical transfer encoding.
//!
//! The node expects a fixed 52-byte payload in XDR layout: every integer is
//! an 8-byte big-endian "hyper", the destination is a fixed 20-byte opaque
//! field, and the order never changes:
//!
//! ```text
//! offset  size  field
//!      0     8  nonce
//!      8    20  destination address
//!     28     8  gas limit
//!     36     8  fee
//!     44     8  amount
//! ```
//!
//! The signature is computed over exactly these 52 bytes and appended to
//! them, giving the 116-byte signed transaction that goes on the wire.

use thiserror::Error;

use crate::config::{
    ADDRESS_LENGTH, HYPER_LENGTH, PAYLOAD_LENGTH, SIGNATURE_LENGTH, SIGNED_TRANSACTION_LENGTH,
};
use crate::crypto::keys::KeyMaterial;
use crate::crypto::signatures::{self, SignatureError, TransactionSignature};
use crate::identity::address::Address;

/// Errors from building or parsing encoded transfers.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EncodingError {
    #[error("destination too short: need at least {ADDRESS_LENGTH} bytes, got {got}")]
    DestinationTooShort { got: usize },

    #[error("invalid encoded length: expected {expected} bytes, got {got}")]
    InvalidLength { expected: usize, got: usize },
}

/// The fields of a transfer, before signing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransactionPayload {
    pub nonce: u64,
    pub destination: Address,
    pub gas_limit: u64,
    pub fee: u64,
    pub amount: u64,
}

impl TransactionPayload {
    /// Serializes the payload into its canonical 52 bytes.
    pub fn to_bytes(&self) -> [u8; PAYLOAD_LENGTH] {
        let mut out = [0u8; PAYLOAD_LENGTH];
        let mut cursor = 0;

        let mut put = |bytes: &[u8]| {
            out[cursor..cursor + bytes.len()].copy_from_slice(bytes);
            cursor += bytes.len();
        };
        put(&self.nonce.to_be_bytes());
        put(self.destination.as_bytes());
        put(&self.gas_limit.to_be_bytes());
        put(&self.fee.to_be_bytes());
        put(&self.amount.to_be_bytes());

        out
    }

    /// Parses a canonical payload back into its fields.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, EncodingError> {
        let raw: &[u8; PAYLOAD_LENGTH] =
            bytes.try_into().map_err(|_| EncodingError::InvalidLength {
                expected: PAYLOAD_LENGTH,
                got: bytes.len(),
            })?;

        let hyper = |offset: usize| {
            let mut buf = [0u8; HYPER_LENGTH];
            buf.copy_from_slice(&raw[offset..offset + HYPER_LENGTH]);
            u64::from_be_bytes(buf)
        };
        let mut destination = [0u8; ADDRESS_LENGTH];
        destination.copy_from_slice(&raw[HYPER_LENGTH..HYPER_LENGTH + ADDRESS_LENGTH]);

        let after_address = HYPER_LENGTH + ADDRESS_LENGTH;
        Ok(Self {
            nonce: hyper(0),
            destination: Address::from_bytes(destination),
            gas_limit: hyper(after_address),
            fee: hyper(after_address + HYPER_LENGTH),
            amount: hyper(after_address + 2 * HYPER_LENGTH),
        })
    }

    /// Signs the canonical bytes and returns the wire-ready transaction.
    pub fn sign(&self, key: &KeyMaterial) -> SignedTransaction {
        SignedTransaction {
            payload: *self,
            signature: signatures::sign(key.seed(), &self.to_bytes()),
        }
    }
}

/// Encodes a transfer from raw parts.
///
/// `destination` may be longer than an address (a 32-byte public key, say);
/// only its trailing 20 bytes are used and the rest is not inspected.
pub fn encode(
    nonce: u64,
    destination: &[u8],
    gas_limit: u64,
    fee: u64,
    amount: u64,
) -> Result<[u8; PAYLOAD_LENGTH], EncodingError> {
    let destination = Address::from_key_bytes(destination).map_err(|_| {
        EncodingError::DestinationTooShort {
            got: destination.len(),
        }
    })?;
    Ok(TransactionPayload {
        nonce,
        destination,
        gas_limit,
        fee,
        amount,
    }
    .to_bytes())
}

/// A payload with its signature appended. Always 116 bytes on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignedTransaction {
    payload: TransactionPayload,
    signature: TransactionSignature,
}

impl SignedTransaction {
    /// Splits wire bytes into payload and signature. The signature is not
    /// checked here; see [`verify`](Self::verify).
    pub fn from_slice(bytes: &[u8]) -> Result<Self, EncodingError> {
        if bytes.len() != SIGNED_TRANSACTION_LENGTH {
            return Err(EncodingError::InvalidLength {
                expected: SIGNED_TRANSACTION_LENGTH,
                got: bytes.len(),
            });
        }
        let payload = TransactionPayload::from_bytes(&bytes[..PAYLOAD_LENGTH])?;
        let mut sig = [0u8; SIGNATURE_LENGTH];
        sig.copy_from_slice(&bytes[PAYLOAD_LENGTH..]);
        Ok(Self {
            payload,
            signature: TransactionSignature::from_bytes(sig),
        })
    }

    pub fn to_bytes(&self) -> [u8; SIGNED_TRANSACTION_LENGTH] {
        let mut bytes = [0u8; SIGNED_TRANSACTION_LENGTH];
        bytes[..PAYLOAD_LENGTH].copy_from_slice(&self.payload.to_bytes());
        bytes[PAYLOAD_LENGTH..].copy_from_slice(self.signature.as_bytes());
        bytes
    }

    pub fn payload(&self) -> &TransactionPayload {
        &self.payload
    }

    pub fn signature(&self) -> &TransactionSignature {
        &self.signature
    }

    /// Checks the embedded signature against `public_key`.
    pub fn verify(&self, public_key: &[u8; 32]) -> Result<(), SignatureError> {
        signatures::verify(public_key, &self.payload.to_bytes(), &self.signature)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

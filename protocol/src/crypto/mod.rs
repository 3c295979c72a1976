//! # Cryptographic Primitives
//!
//! Key material and the ledger's signature scheme. The scheme is Ed25519
//! with a shortened challenge hash (see [`signatures`]), built on
//! `curve25519-dalek`. Keys are derived with `ed25519-dalek`.
//!
//! Nothing here touches the network or logs key bytes.

pub mod keys;
pub mod signatures;

pub use keys::{KeyError, KeyMaterial};
pub use signatures::{extract_public_key, sign, verify, SignatureError, TransactionSignature};

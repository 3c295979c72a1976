// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Smidge Faucet: Core Library
//!
//! Hands out a fixed amount of the ledger's native token to whoever asks,
//! at most once per cooldown window, and follows every transfer until the
//! node tells us how it ended.
//!
//! Three pieces carry the weight here:
//!
//! - **Encoding and signing.** The node only accepts a transfer if the 52-byte
//!   payload is laid out exactly as it expects and the Ed25519 signature over
//!   it checks out. There is no negotiation; one wrong byte and it's rejected.
//! - **Confirmation tracking.** Once submitted, a transfer is polled until it
//!   is confirmed, evicted from the node's pool, or we run out of patience.
//! - **Cooldowns.** One request per requester per window, enforced with an
//!   atomic check-and-insert so two quick messages can't both get paid.
//!
//! ## Architecture
//!
//! - **config**: Wire constants and the operator's `FaucetConfig`.
//! - **identity**: The 20-byte address codec.
//! - **crypto**: Key material, signing, verification.
//! - **transaction**: Payload encoding, submission, confirmation tracking.
//! - **network**: The node's JSON RPC contract and its HTTP client.
//! - **faucet**: Cooldown registry and the request dispatcher.
//! - **history**: Statistics log and account dumps.
//!
//! The node is the source of truth for everything. We never validate a
//! transfer beyond what it reports back, and we never retry a submission.

pub mod config;
pub mod crypto;
pub mod error;
pub mod faucet;
pub mod history;
pub mod identity;
pub mod network;
pub mod transaction;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use error::FaucetError;

//! # Transaction Module
//!
//! The life of one faucet transfer, from bytes to verdict.
//!
//! ```text
//! encoding.rs      - canonical 52-byte payload, signing, 116-byte wire form
//! types.rs         - TransactionId, node-reported info, smidge formatting
//! submitter.rs     - nonce → balance → funds check → sign → submit
//! confirmation.rs  - polls the node until Confirmed / Removed / TimedOut
//! ```
//!
//! ## Lifecycle
//!
//! 1. **Build**: [`TransactionPayload`] holds the five fixed-width fields.
//! 2. **Sign**: [`TransactionPayload::sign`] appends the 64-byte signature.
//! 3. **Submit**: [`TransactionSubmitter::submit`] sends it once and returns
//!    the node-assigned [`TransactionId`].
//! 4. **Track**: [`ConfirmationTracker::track`] turns that id into a
//!    [`ConfirmationOutcome`].
//!
//! All amounts are `u64` smidge. Display conversion happens at the edge,
//! in [`format_smh`].

pub mod confirmation;
pub mod encoding;
pub mod submitter;
pub mod types;

pub use confirmation::{ConfirmationOutcome, ConfirmationTracker, PollState};
pub use encoding::{encode, EncodingError, SignedTransaction, TransactionPayload};
pub use submitter::{has_sufficient_funds, TransactionSubmitter, TransferRequest};
pub use types::{
    format_smh, AccountRef, NodeStatus, SubmissionResult, TransactionId, TransactionIdError,
    TransactionInfo,
};

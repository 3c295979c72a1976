//! Top-level error type for dispensing.
//!
//! A transfer that times out or gets evicted from the mempool is *not* an
//! error. Those are [`ConfirmationOutcome`](crate::transaction::confirmation::ConfirmationOutcome)
//! values. `FaucetError` covers everything that stops a transfer from being
//! submitted, plus a submit call whose result never came back.
//!
//! Only [`FaucetError::SubmissionUnknown`] can follow a transfer that the
//! node actually holds. Every other variant is raised before the signed
//! bytes leave the faucet, or is the node saying no.

use thiserror::Error;

use crate::crypto::keys::KeyError;
use crate::identity::address::{Address, AddressError};
use crate::network::rpc::RpcError;
use crate::transaction::encoding::EncodingError;

#[derive(Debug, Error)]
pub enum FaucetError {
    /// The node has no nonce or balance for the address.
    #[error("uninitialized address {address}")]
    UninitializedAddress { address: Address },

    #[error("insufficient funds: amount {amount}, balance {balance}, gas limit {gas_limit}")]
    InsufficientFunds {
        amount: u64,
        balance: u64,
        gas_limit: u64,
    },

    /// The node refused the transaction. `status` is whatever it said.
    #[error("submission rejected by node: {status}")]
    SubmissionRejected { status: String },

    #[error("network error: {0}")]
    Network(#[from] RpcError),

    /// The submit call failed or came back unreadable. The node may have
    /// taken the transfer anyway.
    #[error("submission outcome unknown: {0}")]
    SubmissionUnknown(#[source] RpcError),

    #[error("key error: {0}")]
    Key(#[from] KeyError),

    #[error("address error: {0}")]
    Address(#[from] AddressError),

    #[error("encoding error: {0}")]
    Encoding(#[from] EncodingError),
}

impl FaucetError {
    /// Whether the failure came from talking to the node rather than from
    /// the faucet's own inputs.
    pub fn is_network(&self) -> bool {
        matches!(self, Self::Network(_) | Self::SubmissionUnknown(_))
    }

    /// Whether a transfer may exist on the node despite the error.
    pub fn may_have_reached_node(&self) -> bool {
        matches!(self, Self::SubmissionUnknown(_))
    }
}

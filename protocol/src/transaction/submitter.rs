//! # Transfer Submission
//!
//! Turns "send N smidge to X" into one signed transaction on the node:
//!
//! 1. ask the node for the faucet's nonce,
//! 2. ask for its balance,
//! 3. refuse if the funds check fails,
//! 4. encode and sign,
//! 5. submit, once.
//!
//! No step is retried here. A failure of step 5 itself may or may not have
//! reached the ledger and comes back as `SubmissionUnknown`. Only the caller
//! knows whether sending again is acceptable.
//!
//! ## The funds check
//!
//! A transfer goes ahead only when `amount < balance - gas_limit`. This is
//! the rule the faucet has always applied. It is stricter than
//! `amount + gas_limit <= balance` by exactly one smidge at the boundary,
//! and the node enforces its own rule regardless. A balance smaller than
//! the gas limit counts as insufficient.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::SUBMISSION_OK;
use crate::crypto::keys::KeyMaterial;
use crate::error::FaucetError;
use crate::identity::address::Address;
use crate::network::rpc::{Endpoint, NodeRpc, RpcError};
use crate::transaction::encoding::{SignedTransaction, TransactionPayload};
use crate::transaction::types::SubmissionResult;

/// One outbound transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferRequest {
    pub destination: Address,
    pub amount: u64,
    /// Fee per unit of gas.
    pub gas_price: u64,
    /// Upper bound on gas. `None` means `gas_price + 1`.
    pub gas_limit: Option<u64>,
}

impl TransferRequest {
    pub fn effective_gas_limit(&self) -> u64 {
        self.gas_limit
            .unwrap_or_else(|| self.gas_price.saturating_add(1))
    }
}

/// Whether `amount` may be sent from `balance` with `gas_limit` reserved.
pub fn has_sufficient_funds(amount: u64, balance: u64, gas_limit: u64) -> bool {
    matches!(balance.checked_sub(gas_limit), Some(available) if amount < available)
}

/// Builds, signs and submits transfers from the faucet's account.
pub struct TransactionSubmitter {
    rpc: Arc<dyn NodeRpc>,
    sender: Address,
    key: KeyMaterial,
}

impl TransactionSubmitter {
    pub fn new(rpc: Arc<dyn NodeRpc>, sender: Address, key: KeyMaterial) -> Self {
        Self { rpc, sender, key }
    }

    pub fn sender(&self) -> &Address {
        &self.sender
    }

    /// Encodes and signs a transfer with an explicit nonce. No network.
    pub fn build(&self, nonce: u64, request: &TransferRequest) -> SignedTransaction {
        TransactionPayload {
            nonce,
            destination: request.destination,
            gas_limit: request.effective_gas_limit(),
            fee: request.gas_price,
            amount: request.amount,
        }
        .sign(&self.key)
    }

    /// Runs the full nonce → balance → check → sign → submit sequence.
    pub async fn submit(&self, request: &TransferRequest) -> Result<SubmissionResult, FaucetError> {
        let gas_limit = request.effective_gas_limit();

        let nonce = self
            .rpc
            .nonce(&self.sender)
            .await?
            .ok_or(FaucetError::UninitializedAddress {
                address: self.sender,
            })?;
        let balance = self
            .rpc
            .balance(&self.sender)
            .await?
            .ok_or(FaucetError::UninitializedAddress {
                address: self.sender,
            })?;

        debug!(sender = %self.sender, nonce, balance, "faucet account state");

        if !has_sufficient_funds(request.amount, balance, gas_limit) {
            warn!(
                amount = request.amount,
                balance, gas_limit, "refusing transfer: insufficient funds"
            );
            return Err(FaucetError::InsufficientFunds {
                amount: request.amount,
                balance,
                gas_limit,
            });
        }

        let signed = self.build(nonce, request);
        let response = self
            .rpc
            .submit_transaction(&signed)
            .await
            .map_err(FaucetError::SubmissionUnknown)?;

        if response.status != SUBMISSION_OK {
            warn!(status = %response.status, nonce, "node rejected transfer");
            return Err(FaucetError::SubmissionRejected {
                status: response.status,
            });
        }
        let id = response.id.ok_or_else(|| {
            FaucetError::SubmissionUnknown(RpcError::Malformed {
                endpoint: Endpoint::SubmitTransaction,
                message: "accepted submission without an id".into(),
            })
        })?;

        info!(
            tx_id = %id,
            to = %request.destination,
            amount = request.amount,
            nonce,
            "transfer submitted"
        );

        Ok(SubmissionResult {
            id,
            status: response.status,
            nonce,
            amount: request.amount,
            gas_limit,
            fee: request.gas_price,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::signatures;
    use crate::testing::ScriptedNode;

    fn destination() -> Address {
        "0x00112233445566778899aabbccddeeff00112233".parse().unwrap()
    }

    fn request(amount: u64) -> TransferRequest {
        TransferRequest {
            destination: destination(),
            amount,
            gas_price: 10,
            gas_limit: None,
        }
    }

    fn submitter(node: &Arc<ScriptedNode>) -> TransactionSubmitter {
        let key = KeyMaterial::from_seed([1u8; 32]);
        TransactionSubmitter::new(node.clone(), key.address(), key)
    }

    #[test]
    fn gas_limit_defaults_to_price_plus_one() {
        assert_eq!(request(1).effective_gas_limit(), 11);
        let explicit = TransferRequest {
            gas_limit: Some(30),
            ..request(1)
        };
        assert_eq!(explicit.effective_gas_limit(), 30);
    }

    #[test]
    fn funds_check_is_strict() {
        assert!(has_sufficient_funds(100, 1000, 11));
        // 989 == 1000 - 11, so not strictly less.
        assert!(!has_sufficient_funds(989, 1000, 11));
        assert!(has_sufficient_funds(988, 1000, 11));
        assert!(!has_sufficient_funds(0, 5, 11));
    }

    #[tokio::test]
    async fn submits_signed_transfer_with_node_nonce() {
        let node = Arc::new(ScriptedNode::new());
        let sub = submitter(&node);
        node.set_account(*sub.sender(), 7, 1000);

        let result = sub.submit(&request(100)).await.unwrap();
        assert_eq!(result.nonce, 7);
        assert_eq!(result.gas_limit, 11);
        assert_eq!(result.status, "ok");

        let sent = node.submitted();
        assert_eq!(sent.len(), 1);
        let payload = sent[0].payload();
        assert_eq!(payload.nonce, 7);
        assert_eq!(payload.destination, destination());
        assert_eq!(payload.amount, 100);
        assert_eq!(payload.fee, 10);
        assert_eq!(payload.gas_limit, 11);

        let key = KeyMaterial::from_seed([1u8; 32]);
        sent[0].verify(key.public_key()).unwrap();
        assert_eq!(
            signatures::extract_public_key(&payload.to_bytes(), sent[0].signature()).unwrap(),
            *key.public_key()
        );
    }

    #[tokio::test]
    async fn unknown_sender_is_uninitialized() {
        let node = Arc::new(ScriptedNode::new());
        let sub = submitter(&node);

        let err = sub.submit(&request(100)).await.unwrap_err();
        assert!(matches!(err, FaucetError::UninitializedAddress { .. }));
        assert!(node.submitted().is_empty());
    }

    #[tokio::test]
    async fn insufficient_funds_never_reaches_the_node() {
        let node = Arc::new(ScriptedNode::new());
        let sub = submitter(&node);
        node.set_account(*sub.sender(), 0, 50);

        let err = sub.submit(&request(100)).await.unwrap_err();
        assert!(matches!(
            err,
            FaucetError::InsufficientFunds {
                amount: 100,
                balance: 50,
                gas_limit: 11
            }
        ));
        assert!(node.submitted().is_empty());
    }

    #[tokio::test]
    async fn non_ok_status_is_rejection_with_raw_status() {
        let node = Arc::new(ScriptedNode::new());
        let sub = submitter(&node);
        node.set_account(*sub.sender(), 0, 1000);
        node.set_submit_status("nonce too low");

        let err = sub.submit(&request(100)).await.unwrap_err();
        match err {
            FaucetError::SubmissionRejected { status } => assert_eq!(status, "nonce too low"),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn failed_submit_call_is_ambiguous() {
        let node = Arc::new(ScriptedNode::new());
        let sub = submitter(&node);
        node.set_account(*sub.sender(), 0, 1000);
        node.fail_next_submit(RpcError::Transport("operation timed out".into()));

        let err = sub.submit(&request(100)).await.unwrap_err();
        assert!(matches!(
            err,
            FaucetError::SubmissionUnknown(RpcError::Transport(_))
        ));
        assert!(err.may_have_reached_node());
    }

    #[tokio::test]
    async fn failed_lookup_is_plain_network_error() {
        let node = Arc::new(ScriptedNode::new());
        let sub = submitter(&node);
        node.set_account(*sub.sender(), 0, 1000);
        node.fail_next_account_lookup(RpcError::Transport("connection refused".into()));

        let err = sub.submit(&request(100)).await.unwrap_err();
        assert!(matches!(err, FaucetError::Network(RpcError::Transport(_))));
        assert!(!err.may_have_reached_node());
        assert!(node.submitted().is_empty());
    }

    #[test]
    fn build_is_deterministic() {
        let node = Arc::new(ScriptedNode::new());
        let sub = submitter(&node);
        assert_eq!(sub.build(3, &request(5)), sub.build(3, &request(5)));
        assert_ne!(sub.build(3, &request(5)), sub.build(4, &request(5)));
    }
}

//! # Node RPC Contract
//!
//! Everything the faucet asks of the ledger node, as a trait. The node
//! speaks JSON over HTTP POST, one endpoint per operation:
//!
//! | Endpoint            | Request                        | Reply                                   |
//! |--------------------|--------------------------------|-----------------------------------------|
//! | `nonce`             | `{"address": "0x…"}`           | `{"value": <uint>}`                     |
//! | `balance`           | `{"address": "0x…"}`           | `{"value": <uint>}`                     |
//! | `submittransaction` | `{"tx": [116 bytes]}`          | `{"id": "<hex>", "value": "ok"}`        |
//! | `gettransaction`    | `{"id": [32 bytes]}`           | transaction info, or an error reply     |
//! | `nodestatus`        | `{}`                           | `{"peers", "synced", "currentLayer", …}`|
//! | `accounttxs`        | `{"account": {"address": …}}`  | `{"txs": ["<hex>", …]}`                 |
//!
//! The node does not always answer in JSON. When something goes wrong it
//! returns a text body containing the word `error`, and the faucet reads
//! meaning out of that text: a missing value for nonce/balance, and
//! `transaction not found` for a transaction that left the mempool. The
//! decoding of those replies lives here, next to the contract, so the HTTP
//! client stays a thin pipe and the rules are testable without a socket.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::identity::address::Address;
use crate::transaction::encoding::SignedTransaction;
use crate::transaction::types::{
    serde_uint, AccountRef, NodeStatus, TransactionId, TransactionIdError, TransactionInfo,
};

/// Marker inside an error reply that means "this transaction is gone".
pub const TRANSACTION_NOT_FOUND: &str = "transaction not found";

// ---------------------------------------------------------------------------
// Endpoints
// ---------------------------------------------------------------------------

/// The node endpoints the faucet calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Nonce,
    Balance,
    SubmitTransaction,
    GetTransaction,
    NodeStatus,
    AccountTransactions,
}

impl Endpoint {
    /// Path segment appended to the configured base URL.
    pub fn path(&self) -> &'static str {
        match self {
            Self::Nonce => "nonce",
            Self::Balance => "balance",
            Self::SubmitTransaction => "submittransaction",
            Self::GetTransaction => "gettransaction",
            Self::NodeStatus => "nodestatus",
            Self::AccountTransactions => "accounttxs",
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Failures talking to the node.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RpcError {
    /// The request never produced a usable body: connection refused,
    /// timeout, or a non-success HTTP status without an error reply.
    #[error("transport error: {0}")]
    Transport(String),

    /// The body is not in the shape the endpoint promises.
    #[error("malformed reply from {endpoint}: {message}")]
    Malformed { endpoint: Endpoint, message: String },

    /// The shape is right but a field's value is unusable.
    #[error("invalid `{field}` in reply from {endpoint}: {message}")]
    InvalidResponse {
        endpoint: Endpoint,
        field: &'static str,
        message: String,
    },
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct AddressRequest {
    pub address: String,
}

impl AddressRequest {
    pub fn new(address: &Address) -> Self {
        Self {
            address: address.to_string(),
        }
    }
}

/// Signed bytes go over the wire as a JSON list of integers.
#[derive(Debug, Clone, Serialize)]
pub struct SubmitRequest {
    pub tx: Vec<u8>,
}

impl SubmitRequest {
    pub fn new(tx: &SignedTransaction) -> Self {
        Self {
            tx: tx.to_bytes().to_vec(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TransactionRequest {
    pub id: Vec<u8>,
}

impl TransactionRequest {
    pub fn new(id: &TransactionId) -> Self {
        Self {
            id: id.as_bytes().to_vec(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AccountTransactionsRequest {
    pub account: AccountRef,
}

impl AccountTransactionsRequest {
    pub fn new(address: &Address) -> Self {
        Self {
            account: AccountRef {
                address: address.to_string(),
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Replies
// ---------------------------------------------------------------------------

/// A node reply before endpoint-specific decoding.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// A text body mentioning `error`. Carried verbatim.
    Error(String),
    Json(serde_json::Value),
}

impl Reply {
    /// Classifies a response body the way the node's clients always have:
    /// any body containing `error` is an error reply, whatever its format.
    pub fn from_body(endpoint: Endpoint, body: &str) -> Result<Self, RpcError> {
        if body.contains("error") {
            return Ok(Self::Error(body.trim().to_string()));
        }
        serde_json::from_str(body)
            .map(Self::Json)
            .map_err(|e| RpcError::Malformed {
                endpoint,
                message: e.to_string(),
            })
    }
}

/// Node's answer to a submission. `id` is absent when the node refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitResponse {
    pub id: Option<TransactionId>,
    pub status: String,
}

/// Outcome of a `gettransaction` lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum TransactionLookup {
    Found(TransactionInfo),
    /// The node no longer knows the transaction.
    NotFound,
}

#[derive(Deserialize)]
struct ValueReply {
    #[serde(default, deserialize_with = "serde_uint::option")]
    value: Option<u64>,
}

#[derive(Deserialize)]
struct RawSubmitReply {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    value: Option<serde_json::Value>,
}

#[derive(Deserialize)]
struct AccountTransactionsReply {
    #[serde(default)]
    txs: Vec<String>,
}

fn from_json<T: serde::de::DeserializeOwned>(
    endpoint: Endpoint,
    value: serde_json::Value,
) -> Result<T, RpcError> {
    serde_json::from_value(value).map_err(|e| RpcError::Malformed {
        endpoint,
        message: e.to_string(),
    })
}

/// `nonce` / `balance`: `None` when the node has no value for the address.
pub fn decode_value(endpoint: Endpoint, reply: Reply) -> Result<Option<u64>, RpcError> {
    match reply {
        Reply::Error(_) => Ok(None),
        Reply::Json(value) => Ok(from_json::<ValueReply>(endpoint, value)?.value),
    }
}

pub fn decode_submit(reply: Reply) -> Result<SubmitResponse, RpcError> {
    let endpoint = Endpoint::SubmitTransaction;
    match reply {
        Reply::Error(text) => Ok(SubmitResponse {
            id: None,
            status: text,
        }),
        Reply::Json(value) => {
            let raw: RawSubmitReply = from_json(endpoint, value)?;
            let status = match raw.value {
                Some(serde_json::Value::String(s)) => s,
                Some(other) => other.to_string(),
                None => String::new(),
            };
            let id = raw
                .id
                .map(|id| {
                    id.parse().map_err(|e: TransactionIdError| RpcError::InvalidResponse {
                        endpoint,
                        field: "id",
                        message: e.to_string(),
                    })
                })
                .transpose()?;
            Ok(SubmitResponse { id, status })
        }
    }
}

pub fn decode_transaction(reply: Reply) -> Result<TransactionLookup, RpcError> {
    let endpoint = Endpoint::GetTransaction;
    match reply {
        Reply::Error(text) if text.contains(TRANSACTION_NOT_FOUND) => {
            Ok(TransactionLookup::NotFound)
        }
        Reply::Error(text) => Err(RpcError::Malformed {
            endpoint,
            message: text,
        }),
        Reply::Json(value) => Ok(TransactionLookup::Found(from_json(endpoint, value)?)),
    }
}

pub fn decode_node_status(reply: Reply) -> Result<NodeStatus, RpcError> {
    let endpoint = Endpoint::NodeStatus;
    match reply {
        Reply::Error(text) => Err(RpcError::Malformed {
            endpoint,
            message: text,
        }),
        Reply::Json(value) => from_json(endpoint, value),
    }
}

/// `accounttxs`: the node may list a hash more than once; duplicates are
/// dropped, first occurrence wins.
pub fn decode_account_transactions(reply: Reply) -> Result<Vec<TransactionId>, RpcError> {
    let endpoint = Endpoint::AccountTransactions;
    let raw: AccountTransactionsReply = match reply {
        Reply::Error(text) => {
            return Err(RpcError::Malformed {
                endpoint,
                message: text,
            })
        }
        Reply::Json(value) => from_json(endpoint, value)?,
    };

    let mut ids: Vec<TransactionId> = Vec::with_capacity(raw.txs.len());
    for hash in raw.txs {
        let id: TransactionId = hash.parse().map_err(|e: TransactionIdError| {
            RpcError::InvalidResponse {
                endpoint,
                field: "txs",
                message: e.to_string(),
            }
        })?;
        if !ids.contains(&id) {
            ids.push(id);
        }
    }
    Ok(ids)
}

// ---------------------------------------------------------------------------
// NodeRpc
// ---------------------------------------------------------------------------

/// The node, as the faucet sees it.
///
/// Implemented over HTTP by [`HttpRpcClient`](crate::network::client::HttpRpcClient)
/// and in memory by the scripted node used in tests.
#[async_trait]
pub trait NodeRpc: Send + Sync {
    /// Next nonce for `address`, or `None` if the node has none.
    async fn nonce(&self, address: &Address) -> Result<Option<u64>, RpcError>;

    /// Balance of `address` in smidge, or `None` if the node has none.
    async fn balance(&self, address: &Address) -> Result<Option<u64>, RpcError>;

    async fn submit_transaction(&self, tx: &SignedTransaction) -> Result<SubmitResponse, RpcError>;

    async fn transaction_info(&self, id: &TransactionId) -> Result<TransactionLookup, RpcError>;

    async fn node_status(&self) -> Result<NodeStatus, RpcError>;

    async fn account_transactions(&self, address: &Address)
        -> Result<Vec<TransactionId>, RpcError>;
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

//! # Network Module
//!
//! How the faucet talks to the ledger node. The node is the source of truth
//! for nonces, balances and transaction status; we only ask.
//!
//! ```text
//! rpc.rs     - NodeRpc trait, endpoint enum, request/reply shapes and decoders
//! client.rs  - reqwest-backed HttpRpcClient
//! ```
//!
//! The trait is the seam: the submitter, the tracker and the dispatcher
//! hold an `Arc<dyn NodeRpc>` and never know whether there is a socket on
//! the other side.

pub mod client;
pub mod rpc;

pub use client::HttpRpcClient;
pub use rpc::{Endpoint, NodeRpc, Reply, RpcError, SubmitResponse, TransactionLookup};

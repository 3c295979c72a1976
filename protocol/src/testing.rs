//! In-memory node for tests.
//!
//! [`ScriptedNode`] implements [`NodeRpc`] from a script instead of a
//! socket: accounts with a nonce and balance, a submission status, and a
//! queue of answers per transaction id. The last scripted answer for an id
//! repeats forever, so `["PENDING", "CONFIRMED"]` means "pending once, then
//! confirmed on every later lookup".
//!
//! Compiled for this crate's tests and, behind the `testing` feature, for
//! the tests of crates that depend on it.

use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use parking_lot::Mutex;
use sha2::{Digest, Sha256};

use crate::config::SUBMISSION_OK;
use crate::crypto::signatures;
use crate::identity::address::Address;
use crate::network::rpc::{NodeRpc, RpcError, SubmitResponse, TransactionLookup};
use crate::transaction::encoding::SignedTransaction;
use crate::transaction::types::{AccountRef, NodeStatus, TransactionId, TransactionInfo};

#[derive(Debug, Clone)]
enum Scripted {
    Info(TransactionInfo),
    NotFound,
}

impl Scripted {
    fn status(status: &str) -> Self {
        Self::Info(TransactionInfo {
            sender: AccountRef::default(),
            receiver: AccountRef::default(),
            amount: 0,
            fee: 0,
            status: status.to_string(),
            extra: serde_json::Map::new(),
        })
    }

    fn lookup(&self) -> TransactionLookup {
        match self {
            Self::Info(info) => TransactionLookup::Found(info.clone()),
            Self::NotFound => TransactionLookup::NotFound,
        }
    }
}

#[derive(Default)]
struct Inner {
    accounts: HashMap<Address, (u64, u64)>,
    submitted: Vec<SignedTransaction>,
    submit_status: Option<String>,
    submit_ids: VecDeque<TransactionId>,
    submit_failures: VecDeque<RpcError>,
    account_failures: VecDeque<RpcError>,
    scripts: HashMap<TransactionId, VecDeque<Scripted>>,
    default_script: Vec<Scripted>,
    lookup_failures: HashMap<TransactionId, (usize, RpcError)>,
    lookups: HashMap<TransactionId, usize>,
    account_txs: HashMap<Address, Vec<TransactionId>>,
    node_status: NodeStatus,
}

/// A scripted stand-in for the ledger node.
#[derive(Default)]
pub struct ScriptedNode {
    inner: Mutex<Inner>,
}

impl ScriptedNode {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the nonce and balance the node reports for `address`.
    pub fn set_account(&self, address: Address, nonce: u64, balance: u64) {
        self.inner.lock().accounts.insert(address, (nonce, balance));
    }

    /// Current `(nonce, balance)` for `address`, if it has an account.
    pub fn account(&self, address: &Address) -> Option<(u64, u64)> {
        self.inner.lock().accounts.get(address).copied()
    }

    /// Status returned for every later submission. Defaults to `"ok"`.
    pub fn set_submit_status(&self, status: &str) {
        self.inner.lock().submit_status = Some(status.to_string());
    }

    /// Id for the next accepted submission. Without one, the id is the
    /// SHA-256 of the signed bytes.
    pub fn queue_submit_id(&self, id: TransactionId) {
        self.inner.lock().submit_ids.push_back(id);
    }

    /// Makes the next submit call fail with `error`.
    pub fn fail_next_submit(&self, error: RpcError) {
        self.inner.lock().submit_failures.push_back(error);
    }

    /// Makes the next nonce or balance lookup fail with `error`.
    pub fn fail_next_account_lookup(&self, error: RpcError) {
        self.inner.lock().account_failures.push_back(error);
    }

    /// Every transaction the node accepted, in order.
    pub fn submitted(&self) -> Vec<SignedTransaction> {
        self.inner.lock().submitted.clone()
    }

    /// Appends status answers for `id`.
    pub fn script_status<'a>(&self, id: TransactionId, statuses: impl IntoIterator<Item = &'a str>) {
        let mut inner = self.inner.lock();
        let queue = inner.scripts.entry(id).or_default();
        queue.extend(statuses.into_iter().map(Scripted::status));
    }

    /// Appends a "transaction not found" answer for `id`.
    pub fn script_not_found(&self, id: TransactionId) {
        self.inner
            .lock()
            .scripts
            .entry(id)
            .or_default()
            .push_back(Scripted::NotFound);
    }

    /// Appends a full transaction record for `id`.
    pub fn script_info(&self, id: TransactionId, info: TransactionInfo) {
        self.inner
            .lock()
            .scripts
            .entry(id)
            .or_default()
            .push_back(Scripted::Info(info));
    }

    /// Answers used for ids with no script of their own. Each such id gets
    /// a fresh copy on first lookup. Empty (the default) means not found.
    pub fn script_default_status<'a>(&self, statuses: impl IntoIterator<Item = &'a str>) {
        self.inner.lock().default_script = statuses.into_iter().map(Scripted::status).collect();
    }

    /// The next `count` lookups of `id` fail with `error`.
    pub fn fail_next_lookups(&self, id: TransactionId, count: usize, error: RpcError) {
        self.inner.lock().lookup_failures.insert(id, (count, error));
    }

    /// How many times `id` was looked up, failures included.
    pub fn lookups(&self, id: &TransactionId) -> usize {
        self.inner.lock().lookups.get(id).copied().unwrap_or(0)
    }

    pub fn set_account_transactions(&self, address: Address, ids: Vec<TransactionId>) {
        self.inner.lock().account_txs.insert(address, ids);
    }

    pub fn set_node_status(&self, status: NodeStatus) {
        self.inner.lock().node_status = status;
    }
}

#[async_trait]
impl NodeRpc for ScriptedNode {
    async fn nonce(&self, address: &Address) -> Result<Option<u64>, RpcError> {
        let mut inner = self.inner.lock();
        if let Some(error) = inner.account_failures.pop_front() {
            return Err(error);
        }
        Ok(inner.accounts.get(address).map(|(nonce, _)| *nonce))
    }

    async fn balance(&self, address: &Address) -> Result<Option<u64>, RpcError> {
        let mut inner = self.inner.lock();
        if let Some(error) = inner.account_failures.pop_front() {
            return Err(error);
        }
        Ok(inner.accounts.get(address).map(|(_, balance)| *balance))
    }

    async fn submit_transaction(&self, tx: &SignedTransaction) -> Result<SubmitResponse, RpcError> {
        let mut inner = self.inner.lock();
        if let Some(error) = inner.submit_failures.pop_front() {
            return Err(error);
        }

        let status = inner
            .submit_status
            .clone()
            .unwrap_or_else(|| SUBMISSION_OK.to_string());
        if status != SUBMISSION_OK {
            return Ok(SubmitResponse { id: None, status });
        }

        let id = inner.submit_ids.pop_front().unwrap_or_else(|| {
            let digest = Sha256::digest(tx.to_bytes());
            let mut bytes = [0u8; 32];
            bytes.copy_from_slice(digest.as_slice());
            TransactionId::from_bytes(bytes)
        });

        // The sender is whoever the signature recovers to. It pays amount
        // plus fee and its nonce moves on.
        let payload = tx.payload();
        let sender = signatures::extract_public_key(&payload.to_bytes(), tx.signature())
            .ok()
            .and_then(|pk| Address::from_key_bytes(&pk).ok());
        if let Some(sender) = sender {
            if let Some((nonce, balance)) = inner.accounts.get_mut(&sender) {
                *nonce += 1;
                *balance = balance.saturating_sub(payload.amount.saturating_add(payload.fee));
            }
        }

        inner.submitted.push(*tx);
        Ok(SubmitResponse {
            id: Some(id),
            status,
        })
    }

    async fn transaction_info(&self, id: &TransactionId) -> Result<TransactionLookup, RpcError> {
        let mut inner = self.inner.lock();
        *inner.lookups.entry(*id).or_insert(0) += 1;

        if let Some((remaining, error)) = inner.lookup_failures.get_mut(id) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(error.clone());
            }
        }

        if !inner.scripts.contains_key(id) {
            let default: VecDeque<Scripted> = inner.default_script.iter().cloned().collect();
            inner.scripts.insert(*id, default);
        }
        let queue = inner.scripts.entry(*id).or_default();
        let answer = if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        };
        Ok(answer
            .map(|s| s.lookup())
            .unwrap_or(TransactionLookup::NotFound))
    }

    async fn node_status(&self) -> Result<NodeStatus, RpcError> {
        Ok(self.inner.lock().node_status.clone())
    }

    async fn account_transactions(
        &self,
        address: &Address,
    ) -> Result<Vec<TransactionId>, RpcError> {
        Ok(self
            .inner
            .lock()
            .account_txs
            .get(address)
            .cloned()
            .unwrap_or_default())
    }
}

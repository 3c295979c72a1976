//! Account transaction dump.
//!
//! Pulls everything the node knows about an address into one JSON file:
//! balance, every transaction hash it lists (deduplicated), the info for
//! each, and whether that transaction moved funds in or out. The file is
//! named after the first 15 characters of the `0x` address.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt, TryStreamExt};
use serde::Serialize;
use tracing::{info, warn};

use super::HistoryError;
use crate::identity::address::Address;
use crate::network::rpc::{NodeRpc, RpcError, TransactionLookup};
use crate::transaction::types::{TransactionId, TransactionInfo};

/// Direction of a transaction relative to the dumped address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    In,
    Out,
}

#[derive(Debug, Clone, Serialize)]
pub struct DumpedTransaction {
    pub id: TransactionId,
    #[serde(flatten)]
    pub info: TransactionInfo,
    pub transaction_type: Direction,
}

#[derive(Debug, Clone, Serialize)]
pub struct AccountDump {
    pub address: Address,
    pub generated_at: DateTime<Utc>,
    /// `None` if the node has no balance for the address.
    pub balance: Option<u64>,
    /// Unique hashes the node listed, including ones it can no longer find.
    pub total_transactions: usize,
    pub in_transactions: usize,
    pub out_transactions: usize,
    pub transactions: Vec<DumpedTransaction>,
}

/// Lookups in flight at once while collecting a dump.
const LOOKUP_CONCURRENCY: usize = 8;

/// `0x` + first 13 hex characters + `.json`.
pub fn dump_file_name(address: &Address) -> String {
    let shown = address.to_string();
    format!("{}.json", &shown[..15])
}

fn direction(info: &TransactionInfo, address: &Address) -> Direction {
    let sender = info.sender.address.trim_start_matches("0x");
    if sender.eq_ignore_ascii_case(&address.to_hex()) {
        Direction::Out
    } else {
        Direction::In
    }
}

/// Collects the dump without touching the filesystem.
pub async fn collect(rpc: &dyn NodeRpc, address: &Address) -> Result<AccountDump, HistoryError> {
    let balance = rpc.balance(address).await?;
    let ids = rpc.account_transactions(address).await?;

    let mut dump = AccountDump {
        address: *address,
        generated_at: Utc::now(),
        balance,
        total_transactions: ids.len(),
        in_transactions: 0,
        out_transactions: 0,
        transactions: Vec::with_capacity(ids.len()),
    };

    // Lookups overlap, results come back in listing order.
    let lookups: Vec<_> = stream::iter(ids)
        .map(|id| async move {
            let lookup = rpc.transaction_info(&id).await?;
            Ok::<_, RpcError>((id, lookup))
        })
        .buffered(LOOKUP_CONCURRENCY)
        .try_collect()
        .await?;

    for (id, lookup) in lookups {
        let info = match lookup {
            TransactionLookup::Found(info) => info,
            TransactionLookup::NotFound => {
                warn!(tx_id = %id, "listed transaction not found, skipping");
                continue;
            }
        };
        let transaction_type = direction(&info, address);
        match transaction_type {
            Direction::In => dump.in_transactions += 1,
            Direction::Out => dump.out_transactions += 1,
        }
        dump.transactions.push(DumpedTransaction {
            id,
            info,
            transaction_type,
        });
    }

    Ok(dump)
}

/// Collects the dump and writes it as pretty JSON into `dir`.
pub async fn write_dump(
    rpc: &dyn NodeRpc,
    address: &Address,
    dir: &Path,
) -> Result<PathBuf, HistoryError> {
    let dump = collect(rpc, address).await?;
    let path = dir.join(dump_file_name(address));
    let json = serde_json::to_vec_pretty(&dump)?;

    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|source| HistoryError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
    tokio::fs::write(&path, json)
        .await
        .map_err(|source| HistoryError::Io {
            path: path.clone(),
            source,
        })?;

    info!(
        address = %address,
        path = %path.display(),
        total = dump.total_transactions,
        "account dump written"
    );
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedNode;
    use crate::transaction::types::AccountRef;

    const ME: &str = "0xc964073a0ee172f3daa62325af021a68f707511a";
    const OTHER: &str = "00112233445566778899aabbccddeeff00112233";

    fn info(sender: &str, receiver: &str, amount: u64) -> TransactionInfo {
        TransactionInfo {
            sender: AccountRef {
                address: sender.to_string(),
            },
            receiver: AccountRef {
                address: receiver.to_string(),
            },
            amount,
            fee: 1,
            status: "CONFIRMED".to_string(),
            extra: serde_json::Map::new(),
        }
    }

    fn scripted() -> (ScriptedNode, Address) {
        let me: Address = ME.parse().unwrap();
        let node = ScriptedNode::new();
        let out_id = TransactionId::from_bytes([1; 32]);
        let in_id = TransactionId::from_bytes([2; 32]);
        let gone_id = TransactionId::from_bytes([3; 32]);

        node.set_account(me, 4, 5_000);
        node.set_account_transactions(me, vec![out_id, in_id, gone_id]);
        node.script_info(out_id, info(&me.to_hex(), OTHER, 100));
        node.script_info(in_id, info(OTHER, &me.to_hex(), 900));
        node.script_not_found(gone_id);
        (node, me)
    }

    #[test]
    fn file_name_uses_first_15_chars() {
        let me: Address = ME.parse().unwrap();
        assert_eq!(dump_file_name(&me), "0xc964073a0ee17.json");
    }

    #[tokio::test]
    async fn tags_directions_and_counts() {
        let (node, me) = scripted();
        let dump = collect(&node, &me).await.unwrap();

        assert_eq!(dump.balance, Some(5_000));
        assert_eq!(dump.total_transactions, 3);
        assert_eq!(dump.out_transactions, 1);
        assert_eq!(dump.in_transactions, 1);
        assert_eq!(dump.transactions.len(), 2);
        assert_eq!(dump.transactions[0].transaction_type, Direction::Out);
        assert_eq!(dump.transactions[1].transaction_type, Direction::In);
    }

    #[tokio::test]
    async fn writes_pretty_json() {
        let (node, me) = scripted();
        let dir = tempfile::tempdir().unwrap();

        let path = write_dump(&node, &me, dir.path()).await.unwrap();
        assert_eq!(path, dir.path().join("0xc964073a0ee17.json"));

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains('\n'));
        let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(json["address"], ME);
        assert_eq!(json["transactions"][0]["transaction_type"], "OUT");
        assert_eq!(json["transactions"][1]["transaction_type"], "IN");
        assert_eq!(json["transactions"][1]["amount"], 900);
    }

    #[tokio::test]
    async fn lookup_failure_aborts_the_dump() {
        let (node, me) = scripted();
        node.fail_next_lookups(
            TransactionId::from_bytes([2; 32]),
            1,
            RpcError::Transport("connection refused".into()),
        );

        let err = collect(&node, &me).await.unwrap_err();
        assert!(matches!(err, HistoryError::Network(RpcError::Transport(_))));
    }
}

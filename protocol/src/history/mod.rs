//! # History
//!
//! What the faucet leaves behind on disk.
//!
//! ```text
//! stats.rs  - append-only `id;outcome` log of settled transfers
//! dump.rs   - per-address JSON dump of everything the node lists
//! ```

pub mod dump;
pub mod stats;

use std::path::PathBuf;

use thiserror::Error;

use crate::network::rpc::RpcError;

pub use dump::{collect, dump_file_name, write_dump, AccountDump, Direction};
pub use stats::{format_elapsed, StatsLog};

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("i/o error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize history: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("node error: {0}")]
    Network(#[from] RpcError),
}

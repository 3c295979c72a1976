//! # CLI Interface
//!
//! `clap` derive definitions for the `faucet` binary. The config path and
//! log format are global so they can follow any subcommand.

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::logging::LogFormat;

/// Smidge faucet.
///
/// Sends a fixed amount to whoever asks, at most once per cooldown window,
/// and follows every transfer until the node confirms or drops it.
#[derive(Parser, Debug)]
#[command(name = "faucet", version, propagate_version = true)]
pub struct FaucetCli {
    /// Path to the faucet configuration file (TOML).
    #[arg(long, short = 'c', global = true, env = "FAUCET_CONFIG", default_value = "faucet.toml")]
    pub config: PathBuf,

    /// Log output format.
    #[arg(long, global = true, env = "FAUCET_LOG_FORMAT", value_enum, default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Serve the HTTP front door and dispense on request.
    Run(RunArgs),
    /// Send one transfer and wait for its outcome.
    Send(SendArgs),
    /// Show an address's balance.
    Balance(AddressArgs),
    /// Show the faucet balance and the node's sync state.
    Status,
    /// Show what the node knows about a transaction.
    TxInfo(TxInfoArgs),
    /// Write every transaction of an address to a JSON file.
    DumpTxs(DumpArgs),
    /// Print version information and exit.
    Version,
}

#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Address the HTTP front door listens on.
    #[arg(long, env = "FAUCET_LISTEN", default_value = "127.0.0.1:8080")]
    pub listen: SocketAddr,

    /// How often expired cooldown entries are swept, in seconds.
    #[arg(long, default_value_t = 60)]
    pub purge_interval_secs: u64,
}

#[derive(Parser, Debug)]
pub struct SendArgs {
    /// Destination address, 40 hex characters with optional `0x`.
    pub address: String,

    /// Requester identity the cooldown is keyed on.
    #[arg(long, default_value = "cli")]
    pub requester: String,
}

#[derive(Parser, Debug)]
pub struct AddressArgs {
    pub address: String,
}

#[derive(Parser, Debug)]
pub struct TxInfoArgs {
    /// Transaction id, 64 hex characters with optional `0x`.
    pub id: String,
}

#[derive(Parser, Debug)]
pub struct DumpArgs {
    pub address: String,

    /// Output directory. Defaults to `faucet.dump_dir` from the config.
    #[arg(long, short = 'o')]
    pub out_dir: Option<PathBuf>,
}

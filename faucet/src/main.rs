// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Smidge Faucet
//!
//! Entry point for the `faucet` binary. Loads the TOML config, sets up
//! logging, and either serves the HTTP front door or runs a single
//! operator command against the node.
//!
//! - `run`       serve `/requests` and dispense in the background
//! - `send`      one transfer, waiting for its outcome
//! - `balance`   balance of an address
//! - `status`    faucet balance and node sync state
//! - `tx-info`   what the node knows about a transaction
//! - `dump-txs`  write an address's transactions to JSON
//! - `version`   build version

mod api;
mod cli;
mod logging;
mod metrics;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tokio::signal;

use faucet_protocol::config::FaucetConfig;
use faucet_protocol::faucet::{unix_now, Dispatch, Faucet};
use faucet_protocol::history;
use faucet_protocol::identity::address::Address;
use faucet_protocol::network::{HttpRpcClient, NodeRpc, TransactionLookup};
use faucet_protocol::transaction::types::{format_smh, TransactionId};
use faucet_protocol::transaction::ConfirmationOutcome;

use cli::{Commands, FaucetCli};
use metrics::FaucetMetrics;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = FaucetCli::parse();

    if let Commands::Version = cli.command {
        print_version();
        return Ok(());
    }

    logging::init_logging(logging::DEFAULT_DIRECTIVE, cli.log_format)?;

    let config = FaucetConfig::load(&cli.config)
        .with_context(|| format!("failed to load config from {}", cli.config.display()))?;
    let rpc: Arc<dyn NodeRpc> = Arc::new(
        HttpRpcClient::from_settings(&config.rpc).context("failed to build node RPC client")?,
    );

    match cli.command {
        Commands::Run(args) => run_faucet(&config, rpc, args).await,
        Commands::Send(args) => send_once(&config, rpc, args).await,
        Commands::Balance(args) => show_balance(rpc.as_ref(), &args.address).await,
        Commands::Status => show_status(&config, rpc.as_ref()).await,
        Commands::TxInfo(args) => show_transaction(rpc.as_ref(), &args.id).await,
        Commands::DumpTxs(args) => {
            let address = parse_address(&args.address)?;
            let dir = args.out_dir.unwrap_or_else(|| config.faucet.dump_dir.clone());
            let path = history::write_dump(rpc.as_ref(), &address, &dir)
                .await
                .with_context(|| format!("failed to dump transactions of {}", address))?;
            println!("{}", path.display());
            Ok(())
        }
        Commands::Version => Ok(()),
    }
}

fn parse_address(raw: &str) -> Result<Address> {
    raw.trim()
        .parse()
        .with_context(|| format!("invalid address {:?}", raw))
}

/// Serves the front door until Ctrl+C or SIGTERM.
async fn run_faucet(config: &FaucetConfig, rpc: Arc<dyn NodeRpc>, args: cli::RunArgs) -> Result<()> {
    let faucet = Faucet::from_config(config, rpc).context("invalid faucet wallet")?;
    let metrics = Arc::new(FaucetMetrics::new().context("failed to register metrics")?);

    tracing::info!(
        address = %faucet.address(),
        amount = faucet.amount(),
        cooldown_secs = config.faucet.request_cooldown_secs,
        node = %config.rpc.url,
        "starting faucet"
    );

    let observer = metrics::spawn_observer(&faucet, Arc::clone(&metrics));

    // Expired cooldown entries are otherwise only replaced, never dropped.
    let sweeper = {
        let faucet = faucet.clone();
        let metrics = Arc::clone(&metrics);
        let period = Duration::from_secs(args.purge_interval_secs.max(1));
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                interval.tick().await;
                let purged = faucet.registry().purge_expired(unix_now());
                if purged > 0 {
                    tracing::debug!(purged, "expired cooldown entries dropped");
                }
                metrics
                    .pending_requests
                    .set(faucet.registry().len() as i64);
            }
        })
    };

    let state = api::AppState {
        faucet,
        metrics,
        version: env!("CARGO_PKG_VERSION").to_string(),
    };
    let router = api::create_router(state);

    let listener = tokio::net::TcpListener::bind(args.listen)
        .await
        .with_context(|| format!("failed to bind {}", args.listen))?;
    tracing::info!("front door listening on {}", args.listen);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    sweeper.abort();
    observer.abort();
    tracing::info!("faucet stopped");
    Ok(())
}

/// Dispenses once and blocks until the transfer settles.
async fn send_once(config: &FaucetConfig, rpc: Arc<dyn NodeRpc>, args: cli::SendArgs) -> Result<()> {
    let address = parse_address(&args.address)?;
    let faucet = Faucet::from_config(config, rpc).context("invalid faucet wallet")?;

    let handle = match faucet.dispatch(&args.requester, address) {
        Dispatch::Accepted(handle) => handle,
        Dispatch::Rejected { wait } => bail!("requester is cooling down for {}s", wait.as_secs()),
    };
    println!(
        "sending {} SMH to {}, waiting for confirmation",
        format_smh(faucet.amount()),
        address
    );

    let report = handle.await.context("dispense task panicked")?;
    let dispensed = report.result?;
    println!("transaction {}", dispensed.submission.id);
    match dispensed.outcome {
        ConfirmationOutcome::Confirmed { elapsed } => {
            println!("confirmed after {}", history::format_elapsed(elapsed))
        }
        ConfirmationOutcome::Removed => bail!("transaction was removed by the node"),
        ConfirmationOutcome::TimedOut => {
            bail!("no confirmation before timeout, check the transaction manually")
        }
    }
    Ok(())
}

async fn show_balance(rpc: &dyn NodeRpc, raw: &str) -> Result<()> {
    let address = parse_address(raw)?;
    match rpc.balance(&address).await? {
        Some(balance) => {
            println!("{} smidge ({} SMH)", balance, format_smh(balance));
            Ok(())
        }
        None => bail!("address {} is not initialized", address),
    }
}

async fn show_status(config: &FaucetConfig, rpc: &dyn NodeRpc) -> Result<()> {
    let address = config.sender_address()?;
    let balance = rpc.balance(&address).await?;
    let node = rpc.node_status().await?;

    println!("Faucet address : {}", address);
    match balance {
        Some(balance) => println!("Balance        : {} SMH", format_smh(balance)),
        None => println!("Balance        : (uninitialized)"),
    }
    println!("Peers          : {}", node.peers);
    println!("Synced         : {}", node.synced);
    println!("Current layer  : {}", node.current_layer);
    println!("Synced layer   : {}", node.synced_layer);
    Ok(())
}

async fn show_transaction(rpc: &dyn NodeRpc, raw: &str) -> Result<()> {
    let id: TransactionId = raw
        .trim()
        .parse()
        .with_context(|| format!("invalid transaction id {:?}", raw))?;
    match rpc.transaction_info(&id).await? {
        TransactionLookup::Found(info) => {
            println!("Sender   : {}", info.sender.address);
            println!("Receiver : {}", info.receiver.address);
            println!("Amount   : {} SMH", format_smh(info.amount));
            println!("Fee      : {}", info.fee);
            println!("Status   : {}", info.status);
            Ok(())
        }
        TransactionLookup::NotFound => bail!("transaction {} not found", id),
    }
}

fn print_version() {
    println!("faucet {}", env!("CARGO_PKG_VERSION"));
    println!(
        "wire    {} byte payload, {} byte signed transfer",
        faucet_protocol::config::PAYLOAD_LENGTH,
        faucet_protocol::config::SIGNED_TRANSACTION_LENGTH
    );
}

/// Waits for SIGINT (Ctrl+C) or SIGTERM, whichever comes first.
///
/// If a handler cannot be installed, that signal is never delivered and
/// the other one still works.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    tracing::info!("shutdown signal received, draining connections");
}

//! # Faucet Configuration & Constants
//!
//! Every magic number the faucet depends on lives here, next to the
//! operator-facing [`FaucetConfig`] that is loaded from TOML at startup.
//!
//! The wire constants are not ours to choose. They describe what the node
//! accepts, and changing any of them produces transfers the node rejects.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::crypto::keys::KeyMaterial;
use crate::identity::address::Address;

// ---------------------------------------------------------------------------
// Wire Format
// ---------------------------------------------------------------------------

/// Address length in bytes. Addresses are the trailing 20 bytes of a key.
pub const ADDRESS_LENGTH: usize = 20;

/// Width of every integer field in the payload. Big-endian, XDR "hyper".
pub const HYPER_LENGTH: usize = 8;

/// Ed25519 seed length. Longer key material is cut down to this.
pub const SEED_LENGTH: usize = 32;

/// Ed25519 public key length.
pub const PUBLIC_KEY_LENGTH: usize = 32;

/// Ed25519 signature length. Always 64 bytes.
pub const SIGNATURE_LENGTH: usize = 64;

/// Unsigned payload: nonce, destination, gas limit, fee, amount.
pub const PAYLOAD_LENGTH: usize = HYPER_LENGTH + ADDRESS_LENGTH + 3 * HYPER_LENGTH;

/// Payload followed by its signature. This is what goes on the wire.
pub const SIGNED_TRANSACTION_LENGTH: usize = PAYLOAD_LENGTH + SIGNATURE_LENGTH;

/// Transaction ids are 32-byte hashes.
pub const TRANSACTION_ID_LENGTH: usize = 32;

/// Status string the node reports once a transaction is in the ledger.
pub const CONFIRMED_STATUS: &str = "CONFIRMED";

/// Submission status the node returns when it took the transaction.
pub const SUBMISSION_OK: &str = "ok";

/// Smidge per display unit. Display amounts are smidge / 10^12.
pub const SMIDGE_PER_SMH: u64 = 1_000_000_000_000;

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

/// Three hours between requests from the same requester.
pub const DEFAULT_REQUEST_COOLDOWN_SECS: u64 = 3 * 60 * 60;

/// Give up tracking a transaction after 15 minutes. Confirmation usually
/// lands in 10-13.
pub const DEFAULT_CONFIRMATION_TIMEOUT_SECS: u64 = 15 * 60;

/// Poll the node for transaction status every 30 seconds.
pub const DEFAULT_CHECK_PERIOD_SECS: u64 = 30;

/// Per-request timeout for RPC calls to the node.
pub const DEFAULT_RPC_TIMEOUT_SECS: u64 = 10;

/// Default location of the settled-transaction statistics log.
pub const DEFAULT_STATS_PATH: &str = "transactions.csv";

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors raised while loading or validating the configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid faucet address: {0}")]
    Address(#[from] crate::identity::address::AddressError),

    #[error("invalid key material: {0}")]
    Key(#[from] crate::crypto::keys::KeyError),

    #[error("invalid setting `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

// ---------------------------------------------------------------------------
// FaucetConfig
// ---------------------------------------------------------------------------

/// Operator configuration, deserialized from TOML.
///
/// ```toml
/// [rpc]
/// url = "http://127.0.0.1:9090/v1/"
///
/// [wallet]
/// address = "0x…"
/// public_key = "…"
/// private_key = "…"
///
/// [faucet]
/// amount = 100000000000
/// fee = 1
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct FaucetConfig {
    pub rpc: RpcSettings,
    pub wallet: WalletSettings,
    pub faucet: FaucetSettings,
}

/// Where the node lives and how long we wait for it.
#[derive(Debug, Clone, Deserialize)]
pub struct RpcSettings {
    /// Base URL of the node's JSON API, e.g. `http://127.0.0.1:9090/v1/`.
    pub url: String,
    #[serde(default = "default_rpc_timeout")]
    pub request_timeout_secs: u64,
}

/// The faucet's own account. Hex strings, `0x` prefix optional.
#[derive(Clone, Deserialize)]
pub struct WalletSettings {
    pub address: String,
    pub public_key: String,
    pub private_key: String,
}

impl std::fmt::Debug for WalletSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WalletSettings")
            .field("address", &self.address)
            .field("public_key", &self.public_key)
            .field("private_key", &"[REDACTED]")
            .finish()
    }
}

/// Dispensing policy.
#[derive(Debug, Clone, Deserialize)]
pub struct FaucetSettings {
    /// Smidge sent per accepted request.
    pub amount: u64,
    /// Gas price paid per transfer.
    pub fee: u64,
    /// Gas limit. When absent the submitter uses `fee + 1`.
    #[serde(default)]
    pub gas_limit: Option<u64>,
    #[serde(default = "default_cooldown")]
    pub request_cooldown_secs: u64,
    #[serde(default = "default_confirmation_timeout")]
    pub confirmation_timeout_secs: u64,
    #[serde(default = "default_check_period")]
    pub check_period_secs: u64,
    /// Statistics log location. Programmatic configs may set `None` to skip it.
    #[serde(default = "default_stats_path")]
    pub stats_path: Option<PathBuf>,
    /// Directory that account dumps are written into.
    #[serde(default = "default_dump_dir")]
    pub dump_dir: PathBuf,
}

fn default_rpc_timeout() -> u64 {
    DEFAULT_RPC_TIMEOUT_SECS
}

fn default_cooldown() -> u64 {
    DEFAULT_REQUEST_COOLDOWN_SECS
}

fn default_confirmation_timeout() -> u64 {
    DEFAULT_CONFIRMATION_TIMEOUT_SECS
}

fn default_check_period() -> u64 {
    DEFAULT_CHECK_PERIOD_SECS
}

fn default_stats_path() -> Option<PathBuf> {
    Some(PathBuf::from(DEFAULT_STATS_PATH))
}

fn default_dump_dir() -> PathBuf {
    PathBuf::from(".")
}

impl FaucetConfig {
    /// Reads, parses and validates a TOML config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Parses a TOML document without validating it.
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(raw)?)
    }

    /// Checks everything that would otherwise fail at the first request.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.sender_address()?;
        self.key_material()?;

        if self.rpc.url.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "rpc.url",
                reason: "must not be empty".into(),
            });
        }
        if self.faucet.check_period_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "faucet.check_period_secs",
                reason: "must be at least one second".into(),
            });
        }
        if self.faucet.confirmation_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "faucet.confirmation_timeout_secs",
                reason: "must be at least one second".into(),
            });
        }
        if self.faucet.amount == 0 {
            return Err(ConfigError::Invalid {
                field: "faucet.amount",
                reason: "a faucet that sends nothing is not a faucet".into(),
            });
        }
        Ok(())
    }

    /// The faucet's own address.
    pub fn sender_address(&self) -> Result<Address, ConfigError> {
        Ok(self.wallet.address.parse()?)
    }

    /// The faucet's signing key.
    pub fn key_material(&self) -> Result<KeyMaterial, ConfigError> {
        Ok(KeyMaterial::from_hex(
            &self.wallet.public_key,
            &self.wallet.private_key,
        )?)
    }

    pub fn request_cooldown(&self) -> Duration {
        Duration::from_secs(self.faucet.request_cooldown_secs)
    }

    pub fn confirmation_timeout(&self) -> Duration {
        Duration::from_secs(self.faucet.confirmation_timeout_secs)
    }

    pub fn check_period(&self) -> Duration {
        Duration::from_secs(self.faucet.check_period_secs)
    }

    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_secs(self.rpc.request_timeout_secs)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

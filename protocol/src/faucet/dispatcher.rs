//! # Request Dispatcher
//!
//! Glue between "someone asked for funds" and the transaction machinery.
//!
//! ```text
//! dispatch(requester, address)
//!   │
//!   ├─ registry.try_accept ── rejected ──► Dispatch::Rejected { wait }
//!   │
//!   └─ accepted ──► spawn ─► submit ─► track ─► release? ─► stats log
//!                              │                   │
//!                              └── error ──────────┴──► DispenseReport
//! ```
//!
//! The cooldown slot is taken synchronously inside `dispatch`, before the
//! task is spawned, so nothing the task does can race another request from
//! the same requester. Each accepted request runs as its own tokio task; a
//! slow confirmation never holds up anyone else.
//!
//! ## Slot policy
//!
//! | Result                         | Slot     |
//! |--------------------------------|----------|
//! | failed before the submit call  | released |
//! | submit rejected by the node    | released |
//! | submit call failed             | kept     |
//! | `Removed`                      | released |
//! | `Confirmed`                    | kept     |
//! | `TimedOut`                     | kept     |
//!
//! A timed-out transfer or a submit call with no readable answer may still
//! land, so both are treated like a success until the window expires.
//!
//! Releasing only ever drops the slot this request took. If the window ran
//! out while the transfer was tracked and the requester was accepted again,
//! the newer slot stays.
//!
//! Observers (logging, metrics, a chat front end) subscribe to a broadcast
//! channel of [`FaucetEvent`]s. Nobody listening is fine.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::Serialize;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::config::{ConfigError, FaucetConfig, FaucetSettings};
use crate::crypto::keys::KeyMaterial;
use crate::error::FaucetError;
use crate::faucet::cooldown::{Admission, CooldownRegistry};
use crate::history::StatsLog;
use crate::identity::address::Address;
use crate::network::rpc::NodeRpc;
use crate::transaction::confirmation::{ConfirmationOutcome, ConfirmationTracker};
use crate::transaction::submitter::{TransactionSubmitter, TransferRequest};
use crate::transaction::types::{SubmissionResult, TransactionId};

/// Capacity of the event channel. Slow subscribers lag rather than block.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Progress notifications, in the order they happen for one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum FaucetEvent {
    Accepted {
        requester: String,
        address: Address,
    },
    Rejected {
        requester: String,
        wait_secs: u64,
    },
    Submitted {
        requester: String,
        tx_id: TransactionId,
        amount: u64,
    },
    Settled {
        requester: String,
        tx_id: TransactionId,
        outcome: ConfirmationOutcome,
    },
    /// Nothing was sent. `error` is the rendered [`FaucetError`].
    Failed {
        requester: String,
        error: String,
    },
}

/// Immediate answer to a request.
#[derive(Debug)]
pub enum Dispatch {
    /// Still cooling down.
    Rejected { wait: Duration },
    /// Slot taken; the handle resolves once the transfer has a verdict.
    Accepted(JoinHandle<DispenseReport>),
}

/// A transfer that made it onto the node, and how it ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dispensed {
    pub submission: SubmissionResult,
    pub outcome: ConfirmationOutcome,
}

/// Final report for one accepted request.
#[derive(Debug)]
pub struct DispenseReport {
    pub requester: String,
    pub address: Address,
    pub result: Result<Dispensed, FaucetError>,
}

/// Current unix time in whole seconds. A clock before 1970 reads as 0.
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

struct Shared {
    registry: CooldownRegistry,
    submitter: TransactionSubmitter,
    tracker: ConfirmationTracker,
    rpc: Arc<dyn NodeRpc>,
    stats: Option<StatsLog>,
    amount: u64,
    gas_price: u64,
    gas_limit: Option<u64>,
    events: broadcast::Sender<FaucetEvent>,
}

/// The faucet. Cheap to clone; clones share the registry and channel.
#[derive(Clone)]
pub struct Faucet {
    shared: Arc<Shared>,
}

impl Faucet {
    pub fn new(
        rpc: Arc<dyn NodeRpc>,
        sender: Address,
        key: KeyMaterial,
        settings: &FaucetSettings,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let shared = Shared {
            registry: CooldownRegistry::new(Duration::from_secs(settings.request_cooldown_secs)),
            submitter: TransactionSubmitter::new(rpc.clone(), sender, key),
            tracker: ConfirmationTracker::new(
                rpc.clone(),
                Duration::from_secs(settings.check_period_secs),
                Duration::from_secs(settings.confirmation_timeout_secs),
            ),
            rpc,
            stats: settings.stats_path.as_ref().map(StatsLog::new),
            amount: settings.amount,
            gas_price: settings.fee,
            gas_limit: settings.gas_limit,
            events,
        };
        Self {
            shared: Arc::new(shared),
        }
    }

    /// Builds a faucet from a loaded config and an RPC implementation.
    pub fn from_config(config: &FaucetConfig, rpc: Arc<dyn NodeRpc>) -> Result<Self, ConfigError> {
        Ok(Self::new(
            rpc,
            config.sender_address()?,
            config.key_material()?,
            &config.faucet,
        ))
    }

    pub fn subscribe(&self) -> broadcast::Receiver<FaucetEvent> {
        self.shared.events.subscribe()
    }

    pub fn address(&self) -> &Address {
        self.shared.submitter.sender()
    }

    pub fn amount(&self) -> u64 {
        self.shared.amount
    }

    pub fn registry(&self) -> &CooldownRegistry {
        &self.shared.registry
    }

    pub fn rpc(&self) -> &Arc<dyn NodeRpc> {
        &self.shared.rpc
    }

    /// Handles a request at the current wall-clock time.
    pub fn dispatch(&self, requester: &str, address: Address) -> Dispatch {
        self.dispatch_at(requester, address, unix_now())
    }

    /// Handles a request as of `now` (unix seconds). Must be called from
    /// within a tokio runtime.
    pub fn dispatch_at(&self, requester: &str, address: Address, now: u64) -> Dispatch {
        match self.shared.registry.try_accept(requester, address, now) {
            Admission::Rejected { wait_secs } => {
                info!(requester, wait_secs, "request rejected: cooling down");
                self.emit(FaucetEvent::Rejected {
                    requester: requester.to_string(),
                    wait_secs,
                });
                Dispatch::Rejected {
                    wait: Duration::from_secs(wait_secs),
                }
            }
            Admission::Accepted { next_eligible } => {
                info!(requester, %address, "request accepted");
                self.emit(FaucetEvent::Accepted {
                    requester: requester.to_string(),
                    address,
                });
                let shared = Arc::clone(&self.shared);
                let requester = requester.to_string();
                Dispatch::Accepted(tokio::spawn(dispense(
                    shared,
                    requester,
                    address,
                    next_eligible,
                )))
            }
        }
    }

    fn emit(&self, event: FaucetEvent) {
        let _ = self.shared.events.send(event);
    }
}

/// `slot` is the `next_eligible` time of the cooldown entry this request took.
async fn dispense(
    shared: Arc<Shared>,
    requester: String,
    address: Address,
    slot: u64,
) -> DispenseReport {
    let emit = |event| {
        let _ = shared.events.send(event);
    };
    let request = TransferRequest {
        destination: address,
        amount: shared.amount,
        gas_price: shared.gas_price,
        gas_limit: shared.gas_limit,
    };

    let submission = match shared.submitter.submit(&request).await {
        Ok(submission) => submission,
        Err(error) => {
            if error.may_have_reached_node() {
                warn!(
                    requester = %requester,
                    %address,
                    error = %error,
                    "submission outcome unknown, keeping slot"
                );
            } else {
                warn!(requester = %requester, %address, error = %error, "dispense failed, releasing slot");
                shared.registry.release_slot(&requester, slot);
            }
            emit(FaucetEvent::Failed {
                requester: requester.clone(),
                error: error.to_string(),
            });
            return DispenseReport {
                requester,
                address,
                result: Err(error),
            };
        }
    };
    let submitted_at = Instant::now();
    emit(FaucetEvent::Submitted {
        requester: requester.clone(),
        tx_id: submission.id,
        amount: submission.amount,
    });

    let outcome = shared.tracker.track_since(&submission.id, submitted_at).await;

    match outcome {
        ConfirmationOutcome::Removed => {
            shared.registry.release_slot(&requester, slot);
        }
        ConfirmationOutcome::TimedOut => {
            warn!(
                requester = %requester,
                tx_id = %submission.id,
                "no confirmation before timeout, check the transaction manually"
            );
        }
        ConfirmationOutcome::Confirmed { .. } => {}
    }

    if let Some(stats) = &shared.stats {
        if let Err(e) = stats.append(&submission.id, &outcome).await {
            warn!(error = %e, "failed to record transaction statistics");
        }
    }

    emit(FaucetEvent::Settled {
        requester: requester.clone(),
        tx_id: submission.id,
        outcome,
    });

    DispenseReport {
        requester,
        address,
        result: Ok(Dispensed {
            submission,
            outcome,
        }),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

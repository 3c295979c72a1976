//! # Confirmation Tracking
//!
//! Once the node accepts a transfer, all we have is an id. This module
//! watches that id until the node gives a final answer, or until we stop
//! waiting for one.
//!
//! ```text
//!              ┌──────────── not found ───────────► Removed
//!              │
//!   Pending ───┼──────────── CONFIRMED ───────────► Confirmed { elapsed }
//!     ▲   │    │
//!     └───┘    └──── elapsed > timeout ───────────► TimedOut
//!   anything else
//! ```
//!
//! Each tick sleeps for the poll interval first, then checks the deadline,
//! then asks the node. A transfer confirmed on the third tick therefore
//! reports `elapsed = 3 × interval`, and a deadline that passes between
//! ticks is noticed on the next tick without another RPC call.
//!
//! A failed poll (node unreachable, garbage reply) is not a verdict. It is
//! logged and the transfer stays `Pending`. Only the timeout can end a
//! transfer the node will not talk about.
//!
//! Time comes from `tokio::time`, so tests run under a paused clock.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::network::rpc::{NodeRpc, TransactionLookup};
use crate::transaction::types::TransactionId;

/// Terminal result of tracking one transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ConfirmationOutcome {
    /// The node reports the transaction in the ledger.
    Confirmed {
        /// Time from submission to the poll that saw the confirmation.
        #[serde(with = "duration_secs")]
        elapsed: Duration,
    },
    /// The node no longer knows the transaction (evicted from the mempool).
    Removed,
    /// No verdict before the deadline. The transfer may still land.
    TimedOut,
}

impl ConfirmationOutcome {
    /// Short label used in logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Confirmed { .. } => "confirmed",
            Self::Removed => "removed",
            Self::TimedOut => "timed_out",
        }
    }

    /// Whether the transfer definitely did not happen.
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Removed)
    }
}

impl fmt::Display for ConfirmationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Confirmed { elapsed } => write!(f, "confirmed after {}s", elapsed.as_secs()),
            Self::Removed => write!(f, "removed from mempool"),
            Self::TimedOut => write!(f, "not confirmed in time"),
        }
    }
}

mod duration_secs {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }
}

/// Result of a single poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    Pending,
    Settled(ConfirmationOutcome),
}

/// Polls the node for one transaction at a time.
#[derive(Clone)]
pub struct ConfirmationTracker {
    rpc: Arc<dyn NodeRpc>,
    interval: Duration,
    timeout: Duration,
}

impl ConfirmationTracker {
    pub fn new(rpc: Arc<dyn NodeRpc>, interval: Duration, timeout: Duration) -> Self {
        Self {
            rpc,
            interval,
            timeout,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Tracks `id` starting now.
    pub async fn track(&self, id: &TransactionId) -> ConfirmationOutcome {
        self.track_since(id, Instant::now()).await
    }

    /// Tracks `id` that was submitted at `submitted_at`.
    pub async fn track_since(&self, id: &TransactionId, submitted_at: Instant) -> ConfirmationOutcome {
        let mut ticks: u32 = 0;
        loop {
            tokio::time::sleep(self.interval).await;
            ticks += 1;

            if submitted_at.elapsed() > self.timeout {
                warn!(
                    tx_id = %id,
                    timeout_secs = self.timeout.as_secs(),
                    ticks,
                    "transaction not confirmed in time"
                );
                return ConfirmationOutcome::TimedOut;
            }

            if let PollState::Settled(outcome) = self.poll_once(id, submitted_at).await {
                return outcome;
            }
        }
    }

    /// Asks the node once and classifies the answer.
    pub async fn poll_once(&self, id: &TransactionId, submitted_at: Instant) -> PollState {
        match self.rpc.transaction_info(id).await {
            Ok(TransactionLookup::NotFound) => {
                info!(tx_id = %id, "transaction removed from mempool");
                PollState::Settled(ConfirmationOutcome::Removed)
            }
            Ok(TransactionLookup::Found(info)) if info.is_confirmed() => {
                let elapsed = submitted_at.elapsed();
                info!(
                    tx_id = %id,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "transaction confirmed"
                );
                PollState::Settled(ConfirmationOutcome::Confirmed { elapsed })
            }
            Ok(TransactionLookup::Found(info)) => {
                debug!(tx_id = %id, status = %info.status, "transaction pending");
                PollState::Pending
            }
            Err(e) => {
                warn!(tx_id = %id, error = %e, "poll failed, still pending");
                PollState::Pending
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

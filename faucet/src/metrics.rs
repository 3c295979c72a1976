//! # Prometheus Metrics
//!
//! Operational metrics for the faucet, served at `/metrics` on the same
//! listener as the front door.
//!
//! Everything here is driven by [`FaucetEvent`]s: an observer task
//! subscribes to the dispatcher's broadcast channel and turns each event
//! into counter bumps and a debug line. The dispatcher already logs each
//! request at `info`. Handlers never touch metrics directly.
//!
//! All metrics live in a dedicated registry prefixed `faucet_`.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use faucet_protocol::faucet::{Faucet, FaucetEvent};
use faucet_protocol::transaction::ConfirmationOutcome;

use crate::api::AppState;

/// Confirmation usually lands in 10-13 minutes; buckets in seconds.
const LATENCY_BUCKETS: &[f64] = &[30.0, 60.0, 120.0, 300.0, 480.0, 600.0, 780.0, 900.0, 1200.0];

#[derive(Clone)]
pub struct FaucetMetrics {
    registry: Registry,
    pub requests_accepted_total: IntCounter,
    pub requests_rejected_total: IntCounter,
    pub transactions_submitted_total: IntCounter,
    pub submission_failures_total: IntCounter,
    /// Terminal outcomes, labelled `confirmed`, `removed` or `timed_out`.
    pub outcomes_total: IntCounterVec,
    /// Requesters currently holding a cooldown slot.
    pub pending_requests: IntGauge,
    pub confirmation_latency_seconds: Histogram,
}

pub type SharedMetrics = Arc<FaucetMetrics>;

fn register<M>(registry: &Registry, metric: M) -> Result<M, prometheus::Error>
where
    M: prometheus::core::Collector + Clone + 'static,
{
    registry.register(Box::new(metric.clone()))?;
    Ok(metric)
}

impl FaucetMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new_custom(Some("faucet".into()), None)?;

        let requests_accepted_total = register(
            &registry,
            IntCounter::new("requests_accepted_total", "Requests that took a cooldown slot")?,
        )?;
        let requests_rejected_total = register(
            &registry,
            IntCounter::new(
                "requests_rejected_total",
                "Requests turned away because the requester is cooling down",
            )?,
        )?;
        let transactions_submitted_total = register(
            &registry,
            IntCounter::new(
                "transactions_submitted_total",
                "Transfers the node accepted for inclusion",
            )?,
        )?;
        let submission_failures_total = register(
            &registry,
            IntCounter::new(
                "submission_failures_total",
                "Accepted requests that never produced a transfer",
            )?,
        )?;
        let outcomes_total = register(
            &registry,
            IntCounterVec::new(
                Opts::new("outcomes_total", "Terminal outcomes of submitted transfers"),
                &["outcome"],
            )?,
        )?;
        let pending_requests = register(
            &registry,
            IntGauge::new("pending_requests", "Requesters currently in cooldown")?,
        )?;
        let confirmation_latency_seconds = register(
            &registry,
            Histogram::with_opts(
                HistogramOpts::new(
                    "confirmation_latency_seconds",
                    "Time from submission to confirmation",
                )
                .buckets(LATENCY_BUCKETS.to_vec()),
            )?,
        )?;

        Ok(Self {
            registry,
            requests_accepted_total,
            requests_rejected_total,
            transactions_submitted_total,
            submission_failures_total,
            outcomes_total,
            pending_requests,
            confirmation_latency_seconds,
        })
    }

    /// Applies one dispatcher event.
    pub fn record(&self, event: &FaucetEvent) {
        match event {
            FaucetEvent::Accepted { .. } => self.requests_accepted_total.inc(),
            FaucetEvent::Rejected { .. } => self.requests_rejected_total.inc(),
            FaucetEvent::Submitted { .. } => self.transactions_submitted_total.inc(),
            FaucetEvent::Failed { .. } => self.submission_failures_total.inc(),
            FaucetEvent::Settled { outcome, .. } => {
                self.outcomes_total
                    .with_label_values(&[outcome.as_str()])
                    .inc();
                if let ConfirmationOutcome::Confirmed { elapsed } = outcome {
                    self.confirmation_latency_seconds
                        .observe(elapsed.as_secs_f64());
                }
            }
        }
    }

    /// Prometheus text exposition of everything registered.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

fn log_event(event: &FaucetEvent) {
    match event {
        FaucetEvent::Accepted { requester, address } => {
            debug!(requester = %requester, %address, "request accepted")
        }
        FaucetEvent::Rejected {
            requester,
            wait_secs,
        } => debug!(requester = %requester, wait_secs, "request rejected"),
        FaucetEvent::Submitted {
            requester,
            tx_id,
            amount,
        } => debug!(requester = %requester, %tx_id, amount, "transfer submitted"),
        FaucetEvent::Settled {
            requester,
            tx_id,
            outcome,
        } => debug!(requester = %requester, %tx_id, outcome = %outcome, "transfer settled"),
        FaucetEvent::Failed { requester, error } => {
            debug!(requester = %requester, error = %error, "request failed")
        }
    }
}

/// Follows the faucet's events until the channel closes, logging each one
/// and keeping the metrics current.
pub fn spawn_observer(faucet: &Faucet, metrics: SharedMetrics) -> JoinHandle<()> {
    let mut events = faucet.subscribe();
    let faucet = faucet.clone();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => {
                    log_event(&event);
                    metrics.record(&event);
                    metrics.pending_requests.set(faucet.registry().len() as i64);
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "event observer lagged, metrics undercount");
                }
                Err(RecvError::Closed) => break,
            }
        }
    })
}

/// `GET /metrics`.
pub async fn metrics_handler(State(state): State<AppState>) -> Response {
    match state.metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!("failed to encode metrics: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "metrics encoding failed").into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use faucet_protocol::transaction::TransactionId;
    use std::time::Duration;

    fn settled(outcome: ConfirmationOutcome) -> FaucetEvent {
        FaucetEvent::Settled {
            requester: "alice".into(),
            tx_id: TransactionId::from_bytes([7; 32]),
            outcome,
        }
    }

    #[test]
    fn events_move_the_right_counters() {
        let metrics = FaucetMetrics::new().unwrap();
        metrics.record(&FaucetEvent::Rejected {
            requester: "alice".into(),
            wait_secs: 10,
        });
        metrics.record(&FaucetEvent::Failed {
            requester: "bob".into(),
            error: "insufficient funds".into(),
        });
        metrics.record(&settled(ConfirmationOutcome::Removed));
        metrics.record(&settled(ConfirmationOutcome::Confirmed {
            elapsed: Duration::from_secs(90),
        }));

        assert_eq!(metrics.requests_rejected_total.get(), 1);
        assert_eq!(metrics.submission_failures_total.get(), 1);
        assert_eq!(metrics.requests_accepted_total.get(), 0);
        assert_eq!(
            metrics.outcomes_total.with_label_values(&["removed"]).get(),
            1
        );
        assert_eq!(
            metrics.outcomes_total.with_label_values(&["confirmed"]).get(),
            1
        );
        assert_eq!(metrics.confirmation_latency_seconds.get_sample_count(), 1);
        assert_eq!(metrics.confirmation_latency_seconds.get_sample_sum(), 90.0);
    }

    #[test]
    fn exposition_uses_the_faucet_prefix() {
        let metrics = FaucetMetrics::new().unwrap();
        metrics.requests_accepted_total.inc();
        let text = metrics.encode().unwrap();
        assert!(text.contains("faucet_requests_accepted_total 1"));
        assert!(text.contains("faucet_confirmation_latency_seconds_bucket"));
    }
}

//! # HTTP Front Door
//!
//! The faucet's public face. A chat bot, a web form or `curl` posts a
//! request here; the dispatcher decides whether it is paid.
//!
//! ## Endpoints
//!
//! | Method | Path                   | Description                               |
//! |--------|------------------------|-------------------------------------------|
//! | GET    | `/health`              | Liveness check                            |
//! | GET    | `/address`             | The faucet's own address                  |
//! | POST   | `/requests`            | Ask for funds (202 / 429 / 400)           |
//! | GET    | `/status`              | Faucet balance and node sync state        |
//! | GET    | `/balance/:address`    | Balance of any address                    |
//! | GET    | `/transactions/:id`    | What the node reports for a transaction   |
//! | GET    | `/metrics`             | Prometheus exposition                     |
//!
//! `POST /requests` answers as soon as the cooldown decision is made. The
//! transfer itself runs in the background; its progress shows up in the
//! logs and metrics, not in the response.

use axum::{
    extract::{Path, State},
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use faucet_protocol::faucet::{Dispatch, Faucet};
use faucet_protocol::identity::address::Address;
use faucet_protocol::network::rpc::{NodeRpc, RpcError, TransactionLookup};
use faucet_protocol::transaction::types::{format_smh, NodeStatus, TransactionId, TransactionInfo};

use crate::metrics::{metrics_handler, SharedMetrics};

// ---------------------------------------------------------------------------
// Application State
// ---------------------------------------------------------------------------

/// Shared by every handler. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub faucet: Faucet,
    pub metrics: SharedMetrics,
    pub version: String,
}

// ---------------------------------------------------------------------------
// Router Construction
// ---------------------------------------------------------------------------

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/address", get(address_handler))
        .route("/requests", post(request_handler))
        .route("/status", get(status_handler))
        .route("/balance/:address", get(balance_handler))
        .route("/transactions/:id", get(transaction_handler))
        .route("/metrics", get(metrics_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Request / Response Types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, Deserialize)]
pub struct DispenseRequest {
    /// Whoever is asking: a chat user id, an IP, anything stable.
    pub requester: String,
    pub address: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AcceptedResponse {
    pub status: String,
    pub requester: String,
    pub address: String,
    pub amount: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CooldownResponse {
    pub error: String,
    pub wait_seconds: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AddressResponse {
    pub address: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BalanceResponse {
    pub address: String,
    pub balance: u64,
    /// Balance in display units, three decimals.
    pub balance_smh: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub version: String,
    pub address: String,
    /// `None` while the faucet account is uninitialized.
    pub balance: Option<u64>,
    pub amount_per_request: u64,
    pub pending_requests: usize,
    pub node: NodeStatus,
    /// RFC 3339 time of the response.
    pub timestamp: String,
}

/// Body of every 4xx/5xx.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn error_response(status: StatusCode, error: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
        }),
    )
        .into_response()
}

/// The node could not be reached or answered nonsense.
fn upstream_error(e: RpcError) -> Response {
    tracing::warn!(error = %e, "node request failed");
    error_response(StatusCode::BAD_GATEWAY, format!("node error: {}", e))
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// `GET /health`. Does not touch the node.
async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(serde_json::json!({ "status": "ok" })))
}

async fn address_handler(State(state): State<AppState>) -> Json<AddressResponse> {
    Json(AddressResponse {
        address: state.faucet.address().to_string(),
    })
}

/// `POST /requests`. 202 once the slot is taken, 429 while cooling down.
async fn request_handler(
    State(state): State<AppState>,
    Json(req): Json<DispenseRequest>,
) -> Response {
    let requester = req.requester.trim();
    if requester.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "requester must not be empty");
    }
    let address: Address = match req.address.trim().parse() {
        Ok(address) => address,
        Err(e) => {
            return error_response(StatusCode::BAD_REQUEST, format!("invalid address: {}", e))
        }
    };

    match state.faucet.dispatch(requester, address) {
        Dispatch::Rejected { wait } => (
            StatusCode::TOO_MANY_REQUESTS,
            Json(CooldownResponse {
                error: format!("{} is cooling down", requester),
                wait_seconds: wait.as_secs(),
            }),
        )
            .into_response(),
        // The transfer outlives the request; the handle is not awaited.
        Dispatch::Accepted(_handle) => (
            StatusCode::ACCEPTED,
            Json(AcceptedResponse {
                status: "accepted".into(),
                requester: requester.to_string(),
                address: address.to_string(),
                amount: state.faucet.amount(),
            }),
        )
            .into_response(),
    }
}

async fn status_handler(State(state): State<AppState>) -> Response {
    let rpc = state.faucet.rpc();
    let balance = match rpc.balance(state.faucet.address()).await {
        Ok(balance) => balance,
        Err(e) => return upstream_error(e),
    };
    let node = match rpc.node_status().await {
        Ok(node) => node,
        Err(e) => return upstream_error(e),
    };

    Json(StatusResponse {
        version: state.version.clone(),
        address: state.faucet.address().to_string(),
        balance,
        amount_per_request: state.faucet.amount(),
        pending_requests: state.faucet.registry().len(),
        node,
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
    .into_response()
}

/// `GET /balance/:address`. 404 when the node has no account for it.
async fn balance_handler(
    Path(address): Path<String>,
    State(state): State<AppState>,
) -> Response {
    let address: Address = match address.parse() {
        Ok(address) => address,
        Err(e) => {
            return error_response(StatusCode::BAD_REQUEST, format!("invalid address: {}", e))
        }
    };

    match state.faucet.rpc().balance(&address).await {
        Ok(Some(balance)) => Json(BalanceResponse {
            address: address.to_string(),
            balance,
            balance_smh: format_smh(balance),
        })
        .into_response(),
        Ok(None) => error_response(
            StatusCode::NOT_FOUND,
            format!("address {} is not initialized", address),
        ),
        Err(e) => upstream_error(e),
    }
}

/// `GET /transactions/:id`.
async fn transaction_handler(Path(id): Path<String>, State(state): State<AppState>) -> Response {
    let id: TransactionId = match id.parse() {
        Ok(id) => id,
        Err(e) => {
            return error_response(
                StatusCode::BAD_REQUEST,
                format!("invalid transaction id: {}", e),
            )
        }
    };

    match state.faucet.rpc().transaction_info(&id).await {
        Ok(TransactionLookup::Found(info)) => Json::<TransactionInfo>(info).into_response(),
        Ok(TransactionLookup::NotFound) => error_response(
            StatusCode::NOT_FOUND,
            format!("transaction not found: {}", id),
        ),
        Err(e) => upstream_error(e),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use faucet_protocol::config::FaucetSettings;
    use faucet_protocol::crypto::keys::KeyMaterial;
    use faucet_protocol::testing::ScriptedNode;
    use http_body_util::BodyExt;
    use std::path::PathBuf;
    use std::sync::Arc;
    use tower::ServiceExt;

    const REQUESTER_ADDRESS: &str = "0x00112233445566778899aabbccddeeff00112233";

    fn settings() -> FaucetSettings {
        FaucetSettings {
            amount: 100,
            fee: 1,
            gas_limit: None,
            request_cooldown_secs: 3600,
            confirmation_timeout_secs: 900,
            check_period_secs: 30,
            stats_path: None,
            dump_dir: PathBuf::from("."),
        }
    }

    /// Router over a scripted node whose faucet account holds 1,000,000.
    fn test_router() -> (Router, Arc<ScriptedNode>, AppState) {
        let node = Arc::new(ScriptedNode::new());
        let key = KeyMaterial::from_seed([3u8; 32]);
        node.set_account(key.address(), 0, 1_000_000);

        let faucet = Faucet::new(node.clone(), key.address(), key, &settings());
        let state = AppState {
            faucet,
            metrics: Arc::new(crate::metrics::FaucetMetrics::new().unwrap()),
            version: "0.1.0-test".into(),
        };
        (create_router(state.clone()), node, state)
    }

    async fn send(router: &Router, req: Request<Body>) -> (StatusCode, Vec<u8>) {
        let resp = router.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let body = resp
            .into_body()
            .collect()
            .await
            .unwrap()
            .to_bytes()
            .to_vec();
        (status, body)
    }

    async fn get(router: &Router, path: &str) -> (StatusCode, Vec<u8>) {
        let req = Request::builder().uri(path).body(Body::empty()).unwrap();
        send(router, req).await
    }

    async fn post_json(
        router: &Router,
        path: &str,
        body: serde_json::Value,
    ) -> (StatusCode, Vec<u8>) {
        let req = Request::builder()
            .method("POST")
            .uri(path)
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap();
        send(router, req).await
    }

    fn request_body(requester: &str, address: &str) -> serde_json::Value {
        serde_json::json!({ "requester": requester, "address": address })
    }

    // -- health / address ---------------------------------------------------

    #[tokio::test]
    async fn health_endpoint_returns_ok() {
        let (router, _, _) = test_router();
        let (status, body) = get(&router, "/health").await;

        assert_eq!(status, StatusCode::OK);
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "ok");
    }

    #[tokio::test]
    async fn address_endpoint_reports_faucet_address() {
        let (router, _, state) = test_router();
        let (status, body) = get(&router, "/address").await;

        assert_eq!(status, StatusCode::OK);
        let resp: AddressResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(resp.address, state.faucet.address().to_string());
    }

    // -- requests -------------------------------------------------------------

    #[tokio::test]
    async fn first_request_is_accepted_second_is_told_to_wait() {
        let (router, _, state) = test_router();

        let (status, body) =
            post_json(&router, "/requests", request_body("alice", REQUESTER_ADDRESS)).await;
        assert_eq!(status, StatusCode::ACCEPTED);
        let accepted: AcceptedResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(accepted.amount, 100);
        assert_eq!(accepted.address, REQUESTER_ADDRESS);

        let (status, body) =
            post_json(&router, "/requests", request_body("alice", REQUESTER_ADDRESS)).await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        let cooldown: CooldownResponse = serde_json::from_slice(&body).unwrap();
        assert!(cooldown.wait_seconds > 3500 && cooldown.wait_seconds <= 3600);

        assert!(state.faucet.registry().pending("alice").is_some());
    }

    #[tokio::test]
    async fn different_requesters_are_independent() {
        let (router, _, _) = test_router();
        for who in ["alice", "bob"] {
            let (status, _) =
                post_json(&router, "/requests", request_body(who, REQUESTER_ADDRESS)).await;
            assert_eq!(status, StatusCode::ACCEPTED);
        }
    }

    #[tokio::test]
    async fn malformed_address_is_a_bad_request() {
        let (router, _, state) = test_router();
        let (status, body) = post_json(&router, "/requests", request_body("carol", "0x1234")).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        let err: ErrorResponse = serde_json::from_slice(&body).unwrap();
        assert!(err.error.contains("invalid address"));
        assert!(state.faucet.registry().is_empty());
    }

    #[tokio::test]
    async fn blank_requester_is_a_bad_request() {
        let (router, _, _) = test_router();
        let (status, _) = post_json(&router, "/requests", request_body("  ", REQUESTER_ADDRESS)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    // -- status / balance -----------------------------------------------------

    #[tokio::test]
    async fn status_reports_balance_and_node_state() {
        let (router, node, _) = test_router();
        node.set_node_status(NodeStatus {
            peers: 8,
            synced: true,
            current_layer: 1200,
            synced_layer: 1199,
        });

        let (status, body) = get(&router, "/status").await;
        assert_eq!(status, StatusCode::OK);
        let resp: StatusResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(resp.balance, Some(1_000_000));
        assert_eq!(resp.amount_per_request, 100);
        assert_eq!(resp.node.peers, 8);
        assert!(resp.node.synced);
        assert_eq!(resp.version, "0.1.0-test");
    }

    #[tokio::test]
    async fn balance_of_known_address() {
        let (router, node, _) = test_router();
        node.set_account(REQUESTER_ADDRESS.parse().unwrap(), 0, 2_500_000_000_000);

        let (status, body) = get(&router, &format!("/balance/{}", REQUESTER_ADDRESS)).await;
        assert_eq!(status, StatusCode::OK);
        let resp: BalanceResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(resp.balance, 2_500_000_000_000);
        assert_eq!(resp.balance_smh, "2.500");
    }

    #[tokio::test]
    async fn balance_of_uninitialized_address_is_404() {
        let (router, _, _) = test_router();
        let (status, body) = get(&router, &format!("/balance/{}", REQUESTER_ADDRESS)).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        let err: ErrorResponse = serde_json::from_slice(&body).unwrap();
        assert!(err.error.contains("not initialized"));
    }

    // -- transactions -----------------------------------------------------------

    #[tokio::test]
    async fn unknown_transaction_is_404() {
        let (router, _, _) = test_router();
        let id = TransactionId::from_bytes([9; 32]);
        let (status, body) = get(&router, &format!("/transactions/{}", id)).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        let err: ErrorResponse = serde_json::from_slice(&body).unwrap();
        assert!(err.error.contains("not found"));
    }

    #[tokio::test]
    async fn known_transaction_returns_node_info() {
        let (router, node, _) = test_router();
        let id = TransactionId::from_bytes([4; 32]);
        node.script_status(id, ["CONFIRMED"]);

        let (status, body) = get(&router, &format!("/transactions/0x{}", id)).await;
        assert_eq!(status, StatusCode::OK);
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "CONFIRMED");
    }

    #[tokio::test]
    async fn malformed_transaction_id_is_a_bad_request() {
        let (router, _, _) = test_router();
        let (status, _) = get(&router, "/transactions/deadbeef").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    // -- metrics ----------------------------------------------------------------

    #[tokio::test]
    async fn metrics_endpoint_serves_prometheus_text() {
        let (router, _, state) = test_router();
        state.metrics.requests_rejected_total.inc();

        let (status, body) = get(&router, "/metrics").await;
        assert_eq!(status, StatusCode::OK);
        let text = String::from_utf8(body).unwrap();
        assert!(text.contains("faucet_requests_rejected_total 1"));
    }
}

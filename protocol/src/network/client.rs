//! HTTP implementation of [`NodeRpc`].
//!
//! A thin pipe: serialize the request, POST it to `<base><endpoint>`, read
//! the body as text, and hand it to the decoders in [`rpc`](super::rpc).
//! No retries. A transfer is submitted at most once per accepted request,
//! and whether to try again is the caller's call.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, trace};

use crate::config::RpcSettings;
use crate::identity::address::Address;
use crate::network::rpc::{
    decode_account_transactions, decode_node_status, decode_submit, decode_transaction,
    decode_value, AccountTransactionsRequest, AddressRequest, Endpoint, NodeRpc, Reply, RpcError,
    SubmitRequest, SubmitResponse, TransactionLookup, TransactionRequest,
};
use crate::transaction::encoding::SignedTransaction;
use crate::transaction::types::{NodeStatus, TransactionId};

/// JSON-over-HTTP client for the node API.
#[derive(Debug, Clone)]
pub struct HttpRpcClient {
    http: reqwest::Client,
    base_url: String,
}

impl HttpRpcClient {
    /// Creates a client for `base_url` (e.g. `http://127.0.0.1:9090/v1/`).
    /// A missing trailing slash is added.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, RpcError> {
        let mut base_url = base_url.into();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RpcError::Transport(e.to_string()))?;
        Ok(Self { http, base_url })
    }

    pub fn from_settings(settings: &RpcSettings) -> Result<Self, RpcError> {
        Self::new(
            settings.url.clone(),
            Duration::from_secs(settings.request_timeout_secs),
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, endpoint: Endpoint) -> String {
        format!("{}{}", self.base_url, endpoint.path())
    }

    async fn post<B: Serialize + ?Sized>(
        &self,
        endpoint: Endpoint,
        body: &B,
    ) -> Result<Reply, RpcError> {
        let url = self.url(endpoint);
        trace!(%url, "node request");

        let resp = self
            .http
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| RpcError::Transport(format!("{}: {}", endpoint, e)))?;
        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| RpcError::Transport(format!("{}: {}", endpoint, e)))?;

        debug!(%endpoint, http_status = status.as_u16(), bytes = text.len(), "node reply");

        let reply = Reply::from_body(endpoint, &text);
        match reply {
            Ok(Reply::Error(_)) => reply,
            _ if !status.is_success() => Err(RpcError::Transport(format!(
                "{}: HTTP {}",
                endpoint, status
            ))),
            _ => reply,
        }
    }
}

#[async_trait]
impl NodeRpc for HttpRpcClient {
    async fn nonce(&self, address: &Address) -> Result<Option<u64>, RpcError> {
        let reply = self
            .post(Endpoint::Nonce, &AddressRequest::new(address))
            .await?;
        decode_value(Endpoint::Nonce, reply)
    }

    async fn balance(&self, address: &Address) -> Result<Option<u64>, RpcError> {
        let reply = self
            .post(Endpoint::Balance, &AddressRequest::new(address))
            .await?;
        decode_value(Endpoint::Balance, reply)
    }

    async fn submit_transaction(&self, tx: &SignedTransaction) -> Result<SubmitResponse, RpcError> {
        let reply = self
            .post(Endpoint::SubmitTransaction, &SubmitRequest::new(tx))
            .await?;
        decode_submit(reply)
    }

    async fn transaction_info(&self, id: &TransactionId) -> Result<TransactionLookup, RpcError> {
        let reply = self
            .post(Endpoint::GetTransaction, &TransactionRequest::new(id))
            .await?;
        decode_transaction(reply)
    }

    async fn node_status(&self) -> Result<NodeStatus, RpcError> {
        let reply = self
            .post(Endpoint::NodeStatus, &serde_json::json!({}))
            .await?;
        decode_node_status(reply)
    }

    async fn account_transactions(
        &self,
        address: &Address,
    ) -> Result<Vec<TransactionId>, RpcError> {
        let reply = self
            .post(
                Endpoint::AccountTransactions,
                &AccountTransactionsRequest::new(address),
            )
            .await?;
        decode_account_transactions(reply)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serves exactly one HTTP response and hands back the raw request.
    async fn one_shot_server(
        status_line: &'static str,
        body: &'static str,
    ) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut raw = Vec::new();
            let mut buf = [0u8; 1024];
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                raw.extend_from_slice(&buf[..n]);
                let text = String::from_utf8_lossy(&raw).to_string();
                if let Some(split) = text.find("\r\n\r\n") {
                    let content_length = text[..split]
                        .lines()
                        .find_map(|l| {
                            let lower = l.to_ascii_lowercase();
                            lower
                                .strip_prefix("content-length:")
                                .map(|v| v.trim().parse::<usize>().unwrap())
                        })
                        .unwrap_or(0);
                    if raw.len() >= split + 4 + content_length || n == 0 {
                        break;
                    }
                }
                if n == 0 {
                    break;
                }
            }
            let response = format!(
                "{}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status_line,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
            String::from_utf8_lossy(&raw).to_string()
        });

        (format!("http://{}/v1", addr), handle)
    }

    fn faucet_address() -> Address {
        "0xc964073a0ee172f3daa62325af021a68f707511a".parse().unwrap()
    }

    #[test]
    fn base_url_gets_trailing_slash() {
        let client = HttpRpcClient::new("http://node:9090/v1", Duration::from_secs(1)).unwrap();
        assert_eq!(client.base_url(), "http://node:9090/v1/");
        assert_eq!(client.url(Endpoint::Balance), "http://node:9090/v1/balance");
    }

    #[tokio::test]
    async fn balance_posts_address_and_reads_value() {
        let (url, server) = one_shot_server("HTTP/1.1 200 OK", r#"{"value":"1000"}"#).await;
        let client = HttpRpcClient::new(url, Duration::from_secs(5)).unwrap();

        let balance = client.balance(&faucet_address()).await.unwrap();
        assert_eq!(balance, Some(1000));

        let request = server.await.unwrap();
        assert!(request.starts_with("POST /v1/balance "));
        assert!(request.contains(r#""address":"0xc964073a0ee172f3daa62325af021a68f707511a""#));
    }

    #[tokio::test]
    async fn error_body_on_failure_status_is_still_decoded() {
        let (url, server) = one_shot_server(
            "HTTP/1.1 404 Not Found",
            r#"{"error":"transaction not found"}"#,
        )
        .await;
        let client = HttpRpcClient::new(url, Duration::from_secs(5)).unwrap();

        let id = TransactionId::from_bytes([9u8; 32]);
        let lookup = client.transaction_info(&id).await.unwrap();
        assert_eq!(lookup, TransactionLookup::NotFound);
        server.await.unwrap();
    }

    #[tokio::test]
    async fn failure_status_without_error_body_is_transport_error() {
        let (url, server) = one_shot_server("HTTP/1.1 503 Service Unavailable", "{}").await;
        let client = HttpRpcClient::new(url, Duration::from_secs(5)).unwrap();

        let err = client.node_status().await.unwrap_err();
        assert!(matches!(err, RpcError::Transport(_)));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn unreachable_node_is_transport_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client =
            HttpRpcClient::new(format!("http://{}/v1/", addr), Duration::from_secs(2)).unwrap();
        let err = client.nonce(&faucet_address()).await.unwrap_err();
        assert!(matches!(err, RpcError::Transport(_)));
    }
}

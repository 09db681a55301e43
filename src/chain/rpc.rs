//! CometBFT RPC client with timeout and error handling.
//!
//! # Responsibilities
//! - Point lookup of a transaction result (`/tx?hash=0x…`)
//! - Point read of a contract state key (`/abci_query?path="/get/…"`)
//! - Node status for connectivity checks
//! - Map transport, HTTP and JSON-RPC failures into [`ChainError`]

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::time::timeout;
use url::Url;

use crate::chain::types::{ChainError, ChainResult};
use crate::config::RpcConfig;

/// Read-only ledger access used by the submitter and the poller.
#[async_trait]
pub trait LedgerRpc: Send + Sync {
    /// Full `/tx` response for `hash` (hex, with or without `0x`).
    async fn tx(&self, hash: &str) -> ChainResult<Value>;

    /// Raw base64 value stored at `{contract}.{key}`, if the node returned one.
    async fn abci_get(&self, contract: &str, key: &str) -> ChainResult<Option<String>>;
}

/// HTTP client for a CometBFT RPC endpoint.
#[derive(Clone)]
pub struct RpcClient {
    http: reqwest::Client,
    base_url: Url,
    timeout_duration: Duration,
}

impl RpcClient {
    /// Create a new RPC client.
    ///
    /// Fails only on an unparseable URL; reachability is checked lazily.
    pub fn new(config: &RpcConfig) -> ChainResult<Self> {
        let mut base_url: Url = config.url.parse().map_err(|e| {
            ChainError::Rpc(format!("Invalid RPC URL '{}': {}", config.url, e))
        })?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        tracing::debug!(rpc_url = %base_url, "RPC client initialized");

        Ok(Self {
            http: reqwest::Client::new(),
            base_url,
            timeout_duration: Duration::from_secs(config.timeout_secs),
        })
    }

    /// Latest block height reported by `/status`.
    pub async fn latest_block_height(&self) -> ChainResult<u64> {
        let status = self.get_json("status", &[]).await?;
        status
            .pointer("/result/sync_info/latest_block_height")
            .and_then(|height| match height {
                Value::String(s) => s.parse().ok(),
                other => other.as_u64(),
            })
            .ok_or_else(|| ChainError::Decode("status without latest_block_height".to_string()))
    }

    /// Check if the node is reachable and answering.
    pub async fn is_healthy(&self) -> bool {
        self.latest_block_height().await.is_ok()
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    async fn get_json(&self, path: &str, query: &[(&str, String)]) -> ChainResult<Value> {
        let url = self
            .base_url
            .join(path)
            .map_err(|e| ChainError::Rpc(format!("Invalid RPC path '{}': {}", path, e)))?;

        let request = async {
            let response = self
                .http
                .get(url.clone())
                .query(query)
                .send()
                .await
                .map_err(|e| ChainError::Rpc(e.to_string()))?;

            let status = response.status();
            if !status.is_success() {
                return Err(ChainError::Rpc(format!("{} returned HTTP {}", path, status)));
            }

            response
                .json::<Value>()
                .await
                .map_err(|e| ChainError::Decode(format!("{} response: {}", path, e)))
        };

        let body = match timeout(self.timeout_duration, request).await {
            Ok(result) => result?,
            Err(_) => {
                tracing::warn!(url = %url, "RPC timeout");
                return Err(ChainError::Timeout(self.timeout_duration.as_secs()));
            }
        };

        if let Some(error) = body.get("error").filter(|e| !e.is_null()) {
            let message = error
                .get("data")
                .and_then(Value::as_str)
                .or_else(|| error.get("message").and_then(Value::as_str))
                .map(str::to_string)
                .unwrap_or_else(|| error.to_string());
            return Err(ChainError::Rpc(message));
        }

        Ok(body)
    }
}

#[async_trait]
impl LedgerRpc for RpcClient {
    async fn tx(&self, hash: &str) -> ChainResult<Value> {
        let hash = hash.strip_prefix("0x").unwrap_or(hash);
        self.get_json("tx", &[("hash", format!("0x{}", hash))]).await
    }

    async fn abci_get(&self, contract: &str, key: &str) -> ChainResult<Option<String>> {
        let path = format!("\"/get/{}.{}\"", contract, key);
        let body = self.get_json("abci_query", &[("path", path)]).await?;
        Ok(body
            .pointer("/result/response/value")
            .and_then(Value::as_str)
            .map(str::to_string))
    }
}

impl std::fmt::Debug for RpcClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcClient")
            .field("rpc_url", &self.base_url.as_str())
            .field("timeout_secs", &self.timeout_duration.as_secs())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config(url: &str) -> RpcConfig {
        RpcConfig {
            url: url.to_string(),
            timeout_secs: 2,
        }
    }

    #[test]
    fn test_base_url_gets_trailing_slash() {
        let client = RpcClient::new(&test_config("http://localhost:26657/rpc")).unwrap();
        assert_eq!(client.base_url().as_str(), "http://localhost:26657/rpc/");
        assert_eq!(
            client.base_url().join("tx").unwrap().as_str(),
            "http://localhost:26657/rpc/tx"
        );
    }

    #[test]
    fn test_invalid_url_rejected() {
        let err = RpcClient::new(&test_config("::not-a-url")).unwrap_err();
        assert!(err.to_string().contains("Invalid RPC URL"));
    }

    #[tokio::test]
    async fn test_unreachable_node_is_rpc_error() {
        // Port 9 (discard) is not expected to run an RPC server.
        let client = RpcClient::new(&test_config("http://127.0.0.1:9")).unwrap();
        let result = client.tx("abc").await;
        assert!(matches!(result, Err(ChainError::Rpc(_)) | Err(ChainError::Timeout(_))));
        assert!(!client.is_healthy().await);
    }
}

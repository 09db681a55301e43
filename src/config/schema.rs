//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the client core.
//! All types derive Serde traits for deserialization from config files, and every
//! section falls back to defaults so a minimal file only names what it changes.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::resilience::Backoff;

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ClientConfig {
    /// Wallet bridge timeouts.
    pub bridge: BridgeConfig,

    /// CometBFT RPC endpoint.
    pub rpc: RpcConfig,

    /// GraphQL state endpoint.
    pub graphql: GraphQlConfig,

    /// Transaction result lookup.
    pub transactions: TransactionConfig,

    /// State confirmation polling.
    pub confirmation: ConfirmationConfig,

    /// Realtime transaction stream.
    pub monitor: MonitorConfig,

    /// Periodic state reconciliation.
    pub reconciler: ReconcilerConfig,

    /// Poll creation and voting.
    pub actions: ActionsConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Wallet bridge configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Timeout for `get-wallet-info` round trips in milliseconds.
    pub info_timeout_ms: u64,

    /// Timeout for `sign-message` round trips in milliseconds.
    pub sign_timeout_ms: u64,

    /// Timeout for `send-transaction` round trips in milliseconds.
    pub transaction_timeout_ms: u64,

    /// How long to wait for `agent-ready` before proceeding anyway.
    pub readiness_fallback_ms: u64,
}

impl BridgeConfig {
    pub fn info_timeout(&self) -> Duration {
        Duration::from_millis(self.info_timeout_ms)
    }

    pub fn sign_timeout(&self) -> Duration {
        Duration::from_millis(self.sign_timeout_ms)
    }

    pub fn transaction_timeout(&self) -> Duration {
        Duration::from_millis(self.transaction_timeout_ms)
    }

    pub fn readiness_fallback(&self) -> Duration {
        Duration::from_millis(self.readiness_fallback_ms)
    }
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            info_timeout_ms: 2_000,
            sign_timeout_ms: 30_000,
            transaction_timeout_ms: 30_000,
            readiness_fallback_ms: 2_000,
        }
    }
}

/// CometBFT RPC configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RpcConfig {
    /// Base URL (e.g., "https://testnet.xian.org").
    pub url: String,

    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            url: "https://testnet.xian.org".to_string(),
            timeout_secs: 10,
        }
    }
}

/// GraphQL endpoint configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GraphQlConfig {
    /// GraphQL endpoint URL.
    pub url: String,

    /// Entries requested per page during prefix scans.
    pub page_size: u32,

    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for GraphQlConfig {
    fn default() -> Self {
        Self {
            url: "https://node.xian.org/graphql".to_string(),
            page_size: 100,
            timeout_secs: 10,
        }
    }
}

/// Transaction result lookup configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TransactionConfig {
    /// Retries after the initial `/tx` lookup.
    pub result_retries: u32,

    /// Delay before the first retry in milliseconds.
    pub result_initial_delay_ms: u64,

    /// Delay growth factor.
    pub result_multiplier: f64,
}

impl TransactionConfig {
    pub fn backoff(&self) -> Backoff {
        Backoff::new(
            Duration::from_millis(self.result_initial_delay_ms),
            self.result_multiplier,
        )
    }
}

impl Default for TransactionConfig {
    fn default() -> Self {
        Self {
            result_retries: 5,
            result_initial_delay_ms: 1_000,
            result_multiplier: 2.0,
        }
    }
}

/// State confirmation polling configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ConfirmationConfig {
    /// Contract whose state keys are polled.
    pub contract: String,

    /// Point reads before giving up and resyncing.
    pub max_attempts: u32,

    /// Delay after the first miss in milliseconds.
    pub initial_delay_ms: u64,

    /// Delay growth factor.
    pub multiplier: f64,

    /// Upper bound for a single delay in milliseconds.
    pub max_delay_ms: u64,
}

impl ConfirmationConfig {
    pub fn backoff(&self) -> Backoff {
        Backoff::from_millis(self.initial_delay_ms, self.multiplier, Some(self.max_delay_ms))
    }
}

impl Default for ConfirmationConfig {
    fn default() -> Self {
        Self {
            contract: "con_xipoll_v0".to_string(),
            max_attempts: 10,
            initial_delay_ms: 1_000,
            multiplier: 1.5,
            max_delay_ms: 5_000,
        }
    }
}

/// Realtime stream monitor configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Start the monitor from the service binary.
    pub enabled: bool,

    /// CometBFT websocket endpoint.
    pub ws_url: String,

    /// Contract whose transactions are forwarded.
    pub contract: String,

    /// Method translated into structured paint events.
    pub designated_method: String,

    /// First reconnect delay in milliseconds.
    pub reconnect_initial_ms: u64,

    /// Reconnect delay growth factor.
    pub reconnect_multiplier: f64,

    /// Reconnect delay cap in milliseconds.
    pub reconnect_max_ms: u64,

    /// Transaction hashes remembered for deduplication.
    pub dedup_capacity: usize,

    /// Forward connection status changes as events.
    pub report_status: bool,
}

impl MonitorConfig {
    pub fn reconnect_backoff(&self) -> Backoff {
        Backoff::from_millis(
            self.reconnect_initial_ms,
            self.reconnect_multiplier,
            Some(self.reconnect_max_ms),
        )
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ws_url: "wss://devnet.xian.org/websocket".to_string(),
            contract: "con_xipoll_v0".to_string(),
            designated_method: "paint".to_string(),
            reconnect_initial_ms: 1_000,
            reconnect_multiplier: 1.5,
            reconnect_max_ms: 15_000,
            dedup_capacity: 10_000,
            report_status: false,
        }
    }
}

/// State reconciler configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ReconcilerConfig {
    /// Contract whose state is scanned.
    pub contract: String,

    /// Refresh interval in seconds.
    pub interval_secs: u64,

    /// Maximum optimistic votes held at once.
    pub overlay_capacity: usize,

    /// Optimistic votes older than this are dropped, in seconds.
    pub overlay_ttl_secs: u64,

    /// Address whose votes are projected onto polls.
    pub user: Option<String>,
}

impl ReconcilerConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn overlay_ttl(&self) -> Duration {
        Duration::from_secs(self.overlay_ttl_secs)
    }
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            contract: "con_xipoll_v0_clean".to_string(),
            interval_secs: 10,
            overlay_capacity: 1_024,
            overlay_ttl_secs: 60,
            user: None,
        }
    }
}

/// Poll action configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ActionsConfig {
    /// Contract that receives `create_poll` and `vote` transactions.
    pub contract: String,

    /// Token contract used when a new poll does not name one.
    pub default_token_contract: String,
}

impl Default for ActionsConfig {
    fn default() -> Self {
        Self {
            contract: "con_xipoll_v0".to_string(),
            default_token_contract: "currency".to_string(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_protocol_constants() {
        let config = ClientConfig::default();
        assert_eq!(config.bridge.info_timeout(), Duration::from_secs(2));
        assert_eq!(config.bridge.sign_timeout(), Duration::from_secs(30));
        assert_eq!(config.bridge.transaction_timeout(), Duration::from_secs(30));
        assert_eq!(config.transactions.result_retries, 5);
        assert_eq!(config.confirmation.max_attempts, 10);
        assert_eq!(config.monitor.reconnect_max_ms, 15_000);
        assert_eq!(config.reconciler.interval(), Duration::from_secs(10));
        assert_eq!(config.actions.default_token_contract, "currency");
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: ClientConfig = toml::from_str(
            r#"
            [rpc]
            url = "http://127.0.0.1:26657"

            [monitor]
            contract = "con_pixel_whale"
            "#,
        )
        .unwrap();

        assert_eq!(config.rpc.url, "http://127.0.0.1:26657");
        assert_eq!(config.rpc.timeout_secs, 10);
        assert_eq!(config.monitor.contract, "con_pixel_whale");
        assert_eq!(config.monitor.designated_method, "paint");
        assert_eq!(config.graphql.page_size, 100);
    }
}

//! State confirmation polling.
//!
//! Reads a state key until it holds an expected value. When the schedule runs
//! out the poller does not fail the caller: it asks the reconciler for a full
//! resync and reports a soft [`ConfirmationStatus::ConfirmationTimeout`].

use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use crate::chain::codec;
use crate::chain::rpc::LedgerRpc;
use crate::chain::types::{ChainError, ChainResult, ConfirmationStatus};
use crate::config::ConfirmationConfig;
use crate::observability::metrics;
use crate::resilience::{retry_with_backoff, Backoff, RetryError};

/// Why a single poll attempt did not confirm.
#[derive(Debug)]
enum PollMiss {
    Mismatch(Option<Value>),
    Read(ChainError),
}

impl fmt::Display for PollMiss {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PollMiss::Mismatch(Some(observed)) => write!(f, "observed {}", observed),
            PollMiss::Mismatch(None) => f.write_str("key absent"),
            PollMiss::Read(e) => write!(f, "{}", e),
        }
    }
}

/// Generic "read key, compare, retry, else resync" primitive.
pub struct StatePoller {
    rpc: Arc<dyn LedgerRpc>,
    contract: String,
    backoff: Backoff,
    max_attempts: u32,
    cache: DashMap<String, Value>,
    resync: Option<Arc<Notify>>,
    cancel: CancellationToken,
}

impl StatePoller {
    pub fn new(rpc: Arc<dyn LedgerRpc>, config: &ConfirmationConfig) -> Self {
        Self {
            rpc,
            contract: config.contract.clone(),
            backoff: config.backoff(),
            max_attempts: config.max_attempts,
            cache: DashMap::new(),
            resync: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Signal to raise when confirmation gives up.
    ///
    /// Usually `StateReconciler::refresh_signal`.
    pub fn with_resync(mut self, resync: Arc<Notify>) -> Self {
        self.resync = Some(resync);
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Single point read of `key`, decoded.
    pub async fn read_value(&self, key: &str) -> ChainResult<Option<Value>> {
        let raw = self.rpc.abci_get(&self.contract, key).await?;
        Ok(codec::decode_state_value(raw.as_deref()))
    }

    /// Last confirmed value of `key`.
    pub fn cached(&self, key: &str) -> Option<Value> {
        self.cache.get(key).map(|entry| entry.value().clone())
    }

    pub fn contract(&self) -> &str {
        &self.contract
    }

    /// Poll `key` until it reads back as `expected`.
    pub async fn wait_for_value(&self, key: &str, expected: &Value) -> ConfirmationStatus {
        self.wait_until(key, |observed| codec::state_matches(observed, expected))
            .await
    }

    /// Poll `key` until `accept` holds for its decoded value (`None` when absent).
    pub async fn wait_until<F>(&self, key: &str, accept: F) -> ConfirmationStatus
    where
        F: Fn(Option<&Value>) -> bool + Sync,
    {
        let accept = &accept;
        let status = match retry_with_backoff(
            &self.backoff,
            self.max_attempts,
            &self.cancel,
            move |attempt| self.attempt(key, accept, attempt),
        )
        .await
        {
            Ok((attempts, observed)) => {
                if let Some(value) = observed {
                    self.cache.insert(key.to_string(), value);
                }
                tracing::info!(key = %key, attempts = attempts, "State confirmed");
                ConfirmationStatus::Confirmed { attempts }
            }
            Err(RetryError::Exhausted { attempts, last }) => {
                tracing::warn!(
                    key = %key,
                    attempts = attempts,
                    last = %last,
                    "State not confirmed, requesting full resync"
                );
                if let Some(resync) = &self.resync {
                    resync.notify_one();
                }
                ConfirmationStatus::ConfirmationTimeout { attempts }
            }
            Err(RetryError::Cancelled) => ConfirmationStatus::Cancelled,
        };

        metrics::record_confirmation(status.label());
        status
    }

    async fn attempt<F>(
        &self,
        key: &str,
        accept: &F,
        attempt: u32,
    ) -> Result<(u32, Option<Value>), PollMiss>
    where
        F: Fn(Option<&Value>) -> bool,
    {
        let observed = self.read_value(key).await.map_err(PollMiss::Read)?;
        if accept(observed.as_ref()) {
            Ok((attempt, observed))
        } else {
            tracing::debug!(
                key = %key,
                attempt = attempt,
                observed = ?observed,
                "State not yet updated"
            );
            Err(PollMiss::Mismatch(observed))
        }
    }
}

impl fmt::Debug for StatePoller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StatePoller")
            .field("contract", &self.contract)
            .field("max_attempts", &self.max_attempts)
            .field("cached_keys", &self.cache.len())
            .finish()
    }
}

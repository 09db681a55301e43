//! Transaction submission and result retrieval.
//!
//! # Responsibilities
//! - Hand the intent to the wallet and await its status reply
//! - Short-circuit on an explicit error list
//! - Fetch the result with doubling backoff, then decode its payload

use std::sync::Arc;

use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::bridge::{TransactionIntent, TxStatus, WalletSession};
use crate::chain::codec;
use crate::chain::rpc::LedgerRpc;
use crate::chain::types::{ChainError, ChainResult, TransactionOutcome};
use crate::config::TransactionConfig;
use crate::observability::metrics;
use crate::resilience::{retry_with_backoff, Backoff, RetryError};

/// Orchestrates submit → status → result lookup → decode.
pub struct TransactionSubmitter {
    bridge: Arc<WalletSession>,
    rpc: Arc<dyn LedgerRpc>,
    backoff: Backoff,
    retries: u32,
    cancel: CancellationToken,
}

impl TransactionSubmitter {
    /// Create a new submitter.
    pub fn new(
        bridge: Arc<WalletSession>,
        rpc: Arc<dyn LedgerRpc>,
        config: &TransactionConfig,
    ) -> Self {
        Self {
            bridge,
            rpc,
            backoff: config.backoff(),
            retries: config.result_retries,
            cancel: CancellationToken::new(),
        }
    }

    /// Abort in-flight result lookups when `cancel` fires.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Submit `intent` and resolve its outcome.
    ///
    /// Bridge failures (timeout, no host) are errors; everything after the
    /// wallet accepted the call is reported through [`TransactionOutcome`].
    pub async fn submit(&self, intent: TransactionIntent) -> ChainResult<TransactionOutcome> {
        let contract = intent.contract.clone();
        let method = intent.method.clone();

        let outcome = match self.bridge.send_transaction(intent).await? {
            TxStatus::Rejected { errors } => {
                tracing::warn!(
                    contract = %contract,
                    method = %method,
                    errors = ?errors,
                    "Transaction rejected by wallet"
                );
                TransactionOutcome::Rejected(errors)
            }
            TxStatus::Accepted { txid } => {
                tracing::info!(
                    contract = %contract,
                    method = %method,
                    tx_hash = %txid,
                    "Transaction accepted"
                );
                match self.tx_result_with_backoff(&txid).await {
                    Ok(tx) => TransactionOutcome::Decoded(codec::decode_tx_result_data(&tx)),
                    Err(RetryError::Exhausted { attempts, last }) => {
                        tracing::warn!(
                            tx_hash = %txid,
                            attempts = attempts,
                            error = %last,
                            "Transaction result unavailable"
                        );
                        TransactionOutcome::Unavailable
                    }
                    Err(RetryError::Cancelled) => {
                        tracing::info!(tx_hash = %txid, "Transaction result lookup cancelled");
                        TransactionOutcome::Unavailable
                    }
                }
            }
        };

        metrics::record_tx_outcome(outcome.label());
        Ok(outcome)
    }

    /// Look up `hash`, retrying with the configured doubling schedule.
    ///
    /// One initial attempt plus `result_retries` retries.
    pub async fn tx_result_with_backoff(
        &self,
        hash: &str,
    ) -> Result<Value, RetryError<ChainError>> {
        let rpc = self.rpc.as_ref();
        retry_with_backoff(&self.backoff, self.retries + 1, &self.cancel, move |attempt| {
            tracing::debug!(tx_hash = %hash, attempt = attempt, "Fetching transaction result");
            rpc.tx(hash)
        })
        .await
    }
}

impl std::fmt::Debug for TransactionSubmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionSubmitter")
            .field("backoff", &self.backoff)
            .field("retries", &self.retries)
            .finish()
    }
}

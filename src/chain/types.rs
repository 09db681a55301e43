//! Chain-specific types and error definitions.

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::bridge::BridgeError;

/// Errors that can occur during chain reads and submissions.
#[derive(Debug, Error)]
pub enum ChainError {
    /// RPC connection or request failed.
    #[error("RPC error: {0}")]
    Rpc(String),

    /// RPC request timed out.
    #[error("RPC timeout after {0} seconds")]
    Timeout(u64),

    /// The node answered, but not with what we can decode.
    #[error("Decode failure: {0}")]
    Decode(String),

    /// The wallet bridge failed before the chain was reached.
    #[error(transparent)]
    Bridge(#[from] BridgeError),
}

/// Result type for chain operations.
pub type ChainResult<T> = Result<T, ChainError>;

/// Final result of a submission.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum TransactionOutcome {
    /// The wallet reported errors; no lookup was attempted.
    Rejected(Vec<String>),
    /// The result was fetched. `None` when its payload could not be decoded.
    Decoded(Option<Value>),
    /// The result could not be fetched within the backoff schedule.
    Unavailable,
}

impl TransactionOutcome {
    /// Short label for logs and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            TransactionOutcome::Rejected(_) => "rejected",
            TransactionOutcome::Decoded(Some(_)) => "decoded",
            TransactionOutcome::Decoded(None) => "undecodable",
            TransactionOutcome::Unavailable => "unavailable",
        }
    }
}

/// Result of waiting for a state key to reach a value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ConfirmationStatus {
    /// The expected value was read back.
    Confirmed { attempts: u32 },
    /// Attempts ran out; a full resync was requested instead.
    ConfirmationTimeout { attempts: u32 },
    /// Polling was cancelled before a verdict.
    Cancelled,
}

impl ConfirmationStatus {
    pub fn is_confirmed(&self) -> bool {
        matches!(self, ConfirmationStatus::Confirmed { .. })
    }

    pub fn label(&self) -> &'static str {
        match self {
            ConfirmationStatus::Confirmed { .. } => "confirmed",
            ConfirmationStatus::ConfirmationTimeout { .. } => "timeout",
            ConfirmationStatus::Cancelled => "cancelled",
        }
    }
}

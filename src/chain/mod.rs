//! Ledger access subsystem.
//!
//! # Data Flow
//! ```text
//! TransactionIntent
//!     → submitter.rs (wallet send → status → backoff lookup)
//!     → rpc.rs (/tx with timeouts)
//!     → codec.rs (base64 → JSON result payload)
//!
//! (key, expected)
//!     → poller.rs (abci_query until match, else resync signal)
//! ```
//!
//! # Constraints
//! - All RPC calls have configurable timeouts
//! - Decoding never fails a caller; malformed payloads decode to `None`

pub mod codec;
pub mod poller;
pub mod rpc;
pub mod submitter;
pub mod types;

pub use poller::StatePoller;
pub use rpc::{LedgerRpc, RpcClient};
pub use submitter::TransactionSubmitter;
pub use types::{ChainError, ChainResult, ConfirmationStatus, TransactionOutcome};

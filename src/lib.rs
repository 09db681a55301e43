//! Client core for an on-chain polling dApp.
//!
//! # Architecture Overview
//!
//! ```text
//!   UI action ──▶ state::PollActions (validate, one vote per poll)
//!                    │
//!                    ▼
//!               chain::TransactionSubmitter ──▶ bridge (WalletSession) ──▶ host wallet agent
//!                    │ tx-status
//!                    ▼
//!               RPC /tx (backoff)
//!               chain::StatePoller ──────────▶ RPC /abci_query ──┐ resync
//!                                                                ▼
//!   websocket ──▶ monitor::RealtimeMonitor ──▶ events     state::StateReconciler ◀── GraphQL
//!                                                                │
//!                                                                ▼
//!                                                         PollSnapshot (watch)
//! ```
//!
//! Cross-cutting: `config`, `observability`, `resilience`, `lifecycle`.

// Core subsystems
pub mod bridge;
pub mod chain;
pub mod monitor;
pub mod state;

// Cross-cutting concerns
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod observability;
pub mod resilience;

pub use bridge::WalletSession;
pub use chain::{StatePoller, TransactionSubmitter};
pub use config::ClientConfig;
pub use error::{Error, Result};
pub use lifecycle::Shutdown;
pub use monitor::RealtimeMonitor;
pub use state::{PollActions, StateReconciler};

//! Wallet bridge subsystem.
//!
//! # Data Flow
//! ```text
//! UI action
//!     → session.rs (enqueue resolver, dispatch named event, race timeout)
//!     → readiness.rs (wait for agent-ready or fallback before dispatch)
//!     → channel.rs (EventChannel to the host's wallet agent)
//!     ← inbound reply → session.rs (resolve by id, else oldest of kind)
//! ```
//!
//! # Security Constraints
//! - No key material ever passes through this crate; signing is the agent's job
//! - Replies are validated into typed variants at the boundary

pub mod channel;
pub mod readiness;
pub mod session;
pub mod types;

pub use channel::{spawn_inbound_pump, EventChannel, HostContext, MpscEventChannel};
pub use readiness::{ReadinessGate, ReadinessState, ReadinessWait};
pub use session::WalletSession;
pub use types::{
    BridgeError, BridgeResult, InboundEvent, OutboundEvent, OutboundRequest, ReplyPayload,
    RequestKind, SignResponse, TransactionIntent, TxStatus, WalletInfo,
};

//! Event channel between the bridge and the host's wallet agent.
//!
//! # Data Flow
//! ```text
//! WalletSession ──dispatch(OutboundEvent)──▶ EventChannel ──▶ wallet agent
//! WalletSession ◀──deliver(InboundEvent)──── inbound pump ◀── wallet agent
//! ```

use std::fmt;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::bridge::session::WalletSession;
use crate::bridge::types::{BridgeError, BridgeResult, InboundEvent, OutboundEvent};

/// Outbound half of the signaling primitive.
pub trait EventChannel: Send + Sync {
    /// Hand a named event to the agent. Must not block.
    fn dispatch(&self, event: OutboundEvent) -> BridgeResult<()>;
}

/// Whether a host that can reach a wallet agent is present.
#[derive(Clone)]
pub enum HostContext {
    Attached(Arc<dyn EventChannel>),
    Detached,
}

impl HostContext {
    pub fn attached(channel: impl EventChannel + 'static) -> Self {
        HostContext::Attached(Arc::new(channel))
    }

    pub fn is_attached(&self) -> bool {
        matches!(self, HostContext::Attached(_))
    }
}

impl fmt::Debug for HostContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostContext::Attached(_) => f.write_str("HostContext::Attached"),
            HostContext::Detached => f.write_str("HostContext::Detached"),
        }
    }
}

/// [`EventChannel`] backed by an unbounded Tokio channel.
///
/// The receiving half is whatever forwards events to the agent (an extension
/// port, a websocket, or a test harness).
#[derive(Debug, Clone)]
pub struct MpscEventChannel {
    tx: mpsc::UnboundedSender<OutboundEvent>,
}

impl MpscEventChannel {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<OutboundEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl EventChannel for MpscEventChannel {
    fn dispatch(&self, event: OutboundEvent) -> BridgeResult<()> {
        self.tx
            .send(event)
            .map_err(|_| BridgeError::Dispatch("agent channel closed".to_string()))
    }
}

/// Forward inbound events from `rx` into `session` until the channel closes.
pub fn spawn_inbound_pump(
    session: Arc<WalletSession>,
    mut rx: mpsc::UnboundedReceiver<InboundEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            session.deliver(event);
        }
        tracing::debug!("Inbound wallet channel closed");
    })
}

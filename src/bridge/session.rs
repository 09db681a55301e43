//! Wallet session: request/response correlation over an [`EventChannel`].
//!
//! # Responsibilities
//! - Tag each outbound request with a fresh id and park a one-shot resolver
//! - Resolve replies by echoed id, or by arrival order when no id is echoed
//! - Enforce per-call timeouts and gate calls on agent readiness
//!
//! # Correlation
//! ```text
//! request_info() ──▶ queue[WalletInfo] = [r1, r2, r3]
//! reply{id: r2}  ──▶ resolves r2
//! reply{}        ──▶ resolves r1 (oldest)
//! ```
//! A timed-out call removes its resolver, so a late reply cannot be
//! attributed to an abandoned call.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use serde_json::Value;
use tokio::sync::{broadcast, oneshot};
use tokio::time::timeout;
use uuid::Uuid;

use crate::bridge::channel::{EventChannel, HostContext};
use crate::bridge::readiness::{ReadinessGate, ReadinessState};
use crate::bridge::types::{
    BridgeError, BridgeResult, InboundEvent, OutboundEvent, OutboundRequest, ReplyPayload,
    RequestKind, SignResponse, TransactionIntent, TxStatus, WalletInfo,
};
use crate::config::BridgeConfig;
use crate::observability::metrics;

/// A parked caller waiting for its reply.
#[derive(Debug)]
struct PendingRequest {
    id: Uuid,
    resolver: oneshot::Sender<ReplyPayload>,
    created_at: Instant,
}

/// One FIFO queue per request kind.
#[derive(Debug, Default)]
struct PendingQueues {
    queues: HashMap<RequestKind, VecDeque<PendingRequest>>,
}

impl PendingQueues {
    fn push(&mut self, kind: RequestKind, request: PendingRequest) {
        self.queues.entry(kind).or_default().push_back(request);
    }

    /// Take the request a reply belongs to.
    ///
    /// An echoed id must match exactly; without one the oldest request wins.
    fn take(&mut self, kind: RequestKind, id: Option<Uuid>) -> Option<PendingRequest> {
        let queue = self.queues.get_mut(&kind)?;
        match id {
            Some(id) => {
                let position = queue.iter().position(|p| p.id == id)?;
                queue.remove(position)
            }
            None => queue.pop_front(),
        }
    }

    fn remove(&mut self, kind: RequestKind, id: Uuid) -> bool {
        self.take(kind, Some(id)).is_some()
    }

    fn len(&self, kind: RequestKind) -> usize {
        self.queues.get(&kind).map_or(0, VecDeque::len)
    }

    fn clear(&mut self) -> usize {
        let dropped = self.queues.values().map(VecDeque::len).sum();
        self.queues.clear();
        dropped
    }
}

/// Bridge to an external signing agent, scoped to one session.
///
/// Constructed with [`WalletSession::open`] and shared by `Arc`.
pub struct WalletSession {
    host: Option<Arc<dyn EventChannel>>,
    gate: ReadinessGate,
    pending: Mutex<PendingQueues>,
    config: BridgeConfig,
    closed: AtomicBool,
    info_updates: broadcast::Sender<WalletInfo>,
}

impl WalletSession {
    /// Open a session. A detached host yields an inert session whose calls
    /// fail with [`BridgeError::NotInHostContext`].
    pub fn open(host: HostContext, config: BridgeConfig) -> Arc<Self> {
        let host = match host {
            HostContext::Attached(channel) => Some(channel),
            HostContext::Detached => {
                tracing::info!("No wallet host context, bridge calls will fail fast");
                None
            }
        };
        let (info_updates, _) = broadcast::channel(16);

        Arc::new(Self {
            host,
            gate: ReadinessGate::new(config.readiness_fallback()),
            pending: Mutex::new(PendingQueues::default()),
            config,
            closed: AtomicBool::new(false),
            info_updates,
        })
    }

    /// Close the session. Pending callers observe [`BridgeError::SessionClosed`].
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let dropped = self.queues().clear();
        tracing::info!(dropped_requests = dropped, "Wallet session closed");
    }

    pub fn is_open(&self) -> bool {
        self.host.is_some() && !self.closed.load(Ordering::SeqCst)
    }

    pub fn readiness(&self) -> ReadinessState {
        self.gate.state()
    }

    /// Requests of `kind` still waiting for a reply.
    pub fn pending_count(&self, kind: RequestKind) -> usize {
        self.queues().len(kind)
    }

    /// Every `wallet-info` reply, solicited or not.
    pub fn subscribe_wallet_info(&self) -> broadcast::Receiver<WalletInfo> {
        self.info_updates.subscribe()
    }

    /// Ask the agent for the active account.
    pub async fn request_info(&self) -> BridgeResult<WalletInfo> {
        self.host()?;

        if !self.gate.is_ready() {
            if self.gate.begin_unlock() {
                // First caller drives the unlock; others wait for it below.
                let result = self.info_round_trip().await;
                self.gate.end_unlock();
                return result;
            }
            self.gate.wait_for_ready().await;
        }

        self.info_round_trip().await
    }

    /// Ask the agent to sign `message`.
    pub async fn sign_message(&self, message: impl Into<String>) -> BridgeResult<SignResponse> {
        self.host()?;
        self.gate.wait_for_ready().await;

        let request = OutboundRequest::SignMessage {
            message: message.into(),
        };
        match self.round_trip(request, self.config.sign_timeout()).await? {
            ReplyPayload::Signature(response) => Ok(response),
            _ => Err(BridgeError::UnexpectedReply(RequestKind::SignMessage)),
        }
    }

    /// Ask the agent to sign and broadcast a contract call.
    pub async fn send_transaction(&self, intent: TransactionIntent) -> BridgeResult<TxStatus> {
        self.host()?;
        self.gate.wait_for_ready().await;

        tracing::debug!(
            contract = %intent.contract,
            method = %intent.method,
            "Dispatching transaction to wallet"
        );
        let request = OutboundRequest::SendTransaction(intent);
        match self.round_trip(request, self.config.transaction_timeout()).await? {
            ReplyPayload::TxStatus(status) => Ok(status),
            _ => Err(BridgeError::UnexpectedReply(RequestKind::Transaction)),
        }
    }

    /// Route an inbound event to its waiting caller.
    pub fn deliver(&self, event: InboundEvent) {
        let (request_id, payload) = match event {
            InboundEvent::AgentReady => {
                self.gate.mark_ready();
                return;
            }
            InboundEvent::Reply {
                request_id,
                payload,
            } => (request_id, payload),
        };

        if let ReplyPayload::WalletInfo(info) = &payload {
            let _ = self.info_updates.send(info.clone());
        }

        let kind = payload.kind();
        match self.queues().take(kind, request_id) {
            Some(pending) => {
                tracing::debug!(
                    kind = kind.as_str(),
                    request_id = %pending.id,
                    latency_ms = pending.created_at.elapsed().as_millis() as u64,
                    "Wallet reply correlated"
                );
                let _ = pending.resolver.send(payload);
            }
            None => {
                tracing::debug!(
                    kind = kind.as_str(),
                    request_id = ?request_id,
                    "Wallet reply with no pending request, dropped"
                );
            }
        }
    }

    /// Validate a wire envelope and deliver it.
    pub fn deliver_json(&self, envelope: &Value) -> BridgeResult<()> {
        match InboundEvent::from_json(envelope) {
            Ok(event) => {
                self.deliver(event);
                Ok(())
            }
            Err(e) => {
                tracing::warn!(error = %e, "Ignoring malformed wallet event");
                Err(e)
            }
        }
    }

    async fn info_round_trip(&self) -> BridgeResult<WalletInfo> {
        match self
            .round_trip(OutboundRequest::GetWalletInfo, self.config.info_timeout())
            .await?
        {
            ReplyPayload::WalletInfo(info) => Ok(info),
            _ => Err(BridgeError::UnexpectedReply(RequestKind::WalletInfo)),
        }
    }

    async fn round_trip(
        &self,
        request: OutboundRequest,
        wait: Duration,
    ) -> BridgeResult<ReplyPayload> {
        let host = self.host()?;
        let kind = request.kind();
        let request_id = Uuid::new_v4();
        let (resolver, reply) = oneshot::channel();

        self.queues().push(
            kind,
            PendingRequest {
                id: request_id,
                resolver,
                created_at: Instant::now(),
            },
        );
        metrics::record_bridge_request(kind.as_str());

        if let Err(e) = host.dispatch(OutboundEvent {
            request_id,
            request,
        }) {
            self.queues().remove(kind, request_id);
            return Err(e);
        }

        match timeout(wait, reply).await {
            Ok(Ok(payload)) => Ok(payload),
            Ok(Err(_)) => Err(BridgeError::SessionClosed),
            Err(_) => {
                self.queues().remove(kind, request_id);
                metrics::record_bridge_timeout(kind.as_str());
                tracing::warn!(
                    kind = kind.as_str(),
                    request_id = %request_id,
                    timeout_ms = wait.as_millis() as u64,
                    "Wallet not responding"
                );
                Err(BridgeError::WalletNotResponding { kind, after: wait })
            }
        }
    }

    fn host(&self) -> BridgeResult<&Arc<dyn EventChannel>> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(BridgeError::SessionClosed);
        }
        self.host.as_ref().ok_or(BridgeError::NotInHostContext)
    }

    fn queues(&self) -> MutexGuard<'_, PendingQueues> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for WalletSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WalletSession")
            .field("attached", &self.host.is_some())
            .field("readiness", &self.gate.state())
            .field("closed", &self.closed.load(Ordering::SeqCst))
            .finish()
    }
}

impl Drop for WalletSession {
    fn drop(&mut self) {
        self.close();
    }
}

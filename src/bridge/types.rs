//! Wallet bridge wire types and error definitions.
//!
//! Outbound requests and inbound replies travel as JSON envelopes:
//!
//! ```text
//! {"event": "send-transaction", "request_id": "<uuid>", "detail": {...}}
//! ```
//!
//! Replies are validated into typed variants once, here, so the rest of the
//! crate never pokes at optional JSON fields.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use thiserror::Error;
use uuid::Uuid;

/// Errors that can occur during wallet bridge calls.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// The session has no host channel to talk to a wallet agent.
    #[error("No wallet host context available")]
    NotInHostContext,

    /// The agent did not reply within the call's timeout.
    #[error("Wallet not responding to {kind} after {}ms", .after.as_millis())]
    WalletNotResponding { kind: RequestKind, after: Duration },

    /// The session was closed while the call was pending.
    #[error("Wallet session closed")]
    SessionClosed,

    /// The host channel refused the outbound event.
    #[error("Dispatch failed: {0}")]
    Dispatch(String),

    /// An inbound envelope could not be understood.
    #[error("Malformed wallet event: {0}")]
    MalformedEvent(String),

    /// A reply of the wrong shape resolved a request.
    #[error("Unexpected reply for {0}")]
    UnexpectedReply(RequestKind),
}

/// Result type for wallet bridge operations.
pub type BridgeResult<T> = Result<T, BridgeError>;

/// The three request/reply pairs the bridge correlates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestKind {
    WalletInfo,
    SignMessage,
    Transaction,
}

impl RequestKind {
    /// Name of the event dispatched to the agent.
    pub fn outbound_event(self) -> &'static str {
        match self {
            RequestKind::WalletInfo => "get-wallet-info",
            RequestKind::SignMessage => "sign-message",
            RequestKind::Transaction => "send-transaction",
        }
    }

    /// Name of the event the agent replies with.
    pub fn reply_event(self) -> &'static str {
        match self {
            RequestKind::WalletInfo => "wallet-info",
            RequestKind::SignMessage => "sign-message-response",
            RequestKind::Transaction => "tx-status",
        }
    }

    /// Short label for logs and metrics.
    pub fn as_str(self) -> &'static str {
        match self {
            RequestKind::WalletInfo => "wallet_info",
            RequestKind::SignMessage => "sign_message",
            RequestKind::Transaction => "transaction",
        }
    }
}

impl std::fmt::Display for RequestKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.outbound_event())
    }
}

/// A contract call handed to the wallet for signing and broadcast.
///
/// Immutable once submitted; the bridge takes it by value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionIntent {
    pub contract: String,
    pub method: String,
    #[serde(default)]
    pub kwargs: Map<String, Value>,
    /// Native value, decimal string on the wire.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl TransactionIntent {
    /// Build an intent. Non-object `kwargs` are sent as an empty map.
    pub fn new(contract: impl Into<String>, method: impl Into<String>, kwargs: Value) -> Self {
        let kwargs = match kwargs {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self {
            contract: contract.into(),
            method: method.into(),
            kwargs,
            value: None,
        }
    }

    /// Attach a native value to send along with the call.
    pub fn with_value(mut self, value: impl ToString) -> Self {
        self.value = Some(value.to_string());
        self
    }
}

/// Request payload, one variant per [`RequestKind`].
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundRequest {
    GetWalletInfo,
    SignMessage { message: String },
    SendTransaction(TransactionIntent),
}

impl OutboundRequest {
    pub fn kind(&self) -> RequestKind {
        match self {
            OutboundRequest::GetWalletInfo => RequestKind::WalletInfo,
            OutboundRequest::SignMessage { .. } => RequestKind::SignMessage,
            OutboundRequest::SendTransaction(_) => RequestKind::Transaction,
        }
    }

    fn detail(&self) -> Value {
        match self {
            OutboundRequest::GetWalletInfo => Value::Null,
            OutboundRequest::SignMessage { message } => json!({ "message": message }),
            OutboundRequest::SendTransaction(intent) => {
                serde_json::to_value(intent).unwrap_or(Value::Null)
            }
        }
    }
}

/// An outbound event, tagged with the id the agent should echo back.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundEvent {
    pub request_id: Uuid,
    pub request: OutboundRequest,
}

impl OutboundEvent {
    pub fn kind(&self) -> RequestKind {
        self.request.kind()
    }

    /// Wire envelope.
    pub fn to_json(&self) -> Value {
        let mut envelope = json!({
            "event": self.kind().outbound_event(),
            "request_id": self.request_id,
        });
        let detail = self.request.detail();
        if !detail.is_null() {
            envelope["detail"] = detail;
        }
        envelope
    }
}

/// Account details reported by the agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletInfo {
    pub address: String,
    #[serde(default)]
    pub locked: bool,
}

/// Reply to a sign request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SignResponse {
    Signed { signature: String },
    Failed { error: String },
}

/// Reply to a send-transaction request.
///
/// An `errors` list takes precedence over a `txid`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TxStatus {
    Rejected { errors: Vec<String> },
    Accepted { txid: String },
}

/// Typed reply handed to the pending caller.
#[derive(Debug, Clone, PartialEq)]
pub enum ReplyPayload {
    WalletInfo(WalletInfo),
    Signature(SignResponse),
    TxStatus(TxStatus),
}

/// An inbound event from the agent.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    /// A reply, optionally echoing the request id it answers.
    Reply {
        request_id: Option<Uuid>,
        payload: ReplyPayload,
    },
    /// The agent is unlocked and available.
    AgentReady,
}

impl InboundEvent {
    /// Reply without a request id; correlated by arrival order.
    pub fn reply(payload: ReplyPayload) -> Self {
        InboundEvent::Reply {
            request_id: None,
            payload,
        }
    }

    /// Reply echoing `request_id`.
    pub fn reply_to(request_id: Uuid, payload: ReplyPayload) -> Self {
        InboundEvent::Reply {
            request_id: Some(request_id),
            payload,
        }
    }

    /// Validate a wire envelope.
    pub fn from_json(envelope: &Value) -> BridgeResult<Self> {
        let event = envelope
            .get("event")
            .and_then(Value::as_str)
            .ok_or_else(|| BridgeError::MalformedEvent("missing event name".to_string()))?;

        if event == "agent-ready" {
            return Ok(InboundEvent::AgentReady);
        }

        let request_id = match envelope.get("request_id") {
            None | Some(Value::Null) => None,
            Some(raw) => Some(
                serde_json::from_value::<Uuid>(raw.clone())
                    .map_err(|e| BridgeError::MalformedEvent(format!("bad request_id: {}", e)))?,
            ),
        };
        let detail = envelope.get("detail").cloned().unwrap_or(Value::Null);
        let malformed =
            |e: serde_json::Error| BridgeError::MalformedEvent(format!("{}: {}", event, e));

        let payload = match event {
            "wallet-info" => {
                ReplyPayload::WalletInfo(serde_json::from_value(detail).map_err(malformed)?)
            }
            "sign-message-response" => {
                ReplyPayload::Signature(serde_json::from_value(detail).map_err(malformed)?)
            }
            "tx-status" => {
                ReplyPayload::TxStatus(serde_json::from_value(detail).map_err(malformed)?)
            }
            other => {
                return Err(BridgeError::MalformedEvent(format!("unknown event '{}'", other)));
            }
        };

        Ok(InboundEvent::Reply { request_id, payload })
    }
}

impl ReplyPayload {
    pub fn kind(&self) -> RequestKind {
        match self {
            ReplyPayload::WalletInfo(_) => RequestKind::WalletInfo,
            ReplyPayload::Signature(_) => RequestKind::SignMessage,
            ReplyPayload::TxStatus(_) => RequestKind::Transaction,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transaction_envelope() {
        let intent = TransactionIntent::new(
            "con_xipoll_v0",
            "vote",
            json!({ "poll_id": 3, "option_id": 1 }),
        )
        .with_value(1_000_000u64);
        let event = OutboundEvent {
            request_id: Uuid::nil(),
            request: OutboundRequest::SendTransaction(intent),
        };

        let wire = event.to_json();
        assert_eq!(wire["event"], "send-transaction");
        assert_eq!(wire["detail"]["contract"], "con_xipoll_v0");
        assert_eq!(wire["detail"]["kwargs"]["poll_id"], 3);
        assert_eq!(wire["detail"]["value"], "1000000");
    }

    #[test]
    fn test_info_request_has_no_detail() {
        let event = OutboundEvent {
            request_id: Uuid::new_v4(),
            request: OutboundRequest::GetWalletInfo,
        };
        let wire = event.to_json();
        assert_eq!(wire["event"], "get-wallet-info");
        assert!(wire.get("detail").is_none());
    }

    #[test]
    fn test_tx_status_errors_take_precedence() {
        let status: TxStatus =
            serde_json::from_value(json!({ "txid": "abc", "errors": ["insufficient balance"] }))
                .unwrap();
        assert_eq!(
            status,
            TxStatus::Rejected {
                errors: vec!["insufficient balance".to_string()]
            }
        );
    }

    #[test]
    fn test_parse_inbound_envelopes() {
        let ready = InboundEvent::from_json(&json!({ "event": "agent-ready" })).unwrap();
        assert_eq!(ready, InboundEvent::AgentReady);

        let id = Uuid::new_v4();
        let info = InboundEvent::from_json(&json!({
            "event": "wallet-info",
            "request_id": id,
            "detail": { "address": "ab12", "locked": true }
        }))
        .unwrap();
        assert_eq!(
            info,
            InboundEvent::reply_to(
                id,
                ReplyPayload::WalletInfo(WalletInfo {
                    address: "ab12".to_string(),
                    locked: true
                })
            )
        );
    }

    #[test]
    fn test_malformed_inbound_rejected() {
        assert!(InboundEvent::from_json(&json!({ "detail": {} })).is_err());
        let bad_status = json!({ "event": "tx-status", "detail": { "nope": 1 } });
        assert!(InboundEvent::from_json(&bad_status).is_err());
        assert!(InboundEvent::from_json(&json!({ "event": "mystery" })).is_err());
    }

    #[test]
    fn test_error_display() {
        let err = BridgeError::WalletNotResponding {
            kind: RequestKind::WalletInfo,
            after: Duration::from_secs(2),
        };
        assert_eq!(err.to_string(), "Wallet not responding to get-wallet-info after 2000ms");
    }
}

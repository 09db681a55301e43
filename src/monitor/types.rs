//! Monitor event types.

use std::time::Duration;

use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

/// Errors that end a single websocket session.
///
/// None of these reach the consumer; the stream loop logs them and reconnects.
#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("Invalid websocket URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("WebSocket connect failed: {0}")]
    Connect(String),

    #[error("Subscribe failed: {0}")]
    Subscribe(String),

    #[error("WebSocket receive failed: {0}")]
    Receive(String),

    #[error("Connection closed by peer")]
    Closed,
}

/// Transaction to the monitored contract, decoded from the stream.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChainEvent {
    pub tx_hash: Option<String>,
    pub contract: String,
    pub function: String,
    pub kwargs: Map<String, Value>,
    pub sender: Option<String>,
}

/// Structured form of a designated-method call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaintEvent {
    pub x: f64,
    pub y: f64,
    pub color: String,
    pub sender: Option<String>,
    pub tx_hash: Option<String>,
}

/// Connection state transitions, forwarded only when status reporting is on.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StreamStatus {
    Subscribed,
    ConnectionLost { reason: String },
    Reconnecting {
        #[serde(with = "millis")]
        delay: Duration,
    },
    Stopped,
}

/// Everything the monitor forwards to its consumer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "event", rename_all = "snake_case")]
pub enum MonitorEvent {
    Paint(PaintEvent),
    ContractTx(ChainEvent),
    Status(StreamStatus),
}

impl MonitorEvent {
    pub fn label(&self) -> &'static str {
        match self {
            MonitorEvent::Paint(_) => "paint",
            MonitorEvent::ContractTx(_) => "contract_tx",
            MonitorEvent::Status(_) => "status",
        }
    }
}

mod millis {
    use std::time::Duration;

    use serde::Serializer;

    pub fn serialize<S: Serializer>(delay: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(delay.as_millis() as u64)
    }
}

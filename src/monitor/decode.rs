//! Stream message decoding.
//!
//! # Data Flow
//! ```text
//! text frame
//!     → JSON envelope (tx hash + raw tx)
//!     → DedupSet (first sighting only)
//!     → base64 → hex digit text → bytes → UTF-8 → JSON payload
//!     → ContractFilter (monitored contract, designated method)
//!     → MonitorEvent
//! ```
//!
//! Every failure here drops the message; nothing propagates to the stream loop.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::monitor::dedup::DedupSet;
use crate::monitor::types::{ChainEvent, MonitorEvent, PaintEvent};

/// Why a raw transaction could not be decoded.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("invalid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("invalid hex: {0}")]
    Hex(#[from] hex::FromHexError),

    #[error("invalid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Hash and raw base64 transaction carried by one stream message.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TxData {
    pub tx_hash: Option<String>,
    pub tx: Option<String>,
}

/// Pull the tx hash and raw tx out of a subscription message.
pub fn extract_tx_data(message: &Value) -> TxData {
    let Some(result) = message.get("result") else {
        return TxData::default();
    };

    let tx_hash = result
        .get("events")
        .and_then(|events| events.get("tx.hash"))
        .and_then(Value::as_array)
        .and_then(|hashes| hashes.first())
        .and_then(Value::as_str)
        .map(str::to_string);

    let tx = result
        .pointer("/data/value/TxResult/tx")
        .or_else(|| result.pointer("/data/value/tx"))
        .and_then(Value::as_str)
        .map(str::to_string);

    TxData { tx_hash, tx }
}

/// Decode a streamed transaction: base64 of the hex rendering of JSON bytes.
pub fn decode_tx_payload(tx_b64: &str) -> Result<Value, DecodeError> {
    let hex_text = String::from_utf8(STANDARD.decode(tx_b64.trim())?)?;
    let bytes = hex::decode(hex_text.trim())?;
    let json = String::from_utf8(bytes)?;
    Ok(serde_json::from_str(&json)?)
}

/// Which transactions the monitor forwards, and which method becomes a paint event.
#[derive(Debug, Clone)]
pub struct ContractFilter {
    pub contract: String,
    pub designated_method: String,
}

impl ContractFilter {
    pub fn new(contract: impl Into<String>, designated_method: impl Into<String>) -> Self {
        Self {
            contract: contract.into(),
            designated_method: designated_method.into(),
        }
    }
}

/// Turn one text frame into at most one event.
pub fn process_message(
    text: &str,
    filter: &ContractFilter,
    seen: &mut DedupSet,
) -> Option<MonitorEvent> {
    let message: Value = serde_json::from_str(text).ok()?;
    let TxData { tx_hash, tx } = extract_tx_data(&message);
    let tx = tx?;

    if let Some(hash) = &tx_hash {
        if !seen.insert(hash) {
            tracing::trace!(tx_hash = %hash, "Duplicate transaction skipped");
            return None;
        }
    }

    let decoded = match decode_tx_payload(&tx) {
        Ok(decoded) => decoded,
        Err(e) => {
            tracing::warn!(tx_hash = ?tx_hash, error = %e, "Transaction decode failed");
            return None;
        }
    };

    let payload = decoded.get("payload")?;
    let contract = payload.get("contract").and_then(Value::as_str)?;
    if contract != filter.contract {
        return None;
    }

    let function = payload
        .get("function")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let kwargs = payload
        .get("kwargs")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();
    let sender = payload.get("sender").and_then(Value::as_str).map(str::to_string);

    if function == filter.designated_method {
        return paint_event(&kwargs, sender, tx_hash).map(MonitorEvent::Paint);
    }

    Some(MonitorEvent::ContractTx(ChainEvent {
        tx_hash,
        contract: contract.to_string(),
        function,
        kwargs,
        sender,
    }))
}

fn paint_event(
    kwargs: &Map<String, Value>,
    sender: Option<String>,
    tx_hash: Option<String>,
) -> Option<PaintEvent> {
    let x = kwargs.get("x").and_then(coerce_number).filter(|x| x.is_finite());
    let y = kwargs.get("y").and_then(coerce_number).filter(|y| y.is_finite());
    let (Some(x), Some(y)) = (x, y) else {
        tracing::debug!(tx_hash = ?tx_hash, "Paint event without finite coordinates skipped");
        return None;
    };

    let color = kwargs.get("color").map(coerce_color).unwrap_or_default();

    Some(PaintEvent {
        x,
        y,
        color,
        sender,
        tx_hash,
    })
}

/// Text form of a color argument. Falsy values (zero, `false`, null, blank) become empty.
fn coerce_color(value: &Value) -> String {
    match value {
        Value::String(s) => s.to_lowercase(),
        Value::Number(n) => match n.as_f64() {
            Some(f) if f == 0.0 => String::new(),
            Some(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", f as i64),
            _ => n.to_string(),
        },
        Value::Bool(true) => "true".to_string(),
        _ => String::new(),
    }
}

/// Loose numeric coercion: numbers as-is, numeric strings parsed, blank and null as zero.
fn coerce_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) if s.trim().is_empty() => Some(0.0),
        Value::String(s) => s.trim().parse().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::Null => Some(0.0),
        _ => None,
    }
}

//! Payload codecs for RPC responses.
//!
//! Every decoder here is total: malformed input yields `None` and a debug log,
//! never an error, so callers keep their flow.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde_json::Value;

/// Value the node returns for an absent (or zero) state key.
pub const ABSENT_STATE_SENTINEL: &str = "AA==";

/// Decode `result.tx_result.data` of a `/tx` response (base64 → JSON).
pub fn decode_tx_result_data(tx: &Value) -> Option<Value> {
    let data = tx
        .pointer("/result/tx_result/data")
        .and_then(Value::as_str)?;

    let bytes = match STANDARD.decode(data.trim()) {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::debug!(error = %e, "Transaction result is not base64");
            return None;
        }
    };
    match serde_json::from_slice(&bytes) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::debug!(error = %e, "Transaction result is not JSON");
            None
        }
    }
}

/// Decode an `abci_query` value.
///
/// `None` for a missing value or the absent sentinel. Text that is not JSON is
/// returned as a JSON string.
pub fn decode_state_value(raw: Option<&str>) -> Option<Value> {
    let raw = raw.map(str::trim).filter(|raw| !raw.is_empty())?;
    if raw == ABSENT_STATE_SENTINEL {
        return None;
    }

    let bytes = match STANDARD.decode(raw) {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::debug!(error = %e, "State value is not base64");
            return None;
        }
    };
    let text = match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(e) => {
            tracing::debug!(error = %e, "State value is not UTF-8");
            return None;
        }
    };
    Some(serde_json::from_str(&text).unwrap_or(Value::String(text)))
}

/// Whether an observed state value satisfies `expected`.
///
/// Absent matches `null` and `0`. Otherwise values match when equal as JSON
/// or when their plain-text renderings are equal (`5` matches `"5"`).
pub fn state_matches(observed: Option<&Value>, expected: &Value) -> bool {
    let Some(observed) = observed else {
        return match expected {
            Value::Null => true,
            Value::Number(n) => n.as_f64() == Some(0.0),
            _ => false,
        };
    };
    observed == expected || plain_text(observed) == plain_text(expected)
}

fn plain_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

//! Metrics collection and exposition.
//!
//! # Metrics
//! - `bridge_requests_total` (counter): wallet round trips by kind
//! - `bridge_timeouts_total` (counter): wallet round trips that timed out
//! - `tx_outcomes_total` (counter): submissions by outcome
//! - `state_confirmations_total` (counter): confirmation polls by status
//! - `monitor_events_total` (counter): forwarded stream events by kind
//! - `monitor_reconnects_total` (counter): stream reconnect attempts
//! - `reconcile_cycles_total` (counter): reconciliation cycles by result
//! - `reconcile_polls` (gauge): polls in the latest snapshot

use std::net::SocketAddr;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Start the Prometheus exporter on `addr`.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => {
            tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter")
        }
    }
}

pub fn record_bridge_request(kind: &'static str) {
    ::metrics::counter!("bridge_requests_total", "kind" => kind).increment(1);
}

pub fn record_bridge_timeout(kind: &'static str) {
    ::metrics::counter!("bridge_timeouts_total", "kind" => kind).increment(1);
}

pub fn record_tx_outcome(outcome: &'static str) {
    ::metrics::counter!("tx_outcomes_total", "outcome" => outcome).increment(1);
}

pub fn record_confirmation(status: &'static str) {
    ::metrics::counter!("state_confirmations_total", "status" => status).increment(1);
}

pub fn record_monitor_event(kind: &'static str) {
    ::metrics::counter!("monitor_events_total", "kind" => kind).increment(1);
}

pub fn record_monitor_reconnect() {
    ::metrics::counter!("monitor_reconnects_total").increment(1);
}

pub fn record_reconcile_cycle(success: bool, polls: usize) {
    let result = if success { "ok" } else { "error" };
    ::metrics::counter!("reconcile_cycles_total", "result" => result).increment(1);
    if success {
        ::metrics::gauge!("reconcile_polls").set(polls as f64);
    }
}

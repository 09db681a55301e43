//! WebSocket subscription loop.
//!
//! # Responsibilities
//! - Connect, subscribe to `tm.event='Tx'`, decode every text frame
//! - Forward decoded events to the consumer channel
//! - Reconnect with growing backoff until stopped
//!
//! # Design Decisions
//! - One task owns the socket and the dedup set for its whole life
//! - The backoff resets only after a connection has delivered a frame
//! - Stopping is the only way out; a dropped consumer counts as a stop

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::config::MonitorConfig;
use crate::monitor::decode::{process_message, ContractFilter};
use crate::monitor::dedup::DedupSet;
use crate::monitor::types::{MonitorError, MonitorEvent, StreamStatus};
use crate::observability::metrics;
use crate::resilience::Backoff;

/// JSON-RPC subscription sent on every (re)connect.
pub const SUBSCRIBE_MESSAGE: &str =
    r#"{"jsonrpc":"2.0","method":"subscribe","id":1,"params":{"query":"tm.event='Tx'"}}"#;

/// How one websocket session ended.
enum SessionEnd {
    Stopped,
    Lost { delivered: bool, error: MonitorError },
}

/// Handle to a running monitor task.
pub struct MonitorHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl MonitorHandle {
    /// Close the socket, halt reconnection and wait for the task to finish.
    pub async fn stop(self) {
        self.cancel.cancel();
        if let Err(e) = self.task.await {
            tracing::error!(error = %e, "Monitor task panicked");
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

/// Realtime transaction monitor for one contract.
pub struct RealtimeMonitor {
    config: MonitorConfig,
    filter: ContractFilter,
    seen: DedupSet,
    backoff: Backoff,
    events: mpsc::UnboundedSender<MonitorEvent>,
}

impl RealtimeMonitor {
    pub fn new(config: MonitorConfig, events: mpsc::UnboundedSender<MonitorEvent>) -> Self {
        Self {
            filter: ContractFilter::new(config.contract.clone(), config.designated_method.clone()),
            seen: DedupSet::new(config.dedup_capacity),
            backoff: config.reconnect_backoff(),
            config,
            events,
        }
    }

    /// Start the monitor on its own task.
    pub fn spawn(
        config: MonitorConfig,
        events: mpsc::UnboundedSender<MonitorEvent>,
    ) -> MonitorHandle {
        let cancel = CancellationToken::new();
        let task = tokio::spawn(Self::new(config, events).run(cancel.clone()));
        MonitorHandle { cancel, task }
    }

    /// Run until `cancel` fires or the consumer goes away.
    pub async fn run(mut self, cancel: CancellationToken) {
        if let Err(e) = Url::parse(&self.config.ws_url) {
            let error = MonitorError::InvalidUrl {
                url: self.config.ws_url.clone(),
                reason: e.to_string(),
            };
            tracing::error!(error = %error, "Monitor not started");
            self.emit_status(StreamStatus::Stopped);
            return;
        }

        tracing::info!(
            ws_url = %self.config.ws_url,
            contract = %self.filter.contract,
            "Starting realtime monitor"
        );

        let mut failures = 0u32;
        loop {
            let (delivered, error) = match self.session(&cancel).await {
                SessionEnd::Stopped => break,
                SessionEnd::Lost { delivered, error } => (delivered, error),
            };
            if delivered {
                failures = 0;
            }

            let delay = self.backoff.delay(failures);
            failures = failures.saturating_add(1);

            tracing::warn!(
                error = %error,
                delay_ms = delay.as_millis() as u64,
                "Monitor connection lost, reconnecting"
            );
            self.emit_status(StreamStatus::ConnectionLost {
                reason: error.to_string(),
            });
            self.emit_status(StreamStatus::Reconnecting { delay });
            metrics::record_monitor_reconnect();

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }

        tracing::info!(seen = self.seen.len(), "Realtime monitor stopped");
        self.emit_status(StreamStatus::Stopped);
    }

    async fn session(&mut self, cancel: &CancellationToken) -> SessionEnd {
        let connected = tokio::select! {
            _ = cancel.cancelled() => return SessionEnd::Stopped,
            connected = connect_async(self.config.ws_url.as_str()) => connected,
        };
        let mut ws = match connected {
            Ok((ws, _)) => ws,
            Err(e) => {
                return SessionEnd::Lost {
                    delivered: false,
                    error: MonitorError::Connect(e.to_string()),
                }
            }
        };

        if let Err(e) = ws.send(Message::Text(SUBSCRIBE_MESSAGE.into())).await {
            return SessionEnd::Lost {
                delivered: false,
                error: MonitorError::Subscribe(e.to_string()),
            };
        }
        tracing::info!(ws_url = %self.config.ws_url, "Subscribed to Tx events");
        self.emit_status(StreamStatus::Subscribed);

        let mut delivered = false;
        loop {
            let frame = tokio::select! {
                _ = cancel.cancelled() => {
                    if let Err(e) = ws.close(None).await {
                        tracing::debug!(error = %e, "WebSocket close failed");
                    }
                    return SessionEnd::Stopped;
                }
                frame = ws.next() => frame,
            };

            let text = match frame {
                Some(Ok(Message::Text(text))) => text.as_str().to_string(),
                Some(Ok(Message::Binary(data))) => match String::from_utf8(data.to_vec()) {
                    Ok(text) => text,
                    Err(_) => {
                        delivered = true;
                        continue;
                    }
                },
                Some(Ok(Message::Close(_))) | None => {
                    return SessionEnd::Lost {
                        delivered,
                        error: MonitorError::Closed,
                    }
                }
                Some(Ok(_)) => continue,
                Some(Err(e)) => {
                    return SessionEnd::Lost {
                        delivered,
                        error: MonitorError::Receive(e.to_string()),
                    }
                }
            };
            delivered = true;

            if let Some(event) = process_message(&text, &self.filter, &mut self.seen) {
                if !self.forward(event) {
                    tracing::info!("Monitor consumer dropped, stopping");
                    let _ = ws.close(None).await;
                    return SessionEnd::Stopped;
                }
            }
        }
    }

    fn forward(&self, event: MonitorEvent) -> bool {
        metrics::record_monitor_event(event.label());
        self.events.send(event).is_ok()
    }

    fn emit_status(&self, status: StreamStatus) {
        if self.config.report_status {
            let _ = self.events.send(MonitorEvent::Status(status));
        }
    }
}

impl std::fmt::Debug for RealtimeMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RealtimeMonitor")
            .field("ws_url", &self.config.ws_url)
            .field("filter", &self.filter)
            .field("seen", &self.seen)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_subscribe_message_shape() {
        let value: serde_json::Value = serde_json::from_str(SUBSCRIBE_MESSAGE).unwrap();
        assert_eq!(value["method"], "subscribe");
        assert_eq!(value["params"]["query"], "tm.event='Tx'");
    }

    #[test]
    fn test_default_reconnect_schedule() {
        let backoff = MonitorConfig::default().reconnect_backoff();
        let delays: Vec<u128> = (0..9).map(|n| backoff.delay(n).as_millis()).collect();
        assert_eq!(delays, vec![1000, 1500, 2250, 3375, 5063, 7594, 11391, 15000, 15000]);
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_reports_and_stops() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let config = MonitorConfig {
            ws_url: format!("ws://{}", addr),
            report_status: true,
            ..MonitorConfig::default()
        };
        let (tx, mut rx) = mpsc::unbounded_channel();
        let handle = RealtimeMonitor::spawn(config, tx);

        let first = tokio::time::timeout(Duration::from_secs(5), rx.recv()).await.unwrap();
        assert!(matches!(first, Some(MonitorEvent::Status(StreamStatus::ConnectionLost { .. }))));
        let second = rx.recv().await;
        assert_eq!(
            second,
            Some(MonitorEvent::Status(StreamStatus::Reconnecting {
                delay: Duration::from_millis(1000)
            }))
        );

        handle.stop().await;
        assert_eq!(rx.recv().await, Some(MonitorEvent::Status(StreamStatus::Stopped)));
    }

    #[tokio::test]
    async fn test_invalid_url_stops_immediately() {
        let config = MonitorConfig {
            ws_url: "not a url".to_string(),
            report_status: true,
            ..MonitorConfig::default()
        };
        let (tx, mut rx) = mpsc::unbounded_channel();
        let handle = RealtimeMonitor::spawn(config, tx);

        assert_eq!(rx.recv().await, Some(MonitorEvent::Status(StreamStatus::Stopped)));
        handle.stop().await;
    }
}

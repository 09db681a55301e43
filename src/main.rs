//! xipoll-bridge service.
//!
//! Keeps a reconciled poll snapshot fresh and follows the realtime
//! transaction stream until interrupted.
//!
//! ```text
//! config.toml ──▶ ClientConfig
//!                    │
//!        ┌───────────┴────────────┐
//!        ▼                        ▼
//!  StateReconciler          RealtimeMonitor
//!  (GraphQL, interval)      (websocket, reconnect)
//!        │                        │
//!        └──── snapshot / events ─┴──▶ structured logs
//! ```
//!
//! Usage: `xipoll-bridge [config.toml]`

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::mpsc;

use xipoll_bridge::chain::RpcClient;
use xipoll_bridge::config::load_or_default;
use xipoll_bridge::lifecycle::{signals::shutdown_on_ctrl_c, Shutdown};
use xipoll_bridge::monitor::{MonitorEvent, RealtimeMonitor};
use xipoll_bridge::observability::{logging::init_logging, metrics::init_metrics};
use xipoll_bridge::state::{GraphQlClient, StateReconciler};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = load_or_default(config_path.as_deref())?;

    init_logging(&config.observability.log_level);
    tracing::info!("xipoll-bridge v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        rpc_url = %config.rpc.url,
        graphql_url = %config.graphql.url,
        ws_url = %config.monitor.ws_url,
        contract = %config.reconciler.contract,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        if let Ok(addr) = config.observability.metrics_address.parse() {
            init_metrics(addr);
        } else {
            tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            );
        }
    }

    let shutdown = Shutdown::new();
    tokio::spawn(shutdown_on_ctrl_c(shutdown.clone()));

    let rpc = RpcClient::new(&config.rpc)?;
    match rpc.latest_block_height().await {
        Ok(height) => tracing::info!(height = height, "RPC node reachable"),
        Err(e) => tracing::warn!(error = %e, "RPC node unreachable, continuing"),
    }

    let reconciler = Arc::new(StateReconciler::new(
        Arc::new(GraphQlClient::new(&config.graphql)),
        &config.reconciler,
    ));
    let reconciler_task = reconciler.spawn(shutdown.token());
    let mut snapshots = reconciler.subscribe();

    let (events_tx, mut events) = mpsc::unbounded_channel();
    let monitor = if config.monitor.enabled {
        Some(RealtimeMonitor::spawn(config.monitor.clone(), events_tx))
    } else {
        tracing::info!("Realtime monitor disabled");
        drop(events_tx);
        None
    };

    loop {
        tokio::select! {
            _ = shutdown.triggered() => break,
            changed = snapshots.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = snapshots.borrow_and_update().clone();
                let active = snapshot.polls.iter().filter(|poll| poll.is_active).count();
                tracing::info!(
                    polls = snapshot.polls.len(),
                    active = active,
                    poll_counter = snapshot.poll_counter,
                    "Snapshot updated"
                );
            }
            Some(event) = events.recv() => match event {
                MonitorEvent::Paint(paint) => {
                    tracing::info!(
                        x = paint.x,
                        y = paint.y,
                        color = %paint.color,
                        sender = ?paint.sender,
                        tx_hash = ?paint.tx_hash,
                        "Paint event"
                    );
                }
                MonitorEvent::ContractTx(tx) => {
                    tracing::info!(
                        function = %tx.function,
                        sender = ?tx.sender,
                        tx_hash = ?tx.tx_hash,
                        "Contract transaction"
                    );
                    reconciler.refresh_signal().notify_one();
                }
                MonitorEvent::Status(status) => tracing::info!(status = ?status, "Monitor status"),
            },
        }
    }

    tracing::info!("Shutting down");
    shutdown.trigger();
    if let Some(monitor) = monitor {
        monitor.stop().await;
    }
    if let Err(e) = reconciler_task.await {
        tracing::error!(error = %e, "Reconciler task panicked");
    }

    tracing::info!("Shutdown complete");
    Ok(())
}

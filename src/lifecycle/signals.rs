//! OS signal handling.

use crate::lifecycle::shutdown::Shutdown;

/// Wait for ctrl-c, then trigger `shutdown`.
pub async fn shutdown_on_ctrl_c(shutdown: Shutdown) {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Interrupt received, shutting down"),
        Err(e) => tracing::error!(error = %e, "Failed to listen for interrupt, shutting down"),
    }
    shutdown.trigger();
}

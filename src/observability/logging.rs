//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the `tracing` subscriber for the binaries
//! - Honour `RUST_LOG` first, then the configured level

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Install the global subscriber.
///
/// `default_level` applies to this crate when `RUST_LOG` is unset. Output goes to
/// stderr so stdout stays free for command output.
pub fn init_logging(default_level: &str) {
    let fallback = format!("xipoll_bridge={level},xipoll_cli={level},warn", level = default_level);

    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| fallback.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();
}

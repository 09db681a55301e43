//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events via `tracing`)
//!     → metrics.rs (counters and gauges via `metrics`)
//!
//! Consumers:
//!     → Log aggregation (stderr)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Structured fields (`tx_hash = %hash`) rather than interpolated messages
//! - Metrics are cheap: recorded unconditionally, exported only when enabled

pub mod logging;
pub mod metrics;

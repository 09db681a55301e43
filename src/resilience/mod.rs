//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Call to wallet / RPC / stream:
//!     → backoff.rs (delay schedule: initial × multiplier^n, optionally capped)
//!     → retries.rs (iterative retry loop, cancellable between attempts)
//! ```
//!
//! # Design Decisions
//! - Schedules are deterministic (no jitter): callers and tests rely on exact delays
//! - Retry loops are iterative and carry a cancellation token
//! - Exhaustion is reported as a value, callers decide whether it is fatal

pub mod backoff;
pub mod retries;

pub use backoff::Backoff;
pub use retries::{retry_with_backoff, RetryError};

//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (binary):
//!     Load config → Validate → Build clients → Spawn reconciler + monitor
//!
//! Shutdown (shutdown.rs):
//!     Signal received → cancel token → monitor closes socket → tasks exit
//!
//! Signals (signals.rs):
//!     SIGINT (ctrl-c) → trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - One root cancellation token; every long-running task gets a child
//! - Stopping is cooperative: tasks observe the token at their await points

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;

//! State reconciliation subsystem.
//!
//! # Data Flow
//! ```text
//! GraphQL indexer
//!     → graphql.rs (paged prefix scans, point lookups)
//!     → projection.rs (route by key family, normalize, attach user vote)
//!     → reconciler.rs (ArcSwap snapshot, watch notifications)
//!     → overlay.rs (optimistic local votes until the next cycle)
//!     → query.rs (sort, search, filter for the poll list)
//! ```
//!
//! `actions.rs` sits on the write side: it submits `create_poll` and `vote`
//! transactions and feeds their effects back into the reconciler.

pub mod actions;
pub mod graphql;
pub mod overlay;
pub mod projection;
pub mod query;
pub mod reconciler;
pub mod types;

pub use actions::{ActionError, ActionReport, ActionResult, NewPoll, PollActions};
pub use graphql::{GraphQlClient, StateSource};
pub use overlay::OptimisticOverlay;
pub use query::{search, sort_polls, vote_percentage, voted_only, SortOrder};
pub use reconciler::StateReconciler;
pub use types::{
    Poll, PollOption, PollSnapshot, RawState, StateEntry, StateError, StateResult,
};

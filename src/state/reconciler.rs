//! Periodic reconciliation of the poll view.
//!
//! # Responsibilities
//! - Bulk-read counter, polls and votes on an interval, on demand and on resync
//! - Replace the snapshot wholesale and notify subscribers
//! - Discard optimistic local votes once real state has been read
//!
//! # Design Decisions
//! - The snapshot lives in an `ArcSwap`; readers never block the refresh
//! - A failed cycle keeps the previous snapshot
//! - Resync requests share the interval timer's loop, so cycles never overlap

use std::sync::Arc;
use std::time::Duration;

use arc_swap::{ArcSwap, ArcSwapOption};
use chrono::Utc;
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::ReconcilerConfig;
use crate::observability::metrics;
use crate::state::graphql::StateSource;
use crate::state::overlay::OptimisticOverlay;
use crate::state::projection::{parse_state_value, project, route_entries, vote_choice};
use crate::state::types::{Poll, PollSnapshot, StateResult};

/// Owner of the last-known poll snapshot.
pub struct StateReconciler {
    source: Arc<dyn StateSource>,
    contract: String,
    interval: Duration,
    user: ArcSwapOption<String>,
    snapshot: ArcSwap<PollSnapshot>,
    overlay: OptimisticOverlay,
    refresh: Arc<Notify>,
    updates: watch::Sender<Arc<PollSnapshot>>,
}

impl StateReconciler {
    pub fn new(source: Arc<dyn StateSource>, config: &ReconcilerConfig) -> Self {
        let empty = Arc::new(PollSnapshot::empty());
        let (updates, _) = watch::channel(empty.clone());
        Self {
            source,
            contract: config.contract.clone(),
            interval: config.interval(),
            user: ArcSwapOption::new(config.user.clone().map(Arc::new)),
            snapshot: ArcSwap::new(empty),
            overlay: OptimisticOverlay::new(config.overlay_capacity, config.overlay_ttl()),
            refresh: Arc::new(Notify::new()),
            updates,
        }
    }

    /// Address whose votes are projected. Takes effect on the next cycle.
    pub fn set_user(&self, user: Option<String>) {
        self.user.store(user.map(Arc::new));
    }

    pub fn user(&self) -> Option<String> {
        self.user.load_full().map(|user| user.as_ref().clone())
    }

    /// Last reconciled snapshot, without local votes.
    pub fn snapshot(&self) -> Arc<PollSnapshot> {
        self.snapshot.load_full()
    }

    /// Polls as the UI should show them: snapshot plus live local votes.
    pub fn view(&self) -> Vec<Poll> {
        let mut polls = self.snapshot.load().polls.clone();
        self.overlay.apply(&mut polls);
        polls
    }

    /// Signal that requests an immediate refresh from the running loop.
    pub fn refresh_signal(&self) -> Arc<Notify> {
        self.refresh.clone()
    }

    /// Receive every new snapshot.
    pub fn subscribe(&self) -> watch::Receiver<Arc<PollSnapshot>> {
        self.updates.subscribe()
    }

    /// Show `option_id` as the user's choice on `poll_id` until the next cycle.
    pub fn record_local_vote(&self, poll_id: u64, option_id: u64) {
        tracing::debug!(poll_id = poll_id, option_id = option_id, "Recording optimistic vote");
        self.overlay.record(poll_id, option_id);
    }

    /// Point lookup of `user`'s recorded choice on `poll_id`.
    pub async fn user_vote(&self, user: &str, poll_id: u64) -> StateResult<Option<u64>> {
        let key = format!("{}.user_votes:{}:{}", self.contract, user, poll_id);
        let value = self.source.get_state(&key).await?;
        Ok(value.as_ref().and_then(parse_state_value).as_ref().and_then(vote_choice))
    }

    /// Run one reconciliation cycle now.
    pub async fn refresh(&self) -> StateResult<Arc<PollSnapshot>> {
        match self.fetch().await {
            Ok(snapshot) => {
                let snapshot = Arc::new(snapshot);
                self.snapshot.store(snapshot.clone());
                self.overlay.clear();
                self.updates.send_replace(snapshot.clone());

                metrics::record_reconcile_cycle(true, snapshot.polls.len());
                tracing::info!(
                    contract = %self.contract,
                    polls = snapshot.polls.len(),
                    poll_counter = snapshot.poll_counter,
                    "State reconciled"
                );
                Ok(snapshot)
            }
            Err(e) => {
                metrics::record_reconcile_cycle(false, 0);
                tracing::warn!(
                    contract = %self.contract,
                    error = %e,
                    "Reconciliation failed, keeping last snapshot"
                );
                Err(e)
            }
        }
    }

    async fn fetch(&self) -> StateResult<PollSnapshot> {
        let counter_key = format!("{}.poll_counter", self.contract);
        let polls_prefix = format!("{}.polls:", self.contract);
        let votes_prefix = format!("{}.user_votes:", self.contract);

        let (counter, polls, votes) = tokio::try_join!(
            self.source.scan_prefix(&counter_key),
            self.source.scan_prefix(&polls_prefix),
            self.source.scan_prefix(&votes_prefix),
        )?;

        let mut entries = counter;
        entries.retain(|entry| entry.key == counter_key);
        entries.extend(polls);
        entries.extend(votes);

        let raw = route_entries(&self.contract, &entries);
        let user = self.user();
        Ok(PollSnapshot {
            polls: project(&raw, user.as_deref(), Utc::now()),
            poll_counter: raw.poll_counter,
            user,
            fetched_at: Utc::now(),
        })
    }

    /// Refresh on every interval tick or resync request until `cancel` fires.
    pub async fn run(self: Arc<Self>, cancel: CancellationToken) {
        tracing::info!(
            contract = %self.contract,
            interval_secs = self.interval.as_secs(),
            "Starting state reconciler"
        );

        loop {
            let _ = self.refresh().await;

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.interval) => {}
                _ = self.refresh.notified() => {
                    tracing::debug!("Resync requested");
                }
            }
        }

        tracing::info!("State reconciler stopped");
    }

    pub fn spawn(self: &Arc<Self>, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.clone().run(cancel))
    }
}

impl std::fmt::Debug for StateReconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateReconciler")
            .field("contract", &self.contract)
            .field("interval", &self.interval)
            .field("polls", &self.snapshot.load().polls.len())
            .field("overlay", &self.overlay)
            .finish()
    }
}

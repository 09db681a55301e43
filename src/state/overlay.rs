//! Optimistic vote overlay.
//!
//! Holds the option a user just picked until the next reconciliation replaces
//! it. Entries are bounded in number and expire after a TTL.

use std::num::NonZeroUsize;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use lru::LruCache;
use tokio::time::Instant;

use crate::state::types::Poll;

struct OverlayEntry {
    option_id: u64,
    recorded_at: Instant,
}

/// Poll id → locally chosen option, superseded by the next snapshot.
pub struct OptimisticOverlay {
    entries: Mutex<LruCache<u64, OverlayEntry>>,
    ttl: Duration,
}

impl OptimisticOverlay {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            ttl,
        }
    }

    /// Record a local choice for `poll_id`.
    pub fn record(&self, poll_id: u64, option_id: u64) {
        self.entries().put(
            poll_id,
            OverlayEntry {
                option_id,
                recorded_at: Instant::now(),
            },
        );
    }

    /// Unexpired local choice for `poll_id`.
    pub fn get(&self, poll_id: u64) -> Option<u64> {
        let mut entries = self.entries();
        let expired = match entries.peek(&poll_id) {
            Some(entry) if entry.recorded_at.elapsed() <= self.ttl => return Some(entry.option_id),
            Some(_) => true,
            None => false,
        };
        if expired {
            entries.pop(&poll_id);
        }
        None
    }

    /// Overwrite `user_choice` on every poll with a live local choice.
    pub fn apply(&self, polls: &mut [Poll]) {
        for poll in polls.iter_mut() {
            if let Some(option_id) = self.get(poll.id) {
                poll.user_choice = Some(option_id);
            }
        }
    }

    pub fn clear(&self) {
        self.entries().clear();
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn entries(&self) -> MutexGuard<'_, LruCache<u64, OverlayEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for OptimisticOverlay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OptimisticOverlay")
            .field("len", &self.len())
            .field("ttl", &self.ttl)
            .finish()
    }
}

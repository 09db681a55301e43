//! Readiness gate for the wallet agent.
//!
//! `Unknown → Ready` is one-way for the life of a session. `Unlocking` is a
//! transient flag raised while a first info request is in flight.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::timeout;

/// Observable readiness of the agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadinessState {
    Unknown,
    Unlocking,
    Ready,
}

/// How a [`ReadinessGate::wait_for_ready`] call finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadinessWait {
    /// Already ready, no wait.
    Immediate,
    /// The ready signal arrived while waiting.
    Signalled,
    /// The fallback timer fired first; the caller proceeds anyway.
    FallbackElapsed,
}

/// Tracks whether the external signing agent is available.
#[derive(Debug)]
pub struct ReadinessGate {
    ready: watch::Sender<bool>,
    unlocking: AtomicBool,
    fallback: Duration,
}

impl ReadinessGate {
    pub fn new(fallback: Duration) -> Self {
        let (ready, _) = watch::channel(false);
        Self {
            ready,
            unlocking: AtomicBool::new(false),
            fallback,
        }
    }

    pub fn state(&self) -> ReadinessState {
        if self.is_ready() {
            ReadinessState::Ready
        } else if self.is_unlocking() {
            ReadinessState::Unlocking
        } else {
            ReadinessState::Unknown
        }
    }

    pub fn is_ready(&self) -> bool {
        *self.ready.borrow()
    }

    pub fn is_unlocking(&self) -> bool {
        self.unlocking.load(Ordering::SeqCst)
    }

    /// Raise the unlocking flag. Returns `true` if this call raised it.
    pub fn begin_unlock(&self) -> bool {
        !self.unlocking.swap(true, Ordering::SeqCst)
    }

    pub fn end_unlock(&self) {
        self.unlocking.store(false, Ordering::SeqCst);
    }

    /// Record the agent's ready signal and release every waiter.
    pub fn mark_ready(&self) {
        self.unlocking.store(false, Ordering::SeqCst);
        let changed = self.ready.send_if_modified(|ready| {
            if *ready {
                false
            } else {
                *ready = true;
                true
            }
        });
        if changed {
            tracing::info!("Wallet agent ready");
        }
    }

    /// Resolve once the agent is ready, or after the fallback delay.
    pub async fn wait_for_ready(&self) -> ReadinessWait {
        if self.is_ready() {
            return ReadinessWait::Immediate;
        }

        let mut rx = self.ready.subscribe();
        let waited = timeout(self.fallback, rx.wait_for(|ready| *ready))
            .await
            .map(|signal| signal.map(|_| ()));
        match waited {
            Ok(Ok(())) => ReadinessWait::Signalled,
            Ok(Err(_)) | Err(_) => {
                tracing::debug!(
                    fallback_ms = self.fallback.as_millis() as u64,
                    "No ready signal from wallet agent, proceeding"
                );
                ReadinessWait::FallbackElapsed
            }
        }
    }
}

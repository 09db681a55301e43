//! Shutdown coordination.

use tokio_util::sync::CancellationToken;

/// Coordinator for graceful shutdown.
///
/// Hands out child tokens that all long-running tasks observe.
#[derive(Debug, Clone)]
pub struct Shutdown {
    root: CancellationToken,
}

impl Shutdown {
    /// Create a new shutdown coordinator.
    pub fn new() -> Self {
        Self {
            root: CancellationToken::new(),
        }
    }

    /// Token for a task; cancelled when shutdown triggers.
    pub fn token(&self) -> CancellationToken {
        self.root.child_token()
    }

    /// Trigger the shutdown signal.
    pub fn trigger(&self) {
        self.root.cancel();
    }

    /// Whether shutdown has been triggered.
    pub fn is_triggered(&self) -> bool {
        self.root.is_cancelled()
    }

    /// Wait until shutdown is triggered.
    pub async fn triggered(&self) {
        self.root.cancelled().await
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_trigger_cancels_children() {
        let shutdown = Shutdown::new();
        let token = shutdown.token();
        assert!(!token.is_cancelled());

        shutdown.trigger();
        token.cancelled().await;
        assert!(shutdown.is_triggered());
    }

    #[test]
    fn test_child_cancel_does_not_propagate_up() {
        let shutdown = Shutdown::new();
        shutdown.token().cancel();
        assert!(!shutdown.is_triggered());
    }
}

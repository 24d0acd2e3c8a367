//! Graceful shutdown coordination.
//!
//! A single `CancellationToken` fans out to the accept loop, the event
//! bridge, and any per-session tasks. `wait_for_signal` ties it to
//! Ctrl-C / SIGTERM for the binary.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Time allowed for in-flight tasks to drain before they are abandoned.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(15);

/// Coordinates shutdown across server tasks.
#[derive(Default)]
pub struct ShutdownCoordinator {
    token: CancellationToken,
}

impl ShutdownCoordinator {
    /// Create a new coordinator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A child token that trips when shutdown begins.
    #[must_use]
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Begin shutdown. Idempotent.
    pub fn trigger(&self) {
        self.token.cancel();
    }

    /// Whether shutdown has begun.
    #[must_use]
    pub fn is_shutting_down(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Trigger shutdown and wait for the given tasks to drain, bounded by
    /// [`DRAIN_TIMEOUT`].
    pub async fn drain(&self, handles: Vec<JoinHandle<()>>) {
        self.trigger();
        info!(task_count = handles.len(), "draining server tasks");
        let joined = futures::future::join_all(handles);
        if tokio::time::timeout(DRAIN_TIMEOUT, joined).await.is_err() {
            warn!("drain timed out after {DRAIN_TIMEOUT:?}; abandoning remaining tasks");
        }
    }
}

/// Resolve when the process receives Ctrl-C (or the token trips first).
pub async fn wait_for_signal(token: CancellationToken) {
    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(err) = result {
                warn!(error = %err, "failed to listen for ctrl-c");
            } else {
                info!("ctrl-c received, shutting down");
            }
        }
        () = token.cancelled() => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trigger_sets_flag() {
        let coord = ShutdownCoordinator::new();
        assert!(!coord.is_shutting_down());
        coord.trigger();
        coord.trigger();
        assert!(coord.is_shutting_down());
    }

    #[test]
    fn child_tokens_trip_together() {
        let coord = ShutdownCoordinator::new();
        let a = coord.token();
        let b = coord.token();
        coord.trigger();
        assert!(a.is_cancelled());
        assert!(b.is_cancelled());
    }

    #[tokio::test]
    async fn drain_waits_for_cooperative_tasks() {
        let coord = ShutdownCoordinator::new();
        let token = coord.token();
        let handle = tokio::spawn(async move {
            token.cancelled().await;
        });
        coord.drain(vec![handle]).await;
        assert!(coord.is_shutting_down());
    }

    #[tokio::test]
    async fn wait_for_signal_returns_on_token() {
        let coord = ShutdownCoordinator::new();
        let token = coord.token();
        let waiter = tokio::spawn(wait_for_signal(token));
        coord.trigger();
        waiter.await.unwrap();
    }
}

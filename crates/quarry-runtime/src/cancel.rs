//! Per-task cooperative cancellation.
//!
//! One [`CancellationToken`] per task id, created when the task is
//! accepted. [`CancelRegistry::request_cancel`] sets the signal exactly
//! once; later calls are no-ops. Tokens are never removed — the signal
//! lives as long as the task record, so a resumed body always observes a
//! prior cancellation at its first checkpoint.

use dashmap::DashMap;
use tokio_util::sync::CancellationToken;

use quarry_core::ids::TaskId;

/// Registry of per-task cancellation signals.
#[derive(Default)]
pub struct CancelRegistry {
    tokens: DashMap<TaskId, CancellationToken>,
}

impl CancelRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a fresh token for a newly accepted task.
    ///
    /// Registering the same id again returns the existing token.
    pub fn register(&self, id: &TaskId) -> CancellationToken {
        self.tokens
            .entry(id.clone())
            .or_insert_with(CancellationToken::new)
            .clone()
    }

    /// The token for a task, if one was registered.
    pub fn token(&self, id: &TaskId) -> Option<CancellationToken> {
        self.tokens.get(id).map(|t| t.clone())
    }

    /// Set the cancellation signal. Idempotent: returns `true` only on the
    /// first effective call.
    pub fn request_cancel(&self, id: &TaskId) -> bool {
        match self.tokens.get(id) {
            Some(token) if !token.is_cancelled() => {
                token.cancel();
                true
            }
            _ => false,
        }
    }

    /// Whether the signal is set for a task.
    pub fn is_cancelled(&self, id: &TaskId) -> bool {
        self.tokens
            .get(id)
            .is_some_and(|t| t.is_cancelled())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_then_cancel() {
        let reg = CancelRegistry::new();
        let id = TaskId::from("t-1");
        let token = reg.register(&id);
        assert!(!token.is_cancelled());

        assert!(reg.request_cancel(&id));
        assert!(token.is_cancelled());
        assert!(reg.is_cancelled(&id));
    }

    #[test]
    fn double_cancel_is_idempotent() {
        let reg = CancelRegistry::new();
        let id = TaskId::from("t-1");
        let _ = reg.register(&id);

        assert!(reg.request_cancel(&id));
        assert!(!reg.request_cancel(&id));
        assert!(reg.is_cancelled(&id));
    }

    #[test]
    fn cancel_unknown_id_is_noop() {
        let reg = CancelRegistry::new();
        assert!(!reg.request_cancel(&TaskId::from("missing")));
        assert!(!reg.is_cancelled(&TaskId::from("missing")));
    }

    #[test]
    fn register_same_id_returns_existing_token() {
        let reg = CancelRegistry::new();
        let id = TaskId::from("t-1");
        let a = reg.register(&id);
        let _ = reg.request_cancel(&id);
        let b = reg.register(&id);
        // The signal survives re-registration.
        assert!(a.is_cancelled());
        assert!(b.is_cancelled());
    }

    #[test]
    fn tokens_are_per_task() {
        let reg = CancelRegistry::new();
        let a = TaskId::from("a");
        let b = TaskId::from("b");
        let _ = reg.register(&a);
        let _ = reg.register(&b);
        let _ = reg.request_cancel(&a);
        assert!(reg.is_cancelled(&a));
        assert!(!reg.is_cancelled(&b));
    }

    #[tokio::test]
    async fn token_wakes_waiters() {
        let reg = CancelRegistry::new();
        let id = TaskId::from("t-1");
        let token = reg.register(&id);

        let handle = tokio::spawn(async move {
            token.cancelled().await;
            true
        });
        let _ = reg.request_cancel(&id);
        assert!(handle.await.unwrap());
    }
}

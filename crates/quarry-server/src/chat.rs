//! Chat input forwarding.
//!
//! Free-text frames from an observer are handed to a [`ChatDelegate`].
//! The conversational feature set itself lives outside this crate; the
//! bundled [`TaskSummaryChat`] echoes the input and answers with a task
//! summary so a bare deployment still responds.

use async_trait::async_trait;

use quarry_core::events::MessageKind;
use quarry_runtime::facade::Orchestrator;

/// Receives free-text chat input from connected observers.
#[async_trait]
pub trait ChatDelegate: Send + Sync {
    /// Handle one chat message. Replies go out through the orchestrator's
    /// event emitter.
    async fn on_chat(&self, text: &str, orchestrator: &Orchestrator);
}

/// Minimal delegate: echo the input, reply with the current task counts.
pub struct TaskSummaryChat;

#[async_trait]
impl ChatDelegate for TaskSummaryChat {
    async fn on_chat(&self, text: &str, orchestrator: &Orchestrator) {
        let emitter = orchestrator.emitter();
        let _ = emitter.emit_message(MessageKind::User, text);

        let thinking = emitter.emit_message(MessageKind::Thinking, "Checking task state...");
        let counts = orchestrator.counts();
        emitter.emit_remove_message(thinking);

        let reply = if counts.total == 0 {
            "No tasks yet. Submit one via POST /tasks.".to_owned()
        } else {
            format!(
                "{} task(s): {} running, {} pending, {} waiting for a decision, {} paused.",
                counts.total,
                counts.running,
                counts.pending,
                counts.waiting_for_human,
                counts.paused
            )
        };
        let _ = emitter.emit_message(MessageKind::Assistant, reply);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

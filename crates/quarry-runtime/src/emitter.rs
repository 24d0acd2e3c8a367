//! Event emission over a `tokio::sync::broadcast` channel.
//!
//! The runtime side of the realtime surface: the executor and facade emit
//! [`ServerEvent`]s here; the server's event bridge subscribes and fans out
//! to connected observers. Emission is fire-and-forget — with no subscriber
//! the event is dropped.

use tokio::sync::broadcast;

use quarry_core::events::{MessageKind, ServerEvent};
use quarry_core::ids::MessageId;
use quarry_core::task::Task;

/// Default channel capacity; slow bridges see `Lagged` rather than
/// blocking publishers.
pub const DEFAULT_CAPACITY: usize = 256;

/// Broadcast emitter for orchestrator events.
pub struct EventEmitter {
    tx: broadcast::Sender<ServerEvent>,
}

impl EventEmitter {
    /// Create an emitter with the given channel capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Subscribe to all future events.
    pub fn subscribe(&self) -> broadcast::Receiver<ServerEvent> {
        self.tx.subscribe()
    }

    /// Publish an event. Dropped silently when nobody is subscribed.
    pub fn emit(&self, event: ServerEvent) {
        if self.tx.send(event).is_err() {
            tracing::trace!("event dropped: no subscribers");
        }
    }

    /// Publish a `task_update` snapshot of a record.
    pub fn emit_task_update(&self, task: &Task) {
        self.emit(ServerEvent::task_update(task));
    }

    /// Publish a chat-style message; returns its ID for later retraction.
    pub fn emit_message(&self, kind: MessageKind, content: impl Into<String>) -> MessageId {
        let event = ServerEvent::message(kind, content);
        let id = event
            .message_id()
            .cloned()
            .unwrap_or_default();
        self.emit(event);
        id
    }

    /// Retract a previously published message.
    pub fn emit_remove_message(&self, message_id: MessageId) {
        self.emit(ServerEvent::RemoveMessage { message_id });
    }

    /// Number of live subscribers.
    #[must_use]
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventEmitter {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

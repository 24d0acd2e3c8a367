//! Wire events for the realtime broadcast channel.
//!
//! Two families:
//!
//! - **[`ServerEvent`]**: outbound envelopes pushed to every connected
//!   observer. A closed tagged enum — the `type` field is the discriminant,
//!   dispatch is an exhaustive match, never a string-comparison chain.
//! - **[`ClientCommand`]**: inbound control messages from an observer.
//!   Anything that does not parse as a command is treated as chat text.
//!
//! Delivery is best-effort and at-most-once per session; there is no
//! replay log. Per-session ordering follows publish order.

use serde::{Deserialize, Serialize};

use crate::ids::{MessageId, TaskId};
use crate::task::{Task, TaskStatus, TaskType, now_rfc3339};

// ─────────────────────────────────────────────────────────────────────────────
// Outbound
// ─────────────────────────────────────────────────────────────────────────────

/// Kind of a chat-style message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    /// Server-originated status line.
    System,
    /// Echo of operator chat input.
    User,
    /// Conversational reply.
    Assistant,
    /// Error surfaced to the operator.
    Error,
    /// Transient "working on it" indicator.
    Thinking,
}

impl MessageKind {
    /// Wire string representation (matches the envelope `type` tag).
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::Error => "error",
            Self::Thinking => "thinking",
        }
    }
}

/// Body shared by all chat-style message envelopes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MessageBody {
    /// Unique message ID (referenced by `remove_message`).
    pub id: MessageId,
    /// Message text.
    pub content: String,
    /// Publish timestamp (RFC 3339).
    pub timestamp: String,
}

impl MessageBody {
    /// Create a body stamped with the current time.
    #[must_use]
    pub fn now(content: impl Into<String>) -> Self {
        Self {
            id: MessageId::new(),
            content: content.into(),
            timestamp: now_rfc3339(),
        }
    }
}

/// An outbound envelope pushed to connected observers.
///
/// The `type` tag is the full discriminant set of the streaming surface:
/// `task_update`, `remove_message`, and the five chat message kinds.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    /// Task progress/status changed.
    TaskUpdate {
        /// Task this update concerns.
        task_id: TaskId,
        /// Progress in `[0, 100]` or `-1`.
        progress: i32,
        /// Current status.
        status: TaskStatus,
        /// Task kind.
        task_type: TaskType,
    },
    /// Retract a previously published message (e.g. a stale `thinking`).
    RemoveMessage {
        /// The message to retract.
        message_id: MessageId,
    },
    /// Server status line.
    System {
        /// Message body.
        #[serde(flatten)]
        message: MessageBody,
    },
    /// Operator chat echo.
    User {
        /// Message body.
        #[serde(flatten)]
        message: MessageBody,
    },
    /// Conversational reply.
    Assistant {
        /// Message body.
        #[serde(flatten)]
        message: MessageBody,
    },
    /// Operator-facing error.
    Error {
        /// Message body.
        #[serde(flatten)]
        message: MessageBody,
    },
    /// Transient progress indicator.
    Thinking {
        /// Message body.
        #[serde(flatten)]
        message: MessageBody,
    },
}

impl ServerEvent {
    /// Build a `task_update` from a task record.
    #[must_use]
    pub fn task_update(task: &Task) -> Self {
        Self::TaskUpdate {
            task_id: task.id.clone(),
            progress: task.progress,
            status: task.status,
            task_type: task.task_type,
        }
    }

    /// Build a chat-style message envelope of the given kind.
    #[must_use]
    pub fn message(kind: MessageKind, content: impl Into<String>) -> Self {
        let message = MessageBody::now(content);
        match kind {
            MessageKind::System => Self::System { message },
            MessageKind::User => Self::User { message },
            MessageKind::Assistant => Self::Assistant { message },
            MessageKind::Error => Self::Error { message },
            MessageKind::Thinking => Self::Thinking { message },
        }
    }

    /// The wire `type` tag of this envelope.
    #[must_use]
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::TaskUpdate { .. } => "task_update",
            Self::RemoveMessage { .. } => "remove_message",
            Self::System { .. } => "system",
            Self::User { .. } => "user",
            Self::Assistant { .. } => "assistant",
            Self::Error { .. } => "error",
            Self::Thinking { .. } => "thinking",
        }
    }

    /// The message ID, when this envelope is a chat-style message.
    #[must_use]
    pub fn message_id(&self) -> Option<&MessageId> {
        match self {
            Self::System { message }
            | Self::User { message }
            | Self::Assistant { message }
            | Self::Error { message }
            | Self::Thinking { message } => Some(&message.id),
            Self::TaskUpdate { .. } | Self::RemoveMessage { .. } => None,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Inbound
// ─────────────────────────────────────────────────────────────────────────────

/// Control messages a connected observer may send.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientCommand {
    /// Request cooperative cancellation of a task.
    CancelTask {
        /// Task to cancel.
        task_id: TaskId,
    },
}

/// A parsed inbound frame: either a control command or free-form chat text.
#[derive(Clone, Debug, PartialEq)]
pub enum InboundFrame {
    /// A structured control message.
    Command(ClientCommand),
    /// Anything else is chat input for the conversational handler.
    Chat(String),
}

/// Classify one inbound text frame.
#[must_use]
pub fn parse_inbound(text: &str) -> InboundFrame {
    match serde_json::from_str::<ClientCommand>(text) {
        Ok(cmd) => InboundFrame::Command(cmd),
        Err(_) => InboundFrame::Chat(text.to_owned()),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

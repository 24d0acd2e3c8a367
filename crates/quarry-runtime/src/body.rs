//! The pluggable task-body contract.
//!
//! A body is decomposed into discrete steps keyed by a cursor. The executor
//! evaluates cancellation and pause before every step, so a continuation is
//! just a saved cursor — resumption can happen on any worker, long after
//! the suspending one returned to the pool.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

use crate::emitter::EventEmitter;
use crate::store::TaskStore;
use quarry_core::errors::QuarryError;
use quarry_core::events::MessageKind;
use quarry_core::human::{Argument, HumanResolution, ResponseKind};
use quarry_core::ids::{MessageId, TaskId};
use quarry_core::task::{Task, TaskType};

/// Fault raised by a body step. The executor records the message on the
/// task and transitions it to `failed`; nothing propagates to the caller
/// that submitted the task.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct BodyError {
    /// What went wrong, recorded on the task record.
    pub message: String,
}

impl BodyError {
    /// Create a fault with the given reason.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<&str> for BodyError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

impl From<String> for BodyError {
    fn from(message: String) -> Self {
        Self { message }
    }
}

/// A suspension point: the decision the operator is asked for, plus where
/// the body continues once it is resolved.
#[derive(Clone, Debug)]
pub struct HumanGateSpec {
    /// Name of the action awaiting approval.
    pub action_name: String,
    /// Action arguments in submission order.
    pub arguments: Vec<Argument>,
    /// Resolution kinds the operator may use.
    pub allowed_responses: Vec<ResponseKind>,
    /// Operator-facing description.
    pub description: String,
    /// Cursor to continue from after resolution.
    pub resume_cursor: u32,
}

/// Result of one body step.
#[derive(Clone, Debug)]
pub enum StepOutcome {
    /// Run the next step at this cursor.
    Continue(u32),
    /// Suspend on an operator decision; the worker slot is released.
    AwaitHuman(HumanGateSpec),
    /// The body is finished; the task completes at progress 100.
    Done,
}

/// Per-step context handed to a body.
///
/// Carries the task identity, the progress/message emission surface, and —
/// on the first step after a gate resolution — the operator's decision.
pub struct StepContext {
    task_id: TaskId,
    store: Arc<TaskStore>,
    emitter: Arc<EventEmitter>,
    resolution: Option<HumanResolution>,
}

impl StepContext {
    /// Build a context for one step.
    #[must_use]
    pub fn new(
        task_id: TaskId,
        store: Arc<TaskStore>,
        emitter: Arc<EventEmitter>,
        resolution: Option<HumanResolution>,
    ) -> Self {
        Self {
            task_id,
            store,
            emitter,
            resolution,
        }
    }

    /// The task being stepped.
    #[must_use]
    pub fn task_id(&self) -> &TaskId {
        &self.task_id
    }

    /// A current snapshot of the task record.
    pub fn task(&self) -> Result<Task, QuarryError> {
        self.store.get(&self.task_id)
    }

    /// Report progress. Values are clamped to `[0, 100]` and never move
    /// backwards; the recorded value is returned and broadcast.
    pub fn emit_progress(&self, progress: i32) -> i32 {
        match self.store.record_progress(&self.task_id, progress) {
            Ok(task) => {
                self.emitter.emit_task_update(&task);
                task.progress
            }
            Err(err) => {
                tracing::warn!(task_id = %self.task_id, error = %err, "progress tick dropped");
                progress
            }
        }
    }

    /// Publish a chat-style message to all observers.
    pub fn emit_message(&self, kind: MessageKind, content: impl Into<String>) -> MessageId {
        self.emitter.emit_message(kind, content)
    }

    /// Retract a previously published message.
    pub fn remove_message(&self, message_id: MessageId) {
        self.emitter.emit_remove_message(message_id);
    }

    /// The gate resolution, present only on the first step after a resume
    /// from `waiting_for_human`.
    #[must_use]
    pub fn resolution(&self) -> Option<&HumanResolution> {
        self.resolution.as_ref()
    }
}

/// A pluggable unit of work, stepped by the executor.
///
/// Implementations must be stateless across tasks: everything task-specific
/// comes from the [`StepContext`] and the cursor.
#[async_trait]
pub trait TaskBody: Send + Sync {
    /// Run the step at `cursor`.
    async fn step(&self, cursor: u32, ctx: &StepContext) -> Result<StepOutcome, BodyError>;
}

/// Registry mapping task types to their bodies.
#[derive(Default)]
pub struct BodyRegistry {
    bodies: HashMap<TaskType, Arc<dyn TaskBody>>,
}

impl BodyRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the body for a task type, replacing any previous one.
    pub fn register(&mut self, task_type: TaskType, body: Arc<dyn TaskBody>) {
        let _ = self.bodies.insert(task_type, body);
    }

    /// The body for a task type, if registered.
    pub fn get(&self, task_type: TaskType) -> Option<Arc<dyn TaskBody>> {
        self.bodies.get(&task_type).cloned()
    }

    /// Whether a body is registered for the type.
    #[must_use]
    pub fn contains(&self, task_type: TaskType) -> bool {
        self.bodies.contains_key(&task_type)
    }

    /// Number of registered bodies.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bodies.len()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bodies.is_empty()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

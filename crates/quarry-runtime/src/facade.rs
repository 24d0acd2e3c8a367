//! Orchestrator facade.
//!
//! The one surface external callers (HTTP handlers, the binary, the chat
//! delegate) touch: submit, cancel, pause, resume, list, get, and
//! resolve-human-request. Everything else in this crate is plumbing behind
//! it.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::broadcast;
use tracing::{info, instrument};

use crate::body::BodyRegistry;
use crate::cancel::CancelRegistry;
use crate::emitter::EventEmitter;
use crate::executor::Executor;
use crate::gate::{GateOutcome, HumanLoopGate};
use crate::store::TaskStore;
use quarry_core::errors::QuarryError;
use quarry_core::events::ServerEvent;
use quarry_core::human::{HumanLoopRequest, ResponseKind};
use quarry_core::ids::{RequestId, TaskId};
use quarry_core::task::{ERROR_PROGRESS, INITIAL_PROGRESS, Task, TaskSpec, TaskStatus};

/// Tuning knobs for the orchestrator.
#[derive(Clone, Debug)]
pub struct OrchestratorConfig {
    /// Worker pool size (concurrently running bodies).
    pub workers: usize,
    /// Broadcast channel capacity.
    pub event_capacity: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            event_capacity: crate::emitter::DEFAULT_CAPACITY,
        }
    }
}

/// Snapshot of task counts by lifecycle phase, for health reporting.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize)]
pub struct TaskCounts {
    /// All records.
    pub total: usize,
    /// Queued for a worker slot.
    pub pending: usize,
    /// Actively running.
    pub running: usize,
    /// Suspended on an operator decision.
    pub waiting_for_human: usize,
    /// Explicitly parked.
    pub paused: usize,
}

/// The orchestrator: record store, cancellation, gate, and executor wired
/// together behind one API.
pub struct Orchestrator {
    store: Arc<TaskStore>,
    cancels: Arc<CancelRegistry>,
    gate: Arc<HumanLoopGate>,
    emitter: Arc<EventEmitter>,
    executor: Executor,
}

impl Orchestrator {
    /// Build an orchestrator over the given body registry.
    #[must_use]
    pub fn new(bodies: BodyRegistry, config: &OrchestratorConfig) -> Self {
        let store = Arc::new(TaskStore::new());
        let cancels = Arc::new(CancelRegistry::new());
        let gate = Arc::new(HumanLoopGate::new());
        let emitter = Arc::new(EventEmitter::new(config.event_capacity));
        let executor = Executor::new(
            store.clone(),
            cancels.clone(),
            gate.clone(),
            emitter.clone(),
            bodies,
            config.workers,
        );
        Self {
            store,
            cancels,
            gate,
            emitter,
            executor,
        }
    }

    /// Accept a task for execution. Fails if no body is registered for the
    /// requested type; the task itself runs asynchronously and its eventual
    /// failure is recorded on the record, not returned here.
    #[instrument(skip_all, fields(task_type = %spec.task_type))]
    pub fn submit(&self, spec: TaskSpec) -> Result<Task, QuarryError> {
        if !self.executor.has_body(spec.task_type) {
            return Err(QuarryError::invalid_state(format!(
                "no task body registered for type '{}'",
                spec.task_type
            )));
        }
        let task = self.store.create(spec);
        let _ = self.cancels.register(&task.id);
        self.emitter.emit_task_update(&task);
        self.executor.enqueue_new(task.id.clone());
        info!(task_id = %task.id, "task submitted");
        Ok(task)
    }

    /// Set the cooperative cancellation signal. Idempotent: a second call
    /// for the same task is a no-op success.
    pub fn request_cancel(&self, id: &TaskId) -> Result<Task, QuarryError> {
        let task = self.store.get(id)?;
        if task.cancel_requested {
            return Ok(task);
        }
        let _ = self.cancels.request_cancel(id);
        let task = self.store.mutate(id, |t| t.cancel_requested = true)?;
        info!(task_id = %id, "cancellation requested");
        Ok(task)
    }

    /// Ask a running task to park at its next checkpoint.
    pub fn pause(&self, id: &TaskId) -> Result<(), QuarryError> {
        let task = self.store.get(id)?;
        if task.status != TaskStatus::Running {
            return Err(QuarryError::invalid_state(format!(
                "pause requires a running task; task {id} is {}",
                task.status
            )));
        }
        self.executor.request_pause(id);
        Ok(())
    }

    /// Resume a parked or failed task.
    ///
    /// - `paused` → continue at the saved cursor, progress unchanged.
    /// - `failed` → restart from step zero with progress reset to `0`.
    /// - `cancelled` → `InvalidState` (the cancellation signal is never
    ///   cleared, so a resumed body would re-cancel immediately).
    pub fn resume(&self, id: &TaskId) -> Result<Task, QuarryError> {
        let task = self.store.get(id)?;
        match task.status {
            TaskStatus::Paused => {
                let cursor = self.executor.take_parked(id).ok_or_else(|| {
                    QuarryError::invalid_state(format!("task {id} has no parked continuation"))
                })?;
                let task = self.store.mutate(id, |t| t.status = TaskStatus::Running)?;
                self.emitter.emit_task_update(&task);
                self.executor.enqueue_continuation(id.clone(), cursor, None);
                info!(task_id = %id, cursor, "paused task resumed");
                Ok(task)
            }
            TaskStatus::Failed => {
                let task = self.store.mutate(id, |t| {
                    t.status = TaskStatus::Running;
                    t.progress = INITIAL_PROGRESS;
                    t.error = None;
                })?;
                self.emitter.emit_task_update(&task);
                self.executor.enqueue_continuation(id.clone(), 0, None);
                info!(task_id = %id, "failed task restarted from zero");
                Ok(task)
            }
            TaskStatus::Cancelled => Err(QuarryError::invalid_state(format!(
                "task {id} was cancelled and cannot be resumed"
            ))),
            other => Err(QuarryError::invalid_state(format!(
                "task {id} is {other}; only paused or failed tasks can be resumed"
            ))),
        }
    }

    /// Resolve an open human-in-loop request and hand control back to the
    /// executor.
    #[instrument(skip_all, fields(request_id = %request_id, kind = %kind))]
    pub fn resolve_human(
        &self,
        request_id: &RequestId,
        kind: ResponseKind,
        payload: Option<Value>,
    ) -> Result<Task, QuarryError> {
        let resolution = self.gate.resolve(request_id, kind, payload.as_ref())?;
        let task_id = resolution.request.task_id.clone();

        match resolution.outcome {
            GateOutcome::Resume(outcome) => {
                let cursor = self.executor.take_parked(&task_id).ok_or_else(|| {
                    QuarryError::invalid_state(format!(
                        "task {task_id} has no parked continuation"
                    ))
                })?;
                let task = self
                    .store
                    .mutate(&task_id, |t| t.status = TaskStatus::Running)?;
                self.emitter.emit_task_update(&task);
                self.executor
                    .enqueue_continuation(task_id.clone(), cursor, Some(outcome));
                info!(task_id = %task_id, "human request resolved; task resumed");
                Ok(task)
            }
            GateOutcome::Ignore => {
                let _ = self.executor.take_parked(&task_id);
                let _ = self.cancels.request_cancel(&task_id);
                let task = self.store.mutate(&task_id, |t| {
                    t.cancel_requested = true;
                    t.status = TaskStatus::Cancelled;
                    t.progress = ERROR_PROGRESS;
                })?;
                self.emitter.emit_task_update(&task);
                info!(task_id = %task_id, "human request ignored; task cancelled");
                Ok(task)
            }
        }
    }

    /// Fetch one task.
    pub fn get(&self, id: &TaskId) -> Result<Task, QuarryError> {
        self.store.get(id)
    }

    /// All tasks in creation order.
    pub fn list(&self) -> Vec<Task> {
        self.store.list()
    }

    /// All open human-in-loop requests, oldest first.
    pub fn open_requests(&self) -> Vec<HumanLoopRequest> {
        self.gate.open_requests()
    }

    /// The open request for one task, if any.
    pub fn open_request_for(&self, task_id: &TaskId) -> Option<HumanLoopRequest> {
        self.gate.open_for_task(task_id)
    }

    /// Subscribe to the realtime event stream.
    pub fn subscribe(&self) -> broadcast::Receiver<ServerEvent> {
        self.emitter.subscribe()
    }

    /// The event emitter, for collaborators that publish their own
    /// messages (e.g. the chat delegate).
    #[must_use]
    pub fn emitter(&self) -> &Arc<EventEmitter> {
        &self.emitter
    }

    /// Task counts by phase.
    pub fn counts(&self) -> TaskCounts {
        let tasks = self.store.list();
        let mut counts = TaskCounts {
            total: tasks.len(),
            ..TaskCounts::default()
        };
        for task in &tasks {
            match task.status {
                TaskStatus::Pending => counts.pending += 1,
                TaskStatus::Running => counts.running += 1,
                TaskStatus::WaitingForHuman => counts.waiting_for_human += 1,
                TaskStatus::Paused => counts.paused += 1,
                TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Cancelled => {}
            }
        }
        counts
    }

    /// Worker pool size.
    #[must_use]
    pub fn worker_count(&self) -> usize {
        self.executor.worker_count()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

//! Task executor: a bounded FIFO worker pool stepping task bodies.
//!
//! Work items (fresh tasks and resumed continuations) are queued on an
//! unbounded channel; a fixed set of workers drains it in order, so the
//! number of concurrently running bodies is bounded by the pool size and
//! excess tasks stay `pending`.
//!
//! Before every step the worker re-evaluates two cooperative signals:
//! cancellation (terminal, `progress = -1`) and pause (continuation parked,
//! progress untouched). A step already in flight completes before either is
//! observed. Suspension on a human-in-loop request parks the continuation
//! and returns the worker to the pool; gate resolution re-queues it.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::body::{BodyRegistry, StepContext, StepOutcome};
use crate::cancel::CancelRegistry;
use crate::emitter::EventEmitter;
use crate::gate::HumanLoopGate;
use crate::store::TaskStore;
use quarry_core::events::MessageKind;
use quarry_core::human::HumanResolution;
use quarry_core::ids::TaskId;
use quarry_core::task::{COMPLETE_PROGRESS, ERROR_PROGRESS, TaskStatus, TaskType};

/// One queued dispatch: a task plus where its body continues.
struct WorkItem {
    id: TaskId,
    cursor: u32,
    resolution: Option<HumanResolution>,
}

struct ExecutorInner {
    store: Arc<TaskStore>,
    cancels: Arc<CancelRegistry>,
    gate: Arc<HumanLoopGate>,
    emitter: Arc<EventEmitter>,
    bodies: BodyRegistry,
    /// Requeue path for dispatches that race a still-winding-down run.
    queue: mpsc::UnboundedSender<WorkItem>,
    /// Saved cursors of suspended continuations (paused or gated).
    parked: DashMap<TaskId, u32>,
    /// Presence means an operator asked to pause this task.
    pause_requested: DashMap<TaskId, ()>,
    /// At-most-one-concurrent-execution-per-id guard.
    active: DashMap<TaskId, ()>,
}

/// The worker pool.
pub struct Executor {
    inner: Arc<ExecutorInner>,
    tx: mpsc::UnboundedSender<WorkItem>,
    workers: Vec<JoinHandle<()>>,
}

impl Executor {
    /// Spawn a pool of `workers` workers over the shared components.
    #[must_use]
    pub fn new(
        store: Arc<TaskStore>,
        cancels: Arc<CancelRegistry>,
        gate: Arc<HumanLoopGate>,
        emitter: Arc<EventEmitter>,
        bodies: BodyRegistry,
        workers: usize,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel::<WorkItem>();
        let inner = Arc::new(ExecutorInner {
            store,
            cancels,
            gate,
            emitter,
            bodies,
            queue: tx.clone(),
            parked: DashMap::new(),
            pause_requested: DashMap::new(),
            active: DashMap::new(),
        });

        let rx = Arc::new(Mutex::new(rx));
        let workers = (0..workers.max(1))
            .map(|slot| {
                let inner = inner.clone();
                let rx = rx.clone();
                tokio::spawn(worker_loop(slot, inner, rx))
            })
            .collect();

        Self { inner, tx, workers }
    }

    /// Number of workers in the pool.
    #[must_use]
    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Whether a body is registered for the type.
    #[must_use]
    pub fn has_body(&self, task_type: TaskType) -> bool {
        self.inner.bodies.contains(task_type)
    }

    /// Queue a freshly created task (cursor 0).
    pub fn enqueue_new(&self, id: TaskId) {
        self.enqueue(WorkItem {
            id,
            cursor: 0,
            resolution: None,
        });
    }

    /// Queue a resumed continuation.
    pub fn enqueue_continuation(
        &self,
        id: TaskId,
        cursor: u32,
        resolution: Option<HumanResolution>,
    ) {
        self.enqueue(WorkItem {
            id,
            cursor,
            resolution,
        });
    }

    /// Ask the running body to park at its next checkpoint.
    pub fn request_pause(&self, id: &TaskId) {
        let _ = self.inner.pause_requested.insert(id.clone(), ());
    }

    /// Take the parked continuation cursor for a task, if any.
    pub fn take_parked(&self, id: &TaskId) -> Option<u32> {
        self.inner.parked.remove(id).map(|(_, cursor)| cursor)
    }

    fn enqueue(&self, item: WorkItem) {
        if self.tx.send(item).is_err() {
            warn!("executor queue closed; dispatch dropped");
        }
    }
}

impl Drop for Executor {
    fn drop(&mut self) {
        for handle in &self.workers {
            handle.abort();
        }
    }
}

async fn worker_loop(
    slot: usize,
    inner: Arc<ExecutorInner>,
    rx: Arc<Mutex<mpsc::UnboundedReceiver<WorkItem>>>,
) {
    debug!(slot, "executor worker started");
    loop {
        let item = {
            let mut rx = rx.lock().await;
            rx.recv().await
        };
        match item {
            Some(item) => run_item(&inner, item).await,
            None => break,
        }
    }
    debug!(slot, "executor worker stopped");
}

/// Removes the task from the active set when the run finishes, on every
/// exit path.
struct ActiveGuard<'a> {
    inner: &'a ExecutorInner,
    id: TaskId,
}

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        let _ = self.inner.active.remove(&self.id);
    }
}

async fn run_item(inner: &Arc<ExecutorInner>, item: WorkItem) {
    let WorkItem {
        id,
        mut cursor,
        mut resolution,
    } = item;

    let Ok(task) = inner.store.get(&id) else {
        warn!(task_id = %id, "dispatch for unknown task dropped");
        return;
    };
    if task.status.is_terminal() {
        // Resolved-as-ignore or otherwise finished while queued.
        debug!(task_id = %id, status = %task.status, "dispatch for terminal task dropped");
        return;
    }
    if inner.active.insert(id.clone(), ()).is_some() {
        // The previous run is still winding down (it parked or finished a
        // breath ago). Requeue rather than drop, so the continuation is
        // never lost.
        debug!(task_id = %id, "task still active; requeueing dispatch");
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let _ = inner.queue.send(WorkItem {
            id,
            cursor,
            resolution,
        });
        return;
    }
    let _guard = ActiveGuard {
        inner: inner.as_ref(),
        id: id.clone(),
    };

    let Some(body) = inner.bodies.get(task.task_type) else {
        finish_failed(inner, &id, "no task body registered for this type");
        return;
    };
    let token = inner.cancels.register(&id);

    match inner.store.mutate(&id, |t| t.status = TaskStatus::Running) {
        Ok(t) => inner.emitter.emit_task_update(&t),
        Err(err) => {
            warn!(task_id = %id, error = %err, "failed to mark task running");
            return;
        }
    }

    loop {
        // Cancellation checkpoint — cooperative, evaluated between steps.
        if token.is_cancelled() {
            finish_cancelled(inner, &id);
            return;
        }

        // Pause checkpoint — park the continuation, free the slot.
        if inner.pause_requested.remove(&id).is_some() {
            let _ = inner.parked.insert(id.clone(), cursor);
            if let Ok(t) = inner.store.mutate(&id, |t| t.status = TaskStatus::Paused) {
                inner.emitter.emit_task_update(&t);
            }
            info!(task_id = %id, cursor, "task paused");
            return;
        }

        let ctx = StepContext::new(
            id.clone(),
            inner.store.clone(),
            inner.emitter.clone(),
            resolution.take(),
        );
        match body.step(cursor, &ctx).await {
            Ok(StepOutcome::Continue(next)) => cursor = next,
            Ok(StepOutcome::AwaitHuman(spec)) => {
                // Park and transition before opening the request: nothing
                // may be resolvable while the continuation is unsaved.
                let _ = inner.parked.insert(id.clone(), spec.resume_cursor);
                if let Ok(t) = inner
                    .store
                    .mutate(&id, |t| t.status = TaskStatus::WaitingForHuman)
                {
                    inner.emitter.emit_task_update(&t);
                }
                match inner.gate.open(
                    id.clone(),
                    spec.action_name,
                    spec.arguments,
                    spec.allowed_responses,
                    spec.description,
                ) {
                    Ok(request) => {
                        let _ = inner.emitter.emit_message(
                            MessageKind::System,
                            format!(
                                "Task {id} is waiting for a decision: {}",
                                request.action_name
                            ),
                        );
                        info!(task_id = %id, request_id = %request.id, "task suspended on human request");
                        return;
                    }
                    Err(err) => {
                        finish_failed(inner, &id, &err.to_string());
                        return;
                    }
                }
            }
            Ok(StepOutcome::Done) => {
                finish_completed(inner, &id);
                return;
            }
            Err(err) => {
                finish_failed(inner, &id, &err.message);
                return;
            }
        }
    }
}

fn clear_runtime_state(inner: &ExecutorInner, id: &TaskId) {
    let _ = inner.pause_requested.remove(id);
    let _ = inner.parked.remove(id);
}

fn finish_completed(inner: &ExecutorInner, id: &TaskId) {
    clear_runtime_state(inner, id);
    if let Ok(t) = inner.store.mutate(id, |t| {
        t.status = TaskStatus::Completed;
        t.progress = COMPLETE_PROGRESS;
    }) {
        inner.emitter.emit_task_update(&t);
        let _ = inner
            .emitter
            .emit_message(MessageKind::System, format!("Task {id} completed"));
    }
    info!(task_id = %id, "task completed");
}

fn finish_failed(inner: &ExecutorInner, id: &TaskId, reason: &str) {
    clear_runtime_state(inner, id);
    if let Ok(t) = inner.store.mutate(id, |t| {
        t.status = TaskStatus::Failed;
        t.progress = ERROR_PROGRESS;
        t.error = Some(reason.to_owned());
    }) {
        inner.emitter.emit_task_update(&t);
        let _ = inner
            .emitter
            .emit_message(MessageKind::Error, format!("Task {id} failed: {reason}"));
    }
    warn!(task_id = %id, reason, "task failed");
}

fn finish_cancelled(inner: &ExecutorInner, id: &TaskId) {
    clear_runtime_state(inner, id);
    if let Ok(t) = inner.store.mutate(id, |t| {
        t.status = TaskStatus::Cancelled;
        t.progress = ERROR_PROGRESS;
    }) {
        inner.emitter.emit_task_update(&t);
        let _ = inner
            .emitter
            .emit_message(MessageKind::System, format!("Task {id} cancelled"));
    }
    info!(task_id = %id, "task cancelled");
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

//! Task record store.
//!
//! The only shared mutable state between workers and the facade. Every
//! mutation goes through [`TaskStore::mutate`], which holds the record's
//! entry lock for the duration of the closure — concurrent updates to the
//! same record serialize, updates to different records proceed
//! independently. Terminal records are retained for audit, never deleted.

use dashmap::DashMap;

use quarry_core::errors::QuarryError;
use quarry_core::ids::TaskId;
use quarry_core::task::{COMPLETE_PROGRESS, INITIAL_PROGRESS, Task, TaskSpec, TaskStatus, now_rfc3339};

/// In-memory table of task records.
#[derive(Default)]
pub struct TaskStore {
    tasks: DashMap<TaskId, Task>,
}

impl TaskStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a fresh `pending` record and return a copy.
    pub fn create(&self, spec: TaskSpec) -> Task {
        let task = Task::from_spec(spec);
        let _ = self.tasks.insert(task.id.clone(), task.clone());
        task
    }

    /// Fetch a copy of a record.
    pub fn get(&self, id: &TaskId) -> Result<Task, QuarryError> {
        self.tasks
            .get(id)
            .map(|t| t.clone())
            .ok_or_else(|| QuarryError::task_not_found(id.as_str()))
    }

    /// Atomic read-modify-write on one record.
    ///
    /// Bumps `updated_at` and returns a copy of the mutated record.
    pub fn mutate(
        &self,
        id: &TaskId,
        f: impl FnOnce(&mut Task),
    ) -> Result<Task, QuarryError> {
        let mut entry = self
            .tasks
            .get_mut(id)
            .ok_or_else(|| QuarryError::task_not_found(id.as_str()))?;
        f(&mut entry);
        entry.updated_at = now_rfc3339();
        Ok(entry.clone())
    }

    /// Record a progress tick, clamping to `[0, 100]` and never moving
    /// backwards. Decreasing values clamp to the prior value.
    pub fn record_progress(&self, id: &TaskId, progress: i32) -> Result<Task, QuarryError> {
        self.mutate(id, |task| {
            let clamped = progress.clamp(INITIAL_PROGRESS, COMPLETE_PROGRESS);
            task.progress = clamped.max(task.progress.max(INITIAL_PROGRESS));
        })
    }

    /// All records, ordered by creation (v7 IDs break same-millisecond ties).
    pub fn list(&self) -> Vec<Task> {
        let mut tasks: Vec<Task> = self.tasks.iter().map(|t| t.clone()).collect();
        tasks.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        tasks
    }

    /// Records currently in `status`, in creation order.
    pub fn list_by_status(&self, status: TaskStatus) -> Vec<Task> {
        let mut tasks: Vec<Task> = self
            .tasks
            .iter()
            .filter(|t| t.status == status)
            .map(|t| t.clone())
            .collect();
        tasks.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        tasks
    }

    /// Number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Whether the store holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

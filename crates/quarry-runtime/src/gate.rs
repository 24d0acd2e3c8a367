//! Human-in-loop gate.
//!
//! Tracks at most one open [`HumanLoopRequest`] per task. `open` is called
//! by the executor when a body suspends; `resolve` is called by the facade
//! on behalf of an operator. Validation failures leave the request open and
//! `waiting`; only a successful resolution clears the slot.

use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;

use quarry_core::errors::QuarryError;
use quarry_core::human::{
    Argument, HumanLoopRequest, HumanResolution, RequestStatus, ResponseKind,
};
use quarry_core::ids::{RequestId, TaskId};

/// What the executor should do after a resolution.
#[derive(Clone, Debug, PartialEq)]
pub enum GateOutcome {
    /// Re-dispatch the parked continuation with this resolution.
    Resume(HumanResolution),
    /// Cancel the task without resuming the body.
    Ignore,
}

/// A successful resolution: the (now resolved) request plus the outcome.
#[derive(Clone, Debug)]
pub struct GateResolution {
    /// The resolved request, with `status == Resolved`.
    pub request: HumanLoopRequest,
    /// What to do with the suspended task.
    pub outcome: GateOutcome,
}

#[derive(Default)]
struct GateState {
    by_task: HashMap<TaskId, HumanLoopRequest>,
    task_by_request: HashMap<RequestId, TaskId>,
}

/// The gate itself: one open-request slot per task.
#[derive(Default)]
pub struct HumanLoopGate {
    state: Mutex<GateState>,
}

impl HumanLoopGate {
    /// Create an empty gate.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a request for `task_id`. Fails with `Conflict` if one is
    /// already open for that task.
    pub fn open(
        &self,
        task_id: TaskId,
        action_name: impl Into<String>,
        arguments: Vec<Argument>,
        allowed_responses: Vec<ResponseKind>,
        description: impl Into<String>,
    ) -> Result<HumanLoopRequest, QuarryError> {
        let mut state = self.state.lock();
        if state.by_task.contains_key(&task_id) {
            return Err(QuarryError::Conflict {
                task_id: task_id.into_inner(),
            });
        }
        let request = HumanLoopRequest::new(
            task_id.clone(),
            action_name,
            arguments,
            allowed_responses,
            description,
        );
        let _ = state
            .task_by_request
            .insert(request.id.clone(), task_id.clone());
        let _ = state.by_task.insert(task_id, request.clone());
        Ok(request)
    }

    /// Resolve a request into a typed outcome.
    ///
    /// - `kind` not in the request's allowed set → `InvalidResponseKind`,
    ///   request stays `waiting`.
    /// - `edit` payload must supply exactly the original argument names.
    /// - `respond` payload must be a JSON string.
    /// - `ignore` yields [`GateOutcome::Ignore`].
    pub fn resolve(
        &self,
        request_id: &RequestId,
        kind: ResponseKind,
        payload: Option<&Value>,
    ) -> Result<GateResolution, QuarryError> {
        let mut state = self.state.lock();
        let Some(task_id) = state.task_by_request.get(request_id).cloned() else {
            return Err(QuarryError::request_not_found(request_id.as_str()));
        };

        let outcome = {
            let Some(request) = state.by_task.get(&task_id) else {
                return Err(QuarryError::request_not_found(request_id.as_str()));
            };
            if !request.permits(kind) {
                return Err(QuarryError::InvalidResponseKind {
                    kind,
                    message: format!(
                        "allowed responses for '{}': {}",
                        request.action_name,
                        request
                            .allowed_responses
                            .iter()
                            .map(|k| k.as_str())
                            .collect::<Vec<_>>()
                            .join(", ")
                    ),
                });
            }
            match kind {
                ResponseKind::Accept => GateOutcome::Resume(HumanResolution::Accept {
                    arguments: request.arguments.clone(),
                }),
                ResponseKind::Edit => {
                    let payload = payload.ok_or_else(|| QuarryError::InvalidResponseKind {
                        kind,
                        message: "edit requires a payload object".into(),
                    })?;
                    let arguments = request.validate_edit(payload)?;
                    GateOutcome::Resume(HumanResolution::Edit { arguments })
                }
                ResponseKind::Respond => {
                    let text = payload
                        .and_then(Value::as_str)
                        .ok_or_else(|| QuarryError::InvalidResponseKind {
                            kind,
                            message: "respond requires a string payload".into(),
                        })?
                        .to_owned();
                    GateOutcome::Resume(HumanResolution::Respond { text })
                }
                ResponseKind::Ignore => GateOutcome::Ignore,
            }
        };

        // Validation passed — clear the slot for this task.
        let Some(mut request) = state.by_task.remove(&task_id) else {
            return Err(QuarryError::request_not_found(request_id.as_str()));
        };
        let _ = state.task_by_request.remove(request_id);
        request.status = RequestStatus::Resolved;

        Ok(GateResolution { request, outcome })
    }

    /// The open request for a task, if any.
    pub fn open_for_task(&self, task_id: &TaskId) -> Option<HumanLoopRequest> {
        self.state.lock().by_task.get(task_id).cloned()
    }

    /// All open requests, oldest first.
    pub fn open_requests(&self) -> Vec<HumanLoopRequest> {
        let state = self.state.lock();
        let mut requests: Vec<HumanLoopRequest> = state.by_task.values().cloned().collect();
        requests.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        requests
    }

    /// Number of open requests.
    #[must_use]
    pub fn open_count(&self) -> usize {
        self.state.lock().by_task.len()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

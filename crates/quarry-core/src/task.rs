//! Task records and their lifecycle vocabulary.
//!
//! A [`Task`] is the durable record of one long-running job. The record is
//! owned by the store; the executor mutates it only through the store's
//! atomic `mutate` API. Progress is an integer in `[0, 100]` while the task
//! is making headway, or the [`ERROR_PROGRESS`] sentinel once the task ends
//! in `failed` or `cancelled`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ids::TaskId;

/// Progress value marking a terminal error state (`failed` / `cancelled`).
pub const ERROR_PROGRESS: i32 = -1;

/// Progress value of a freshly created task.
pub const INITIAL_PROGRESS: i32 = 0;

/// Progress value of a completed task.
pub const COMPLETE_PROGRESS: i32 = 100;

/// Current UTC timestamp in RFC 3339 with millisecond precision.
#[must_use]
pub fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

// ─────────────────────────────────────────────────────────────────────────────
// Enums
// ─────────────────────────────────────────────────────────────────────────────

/// Task status in the orchestrator lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Accepted, waiting for a worker slot.
    Pending,
    /// A worker is actively stepping the body.
    Running,
    /// Suspended on an open human-in-loop request.
    WaitingForHuman,
    /// Parked by an explicit pause; continuation retained.
    Paused,
    /// Body finished; `progress == 100`.
    Completed,
    /// Body raised an unhandled fault; `progress == -1`.
    Failed,
    /// Cancellation observed at a checkpoint; `progress == -1`.
    Cancelled,
}

impl TaskStatus {
    /// Whether this status is terminal (the record is retained for audit).
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Wire string representation (matches the serde rename).
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::WaitingForHuman => "waiting_for_human",
            Self::Paused => "paused",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Enumerated task kind, selecting which pluggable body runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskType {
    /// Ingest a source-code repository into a dataset.
    RepositoryIngest,
    /// Crawl a website into a dataset.
    WebCrawl,
}

impl TaskType {
    /// Wire string representation (matches the serde rename).
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::RepositoryIngest => "repository-ingest",
            Self::WebCrawl => "web-crawl",
        }
    }
}

impl std::fmt::Display for TaskType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Domain types
// ─────────────────────────────────────────────────────────────────────────────

/// Parameters for submitting a task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSpec {
    /// Which body to run.
    #[serde(rename = "type")]
    pub task_type: TaskType,
    /// Source location (repository URL or site URL).
    pub source: String,
    /// Target dataset name, if the body publishes one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dataset_name: Option<String>,
    /// Human-readable description; defaulted from type and source if absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Type-specific options, passed through to the body verbatim.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<Value>,
}

/// A task record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// Unique ID, generated at creation.
    pub id: TaskId,
    /// Which body this task runs.
    #[serde(rename = "type")]
    pub task_type: TaskType,
    /// Current lifecycle status.
    pub status: TaskStatus,
    /// Progress in `[0, 100]`, or `-1` for terminal error states.
    pub progress: i32,
    /// Human-readable description.
    pub description: String,
    /// Source location the body works on.
    pub source: String,
    /// Target dataset name, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dataset_name: Option<String>,
    /// Type-specific options.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<Value>,
    /// Creation timestamp (RFC 3339).
    pub created_at: String,
    /// Last mutation timestamp (RFC 3339); bumped on every state change.
    pub updated_at: String,
    /// Set once by the cancellation controller; never cleared.
    pub cancel_requested: bool,
    /// Failure reason recorded when the body faults.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Task {
    /// Create a fresh `pending` record from a submission spec.
    #[must_use]
    pub fn from_spec(spec: TaskSpec) -> Self {
        let now = now_rfc3339();
        let description = spec
            .description
            .unwrap_or_else(|| format!("{} of {}", spec.task_type, spec.source));
        Self {
            id: TaskId::new(),
            task_type: spec.task_type,
            status: TaskStatus::Pending,
            progress: INITIAL_PROGRESS,
            description,
            source: spec.source,
            dataset_name: spec.dataset_name,
            options: spec.options,
            created_at: now.clone(),
            updated_at: now,
            cancel_requested: false,
            error: None,
        }
    }

    /// Whether the status/progress pair satisfies the record invariants.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        match self.status {
            TaskStatus::Completed => self.progress == COMPLETE_PROGRESS,
            TaskStatus::Failed | TaskStatus::Cancelled => self.progress == ERROR_PROGRESS,
            _ => (0..=COMPLETE_PROGRESS).contains(&self.progress),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn spec() -> TaskSpec {
        TaskSpec {
            task_type: TaskType::RepositoryIngest,
            source: "https://github.com/acme/widgets".into(),
            dataset_name: Some("widgets-corpus".into()),
            description: None,
            options: None,
        }
    }

    #[test]
    fn status_serde_values() {
        assert_eq!(
            serde_json::to_string(&TaskStatus::WaitingForHuman).unwrap(),
            "\"waiting_for_human\""
        );
        assert_eq!(
            serde_json::to_string(&TaskStatus::Pending).unwrap(),
            "\"pending\""
        );
    }

    #[test]
    fn status_serde_roundtrip() {
        for status in [
            TaskStatus::Pending,
            TaskStatus::Running,
            TaskStatus::WaitingForHuman,
            TaskStatus::Paused,
            TaskStatus::Completed,
            TaskStatus::Failed,
            TaskStatus::Cancelled,
        ] {
            let json = serde_json::to_string(&status).unwrap();
            let back: TaskStatus = serde_json::from_str(&json).unwrap();
            assert_eq!(back, status);
        }
    }

    #[test]
    fn status_is_terminal() {
        assert!(TaskStatus::Completed.is_terminal());
        assert!(TaskStatus::Failed.is_terminal());
        assert!(TaskStatus::Cancelled.is_terminal());
        assert!(!TaskStatus::Pending.is_terminal());
        assert!(!TaskStatus::Running.is_terminal());
        assert!(!TaskStatus::WaitingForHuman.is_terminal());
        assert!(!TaskStatus::Paused.is_terminal());
    }

    #[test]
    fn task_type_wire_values() {
        assert_eq!(
            serde_json::to_string(&TaskType::RepositoryIngest).unwrap(),
            "\"repository-ingest\""
        );
        assert_eq!(
            serde_json::to_string(&TaskType::WebCrawl).unwrap(),
            "\"web-crawl\""
        );
    }

    #[test]
    fn from_spec_defaults() {
        let task = Task::from_spec(spec());
        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.progress, 0);
        assert!(!task.cancel_requested);
        assert!(task.error.is_none());
        assert_eq!(task.created_at, task.updated_at);
        assert!(
            task.description
                .contains("https://github.com/acme/widgets")
        );
    }

    #[test]
    fn from_spec_keeps_explicit_description() {
        let mut s = spec();
        s.description = Some("nightly corpus refresh".into());
        let task = Task::from_spec(s);
        assert_eq!(task.description, "nightly corpus refresh");
    }

    #[test]
    fn consistency_rules() {
        let mut task = Task::from_spec(spec());
        assert!(task.is_consistent());

        task.status = TaskStatus::Completed;
        task.progress = COMPLETE_PROGRESS;
        assert!(task.is_consistent());
        task.progress = 99;
        assert!(!task.is_consistent());

        task.status = TaskStatus::Failed;
        task.progress = ERROR_PROGRESS;
        assert!(task.is_consistent());
        task.progress = 50;
        assert!(!task.is_consistent());

        task.status = TaskStatus::Running;
        task.progress = 101;
        assert!(!task.is_consistent());
    }

    #[test]
    fn task_serde_roundtrip() {
        let task = Task::from_spec(spec());
        let json = serde_json::to_string(&task).unwrap();
        let back: Task = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, task.id);
        assert_eq!(back.status, task.status);
        assert_eq!(back.task_type, task.task_type);
    }

    #[test]
    fn task_serde_uses_type_key() {
        let task = Task::from_spec(spec());
        let v: serde_json::Value = serde_json::to_value(&task).unwrap();
        assert_eq!(v["type"], "repository-ingest");
        assert_eq!(v["status"], "pending");
        assert_eq!(v["progress"], 0);
        assert!(v.get("error").is_none());
    }

    #[test]
    fn spec_deserializes_from_wire_body() {
        let json = r#"{"type":"web-crawl","source":"https://example.com","dataset_name":"ex"}"#;
        let s: TaskSpec = serde_json::from_str(json).unwrap();
        assert_eq!(s.task_type, TaskType::WebCrawl);
        assert_eq!(s.dataset_name.as_deref(), Some("ex"));
        assert!(s.options.is_none());
    }

    #[test]
    fn now_rfc3339_has_millis_and_utc() {
        let ts = now_rfc3339();
        assert!(ts.ends_with('Z'));
        assert!(ts.contains('.'));
    }
}

//! Human-in-loop request types and the typed resolution protocol.
//!
//! A task body that needs an operator decision opens a [`HumanLoopRequest`]
//! and suspends. The request carries a named action, its arguments in
//! submission order, and the set of resolution kinds the operator may use.
//! At most one request is open per task at any time.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::QuarryError;
use crate::ids::{RequestId, TaskId};
use crate::task::now_rfc3339;

// ─────────────────────────────────────────────────────────────────────────────
// Types
// ─────────────────────────────────────────────────────────────────────────────

/// One named argument of a human-in-loop action, order-preserving.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Argument {
    /// Argument name.
    pub name: String,
    /// Argument value.
    pub value: Value,
}

impl Argument {
    /// Convenience constructor.
    #[must_use]
    pub fn new(name: impl Into<String>, value: Value) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

/// Resolution kinds an operator may answer with.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseKind {
    /// Resume with the original arguments unchanged.
    Accept,
    /// Resume with operator-edited arguments (same keys required).
    Edit,
    /// Resume handing the body a free-form text payload.
    Respond,
    /// Cancel the task without resuming the body.
    Ignore,
}

impl ResponseKind {
    /// Wire string representation (matches the serde rename).
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Accept => "accept",
            Self::Edit => "edit",
            Self::Respond => "respond",
            Self::Ignore => "ignore",
        }
    }
}

impl std::fmt::Display for ResponseKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle state of a request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    /// Awaiting an operator decision.
    Waiting,
    /// Decided; the slot for its task is cleared.
    Resolved,
}

/// A pending decision blocking one task.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HumanLoopRequest {
    /// Unique request ID.
    pub id: RequestId,
    /// Task this request suspends (non-owning back-reference).
    pub task_id: TaskId,
    /// Name of the action awaiting approval (e.g. `publish_dataset`).
    pub action_name: String,
    /// Action arguments in submission order.
    pub arguments: Vec<Argument>,
    /// Operator-facing description of the decision.
    pub description: String,
    /// Resolution kinds this request permits.
    pub allowed_responses: Vec<ResponseKind>,
    /// Lifecycle state.
    pub status: RequestStatus,
    /// Creation timestamp (RFC 3339).
    pub created_at: String,
}

impl HumanLoopRequest {
    /// Create a new `waiting` request.
    #[must_use]
    pub fn new(
        task_id: TaskId,
        action_name: impl Into<String>,
        arguments: Vec<Argument>,
        allowed_responses: Vec<ResponseKind>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: RequestId::new(),
            task_id,
            action_name: action_name.into(),
            arguments,
            description: description.into(),
            allowed_responses,
            status: RequestStatus::Waiting,
            created_at: now_rfc3339(),
        }
    }

    /// Whether `kind` is a member of this request's allowed set.
    #[must_use]
    pub fn permits(&self, kind: ResponseKind) -> bool {
        self.allowed_responses.contains(&kind)
    }

    /// Validate an `edit` payload against the original arguments.
    ///
    /// The payload must be a JSON object supplying exactly the original
    /// argument names; extra or missing keys are rejected. Returns the
    /// replacement arguments in the original order.
    pub fn validate_edit(&self, payload: &Value) -> Result<Vec<Argument>, QuarryError> {
        let Some(map) = payload.as_object() else {
            return Err(QuarryError::InvalidResponseKind {
                kind: ResponseKind::Edit,
                message: "edit payload must be a JSON object".into(),
            });
        };

        for arg in &self.arguments {
            if !map.contains_key(&arg.name) {
                return Err(QuarryError::InvalidResponseKind {
                    kind: ResponseKind::Edit,
                    message: format!("edit payload missing argument '{}'", arg.name),
                });
            }
        }
        for key in map.keys() {
            if !self.arguments.iter().any(|a| &a.name == key) {
                return Err(QuarryError::InvalidResponseKind {
                    kind: ResponseKind::Edit,
                    message: format!("edit payload has unknown argument '{key}'"),
                });
            }
        }

        Ok(self
            .arguments
            .iter()
            .map(|a| Argument::new(a.name.clone(), map[&a.name].clone()))
            .collect())
    }
}

/// The typed outcome handed to a resuming task body.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HumanResolution {
    /// Operator accepted; original arguments apply.
    Accept {
        /// The original arguments, unchanged.
        arguments: Vec<Argument>,
    },
    /// Operator edited the arguments.
    Edit {
        /// Replacement arguments (same names, original order).
        arguments: Vec<Argument>,
    },
    /// Operator answered with free-form text.
    Respond {
        /// The text payload; interpretation is body-specific.
        text: String,
    },
}

impl HumanResolution {
    /// The arguments the body should continue with, if this resolution
    /// carries any.
    #[must_use]
    pub fn arguments(&self) -> Option<&[Argument]> {
        match self {
            Self::Accept { arguments } | Self::Edit { arguments } => Some(arguments),
            Self::Respond { .. } => None,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;

    fn request() -> HumanLoopRequest {
        HumanLoopRequest::new(
            TaskId::from("t-1"),
            "publish_dataset",
            vec![
                Argument::new("dataset_name", json!("widgets-corpus")),
                Argument::new("source", json!("https://github.com/acme/widgets")),
            ],
            vec![ResponseKind::Accept, ResponseKind::Edit, ResponseKind::Ignore],
            "Publish the generated dataset?",
        )
    }

    #[test]
    fn new_request_is_waiting() {
        let req = request();
        assert_eq!(req.status, RequestStatus::Waiting);
        assert_eq!(req.task_id.as_str(), "t-1");
        assert!(!req.created_at.is_empty());
    }

    #[test]
    fn permits_members_only() {
        let req = request();
        assert!(req.permits(ResponseKind::Accept));
        assert!(req.permits(ResponseKind::Edit));
        assert!(req.permits(ResponseKind::Ignore));
        assert!(!req.permits(ResponseKind::Respond));
    }

    #[test]
    fn response_kind_serde_values() {
        assert_eq!(
            serde_json::to_string(&ResponseKind::Accept).unwrap(),
            "\"accept\""
        );
        assert_eq!(
            serde_json::to_string(&ResponseKind::Ignore).unwrap(),
            "\"ignore\""
        );
    }

    #[test]
    fn validate_edit_same_keys() {
        let req = request();
        let args = req
            .validate_edit(&json!({
                "dataset_name": "renamed-corpus",
                "source": "https://github.com/acme/widgets",
            }))
            .unwrap();
        assert_eq!(args.len(), 2);
        // Order preserved from the original request, not the payload.
        assert_eq!(args[0].name, "dataset_name");
        assert_eq!(args[0].value, json!("renamed-corpus"));
        assert_eq!(args[1].name, "source");
    }

    #[test]
    fn validate_edit_missing_key() {
        let req = request();
        let err = req
            .validate_edit(&json!({"dataset_name": "x"}))
            .unwrap_err();
        assert_matches!(err, QuarryError::InvalidResponseKind { .. });
        assert!(err.to_string().contains("source"));
    }

    #[test]
    fn validate_edit_extra_key() {
        let req = request();
        let err = req
            .validate_edit(&json!({
                "dataset_name": "x",
                "source": "y",
                "surprise": true,
            }))
            .unwrap_err();
        assert_matches!(err, QuarryError::InvalidResponseKind { .. });
        assert!(err.to_string().contains("surprise"));
    }

    #[test]
    fn validate_edit_non_object() {
        let req = request();
        let err = req.validate_edit(&json!("just a string")).unwrap_err();
        assert_matches!(err, QuarryError::InvalidResponseKind { .. });
    }

    #[test]
    fn resolution_arguments_accessor() {
        let args = vec![Argument::new("a", json!(1))];
        let accept = HumanResolution::Accept {
            arguments: args.clone(),
        };
        assert_eq!(accept.arguments().unwrap().len(), 1);

        let respond = HumanResolution::Respond {
            text: "go ahead".into(),
        };
        assert!(respond.arguments().is_none());
    }

    #[test]
    fn resolution_serde_tagged() {
        let res = HumanResolution::Respond {
            text: "use the staging bucket".into(),
        };
        let v = serde_json::to_value(&res).unwrap();
        assert_eq!(v["kind"], "respond");
        assert_eq!(v["text"], "use the staging bucket");
    }

    #[test]
    fn request_serde_roundtrip() {
        let req = request();
        let json = serde_json::to_string(&req).unwrap();
        let back: HumanLoopRequest = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, req.id);
        assert_eq!(back.arguments, req.arguments);
        assert_eq!(back.allowed_responses, req.allowed_responses);
    }
}

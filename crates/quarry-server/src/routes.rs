//! REST surface over the orchestrator facade.
//!
//! | Route | Outcome |
//! |-------|---------|
//! | `POST /tasks` | `201 {id}`, `400` on a malformed spec |
//! | `GET /tasks` | `200 {tasks}` |
//! | `GET /tasks/{id}` | `200` task, `404` |
//! | `POST /tasks/{id}/cancel` | `200`, `404` |
//! | `POST /tasks/{id}/pause` | `200`, `404`, `409` |
//! | `POST /tasks/{id}/resume` | `200`, `404`, `409` |
//! | `GET /human-requests` | `200 {requests}` |
//! | `POST /human-requests/{id}/resolve` | `200`, `400`, `404`, `409` |
//! | `GET /health` | `200` health snapshot |
//! | `GET /ws` | WebSocket upgrade |

use std::sync::Arc;
use std::time::Instant;

use axum::Json;
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::chat::ChatDelegate;
use crate::config::ServerConfig;
use crate::health;
use crate::websocket::broadcast::SessionRegistry;
use crate::websocket::session::run_ws_session;
use quarry_core::errors::QuarryError;
use quarry_core::human::ResponseKind;
use quarry_core::ids::{ClientId, RequestId, TaskId};
use quarry_core::task::TaskSpec;
use quarry_runtime::facade::Orchestrator;

/// Shared state available to every handler.
#[derive(Clone)]
pub struct AppState {
    /// The orchestrator facade.
    pub orchestrator: Arc<Orchestrator>,
    /// Connected observer sessions.
    pub sessions: Arc<SessionRegistry>,
    /// Destination for chat input.
    pub chat: Arc<dyn ChatDelegate>,
    /// Server configuration.
    pub config: ServerConfig,
    /// Process start, for uptime reporting.
    pub start_time: Instant,
}

/// Wire error: a domain failure or a malformed request.
#[derive(Debug)]
pub enum ApiError {
    /// Mapped from the orchestrator taxonomy.
    Domain(QuarryError),
    /// The request body or parameters did not parse.
    BadRequest(String),
}

impl From<QuarryError> for ApiError {
    fn from(err: QuarryError) -> Self {
        Self::Domain(err)
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Domain(err) => match err {
                QuarryError::NotFound { .. } => StatusCode::NOT_FOUND,
                QuarryError::Conflict { .. } | QuarryError::InvalidState { .. } => {
                    StatusCode::CONFLICT
                }
                QuarryError::InvalidResponseKind { .. } => StatusCode::BAD_REQUEST,
                QuarryError::BodyFailure(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    fn body(&self) -> Value {
        let (code, message) = match self {
            Self::BadRequest(message) => ("BAD_REQUEST", message.clone()),
            Self::Domain(err) => (err.code(), err.to_string()),
        };
        json!({ "error": { "code": code, "message": message } })
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(self.body())).into_response()
    }
}

/// `POST /tasks`
pub async fn create_task(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, ApiError> {
    let spec: TaskSpec = serde_json::from_value(body)
        .map_err(|err| ApiError::BadRequest(format!("invalid task spec: {err}")))?;
    if spec.source.trim().is_empty() {
        return Err(ApiError::BadRequest("source must not be empty".into()));
    }
    let task = state.orchestrator.submit(spec)?;
    Ok((StatusCode::CREATED, Json(json!({ "id": task.id }))))
}

/// `GET /tasks`
pub async fn list_tasks(State(state): State<AppState>) -> Json<Value> {
    Json(json!({ "tasks": state.orchestrator.list() }))
}

/// `GET /tasks/{id}`
pub async fn get_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let task = state.orchestrator.get(&TaskId::from(id))?;
    Ok(Json(serde_json::to_value(task).unwrap_or_default()))
}

/// `POST /tasks/{id}/cancel`
pub async fn cancel_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let task = state.orchestrator.request_cancel(&TaskId::from(id))?;
    Ok(Json(json!({ "id": task.id, "cancel_requested": true })))
}

/// `POST /tasks/{id}/pause`
pub async fn pause_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let id = TaskId::from(id);
    state.orchestrator.pause(&id)?;
    Ok(Json(json!({ "id": id, "pause_requested": true })))
}

/// `POST /tasks/{id}/resume`
pub async fn resume_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let task = state.orchestrator.resume(&TaskId::from(id))?;
    Ok(Json(serde_json::to_value(task).unwrap_or_default()))
}

/// `GET /human-requests`
pub async fn list_human_requests(State(state): State<AppState>) -> Json<Value> {
    Json(json!({ "requests": state.orchestrator.open_requests() }))
}

/// Body of `POST /human-requests/{id}/resolve`.
#[derive(Debug, Deserialize)]
pub struct ResolveBody {
    /// Resolution kind; must be in the request's allowed set.
    pub kind: ResponseKind,
    /// Kind-specific payload (`edit`: object, `respond`: string).
    #[serde(default)]
    pub payload: Option<Value>,
}

/// `POST /human-requests/{id}/resolve`
pub async fn resolve_human_request(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, ApiError> {
    let body: ResolveBody = serde_json::from_value(body)
        .map_err(|err| ApiError::BadRequest(format!("invalid resolution: {err}")))?;
    let task = state
        .orchestrator
        .resolve_human(&RequestId::from(id), body.kind, body.payload)?;
    Ok(Json(serde_json::to_value(task).unwrap_or_default()))
}

/// `GET /health`
pub async fn health_handler(State(state): State<AppState>) -> Json<health::HealthResponse> {
    let snapshot = health::health_check(
        state.start_time,
        state.sessions.connection_count(),
        state.orchestrator.counts(),
    );
    Json(snapshot)
}

/// `GET /ws` — upgrade to the streaming surface.
pub async fn ws_upgrade(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    let client_id = ClientId::new();
    ws.on_upgrade(move |socket| {
        run_ws_session(
            socket,
            client_id,
            state.orchestrator.clone(),
            state.sessions.clone(),
            state.chat.clone(),
            state.config.clone(),
        )
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

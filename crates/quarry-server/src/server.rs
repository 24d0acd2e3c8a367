//! `QuarryServer` — router assembly and the serve loop.

use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::routing::{get, post};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::chat::ChatDelegate;
use crate::config::ServerConfig;
use crate::routes::{
    AppState, cancel_task, create_task, get_task, health_handler, list_human_requests,
    list_tasks, pause_task, resolve_human_request, resume_task, ws_upgrade,
};
use crate::shutdown::ShutdownCoordinator;
use crate::websocket::broadcast::SessionRegistry;
use crate::websocket::event_bridge::EventBridge;
use quarry_runtime::facade::Orchestrator;

/// The Quarry HTTP + WebSocket server.
pub struct QuarryServer {
    config: ServerConfig,
    orchestrator: Arc<Orchestrator>,
    sessions: Arc<SessionRegistry>,
    chat: Arc<dyn ChatDelegate>,
    shutdown: Arc<ShutdownCoordinator>,
    start_time: Instant,
}

impl QuarryServer {
    /// Assemble a server over an orchestrator and a chat delegate.
    #[must_use]
    pub fn new(
        config: ServerConfig,
        orchestrator: Arc<Orchestrator>,
        chat: Arc<dyn ChatDelegate>,
    ) -> Self {
        Self {
            config,
            orchestrator,
            sessions: Arc::new(SessionRegistry::new()),
            chat,
            shutdown: Arc::new(ShutdownCoordinator::new()),
            start_time: Instant::now(),
        }
    }

    /// Build the router with all routes and middleware.
    pub fn router(&self) -> Router {
        let state = AppState {
            orchestrator: self.orchestrator.clone(),
            sessions: self.sessions.clone(),
            chat: self.chat.clone(),
            config: self.config.clone(),
            start_time: self.start_time,
        };

        Router::new()
            .route("/health", get(health_handler))
            .route("/ws", get(ws_upgrade))
            .route("/tasks", post(create_task).get(list_tasks))
            .route("/tasks/{id}", get(get_task))
            .route("/tasks/{id}/cancel", post(cancel_task))
            .route("/tasks/{id}/pause", post(pause_task))
            .route("/tasks/{id}/resume", post(resume_task))
            .route("/human-requests", get(list_human_requests))
            .route("/human-requests/{id}/resolve", post(resolve_human_request))
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive())
            .with_state(state)
    }

    /// Bind and serve until the shutdown coordinator trips.
    ///
    /// Spawns the event bridge before accepting connections so no early
    /// events are missed by the fan-out path.
    pub async fn serve(&self) -> std::io::Result<()> {
        let bridge = EventBridge::new(
            self.orchestrator.subscribe(),
            self.sessions.clone(),
            self.shutdown.token(),
        );
        let bridge_handle = tokio::spawn(bridge.run());

        let listener = tokio::net::TcpListener::bind(self.config.bind_addr()).await?;
        let addr = listener.local_addr()?;
        info!(%addr, workers = self.orchestrator.worker_count(), "quarry server listening");

        let token = self.shutdown.token();
        axum::serve(listener, self.router())
            .with_graceful_shutdown(async move { token.cancelled().await })
            .await?;

        self.shutdown.drain(vec![bridge_handle]).await;
        Ok(())
    }

    /// The session registry (fan-out surface).
    #[must_use]
    pub fn sessions(&self) -> &Arc<SessionRegistry> {
        &self.sessions
    }

    /// The shutdown coordinator.
    #[must_use]
    pub fn shutdown(&self) -> &Arc<ShutdownCoordinator> {
        &self.shutdown
    }

    /// The server configuration.
    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::TaskSummaryChat;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use quarry_runtime::body::{
        BodyError, BodyRegistry, HumanGateSpec, StepContext, StepOutcome, TaskBody,
    };
    use quarry_runtime::facade::OrchestratorConfig;
    use async_trait::async_trait;
    use quarry_core::human::{Argument, ResponseKind};
    use quarry_core::task::TaskType;
    use serde_json::{Value, json};
    use std::time::Duration;
    use tower::ServiceExt;

    /// Gates on `publish` after one progress tick.
    struct GatedBody;

    #[async_trait]
    impl TaskBody for GatedBody {
        async fn step(&self, cursor: u32, ctx: &StepContext) -> Result<StepOutcome, BodyError> {
            match cursor {
                0 => {
                    let _ = ctx.emit_progress(50);
                    Ok(StepOutcome::AwaitHuman(HumanGateSpec {
                        action_name: "publish".into(),
                        arguments: vec![Argument::new("dataset_name", json!("corpus"))],
                        allowed_responses: vec![ResponseKind::Accept, ResponseKind::Ignore],
                        description: "Publish?".into(),
                        resume_cursor: 1,
                    }))
                }
                _ => Ok(StepOutcome::Done),
            }
        }
    }

    struct InstantBody;

    #[async_trait]
    impl TaskBody for InstantBody {
        async fn step(&self, _cursor: u32, ctx: &StepContext) -> Result<StepOutcome, BodyError> {
            let _ = ctx.emit_progress(100);
            Ok(StepOutcome::Done)
        }
    }

    fn make_server() -> QuarryServer {
        let mut bodies = BodyRegistry::new();
        bodies.register(TaskType::RepositoryIngest, Arc::new(GatedBody));
        bodies.register(TaskType::WebCrawl, Arc::new(InstantBody));
        let orchestrator = Arc::new(Orchestrator::new(bodies, &OrchestratorConfig::default()));
        QuarryServer::new(
            ServerConfig::default(),
            orchestrator,
            Arc::new(TaskSummaryChat),
        )
    }

    async fn request(
        server: &QuarryServer,
        method: &str,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let req = match body {
            Some(value) => builder
                .header("content-type", "application/json")
                .body(Body::from(value.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let resp = server.router().oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), 1_000_000)
            .await
            .unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, value)
    }

    async fn wait_for_task_status(server: &QuarryServer, id: &str, status: &str) {
        for _ in 0..500 {
            let (code, body) = request(server, "GET", &format!("/tasks/{id}"), None).await;
            assert_eq!(code, StatusCode::OK);
            if body["status"] == status {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("task {id} never reached {status}");
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let server = make_server();
        let (status, body) = request(&server, "GET", "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["connections"], 0);
        assert!(body["tasks"]["total"].is_number());
    }

    #[tokio::test]
    async fn unknown_route_is_404() {
        let server = make_server();
        let (status, _) = request(&server, "GET", "/nope", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn create_task_returns_201_with_id() {
        let server = make_server();
        let (status, body) = request(
            &server,
            "POST",
            "/tasks",
            Some(json!({
                "type": "web-crawl",
                "source": "https://example.com",
                "dataset_name": "ex",
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert!(body["id"].is_string());
    }

    #[tokio::test]
    async fn create_task_missing_fields_is_400() {
        let server = make_server();
        let (status, body) = request(
            &server,
            "POST",
            "/tasks",
            Some(json!({ "type": "web-crawl" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "BAD_REQUEST");

        let (status, _) = request(
            &server,
            "POST",
            "/tasks",
            Some(json!({ "type": "web-crawl", "source": "   " })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn create_task_unknown_type_is_400() {
        let server = make_server();
        let (status, _) = request(
            &server,
            "POST",
            "/tasks",
            Some(json!({ "type": "teleport", "source": "x" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn list_tasks_includes_created() {
        let server = make_server();
        let (_, created) = request(
            &server,
            "POST",
            "/tasks",
            Some(json!({ "type": "web-crawl", "source": "https://example.com" })),
        )
        .await;
        let (status, body) = request(&server, "GET", "/tasks", None).await;
        assert_eq!(status, StatusCode::OK);
        let tasks = body["tasks"].as_array().unwrap();
        assert!(tasks.iter().any(|t| t["id"] == created["id"]));
    }

    #[tokio::test]
    async fn get_unknown_task_is_404() {
        let server = make_server();
        let (status, body) = request(&server, "GET", "/tasks/missing", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn cancel_unknown_task_is_404() {
        let server = make_server();
        let (status, _) = request(&server, "POST", "/tasks/missing/cancel", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn cancel_twice_is_200_both_times() {
        let server = make_server();
        let (_, created) = request(
            &server,
            "POST",
            "/tasks",
            Some(json!({ "type": "repository-ingest", "source": "https://github.com/a/b" })),
        )
        .await;
        let id = created["id"].as_str().unwrap().to_owned();
        let (s1, _) = request(&server, "POST", &format!("/tasks/{id}/cancel"), None).await;
        let (s2, _) = request(&server, "POST", &format!("/tasks/{id}/cancel"), None).await;
        assert_eq!(s1, StatusCode::OK);
        assert_eq!(s2, StatusCode::OK);
    }

    #[tokio::test]
    async fn resume_unresumable_task_is_409() {
        let server = make_server();
        let (_, created) = request(
            &server,
            "POST",
            "/tasks",
            Some(json!({ "type": "web-crawl", "source": "https://example.com" })),
        )
        .await;
        let id = created["id"].as_str().unwrap().to_owned();
        wait_for_task_status(&server, &id, "completed").await;

        let (status, body) =
            request(&server, "POST", &format!("/tasks/{id}/resume"), None).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"]["code"], "INVALID_STATE");
    }

    #[tokio::test]
    async fn human_request_flow_over_rest() {
        let server = make_server();
        let (_, created) = request(
            &server,
            "POST",
            "/tasks",
            Some(json!({ "type": "repository-ingest", "source": "https://github.com/a/b" })),
        )
        .await;
        let id = created["id"].as_str().unwrap().to_owned();
        wait_for_task_status(&server, &id, "waiting_for_human").await;

        let (status, body) = request(&server, "GET", "/human-requests", None).await;
        assert_eq!(status, StatusCode::OK);
        let requests = body["requests"].as_array().unwrap();
        assert_eq!(requests.len(), 1);
        let request_id = requests[0]["id"].as_str().unwrap().to_owned();
        assert_eq!(requests[0]["task_id"], id.as_str());

        // A disallowed kind is a 400 and leaves the request open.
        let (status, body) = request(
            &server,
            "POST",
            &format!("/human-requests/{request_id}/resolve"),
            Some(json!({ "kind": "respond", "payload": "hi" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "INVALID_RESPONSE_KIND");

        let (status, body) = request(
            &server,
            "POST",
            &format!("/human-requests/{request_id}/resolve"),
            Some(json!({ "kind": "accept" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "running");

        wait_for_task_status(&server, &id, "completed").await;

        // The slot is cleared; resolving again is a 404.
        let (status, _) = request(
            &server,
            "POST",
            &format!("/human-requests/{request_id}/resolve"),
            Some(json!({ "kind": "accept" })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn resolve_with_unknown_kind_string_is_400() {
        let server = make_server();
        let (status, _) = request(
            &server,
            "POST",
            "/human-requests/r-1/resolve",
            Some(json!({ "kind": "shrug" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn ignored_request_cancels_task_and_blocks_resume() {
        let server = make_server();
        let (_, created) = request(
            &server,
            "POST",
            "/tasks",
            Some(json!({ "type": "repository-ingest", "source": "https://github.com/a/b" })),
        )
        .await;
        let id = created["id"].as_str().unwrap().to_owned();
        wait_for_task_status(&server, &id, "waiting_for_human").await;

        let (_, body) = request(&server, "GET", "/human-requests", None).await;
        let request_id = body["requests"][0]["id"].as_str().unwrap().to_owned();

        let (status, body) = request(
            &server,
            "POST",
            &format!("/human-requests/{request_id}/resolve"),
            Some(json!({ "kind": "ignore" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "cancelled");
        assert_eq!(body["progress"], -1);

        let (status, body) =
            request(&server, "POST", &format!("/tasks/{id}/resume"), None).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"]["code"], "INVALID_STATE");
    }
}

//! # quarryd
//!
//! Quarry orchestrator server binary — registers the built-in task bodies,
//! builds the orchestrator and HTTP/WebSocket server, and serves until
//! Ctrl-C.

#![deny(unsafe_code)]

mod bodies;

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;

use bodies::{RepositoryIngestBody, WebCrawlBody};
use quarry_core::task::TaskType;
use quarry_runtime::body::BodyRegistry;
use quarry_runtime::facade::{Orchestrator, OrchestratorConfig};
use quarry_server::chat::TaskSummaryChat;
use quarry_server::config::ServerConfig;
use quarry_server::server::QuarryServer;
use quarry_server::shutdown;

/// Quarry orchestrator server.
#[derive(Parser, Debug)]
#[command(name = "quarryd", about = "Quarry task orchestrator server")]
struct Cli {
    /// Host to bind.
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Port to bind (0 for auto-assign).
    #[arg(long, default_value = "8080")]
    port: u16,

    /// Worker pool size (concurrently running task bodies).
    #[arg(long, default_value = "4")]
    workers: usize,

    /// Fallback log filter when RUST_LOG is unset.
    #[arg(long, default_value = "info")]
    log: String,
}

fn build_orchestrator(workers: usize) -> Orchestrator {
    let mut bodies = BodyRegistry::new();
    bodies.register(TaskType::RepositoryIngest, Arc::new(RepositoryIngestBody));
    bodies.register(TaskType::WebCrawl, Arc::new(WebCrawlBody));
    Orchestrator::new(
        bodies,
        &OrchestratorConfig {
            workers,
            ..OrchestratorConfig::default()
        },
    )
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();
    quarry_core::logging::init_tracing(&args.log);

    let orchestrator = Arc::new(build_orchestrator(args.workers));
    let config = ServerConfig {
        host: args.host,
        port: args.port,
        ..ServerConfig::default()
    };
    let server = QuarryServer::new(config, orchestrator, Arc::new(TaskSummaryChat));

    // Tie Ctrl-C to the server's shutdown coordinator.
    let coordinator = server.shutdown().clone();
    let _ = tokio::spawn(async move {
        shutdown::wait_for_signal(coordinator.token()).await;
        coordinator.trigger();
    });

    server.serve().await?;
    tracing::info!("quarryd stopped");
    Ok(())
}

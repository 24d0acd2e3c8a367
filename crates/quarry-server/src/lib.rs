//! # quarry-server
//!
//! Axum HTTP + `WebSocket` server for the Quarry orchestrator.
//!
//! - REST surface over the orchestrator facade (submit, list, cancel,
//!   pause, resume, resolve-human-request)
//! - `WebSocket` gateway: per-session queues, heartbeat, inbound control
//!   dispatch
//! - Event fan-out: runtime broadcast → serialized frames → every
//!   connected observer
//! - Health endpoint and graceful shutdown via `CancellationToken`

#![deny(unsafe_code)]

pub mod chat;
pub mod config;
pub mod health;
pub mod routes;
pub mod server;
pub mod shutdown;
pub mod websocket;

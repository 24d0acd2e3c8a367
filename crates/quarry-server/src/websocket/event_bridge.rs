//! Bridges the runtime's broadcast channel to connected sessions.
//!
//! One bridge task per server: it drains the orchestrator's
//! `tokio::sync::broadcast` receiver and fans each event out through the
//! [`SessionRegistry`]. A lagged receiver logs and keeps going — observers
//! simply miss those events (the surface is at-most-once by contract).

use std::sync::Arc;

use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::broadcast::SessionRegistry;
use quarry_core::events::ServerEvent;

/// Pump from the runtime broadcast into the session registry.
pub struct EventBridge {
    rx: broadcast::Receiver<ServerEvent>,
    sessions: Arc<SessionRegistry>,
    shutdown: CancellationToken,
}

impl EventBridge {
    /// Create a bridge over a subscription.
    #[must_use]
    pub fn new(
        rx: broadcast::Receiver<ServerEvent>,
        sessions: Arc<SessionRegistry>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            rx,
            sessions,
            shutdown,
        }
    }

    /// Run until the emitter is dropped or shutdown trips.
    #[tracing::instrument(skip_all, name = "event_bridge")]
    pub async fn run(mut self) {
        loop {
            tokio::select! {
                () = self.shutdown.cancelled() => {
                    info!("event bridge: shutdown");
                    break;
                }
                received = self.rx.recv() => match received {
                    Ok(event) => self.sessions.broadcast(&event).await,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "event bridge lagged; events missed");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        info!("event bridge: emitter closed");
                        break;
                    }
                },
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

//! Event fan-out to connected observer sessions.
//!
//! Every published event goes to every registered session, serialized
//! once and shared via `Arc`. Delivery into a session is `try_send` —
//! best-effort, at-most-once, no replay — so a stalled session never
//! blocks the others. Sessions that keep dropping frames past a lifetime
//! threshold are evicted.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use metrics::counter;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use super::connection::ClientSession;
use quarry_core::events::ServerEvent;
use quarry_core::ids::ClientId;

/// Lifetime frame drops after which a session is forcibly evicted.
const MAX_TOTAL_DROPS: u64 = 100;

/// Registry of connected sessions with fan-out.
pub struct SessionRegistry {
    sessions: RwLock<HashMap<ClientId, Arc<ClientSession>>>,
    /// Kept alongside the map so count queries skip the read lock.
    active_count: AtomicUsize,
}

impl SessionRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            active_count: AtomicUsize::new(0),
        }
    }

    /// Register a session.
    pub async fn add(&self, session: Arc<ClientSession>) {
        let mut sessions = self.sessions.write().await;
        if sessions.insert(session.id.clone(), session).is_none() {
            let _ = self.active_count.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Remove a session by ID (disconnect teardown).
    pub async fn remove(&self, id: &ClientId) {
        let mut sessions = self.sessions.write().await;
        if sessions.remove(id).is_some() {
            let _ = self.active_count.fetch_sub(1, Ordering::Relaxed);
        }
    }

    /// Publish an event to every connected session.
    pub async fn broadcast(&self, event: &ServerEvent) {
        let frame = match serde_json::to_string(event) {
            Ok(json) => Arc::new(json),
            Err(err) => {
                warn!(event_type = event.event_type(), error = %err, "failed to serialize event");
                return;
            }
        };

        let mut to_evict = Vec::new();
        {
            let sessions = self.sessions.read().await;
            for session in sessions.values() {
                if !session.send(Arc::clone(&frame)) {
                    counter!("ws_broadcast_drops_total").increment(1);
                    let drops = session.drop_count();
                    if drops >= MAX_TOTAL_DROPS {
                        warn!(client_id = %session.id, drops, "evicting persistently slow session");
                        to_evict.push(session.id.clone());
                    } else {
                        warn!(client_id = %session.id, drops, "frame dropped (session queue full)");
                    }
                }
            }
            debug!(
                event_type = event.event_type(),
                recipients = sessions.len(),
                "broadcast event"
            );
        }

        if !to_evict.is_empty() {
            let mut sessions = self.sessions.write().await;
            for id in &to_evict {
                if sessions.remove(id).is_some() {
                    let _ = self.active_count.fetch_sub(1, Ordering::Relaxed);
                }
            }
        }
    }

    /// Number of connected sessions.
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.active_count.load(Ordering::Relaxed)
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

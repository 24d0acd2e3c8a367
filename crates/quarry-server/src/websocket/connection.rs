//! Per-observer session state.
//!
//! A [`ClientSession`] owns nothing but its outbound queue and counters —
//! it references tasks and requests by ID only. The sequence counter is
//! per-session and diagnostic: it says how many frames this session was
//! handed, not anything about cross-session ordering.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::sync::mpsc;

use quarry_core::ids::ClientId;

/// One connected observer.
pub struct ClientSession {
    /// Unique session ID, assigned at upgrade.
    pub id: ClientId,
    /// Send side of the outbound queue; the write task drains it.
    tx: mpsc::Sender<Arc<String>>,
    /// When the session connected.
    pub connected_at: Instant,
    /// Frames enqueued to this session (diagnostics only).
    seq: AtomicU64,
    /// Frames dropped because the queue was full or closed.
    dropped: AtomicU64,
    /// Whether the client answered the last ping.
    alive: AtomicBool,
    /// Last pong (or connect) time.
    last_pong: Mutex<Instant>,
}

impl ClientSession {
    /// Create a session around an outbound queue.
    #[must_use]
    pub fn new(id: ClientId, tx: mpsc::Sender<Arc<String>>) -> Self {
        let now = Instant::now();
        Self {
            id,
            tx,
            connected_at: now,
            seq: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
            alive: AtomicBool::new(true),
            last_pong: Mutex::new(now),
        }
    }

    /// Enqueue a pre-serialized frame.
    ///
    /// Never blocks: a full or closed queue counts a drop and returns
    /// `false`, so one slow session cannot stall publication to others.
    pub fn send(&self, frame: Arc<String>) -> bool {
        let _ = self.seq.fetch_add(1, Ordering::Relaxed);
        if self.tx.try_send(frame).is_ok() {
            true
        } else {
            let _ = self.dropped.fetch_add(1, Ordering::Relaxed);
            false
        }
    }

    /// Frames handed to this session so far.
    #[must_use]
    pub fn seq(&self) -> u64 {
        self.seq.load(Ordering::Relaxed)
    }

    /// Lifetime count of dropped frames.
    #[must_use]
    pub fn drop_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Record a pong (or any sign of life).
    pub fn mark_alive(&self) {
        self.alive.store(true, Ordering::Relaxed);
        *self.last_pong.lock() = Instant::now();
    }

    /// Check and reset the liveness flag for the heartbeat loop.
    pub fn check_alive(&self) -> bool {
        self.alive.swap(false, Ordering::Relaxed)
    }

    /// Time since the last pong (or connect).
    #[must_use]
    pub fn last_pong_elapsed(&self) -> Duration {
        self.last_pong.lock().elapsed()
    }

    /// Session age.
    #[must_use]
    pub fn age(&self) -> Duration {
        self.connected_at.elapsed()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

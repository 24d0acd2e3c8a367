//! Health endpoint payload.

use serde::{Deserialize, Serialize};
use std::time::Instant;

use quarry_runtime::facade::TaskCounts;

/// Response body of `GET /health`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Always `"ok"` while the process is serving.
    pub status: String,
    /// Seconds since server start.
    pub uptime_secs: u64,
    /// Connected observer sessions.
    pub connections: usize,
    /// Task counts by lifecycle phase.
    pub tasks: HealthTaskCounts,
}

/// Task counts, flattened for the wire.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HealthTaskCounts {
    /// All records.
    pub total: usize,
    /// Queued.
    pub pending: usize,
    /// Actively running.
    pub running: usize,
    /// Suspended on an operator decision.
    pub waiting_for_human: usize,
    /// Parked.
    pub paused: usize,
}

/// Build a health snapshot.
#[must_use]
pub fn health_check(start_time: Instant, connections: usize, counts: TaskCounts) -> HealthResponse {
    HealthResponse {
        status: "ok".into(),
        uptime_secs: start_time.elapsed().as_secs(),
        connections,
        tasks: HealthTaskCounts {
            total: counts.total,
            pending: counts.pending,
            running: counts.running,
            waiting_for_human: counts.waiting_for_human,
            paused: counts.paused,
        },
    }
}

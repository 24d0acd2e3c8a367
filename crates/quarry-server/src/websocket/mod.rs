//! WebSocket layer: session lifecycle, heartbeat, inbound dispatch, and
//! event fan-out.
//!
//! | Module | Purpose |
//! |--------|---------|
//! | `connection` | Per-observer session state: outbound queue, sequence and drop counters, liveness |
//! | `broadcast` | Session registry and fan-out; evicts persistently slow sessions |
//! | `session` | One connection's lifetime: upgrade, hello, heartbeat, inbound dispatch, teardown |
//! | `event_bridge` | Runtime broadcast → serialized frames → registry fan-out |
//!
//! Data flow: orchestrator emitter → `event_bridge` → `broadcast` →
//! per-session queues. Inbound: `session` → cancel commands to the facade,
//! chat text to the [`crate::chat::ChatDelegate`].

pub mod broadcast;
pub mod connection;
pub mod event_bridge;
pub mod session;

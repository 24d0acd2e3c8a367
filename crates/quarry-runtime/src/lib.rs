//! # quarry-runtime
//!
//! The orchestration engine: task record store, cancellation controller,
//! human-in-loop gate, executor worker pool, and the facade external
//! callers go through.
//!
//! - **Store**: atomic read-modify-write over in-memory task records
//! - **Cancel**: one `CancellationToken` per task, set once, idempotent
//! - **Gate**: suspends a task on an operator decision, resolves it into a
//!   typed outcome
//! - **Executor**: bounded FIFO worker pool; cooperative cancellation and
//!   pause at step checkpoints; continuations parked as saved cursors
//! - **Facade**: submit / cancel / pause / resume / list / resolve
//!
//! Known limitation: no hard timeout is enforced on a running body step. A
//! badly behaved body stalls its pool slot until it yields at a checkpoint.

#![deny(unsafe_code)]

pub mod body;
pub mod cancel;
pub mod emitter;
pub mod executor;
pub mod facade;
pub mod gate;
pub mod store;

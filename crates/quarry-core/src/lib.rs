//! # quarry-core
//!
//! Foundation types, errors, branded IDs, and wire events for the Quarry
//! task orchestrator.
//!
//! This crate provides the shared vocabulary the other Quarry crates depend on:
//!
//! - **Branded IDs**: [`ids::TaskId`], [`ids::RequestId`], [`ids::MessageId`],
//!   [`ids::ClientId`] as newtypes
//! - **Tasks**: [`task::Task`] records with [`task::TaskStatus`] lifecycle and
//!   the `-1` error-progress sentinel
//! - **Human-in-loop**: [`human::HumanLoopRequest`] and the typed
//!   [`human::ResponseKind`] resolution protocol
//! - **Errors**: [`errors::QuarryError`] taxonomy via `thiserror`
//! - **Events**: [`events::ServerEvent`] outbound envelopes and
//!   [`events::ClientCommand`] inbound control messages
//! - **Logging**: [`logging::init_tracing`] bootstrap for the binary
//!
//! ## Crate Position
//!
//! Foundation crate. Depended on by all other quarry crates.

#![deny(unsafe_code)]

pub mod errors;
pub mod events;
pub mod human;
pub mod ids;
pub mod logging;
pub mod task;

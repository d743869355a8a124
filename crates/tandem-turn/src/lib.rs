//! Conversation turn orchestration.
//!
//! A turn takes one user message through persistence, optional memory
//! augmentation, at most one round of tool calls, and a final provider
//! response. [`TurnOrchestrator::run`] is infallible at the turn boundary:
//! whatever goes wrong below it, the caller gets a well-formed reply and the
//! transcript gets a well-formed assistant message.
//!
//! # Main types
//!
//! - [`TurnOrchestrator`] — Drives a turn against the provider router, tool
//!   registry, conversation store, and memory store.
//! - [`TurnRequest`] / [`TurnReply`] — Boundary types for one turn.
//! - [`DeliveryEvent`] — Events emitted by the streaming variant.

pub mod orchestrator;
pub mod streaming;

pub use orchestrator::{GenerationSettings, TurnOrchestrator, TurnReply, TurnRequest};
pub use streaming::DeliveryEvent;

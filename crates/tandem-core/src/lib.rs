//! Core types and error definitions for the Tandem conversation engine.
//!
//! This crate provides the foundational types shared across all Tandem crates:
//! the unified error enum, chat message representations, tool call shapes, and
//! the collaborator traits for conversation persistence and semantic memory.
//!
//! # Main types
//!
//! - [`TandemError`] — Unified error enum for all Tandem subsystems.
//! - [`TandemResult`] — Convenience alias for `Result<T, TandemError>`.
//! - [`Role`] — Message role (user, assistant, system, tool).
//! - [`ChatMessage`] — A single message within a conversation.
//! - [`ToolCall`] — An LLM-initiated tool invocation request.
//! - [`ConversationStore`] — Collaborator trait for message persistence.
//! - [`MemoryStore`] — Collaborator trait for semantic-similarity memory.

/// Chat message and role types.
pub mod message;

/// Semantic memory collaborator trait and reference implementations.
pub mod memory;

/// Conversation persistence collaborator trait and in-memory implementation.
pub mod store;

pub use message::{ChatMessage, Role, ToolCall};
pub use memory::{InMemoryMemoryStore, MemoryHit, MemoryStore, NullMemoryStore};
pub use store::{ConversationStore, InMemoryConversationStore};

/// Top-level error type for the Tandem engine.
///
/// Each variant corresponds to a failure class defined by the error taxonomy:
/// provider transport failures, configuration gaps, sandbox rejections,
/// timeouts, lookup misses, and the turn-boundary catch-all.
#[derive(Debug, thiserror::Error)]
pub enum TandemError {
    /// A network/auth/rate-limit failure from an LLM backend, wrapped so
    /// backend-specific error types never leak past the provider layer.
    #[error("Provider '{provider}' error: {message}")]
    Provider {
        /// Name of the backend that failed (e.g. "openai").
        provider: String,
        /// Human-readable cause.
        message: String,
    },

    /// A requested provider has no configured credentials, or configuration
    /// parsing/validation failed.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Static validation rejected a script tool before any code ran.
    #[error("Execution denied: {0}")]
    ExecutionDenied(String),

    /// A tool execution exceeded its time budget.
    #[error("ExecutionTimeout")]
    ExecutionTimeout,

    /// No tool with the requested name is visible to the caller.
    #[error("Tool '{0}' not found")]
    ToolNotFound(String),

    /// Catch-all for failures at the turn boundary.
    #[error("Orchestration error: {0}")]
    Orchestration(String),

    /// An error from a persistence or memory collaborator.
    #[error("Storage error: {0}")]
    Storage(String),

    /// An error from the delivery/gateway layer.
    #[error("Gateway error: {0}")]
    Gateway(String),

    /// A JSON serialization or deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A standard I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A convenience `Result` alias using [`TandemError`].
pub type TandemResult<T> = Result<T, TandemError>;

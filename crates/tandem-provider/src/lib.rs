//! Provider-agnostic LLM access for the Tandem conversation engine.
//!
//! Each provider (OpenAI-compatible, Anthropic) implements the
//! [`ProviderBackend`] trait; the [`ProviderRouter`] picks a backend from the
//! requested model name (`gpt-*` goes to OpenAI, `claude-*` to Anthropic,
//! anything else to the default). Transport and wire-format details never
//! leak past this crate: all failures surface as
//! `TandemError::Provider { provider, message }`.

pub mod backends;
pub mod config;
pub mod router;
pub mod types;

pub use backends::anthropic::AnthropicBackend;
pub use backends::openai::OpenAiBackend;
pub use backends::ProviderBackend;
pub use config::ProviderSettings;
pub use router::{ModelListing, ProviderRouter};
pub use types::{ChatRequest, ProviderResponse, StreamChunk, TokenUsage};

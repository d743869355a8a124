use serde::{Deserialize, Serialize};
use tandem_core::{ChatMessage, ToolCall};
use tandem_tools::ToolSpec;

/// Token usage reported by a provider for one call.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl TokenUsage {
    /// Accumulates another call's usage into this one. A turn can make more
    /// than one provider call; the reply reports the sum.
    pub fn accumulate(&mut self, other: &TokenUsage) {
        self.prompt_tokens += other.prompt_tokens;
        self.completion_tokens += other.completion_tokens;
        self.total_tokens += other.total_tokens;
    }
}

/// A completed (non-streaming) provider response.
#[derive(Debug, Clone)]
pub struct ProviderResponse {
    /// Assistant text content; may be empty when the model only calls tools.
    pub content: String,
    /// Tool invocations requested by the model, in the order it emitted them.
    pub tool_calls: Vec<ToolCall>,
    /// Usage for this single call.
    pub usage: TokenUsage,
    /// The model that actually served the request.
    pub model: String,
    /// Provider-reported finish reason, when one was given.
    pub finish_reason: Option<String>,
}

/// One unit of a streamed provider response.
#[derive(Debug, Clone)]
pub enum StreamChunk {
    /// A content delta. Providers may emit empty deltas; consumers decide
    /// whether to forward them.
    Delta(String),
    /// The stream finished normally.
    Done { usage: Option<TokenUsage> },
}

/// A provider-independent chat completion request.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    /// Full message history, oldest first. System messages are translated
    /// per provider convention.
    pub messages: Vec<ChatMessage>,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Tool specs to advertise; empty means tools are not offered.
    pub tools: Vec<ToolSpec>,
}

impl ChatRequest {
    /// Creates a request with the default generation settings.
    pub fn new(messages: Vec<ChatMessage>, model: impl Into<String>) -> Self {
        Self {
            messages,
            model: model.into(),
            temperature: 0.7,
            max_tokens: 1000,
            tools: Vec::new(),
        }
    }

    /// Advertises tool specs (builder style).
    pub fn with_tools(mut self, tools: Vec<ToolSpec>) -> Self {
        self.tools = tools;
        self
    }
}

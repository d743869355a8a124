use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// The role of the participant that authored a [`ChatMessage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// A human end-user.
    User,
    /// The AI assistant.
    Assistant,
    /// A system-level instruction or prompt.
    System,
    /// Output produced by a tool invocation.
    Tool,
}

/// A request from the LLM to invoke a specific tool.
///
/// Tool calls are produced only by provider responses, never synthesized by
/// the orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique identifier assigned by the LLM for this tool call.
    pub id: String,
    /// Name of the tool to invoke.
    pub name: String,
    /// JSON arguments to pass to the tool.
    pub arguments: serde_json::Value,
}

/// A single message within a conversation.
///
/// Messages are appended and never mutated, with one exception: the in-place
/// content update that finalizes a streamed assistant message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Unique identifier for this message.
    pub id: Uuid,
    /// The conversation this message belongs to.
    pub conversation_id: Uuid,
    /// The role of the message author.
    pub role: Role,
    /// The textual content of the message.
    pub content: String,
    /// Tool calls attached to an assistant message, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    /// For a `tool` message, the id of the call this message answers. Must
    /// match an id in the immediately preceding assistant message's
    /// `tool_calls`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    /// Arbitrary key-value metadata attached to the message.
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
    /// Completion token count reported by the provider, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_count: Option<u32>,
    /// The model that produced this message, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// UTC timestamp of when the message was created.
    pub created_at: DateTime<Utc>,
}

impl ChatMessage {
    /// Creates a new message with the given role, content, and conversation.
    pub fn new(role: Role, content: impl Into<String>, conversation_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            conversation_id,
            role,
            content: content.into(),
            tool_calls: None,
            tool_call_id: None,
            metadata: HashMap::new(),
            token_count: None,
            model: None,
            created_at: Utc::now(),
        }
    }

    /// Creates a new message with [`Role::User`].
    pub fn user(content: impl Into<String>, conversation_id: Uuid) -> Self {
        Self::new(Role::User, content, conversation_id)
    }

    /// Creates a new message with [`Role::Assistant`].
    pub fn assistant(content: impl Into<String>, conversation_id: Uuid) -> Self {
        Self::new(Role::Assistant, content, conversation_id)
    }

    /// Creates a new message with [`Role::System`].
    pub fn system(content: impl Into<String>, conversation_id: Uuid) -> Self {
        Self::new(Role::System, content, conversation_id)
    }

    /// Creates a `tool` message answering the given call id.
    pub fn tool(
        content: impl Into<String>,
        conversation_id: Uuid,
        tool_call_id: impl Into<String>,
    ) -> Self {
        let mut msg = Self::new(Role::Tool, content, conversation_id);
        msg.tool_call_id = Some(tool_call_id.into());
        msg
    }

    /// Attaches tool calls to this message (builder style).
    pub fn with_tool_calls(mut self, calls: Vec<ToolCall>) -> Self {
        self.tool_calls = Some(calls);
        self
    }

    /// Sets the model that produced this message (builder style).
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Sets the completion token count (builder style).
    pub fn with_token_count(mut self, count: u32) -> Self {
        self.token_count = Some(count);
        self
    }
}

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tandem_core::TandemResult;
use uuid::Uuid;

/// Metadata describing a tool's interface, advertised to the LLM.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSpec {
    /// Unique tool name within its scope.
    pub name: String,
    /// Human-readable description the LLM uses to decide when to call it.
    pub description: String,
    /// JSON Schema for the tool's parameters.
    pub parameters: serde_json::Value,
    /// Grouping category ("builtin", "custom", ...).
    pub category: String,
}

/// Structured result of a tool execution.
///
/// Serialized verbatim into the transcript as the content of a `tool`
/// message, so field order and omission of empty fields are part of the
/// wire shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolOutcome {
    /// Whether the execution succeeded.
    pub success: bool,
    /// The tool's return value, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    /// Captured stdout/stderr, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    /// Error description when `success` is false.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Wall-clock execution time. Observability only, not part of the
    /// serialized outcome.
    #[serde(skip)]
    pub duration_ms: u64,
}

impl ToolOutcome {
    /// Creates a successful outcome carrying a result value.
    pub fn success(result: serde_json::Value) -> Self {
        Self {
            success: true,
            result: Some(result),
            output: None,
            error: None,
            duration_ms: 0,
        }
    }

    /// Creates a failed outcome carrying an error description.
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            result: None,
            output: None,
            error: Some(error.into()),
            duration_ms: 0,
        }
    }

    /// Attaches captured output (builder style). Empty output is dropped.
    pub fn with_output(mut self, output: impl Into<String>) -> Self {
        let output = output.into();
        if !output.is_empty() {
            self.output = Some(output);
        }
        self
    }
}

/// Per-execution context: who is running the tool and under what budget.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    /// The user on whose behalf the tool runs; scopes custom tool lookup.
    pub user_id: String,
    /// The conversation the call originated from, if any.
    pub conversation_id: Option<Uuid>,
    /// Time budget for a single execution.
    pub timeout: Duration,
}

impl ExecutionContext {
    /// Creates a context with the default 30-second time budget.
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            conversation_id: None,
            timeout: Duration::from_secs(30),
        }
    }

    /// Sets the conversation id (builder style).
    pub fn with_conversation(mut self, conversation_id: Uuid) -> Self {
        self.conversation_id = Some(conversation_id);
        self
    }

    /// Sets the time budget (builder style).
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Trait that all tools implement, whether native, HTTP-backed, or scripted.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The tool's advertised interface.
    fn spec(&self) -> &ToolSpec;

    /// Runs the tool with the given parameters.
    ///
    /// Implementations report domain failures through a failed
    /// [`ToolOutcome`]; `Err` is reserved for infrastructure faults (spawn
    /// failures, transport errors) and is converted to a failure outcome by
    /// the registry.
    async fn run(
        &self,
        params: serde_json::Value,
        ctx: &ExecutionContext,
    ) -> TandemResult<ToolOutcome>;
}

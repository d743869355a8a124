use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tandem_core::{ChatMessage, ConversationStore, MemoryStore, TandemResult};
use tandem_provider::{ChatRequest, ProviderRouter, TokenUsage};
use tandem_tools::{ExecutionContext, ToolRegistry};
use tracing::{info, warn};
use uuid::Uuid;

/// Defaults applied when a request does not name a model.
#[derive(Debug, Clone)]
pub struct GenerationSettings {
    pub default_model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Time budget for each individual tool execution.
    pub tool_timeout: Duration,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            default_model: "gpt-4o-mini".to_string(),
            temperature: 0.7,
            max_tokens: 1000,
            tool_timeout: Duration::from_secs(30),
        }
    }
}

/// One user message plus the per-turn switches.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnRequest {
    pub conversation_id: Uuid,
    pub user_id: String,
    pub content: String,
    /// Model override; the orchestrator default applies when absent.
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub use_tools: bool,
    #[serde(default)]
    pub use_memory: bool,
}

/// The outcome of one turn. Always well-formed: a failed turn carries the
/// error text as its content and sets `error`.
#[derive(Debug, Clone, Serialize)]
pub struct TurnReply {
    pub conversation_id: Uuid,
    /// Id of the final assistant message, when one was persisted.
    pub message_id: Option<Uuid>,
    pub content: String,
    pub usage: TokenUsage,
    pub error: Option<String>,
}

const MEMORY_LIMIT: usize = 3;
const MEMORY_THRESHOLD: f32 = 0.7;

/// Drives conversation turns.
pub struct TurnOrchestrator {
    router: Arc<ProviderRouter>,
    tools: Arc<ToolRegistry>,
    store: Arc<dyn ConversationStore>,
    memory: Arc<dyn MemoryStore>,
    settings: GenerationSettings,
}

impl TurnOrchestrator {
    pub fn new(
        router: Arc<ProviderRouter>,
        tools: Arc<ToolRegistry>,
        store: Arc<dyn ConversationStore>,
        memory: Arc<dyn MemoryStore>,
    ) -> Self {
        Self {
            router,
            tools,
            store,
            memory,
            settings: GenerationSettings::default(),
        }
    }

    /// Overrides the generation defaults (builder style).
    pub fn with_settings(mut self, settings: GenerationSettings) -> Self {
        self.settings = settings;
        self
    }

    pub(crate) fn store(&self) -> &Arc<dyn ConversationStore> {
        &self.store
    }

    pub(crate) fn router(&self) -> &Arc<ProviderRouter> {
        &self.router
    }

    pub(crate) fn settings(&self) -> &GenerationSettings {
        &self.settings
    }

    pub(crate) fn model_for(&self, req: &TurnRequest) -> String {
        req.model
            .clone()
            .unwrap_or_else(|| self.settings.default_model.clone())
    }

    /// Runs one turn to completion.
    ///
    /// Never returns an error: any failure below the turn boundary is
    /// converted into a degraded reply, with the error text persisted as an
    /// assistant message so the transcript stays coherent.
    pub async fn run(&self, req: TurnRequest) -> TurnReply {
        match self.run_inner(&req).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!(conversation = %req.conversation_id, error = %e, "Turn failed");
                let content = format!("Error generating response: {e}");
                let message_id = match self
                    .store
                    .append_message(ChatMessage::assistant(&content, req.conversation_id))
                    .await
                {
                    Ok(id) => Some(id),
                    Err(persist_err) => {
                        warn!(error = %persist_err, "Could not persist turn error message");
                        None
                    }
                };
                TurnReply {
                    conversation_id: req.conversation_id,
                    message_id,
                    content,
                    usage: TokenUsage::default(),
                    error: Some(e.to_string()),
                }
            }
        }
    }

    async fn run_inner(&self, req: &TurnRequest) -> TandemResult<TurnReply> {
        let model = self.model_for(req);

        // The stored user message is always pristine; augmentation only
        // affects the copy sent to the provider.
        self.store
            .append_message(ChatMessage::user(&req.content, req.conversation_id))
            .await?;

        let mut history = self.store.list_messages(req.conversation_id).await?;
        if req.use_memory {
            if let Some(augmented) = self.augment(req).await {
                if let Some(last) = history.last_mut() {
                    last.content = augmented;
                }
            }
        }

        let tool_specs = if req.use_tools {
            self.tools.specs_for(&req.user_id).await
        } else {
            Vec::new()
        };

        let mut usage = TokenUsage::default();
        let first = self
            .router
            .generate(&self.request(history, &model).with_tools(tool_specs))
            .await?;
        usage.accumulate(&first.usage);

        // A single round of tool calls at most. With tools disabled, any
        // calls the provider returns anyway are ignored.
        let (message_id, content) = if req.use_tools && !first.tool_calls.is_empty() {
            info!(
                conversation = %req.conversation_id,
                calls = first.tool_calls.len(),
                "Executing tool round"
            );

            self.store
                .append_message(
                    ChatMessage::assistant(&first.content, req.conversation_id)
                        .with_tool_calls(first.tool_calls.clone())
                        .with_model(&model)
                        .with_token_count(first.usage.completion_tokens),
                )
                .await?;

            let ctx = ExecutionContext::new(&req.user_id)
                .with_conversation(req.conversation_id)
                .with_timeout(self.settings.tool_timeout);

            for call in &first.tool_calls {
                let outcome = self
                    .tools
                    .execute(&call.name, call.arguments.clone(), &ctx)
                    .await;
                self.store
                    .append_message(ChatMessage::tool(
                        serde_json::to_string(&outcome)?,
                        req.conversation_id,
                        &call.id,
                    ))
                    .await?;
            }

            // Second call sees the tool results but is not offered tools
            // again; the protocol is single-round.
            let history = self.store.list_messages(req.conversation_id).await?;
            let second = self.router.generate(&self.request(history, &model)).await?;
            usage.accumulate(&second.usage);

            let id = self
                .store
                .append_message(
                    ChatMessage::assistant(&second.content, req.conversation_id)
                        .with_model(&model)
                        .with_token_count(second.usage.completion_tokens),
                )
                .await?;
            (id, second.content)
        } else {
            let id = self
                .store
                .append_message(
                    ChatMessage::assistant(&first.content, req.conversation_id)
                        .with_model(&model)
                        .with_token_count(first.usage.completion_tokens),
                )
                .await?;
            (id, first.content)
        };

        if req.use_memory {
            self.spawn_memory_write(req, &content);
        }

        Ok(TurnReply {
            conversation_id: req.conversation_id,
            message_id: Some(message_id),
            content,
            usage,
            error: None,
        })
    }

    fn request(&self, messages: Vec<ChatMessage>, model: &str) -> ChatRequest {
        let mut request = ChatRequest::new(messages, model);
        request.temperature = self.settings.temperature;
        request.max_tokens = self.settings.max_tokens;
        request
    }

    /// Builds the augmented copy of the latest user content, or `None` when
    /// memory has nothing relevant. Retrieval failures degrade to an
    /// unaugmented prompt.
    pub(crate) async fn augment(&self, req: &TurnRequest) -> Option<String> {
        let hits = match self
            .memory
            .retrieve_relevant(
                &req.content,
                &req.user_id,
                MEMORY_LIMIT,
                MEMORY_THRESHOLD,
                Some(req.conversation_id),
            )
            .await
        {
            Ok(hits) => hits,
            Err(e) => {
                warn!(error = %e, "Memory retrieval failed; continuing without context");
                return None;
            }
        };

        if hits.is_empty() {
            return None;
        }

        let mut augmented = String::from("Relevant context from previous conversations:\n");
        for hit in &hits {
            augmented.push_str("- ");
            augmented.push_str(&hit.content);
            augmented.push('\n');
        }
        augmented.push_str("\nCurrent message: ");
        augmented.push_str(&req.content);
        Some(augmented)
    }

    /// Fire-and-forget memory write; failures are logged, never surfaced.
    pub(crate) fn spawn_memory_write(&self, req: &TurnRequest, reply_content: &str) {
        let memory = Arc::clone(&self.memory);
        let content = format!("User: {}\nAssistant: {}", req.content, reply_content);
        let user_id = req.user_id.clone();
        let conversation_id = req.conversation_id;
        tokio::spawn(async move {
            if let Err(e) = memory
                .store(&content, &user_id, "conversation", 0.5, Some(conversation_id))
                .await
            {
                warn!(error = %e, "Memory write failed");
            }
        });
    }
}

use crate::http::HttpTool;
use crate::script::ScriptTool;
use crate::tool::{ExecutionContext, Tool, ToolOutcome, ToolSpec};
use crate::validator;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tandem_core::{TandemError, TandemResult};
use tokio::sync::RwLock;
use tracing::{info, warn};

/// A user-submitted tool definition.
///
/// If `implementation` starts with `http://` or `https://` the tool proxies
/// to that endpoint; otherwise it is treated as Python source and validated
/// before acceptance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    /// JSON Schema for the tool's parameters.
    pub parameters: serde_json::Value,
    pub implementation: String,
    #[serde(default = "default_category")]
    pub category: String,
}

fn default_category() -> String {
    "custom".to_string()
}

/// Tool lookup and execution.
///
/// Built-ins are registered once at startup and shared by all users; custom
/// tools are scoped per user. Lookup checks built-ins first, then the
/// caller's own tools.
pub struct ToolRegistry {
    builtins: HashMap<String, Arc<dyn Tool>>,
    user_tools: RwLock<HashMap<String, HashMap<String, Arc<dyn Tool>>>>,
}

impl ToolRegistry {
    /// Creates an empty registry with no built-ins.
    pub fn new() -> Self {
        Self {
            builtins: HashMap::new(),
            user_tools: RwLock::new(HashMap::new()),
        }
    }

    /// Creates a registry preloaded with the standard built-in tools.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register_builtin(Arc::new(crate::builtins::CalculatorTool::new()));
        registry.register_builtin(Arc::new(crate::builtins::WebSearchTool::new()));
        registry.register_builtin(Arc::new(crate::builtins::TextAnalyzerTool::new()));
        registry
    }

    /// Registers a built-in tool. Only possible before the registry is shared.
    pub fn register_builtin(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.spec().name.clone();
        info!(tool = %name, "Registered builtin tool");
        self.builtins.insert(name, tool);
    }

    /// Defines a custom tool for a user.
    ///
    /// Script implementations are statically validated here; a rejected
    /// script never reaches a subprocess. Names must be unique across the
    /// built-ins and the user's own tools.
    pub async fn define_tool(
        &self,
        user_id: &str,
        definition: ToolDefinition,
    ) -> TandemResult<()> {
        if self.builtins.contains_key(&definition.name) {
            return Err(TandemError::Configuration(format!(
                "Tool '{}' already exists",
                definition.name
            )));
        }

        let spec = ToolSpec {
            name: definition.name.clone(),
            description: definition.description,
            parameters: definition.parameters,
            category: definition.category,
        };

        let tool: Arc<dyn Tool> = if validator::is_http_implementation(&definition.implementation) {
            Arc::new(HttpTool::new(spec, definition.implementation))
        } else {
            Arc::new(ScriptTool::new(spec, definition.implementation)?)
        };

        let mut user_tools = self.user_tools.write().await;
        let tools = user_tools.entry(user_id.to_string()).or_default();
        if tools.contains_key(&definition.name) {
            return Err(TandemError::Configuration(format!(
                "Tool '{}' already exists",
                definition.name
            )));
        }
        info!(tool = %definition.name, user = %user_id, "Defined custom tool");
        tools.insert(definition.name, tool);
        Ok(())
    }

    /// Lists the tool specs visible to a user: built-ins plus their own.
    pub async fn specs_for(&self, user_id: &str) -> Vec<ToolSpec> {
        let mut specs: Vec<ToolSpec> = self.builtins.values().map(|t| t.spec().clone()).collect();
        let user_tools = self.user_tools.read().await;
        if let Some(tools) = user_tools.get(user_id) {
            specs.extend(tools.values().map(|t| t.spec().clone()));
        }
        specs.sort_by(|a, b| a.name.cmp(&b.name));
        specs
    }

    async fn lookup(&self, name: &str, user_id: &str) -> Option<Arc<dyn Tool>> {
        if let Some(tool) = self.builtins.get(name) {
            return Some(Arc::clone(tool));
        }
        let user_tools = self.user_tools.read().await;
        user_tools.get(user_id)?.get(name).cloned()
    }

    /// Executes a tool by name.
    ///
    /// Never returns an error: an unknown name, an infrastructure fault, or
    /// a blown time budget all become failed outcomes so a turn can carry
    /// the result back to the LLM. The timed-out future is dropped, which
    /// kills any sandbox subprocess it spawned.
    pub async fn execute(
        &self,
        name: &str,
        params: serde_json::Value,
        ctx: &ExecutionContext,
    ) -> ToolOutcome {
        let started = Instant::now();

        let Some(tool) = self.lookup(name, &ctx.user_id).await else {
            let mut outcome = ToolOutcome::failure(format!("Tool '{name}' not found"));
            outcome.duration_ms = started.elapsed().as_millis() as u64;
            return outcome;
        };

        let mut outcome = match tokio::time::timeout(ctx.timeout, tool.run(params, ctx)).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(e)) => {
                warn!(tool = %name, error = %e, "Tool execution failed");
                ToolOutcome::failure(e.to_string())
            }
            Err(_) => {
                warn!(tool = %name, timeout_ms = ctx.timeout.as_millis() as u64, "Tool execution timed out");
                ToolOutcome::failure(TandemError::ExecutionTimeout.to_string())
            }
        };
        outcome.duration_ms = started.elapsed().as_millis() as u64;
        outcome
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

//! Tool registry and sandboxed execution for the Tandem conversation engine.
//!
//! Tools come in three flavors: native Rust built-ins (calculator, web search,
//! text analyzer), HTTP tools that proxy to an external endpoint, and script
//! tools that run user-supplied Python in an isolated subprocess. All three
//! implement the [`Tool`] trait and are dispatched through [`ToolRegistry`].
//!
//! # Main types
//!
//! - [`Tool`] — Trait implemented by every executable tool.
//! - [`ToolSpec`] — Name, description, and parameter schema advertised to the LLM.
//! - [`ToolOutcome`] — Structured execution result; never an `Err` at the registry boundary.
//! - [`ToolRegistry`] — Built-in plus per-user tool lookup and timeout-guarded execution.
//! - [`ScriptTool`] — Python subprocess sandbox with static pre-validation.
//! - [`HttpTool`] — Tool backed by an external HTTP endpoint.

pub mod builtins;
pub mod http;
pub mod registry;
pub mod script;
pub mod tool;
pub mod validator;

pub use builtins::{CalculatorTool, TextAnalyzerTool, WebSearchTool};
pub use http::HttpTool;
pub use registry::{ToolDefinition, ToolRegistry};
pub use script::ScriptTool;
pub use tool::{ExecutionContext, Tool, ToolOutcome, ToolSpec};

//! End-to-end tests for the Python script sandbox.
//!
//! These spawn real `python3` subprocesses and are skipped when no
//! interpreter is on the PATH.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;
use std::time::Duration;
use tandem_tools::{ExecutionContext, ScriptTool, Tool, ToolDefinition, ToolRegistry, ToolSpec};

fn python3_available() -> bool {
    std::process::Command::new("python3")
        .arg("--version")
        .output()
        .is_ok()
}

fn spec(name: &str) -> ToolSpec {
    ToolSpec {
        name: name.to_string(),
        description: "test".to_string(),
        parameters: serde_json::json!({"type": "object"}),
        category: "custom".to_string(),
    }
}

fn ctx() -> ExecutionContext {
    ExecutionContext::new("test-user")
}

#[tokio::test]
async fn explicit_result_variable_is_returned() {
    if !python3_available() {
        return;
    }
    let tool = ScriptTool::new(spec("double"), "result = x * 2").unwrap();
    let outcome = tool.run(serde_json::json!({"x": 21}), &ctx()).await.unwrap();
    assert!(outcome.success);
    assert_eq!(outcome.result, Some(serde_json::json!(42)));
}

#[tokio::test]
async fn new_locals_become_the_result_map() {
    if !python3_available() {
        return;
    }
    let tool = ScriptTool::new(spec("locals"), "total = a + b\n_scratch = 99").unwrap();
    let outcome = tool
        .run(serde_json::json!({"a": 1, "b": 2}), &ctx())
        .await
        .unwrap();
    assert!(outcome.success);
    let result = outcome.result.unwrap();
    assert_eq!(result["total"], 3);
    // Parameters and underscore-prefixed names are excluded.
    assert!(result.get("a").is_none());
    assert!(result.get("_scratch").is_none());
}

#[tokio::test]
async fn stdout_is_captured_as_output() {
    if !python3_available() {
        return;
    }
    let tool = ScriptTool::new(spec("printer"), "print('hello from sandbox')\nresult = 1").unwrap();
    let outcome = tool.run(serde_json::json!({}), &ctx()).await.unwrap();
    assert!(outcome.success);
    assert_eq!(outcome.output.as_deref(), Some("hello from sandbox\n"));
}

#[tokio::test]
async fn runtime_exceptions_become_failure_outcomes() {
    if !python3_available() {
        return;
    }
    let tool = ScriptTool::new(spec("boom"), "result = 1 / 0").unwrap();
    let outcome = tool.run(serde_json::json!({}), &ctx()).await.unwrap();
    assert!(!outcome.success);
    assert!(outcome.error.unwrap().starts_with("ZeroDivisionError:"));
}

#[tokio::test]
async fn allowlisted_import_works_at_runtime() {
    if !python3_available() {
        return;
    }
    let tool = ScriptTool::new(spec("sqrt"), "import math\nresult = math.sqrt(x)").unwrap();
    let outcome = tool.run(serde_json::json!({"x": 16}), &ctx()).await.unwrap();
    assert!(outcome.success);
    assert_eq!(outcome.result, Some(serde_json::json!(4.0)));
}

#[tokio::test]
async fn infinite_loop_is_killed_by_the_registry_timeout() {
    if !python3_available() {
        return;
    }
    let registry = ToolRegistry::with_builtins();
    registry
        .define_tool(
            "test-user",
            ToolDefinition {
                name: "spin".to_string(),
                description: "loops forever".to_string(),
                parameters: serde_json::json!({"type": "object"}),
                implementation: "while True:\n    pass".to_string(),
                category: "custom".to_string(),
            },
        )
        .await
        .unwrap();

    let ctx = ctx().with_timeout(Duration::from_millis(500));
    let outcome = registry.execute("spin", serde_json::json!({}), &ctx).await;
    assert!(!outcome.success);
    assert_eq!(outcome.error.as_deref(), Some("ExecutionTimeout"));
}

#[tokio::test]
async fn non_json_result_falls_back_to_repr() {
    if !python3_available() {
        return;
    }
    let tool = ScriptTool::new(spec("setval"), "result = {1, 2}").unwrap();
    let outcome = tool.run(serde_json::json!({}), &ctx()).await.unwrap();
    assert!(outcome.success);
    // Sets are not JSON-serializable; the harness falls back to repr().
    assert!(outcome.result.unwrap().as_str().unwrap().contains('{'));
}

#[tokio::test]
async fn shared_registry_executes_scripts_concurrently() {
    if !python3_available() {
        return;
    }
    let registry = Arc::new(ToolRegistry::with_builtins());
    registry
        .define_tool(
            "u1",
            ToolDefinition {
                name: "echo".to_string(),
                description: "echoes n".to_string(),
                parameters: serde_json::json!({"type": "object"}),
                implementation: "result = n".to_string(),
                category: "custom".to_string(),
            },
        )
        .await
        .unwrap();

    let mut handles = Vec::new();
    for n in 0..4 {
        let registry = Arc::clone(&registry);
        handles.push(tokio::spawn(async move {
            registry
                .execute(
                    "echo",
                    serde_json::json!({"n": n}),
                    &ExecutionContext::new("u1"),
                )
                .await
        }));
    }
    for (n, handle) in handles.into_iter().enumerate() {
        let outcome = handle.await.unwrap();
        assert!(outcome.success);
        assert_eq!(outcome.result, Some(serde_json::json!(n)));
    }
}

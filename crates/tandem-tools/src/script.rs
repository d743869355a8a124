//! Python script tool running in an isolated subprocess.
//!
//! The subprocess is the isolation boundary: scripts run under `python3 -I`
//! (isolated mode, no site packages, no user site) inside a fixed harness
//! that strips the builtin namespace down to an enumerated safe set and
//! guards `__import__` with the same allowlist as static validation. The
//! registry wraps every run in a timeout, and `kill_on_drop` ensures the
//! interpreter dies with the timed-out future.

use crate::tool::{ExecutionContext, Tool, ToolOutcome, ToolSpec};
use crate::validator;
use async_trait::async_trait;
use serde::Deserialize;
use std::process::Stdio;
use tandem_core::{TandemError, TandemResult};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

/// Harness executed by `python3 -I -c`. Reads `{"code": ..., "params": ...}`
/// from stdin and prints a single JSON report line to stdout.
const HARNESS: &str = r#"
import sys, json, builtins, contextlib, io

ALLOWED = {
    'json', 'math', 'datetime', 'random', 'string', 're', 'collections',
    'itertools', 'functools', 'operator', 'statistics', 'base64', 'hashlib',
    'uuid', 'urllib',
}

_real_import = builtins.__import__

def guarded_import(name, globals=None, locals=None, fromlist=(), level=0):
    if name.split('.')[0] not in ALLOWED:
        raise ImportError("import of '" + name + "' is not allowed")
    return _real_import(name, globals, locals, fromlist, level)

SAFE_NAMES = (
    'len', 'str', 'int', 'float', 'bool', 'list', 'dict', 'tuple', 'set',
    'range', 'enumerate', 'zip', 'map', 'filter', 'sorted', 'reversed',
    'sum', 'min', 'max', 'abs', 'round', 'divmod', 'pow', 'type',
    'isinstance', 'issubclass', 'repr', 'print', 'hasattr', 'getattr',
    'iter', 'next', 'all', 'any', 'chr', 'ord', 'hex', 'oct', 'bin',
    'format', 'slice', 'frozenset', 'bytes', 'bytearray',
    'Exception', 'ValueError', 'TypeError', 'KeyError', 'IndexError',
    'AttributeError', 'ZeroDivisionError', 'StopIteration', 'ArithmeticError',
    'RuntimeError', 'NotImplementedError', 'ImportError',
)
SAFE_BUILTINS = {name: getattr(builtins, name) for name in SAFE_NAMES}
SAFE_BUILTINS['__import__'] = guarded_import

payload = json.load(sys.stdin)
code = payload['code']
params = payload.get('params') or {}

env = dict(params)
captured = io.StringIO()
report = {'ok': True, 'result': None, 'output': '', 'error': None}

try:
    with contextlib.redirect_stdout(captured), contextlib.redirect_stderr(captured):
        exec(code, {'__builtins__': SAFE_BUILTINS}, env)
    result = env.get('result')
    if result is None:
        result = {
            k: v for k, v in env.items()
            if k not in params and not k.startswith('_')
        }
    try:
        json.dumps(result)
    except (TypeError, ValueError):
        result = repr(result)
    report['result'] = result
except Exception as e:
    report['ok'] = False
    report['error'] = type(e).__name__ + ': ' + str(e)

report['output'] = captured.getvalue()
print(json.dumps(report))
"#;

#[derive(Deserialize)]
struct HarnessReport {
    ok: bool,
    result: Option<serde_json::Value>,
    output: Option<String>,
    error: Option<String>,
}

/// A user-defined tool whose implementation is a Python snippet.
///
/// Parameters are bound as local variables; the snippet either assigns
/// `result` or leaves new non-underscore locals behind, which become the
/// result map.
#[derive(Debug)]
pub struct ScriptTool {
    spec: ToolSpec,
    code: String,
}

impl ScriptTool {
    /// Creates a script tool, statically validating the code first.
    pub fn new(spec: ToolSpec, code: impl Into<String>) -> TandemResult<Self> {
        let code = code.into();
        validator::validate_script(&code)?;
        Ok(Self { spec, code })
    }
}

#[async_trait]
impl Tool for ScriptTool {
    fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    async fn run(
        &self,
        params: serde_json::Value,
        _ctx: &ExecutionContext,
    ) -> TandemResult<ToolOutcome> {
        debug!(tool = %self.spec.name, "Spawning script sandbox");

        let mut child = Command::new("python3")
            .arg("-I")
            .arg("-c")
            .arg(HARNESS)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let payload = serde_json::to_vec(&serde_json::json!({
            "code": self.code,
            "params": params,
        }))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(&payload).await?;
            // Closing stdin lets json.load see EOF.
        }

        let output = child.wait_with_output().await?;
        let stdout = String::from_utf8_lossy(&output.stdout);

        let report: HarnessReport = serde_json::from_str(stdout.trim()).map_err(|_| {
            TandemError::Orchestration(format!(
                "Script harness produced no report: {}",
                String::from_utf8_lossy(&output.stderr)
            ))
        })?;

        let outcome = if report.ok {
            ToolOutcome::success(report.result.unwrap_or(serde_json::Value::Null))
        } else {
            ToolOutcome::failure(report.error.unwrap_or_else(|| "unknown error".to_string()))
        };
        Ok(outcome.with_output(report.output.unwrap_or_default()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn spec(name: &str) -> ToolSpec {
        ToolSpec {
            name: name.to_string(),
            description: "test".to_string(),
            parameters: serde_json::json!({"type": "object"}),
            category: "custom".to_string(),
        }
    }

    #[test]
    fn creation_rejects_denied_code() {
        let err = ScriptTool::new(spec("bad"), "open('/etc/passwd')").unwrap_err();
        assert!(matches!(err, TandemError::ExecutionDenied(_)));
    }

    #[test]
    fn creation_accepts_valid_code() {
        assert!(ScriptTool::new(spec("ok"), "result = x + 1").is_ok());
    }
}

//! Static validation of script tool implementations.
//!
//! Validation runs once at definition time and rejects code that reaches for
//! interpreter escape hatches. The real isolation boundary is the subprocess
//! in [`crate::script`]; this pass exists to fail fast with a useful message
//! instead of at first execution.

use regex::Regex;
use std::sync::LazyLock;
use tandem_core::{TandemError, TandemResult};

/// Import roots a script is allowed to use.
pub const ALLOWED_IMPORTS: &[&str] = &[
    "json",
    "math",
    "datetime",
    "random",
    "string",
    "re",
    "collections",
    "itertools",
    "functools",
    "operator",
    "statistics",
    "base64",
    "hashlib",
    "uuid",
    "urllib",
];

static DENIED_CALL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(eval|exec|compile|open|__import__|input|breakpoint)\s*\(")
        .expect("valid regex")
});

static DUNDER_ATTR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\.\s*__\w+__").expect("valid regex"));

static IMPORT_STMT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*import\s+(.+)$").expect("valid regex"));

static FROM_IMPORT_STMT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*from\s+([A-Za-z_][\w.]*)\s+import\b").expect("valid regex"));

/// Whether an implementation string designates an HTTP tool rather than a
/// script. HTTP implementations skip script validation entirely.
pub fn is_http_implementation(implementation: &str) -> bool {
    implementation.starts_with("http://") || implementation.starts_with("https://")
}

fn import_root(module: &str) -> &str {
    module.split('.').next().unwrap_or(module)
}

fn check_import(module: &str) -> TandemResult<()> {
    let root = import_root(module);
    if ALLOWED_IMPORTS.contains(&root) {
        Ok(())
    } else {
        Err(TandemError::ExecutionDenied(format!(
            "import of '{module}' is not allowed"
        )))
    }
}

/// Validates a script implementation, returning `ExecutionDenied` for code
/// that calls restricted builtins, touches dunder attributes, or imports
/// outside the allowlist.
pub fn validate_script(code: &str) -> TandemResult<()> {
    if let Some(m) = DENIED_CALL.find(code) {
        return Err(TandemError::ExecutionDenied(format!(
            "call to restricted builtin '{}'",
            m.as_str().trim_end_matches(['(', ' ', '\t'])
        )));
    }

    if let Some(m) = DUNDER_ATTR.find(code) {
        return Err(TandemError::ExecutionDenied(format!(
            "dunder attribute access '{}'",
            m.as_str()
        )));
    }

    for caps in IMPORT_STMT.captures_iter(code) {
        // "import a, b as c" lists several modules on one line.
        for part in caps[1].split(',') {
            let module = part.trim().split_whitespace().next().unwrap_or("");
            if !module.is_empty() {
                check_import(module)?;
            }
        }
    }

    for caps in FROM_IMPORT_STMT.captures_iter(code) {
        check_import(&caps[1])?;
    }

    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn allows_plain_arithmetic() {
        assert!(validate_script("result = x * 2").is_ok());
    }

    #[test]
    fn allows_allowlisted_imports() {
        assert!(validate_script("import math\nresult = math.sqrt(x)").is_ok());
        assert!(validate_script("from urllib.parse import quote\nresult = quote(s)").is_ok());
        assert!(validate_script("import json, re\nresult = 1").is_ok());
    }

    #[test]
    fn denies_restricted_calls() {
        for code in [
            "eval('1+1')",
            "exec(payload)",
            "compile(src, '<s>', 'exec')",
            "open('/etc/passwd')",
            "__import__('os')",
            "input()",
            "breakpoint()",
        ] {
            let err = validate_script(code).unwrap_err();
            assert!(matches!(err, TandemError::ExecutionDenied(_)), "{code}");
        }
    }

    #[test]
    fn denies_dunder_attribute_access() {
        let err = validate_script("x.__class__.__bases__").unwrap_err();
        assert!(matches!(err, TandemError::ExecutionDenied(_)));
    }

    #[test]
    fn denies_disallowed_imports() {
        assert!(validate_script("import os").is_err());
        assert!(validate_script("import socket\nresult = 1").is_err());
        assert!(validate_script("from subprocess import run").is_err());
        assert!(validate_script("import json, os").is_err());
    }

    #[test]
    fn evaluate_as_identifier_is_not_a_denied_call() {
        // Only the exact builtin names are denied, not substrings.
        assert!(validate_script("result = evaluate(x)").is_ok());
    }

    #[test]
    fn classifies_http_implementations() {
        assert!(is_http_implementation("https://api.example.com/run"));
        assert!(is_http_implementation("http://internal/run"));
        assert!(!is_http_implementation("result = 1"));
    }
}

use crate::tool::{ExecutionContext, Tool, ToolOutcome, ToolSpec};
use async_trait::async_trait;
use tandem_core::TandemResult;
use tracing::debug;

/// A tool backed by an external HTTP endpoint.
///
/// GET requests carry the parameters as a query string; any other method
/// sends them as a JSON body. A response is a success when the status is
/// below 400; JSON bodies are parsed, everything else is returned as text.
pub struct HttpTool {
    spec: ToolSpec,
    endpoint: String,
    method: reqwest::Method,
    client: reqwest::Client,
}

impl HttpTool {
    /// Creates an HTTP tool posting to the given endpoint.
    pub fn new(spec: ToolSpec, endpoint: impl Into<String>) -> Self {
        Self::with_method(spec, endpoint, reqwest::Method::POST)
    }

    /// Creates an HTTP tool using an explicit method.
    pub fn with_method(
        spec: ToolSpec,
        endpoint: impl Into<String>,
        method: reqwest::Method,
    ) -> Self {
        Self {
            spec,
            endpoint: endpoint.into(),
            method,
            client: reqwest::Client::new(),
        }
    }
}

fn query_pairs(params: &serde_json::Value) -> Vec<(String, String)> {
    let Some(map) = params.as_object() else {
        return Vec::new();
    };
    map.iter()
        .map(|(k, v)| {
            let value = match v {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            (k.clone(), value)
        })
        .collect()
}

#[async_trait]
impl Tool for HttpTool {
    fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    async fn run(
        &self,
        params: serde_json::Value,
        ctx: &ExecutionContext,
    ) -> TandemResult<ToolOutcome> {
        debug!(tool = %self.spec.name, endpoint = %self.endpoint, "HTTP tool call");

        let mut request = self
            .client
            .request(self.method.clone(), &self.endpoint)
            .timeout(ctx.timeout);

        if self.method == reqwest::Method::GET {
            request = request.query(&query_pairs(&params));
        } else {
            request = request.json(&params);
        }

        let response = match request.send().await {
            Ok(r) => r,
            Err(e) => {
                return Ok(ToolOutcome::failure(format!("HTTP request failed: {e}")));
            }
        };

        let status = response.status();
        let body_text = response.text().await.unwrap_or_default();
        let body: serde_json::Value = serde_json::from_str(&body_text)
            .unwrap_or(serde_json::Value::String(body_text));

        if status.as_u16() < 400 {
            Ok(ToolOutcome::success(body))
        } else {
            let mut outcome = ToolOutcome::failure(format!("HTTP {status}"));
            outcome.result = Some(body);
            Ok(outcome)
        }
    }
}

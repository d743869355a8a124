use super::ProviderBackend;
use crate::types::{ChatRequest, ProviderResponse, StreamChunk, TokenUsage};
use async_trait::async_trait;
use futures_util::StreamExt;
use tandem_core::{Role, TandemError, TandemResult, ToolCall};
use tandem_tools::ToolSpec;
use tokio::sync::mpsc;

const DEFAULT_BASE_URL: &str = "https://api.openai.com";

fn provider_error(message: impl Into<String>) -> TandemError {
    TandemError::Provider {
        provider: "openai".to_string(),
        message: message.into(),
    }
}

/// OpenAI-compatible chat completions backend.
///
/// Works with OpenAI and any service implementing the same API. Assistant
/// tool calls and `tool` role messages are forwarded natively.
pub struct OpenAiBackend {
    api_key: String,
    base_url: String,
    http: reqwest::Client,
}

impl OpenAiBackend {
    pub fn new(api_key: impl Into<String>, base_url: Option<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            http: reqwest::Client::new(),
        }
    }

    fn build_messages(&self, request: &ChatRequest) -> Vec<serde_json::Value> {
        request
            .messages
            .iter()
            .map(|m| match m.role {
                Role::Tool => serde_json::json!({
                    "role": "tool",
                    "tool_call_id": m.tool_call_id,
                    "content": m.content,
                }),
                Role::Assistant if m.tool_calls.is_some() => {
                    let calls: Vec<serde_json::Value> = m
                        .tool_calls
                        .iter()
                        .flatten()
                        .map(|tc| {
                            serde_json::json!({
                                "id": tc.id,
                                "type": "function",
                                "function": {
                                    "name": tc.name,
                                    "arguments": tc.arguments.to_string(),
                                }
                            })
                        })
                        .collect();
                    serde_json::json!({
                        "role": "assistant",
                        "content": m.content,
                        "tool_calls": calls,
                    })
                }
                role => serde_json::json!({
                    "role": match role {
                        Role::User => "user",
                        Role::Assistant => "assistant",
                        Role::System => "system",
                        Role::Tool => unreachable!(),
                    },
                    "content": m.content,
                }),
            })
            .collect()
    }

    fn build_tools(tools: &[ToolSpec]) -> Vec<serde_json::Value> {
        tools
            .iter()
            .map(|t| {
                serde_json::json!({
                    "type": "function",
                    "function": {
                        "name": t.name,
                        "description": t.description,
                        "parameters": t.parameters,
                    }
                })
            })
            .collect()
    }

    fn build_body(&self, request: &ChatRequest, stream: bool) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": request.model,
            "temperature": request.temperature,
            "max_tokens": request.max_tokens,
            "messages": self.build_messages(request),
        });
        if !request.tools.is_empty() {
            body["tools"] = serde_json::json!(Self::build_tools(&request.tools));
        }
        if stream {
            body["stream"] = serde_json::json!(true);
        }
        body
    }
}

#[async_trait]
impl ProviderBackend for OpenAiBackend {
    fn name(&self) -> &str {
        "openai"
    }

    fn available_models(&self) -> Vec<String> {
        ["gpt-4o", "gpt-4o-mini", "gpt-4-turbo", "gpt-4", "gpt-3.5-turbo"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    async fn generate(&self, request: &ChatRequest) -> TandemResult<ProviderResponse> {
        let url = format!("{}/v1/chat/completions", self.base_url);

        let resp = self
            .http
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&self.build_body(request, false))
            .send()
            .await
            .map_err(|e| provider_error(e.to_string()))?;

        let status = resp.status();
        let body: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| provider_error(e.to_string()))?;

        if !status.is_success() {
            return Err(provider_error(format!("API error {status}: {body}")));
        }

        parse_response(&body)
    }

    async fn stream(
        &self,
        request: &ChatRequest,
    ) -> TandemResult<mpsc::Receiver<TandemResult<StreamChunk>>> {
        let url = format!("{}/v1/chat/completions", self.base_url);

        let resp = self
            .http
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&self.build_body(request, true))
            .send()
            .await
            .map_err(|e| provider_error(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let error_body = resp
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(provider_error(format!("API error {status}: {error_body}")));
        }

        let (tx, rx) = mpsc::channel::<TandemResult<StreamChunk>>(256);
        let byte_stream = resp.bytes_stream();

        tokio::spawn(async move {
            let mut stream = byte_stream;
            let mut buffer = String::new();
            let mut usage: Option<TokenUsage> = None;
            let mut done_sent = false;

            while let Some(chunk_result) = stream.next().await {
                let chunk = match chunk_result {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        let _ = tx
                            .send(Err(provider_error(format!("Stream read error: {e}"))))
                            .await;
                        return;
                    }
                };

                buffer.push_str(&String::from_utf8_lossy(&chunk));

                while let Some(line_end) = buffer.find('\n') {
                    let line = buffer[..line_end].trim().to_string();
                    buffer = buffer[line_end + 1..].to_string();

                    if line.is_empty() || line.starts_with(':') {
                        continue;
                    }

                    if let Some(data) = line.strip_prefix("data: ") {
                        if data == "[DONE]" {
                            if !done_sent {
                                done_sent = true;
                                let _ = tx.send(Ok(StreamChunk::Done { usage })).await;
                            }
                            continue;
                        }

                        let event: serde_json::Value = match serde_json::from_str(data) {
                            Ok(v) => v,
                            Err(_) => continue,
                        };

                        if let Some(u) = parse_usage(&event["usage"]) {
                            usage = Some(u);
                        }

                        let choice = &event["choices"][0];

                        if choice["finish_reason"].as_str().is_some() {
                            if !done_sent {
                                done_sent = true;
                                let _ = tx.send(Ok(StreamChunk::Done { usage })).await;
                            }
                            continue;
                        }

                        if let Some(content) = choice["delta"]["content"].as_str() {
                            let _ = tx
                                .send(Ok(StreamChunk::Delta(content.to_string())))
                                .await;
                        }
                    }
                }
            }

            if !done_sent {
                let _ = tx.send(Ok(StreamChunk::Done { usage })).await;
            }
        });

        Ok(rx)
    }
}

fn parse_usage(value: &serde_json::Value) -> Option<TokenUsage> {
    value.as_object().map(|u| TokenUsage {
        prompt_tokens: u.get("prompt_tokens").and_then(|v| v.as_u64()).unwrap_or(0) as u32,
        completion_tokens: u
            .get("completion_tokens")
            .and_then(|v| v.as_u64())
            .unwrap_or(0) as u32,
        total_tokens: u.get("total_tokens").and_then(|v| v.as_u64()).unwrap_or(0) as u32,
    })
}

fn parse_response(body: &serde_json::Value) -> TandemResult<ProviderResponse> {
    let choice = &body["choices"][0];
    let message = &choice["message"];
    let content = message["content"].as_str().unwrap_or_default().to_string();

    let tool_calls: Vec<ToolCall> = message["tool_calls"]
        .as_array()
        .map(|calls| {
            calls
                .iter()
                .filter_map(|tc| {
                    let id = tc["id"].as_str()?.to_string();
                    let name = tc["function"]["name"].as_str()?.to_string();
                    let arguments: serde_json::Value =
                        serde_json::from_str(tc["function"]["arguments"].as_str()?)
                            .unwrap_or_default();
                    Some(ToolCall { id, name, arguments })
                })
                .collect()
        })
        .unwrap_or_default();

    Ok(ProviderResponse {
        content,
        tool_calls,
        usage: parse_usage(&body["usage"]).unwrap_or_default(),
        model: body["model"].as_str().unwrap_or_default().to_string(),
        finish_reason: body["choices"][0]["finish_reason"]
            .as_str()
            .map(ToString::to_string),
    })
}

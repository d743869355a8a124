use super::ProviderBackend;
use crate::types::{ChatRequest, ProviderResponse, StreamChunk, TokenUsage};
use async_trait::async_trait;
use futures_util::StreamExt;
use serde::Serialize;
use tandem_core::{Role, TandemError, TandemResult, ToolCall};
use tokio::sync::mpsc;

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const API_VERSION: &str = "2023-06-01";

fn provider_error(message: impl Into<String>) -> TandemError {
    TandemError::Provider {
        provider: "anthropic".to_string(),
        message: message.into(),
    }
}

/// Anthropic messages API backend.
///
/// The system message moves to the dedicated `system` slot and `tool` role
/// messages are mapped to `user`, since the messages API accepts only
/// user/assistant roles in the history.
pub struct AnthropicBackend {
    api_key: String,
    base_url: String,
    http: reqwest::Client,
}

impl AnthropicBackend {
    pub fn new(api_key: impl Into<String>, base_url: Option<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            http: reqwest::Client::new(),
        }
    }

    fn build_body(&self, request: &ChatRequest, stream: bool) -> serde_json::Value {
        let system: Vec<&str> = request
            .messages
            .iter()
            .filter(|m| m.role == Role::System)
            .map(|m| m.content.as_str())
            .collect();

        let api_messages: Vec<WireMessage> = request
            .messages
            .iter()
            .filter(|m| m.role != Role::System)
            .map(|m| WireMessage {
                role: match m.role {
                    Role::User | Role::Tool => "user",
                    Role::Assistant => "assistant",
                    Role::System => unreachable!(),
                },
                content: m.content.clone(),
            })
            .collect();

        let mut body = serde_json::json!({
            "model": request.model,
            "temperature": request.temperature,
            "max_tokens": request.max_tokens,
            "messages": api_messages,
        });

        if !system.is_empty() {
            body["system"] = serde_json::json!(system.join("\n\n"));
        }

        if !request.tools.is_empty() {
            let tools: Vec<serde_json::Value> = request
                .tools
                .iter()
                .map(|t| {
                    serde_json::json!({
                        "name": t.name,
                        "description": t.description,
                        "input_schema": t.parameters,
                    })
                })
                .collect();
            body["tools"] = serde_json::json!(tools);
        }

        if stream {
            body["stream"] = serde_json::json!(true);
        }

        body
    }

    fn request(&self, url: &str) -> reqwest::RequestBuilder {
        self.http
            .post(url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
    }
}

#[async_trait]
impl ProviderBackend for AnthropicBackend {
    fn name(&self) -> &str {
        "anthropic"
    }

    fn available_models(&self) -> Vec<String> {
        [
            "claude-3-5-sonnet-20241022",
            "claude-3-5-haiku-20241022",
            "claude-3-opus-20240229",
            "claude-3-haiku-20240307",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect()
    }

    async fn generate(&self, request: &ChatRequest) -> TandemResult<ProviderResponse> {
        let url = format!("{}/v1/messages", self.base_url);

        let resp = self
            .request(&url)
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
        let url = format!("{}/v1/messages", self.base_url);

        let resp = self
            .request(&url)
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
            let mut usage = TokenUsage::default();
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

                    let Some(data) = line.strip_prefix("data: ") else {
                        continue;
                    };
                    let event: serde_json::Value = match serde_json::from_str(data) {
                        Ok(v) => v,
                        Err(_) => continue,
                    };

                    match event["type"].as_str().unwrap_or("") {
                        "message_start" => {
                            if let Some(input) =
                                event["message"]["usage"]["input_tokens"].as_u64()
                            {
                                usage.prompt_tokens = input as u32;
                            }
                        }
                        "content_block_delta" => {
                            if event["delta"]["type"].as_str() == Some("text_delta") {
                                if let Some(text) = event["delta"]["text"].as_str() {
                                    let _ = tx
                                        .send(Ok(StreamChunk::Delta(text.to_string())))
                                        .await;
                                }
                            }
                        }
                        "message_delta" => {
                            if let Some(output) = event["usage"]["output_tokens"].as_u64() {
                                usage.completion_tokens = output as u32;
                            }
                        }
                        "message_stop" => {
                            if !done_sent {
                                done_sent = true;
                                usage.total_tokens =
                                    usage.prompt_tokens + usage.completion_tokens;
                                let _ = tx
                                    .send(Ok(StreamChunk::Done { usage: Some(usage) }))
                                    .await;
                            }
                        }
                        _ => {}
                    }
                }
            }

            if !done_sent {
                usage.total_tokens = usage.prompt_tokens + usage.completion_tokens;
                let _ = tx.send(Ok(StreamChunk::Done { usage: Some(usage) })).await;
            }
        });

        Ok(rx)
    }
}

#[derive(Serialize)]
struct WireMessage {
    role: &'static str,
    content: String,
}

fn parse_response(body: &serde_json::Value) -> TandemResult<ProviderResponse> {
    let content = body["content"]
        .as_array()
        .ok_or_else(|| provider_error("Missing content in response"))?;

    let mut text_parts = Vec::new();
    let mut tool_calls = Vec::new();

    for block in content {
        match block["type"].as_str() {
            Some("text") => {
                if let Some(t) = block["text"].as_str() {
                    text_parts.push(t.to_string());
                }
            }
            Some("tool_use") => {
                tool_calls.push(ToolCall {
                    id: block["id"].as_str().unwrap_or_default().to_string(),
                    name: block["name"].as_str().unwrap_or_default().to_string(),
                    arguments: block["input"].clone(),
                });
            }
            _ => {}
        }
    }

    let prompt_tokens = body["usage"]["input_tokens"].as_u64().unwrap_or(0) as u32;
    let completion_tokens = body["usage"]["output_tokens"].as_u64().unwrap_or(0) as u32;

    Ok(ProviderResponse {
        content: text_parts.join("\n"),
        tool_calls,
        usage: TokenUsage {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        },
        model: body["model"].as_str().unwrap_or_default().to_string(),
        finish_reason: body["stop_reason"].as_str().map(ToString::to_string),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use tandem_core::ChatMessage;
    use uuid::Uuid;

    #[test]
    fn system_message_moves_to_the_system_slot() {
        let backend = AnthropicBackend::new("test-key", None);
        let cid = Uuid::new_v4();
        let request = ChatRequest::new(
            vec![
                ChatMessage::system("You are terse.", cid),
                ChatMessage::user("hi", cid),
            ],
            "claude-3-5-haiku-20241022",
        );

        let body = backend.build_body(&request, false);
        assert_eq!(body["system"], "You are terse.");
        let messages = body["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0]["role"], "user");
    }

    #[test]
    fn tool_role_maps_to_user() {
        let backend = AnthropicBackend::new("test-key", None);
        let cid = Uuid::new_v4();
        let request = ChatRequest::new(
            vec![ChatMessage::tool(r#"{"success":true,"result":100}"#, cid, "c1")],
            "claude-3-5-haiku-20241022",
        );

        let body = backend.build_body(&request, false);
        assert_eq!(body["messages"][0]["role"], "user");
    }

    #[test]
    fn parses_tool_use_blocks() {
        let body = serde_json::json!({
            "model": "claude-3-5-haiku-20241022",
            "content": [
                {"type": "text", "text": "Let me calculate."},
                {"type": "tool_use", "id": "c1", "name": "calculator",
                 "input": {"expression": "25*4"}}
            ],
            "stop_reason": "tool_use",
            "usage": {"input_tokens": 30, "output_tokens": 12}
        });

        let response = parse_response(&body).unwrap();
        assert_eq!(response.content, "Let me calculate.");
        assert_eq!(response.tool_calls[0].id, "c1");
        assert_eq!(
            response.tool_calls[0].arguments,
            serde_json::json!({"expression": "25*4"})
        );
        assert_eq!(response.usage.total_tokens, 42);
    }
}

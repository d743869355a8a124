//! Wire-level provider tests against mock HTTP servers.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;
use tandem_core::{ChatMessage, TandemError};
use tandem_provider::{
    AnthropicBackend, ChatRequest, OpenAiBackend, ProviderBackend, ProviderRouter, StreamChunk,
};
use uuid::Uuid;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn request(text: &str, model: &str) -> ChatRequest {
    ChatRequest::new(vec![ChatMessage::user(text, Uuid::new_v4())], model)
}

#[tokio::test]
async fn openai_generate_round_trip() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("Authorization", "Bearer sk-test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "model": "gpt-4o-mini",
            "choices": [{
                "message": {"content": "Hello there"},
                "finish_reason": "stop"
            }],
            "usage": {"prompt_tokens": 9, "completion_tokens": 3, "total_tokens": 12}
        })))
        .mount(&server)
        .await;

    let backend = OpenAiBackend::new("sk-test", Some(server.uri()));
    let response = backend
        .generate(&request("hi", "gpt-4o-mini"))
        .await
        .unwrap();
    assert_eq!(response.content, "Hello there");
    assert!(response.tool_calls.is_empty());
    assert_eq!(response.usage.total_tokens, 12);
}

#[tokio::test]
async fn openai_http_error_becomes_provider_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(429).set_body_json(serde_json::json!({
            "error": {"message": "rate limited"}
        })))
        .mount(&server)
        .await;

    let backend = OpenAiBackend::new("sk-test", Some(server.uri()));
    let err = backend
        .generate(&request("hi", "gpt-4o-mini"))
        .await
        .unwrap_err();
    match err {
        TandemError::Provider { provider, message } => {
            assert_eq!(provider, "openai");
            assert!(message.contains("429"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn openai_stream_parses_sse_deltas() {
    let sse_body = concat!(
        "data: {\"choices\":[{\"delta\":{\"content\":\"Hel\"}}]}\n\n",
        "data: {\"choices\":[{\"delta\":{\"content\":\"lo\"}}]}\n\n",
        "data: {\"choices\":[{\"delta\":{},\"finish_reason\":\"stop\"}]}\n\n",
        "data: [DONE]\n\n",
    );

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(sse_body, "text/event-stream"))
        .mount(&server)
        .await;

    let backend = OpenAiBackend::new("sk-test", Some(server.uri()));
    let mut rx = backend.stream(&request("hi", "gpt-4o-mini")).await.unwrap();

    let mut deltas = Vec::new();
    let mut done = 0;
    while let Some(chunk) = rx.recv().await {
        match chunk.unwrap() {
            StreamChunk::Delta(text) => deltas.push(text),
            StreamChunk::Done { .. } => done += 1,
        }
    }
    assert_eq!(deltas, vec!["Hel", "lo"]);
    assert_eq!(done, 1);
}

#[tokio::test]
async fn anthropic_generate_round_trip() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .and(header("x-api-key", "ak-test"))
        .and(header("anthropic-version", "2023-06-01"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "model": "claude-3-5-haiku-20241022",
            "content": [{"type": "text", "text": "Bonjour"}],
            "stop_reason": "end_turn",
            "usage": {"input_tokens": 10, "output_tokens": 2}
        })))
        .mount(&server)
        .await;

    let backend = AnthropicBackend::new("ak-test", Some(server.uri()));
    let response = backend
        .generate(&request("hi", "claude-3-5-haiku-20241022"))
        .await
        .unwrap();
    assert_eq!(response.content, "Bonjour");
    assert_eq!(response.usage.total_tokens, 12);
}

#[tokio::test]
async fn anthropic_stream_parses_typed_events() {
    let sse_body = concat!(
        "data: {\"type\":\"message_start\",\"message\":{\"usage\":{\"input_tokens\":7}}}\n\n",
        "data: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\"Bon\"}}\n\n",
        "data: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\"jour\"}}\n\n",
        "data: {\"type\":\"message_delta\",\"delta\":{\"stop_reason\":\"end_turn\"},\"usage\":{\"output_tokens\":4}}\n\n",
        "data: {\"type\":\"message_stop\"}\n\n",
    );

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(sse_body, "text/event-stream"))
        .mount(&server)
        .await;

    let backend = AnthropicBackend::new("ak-test", Some(server.uri()));
    let mut rx = backend
        .stream(&request("hi", "claude-3-5-haiku-20241022"))
        .await
        .unwrap();

    let mut deltas = Vec::new();
    let mut final_usage = None;
    while let Some(chunk) = rx.recv().await {
        match chunk.unwrap() {
            StreamChunk::Delta(text) => deltas.push(text),
            StreamChunk::Done { usage } => final_usage = usage,
        }
    }
    assert_eq!(deltas, vec!["Bon", "jour"]);
    let usage = final_usage.unwrap();
    assert_eq!(usage.prompt_tokens, 7);
    assert_eq!(usage.completion_tokens, 4);
    assert_eq!(usage.total_tokens, 11);
}

#[tokio::test]
async fn router_dispatches_by_model_prefix() {
    let openai_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "model": "gpt-4o-mini",
            "choices": [{"message": {"content": "from openai"}, "finish_reason": "stop"}],
            "usage": {"prompt_tokens": 1, "completion_tokens": 1, "total_tokens": 2}
        })))
        .mount(&openai_server)
        .await;

    let anthropic_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "model": "claude-3-5-haiku-20241022",
            "content": [{"type": "text", "text": "from anthropic"}],
            "stop_reason": "end_turn",
            "usage": {"input_tokens": 1, "output_tokens": 1}
        })))
        .mount(&anthropic_server)
        .await;

    let router = ProviderRouter::from_backends(
        Some(Arc::new(OpenAiBackend::new("sk-test", Some(openai_server.uri())))),
        Some(Arc::new(AnthropicBackend::new(
            "ak-test",
            Some(anthropic_server.uri()),
        ))),
    );

    let openai_reply = router.generate(&request("hi", "gpt-4o-mini")).await.unwrap();
    assert_eq!(openai_reply.content, "from openai");

    let anthropic_reply = router
        .generate(&request("hi", "claude-3-5-haiku-20241022"))
        .await
        .unwrap();
    assert_eq!(anthropic_reply.content, "from anthropic");

    // No matching prefix falls back to the default (OpenAI) route.
    let fallback = router.generate(&request("hi", "llama-3-70b")).await.unwrap();
    assert_eq!(fallback.content, "from openai");
}

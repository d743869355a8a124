use crate::orchestrator::{TurnOrchestrator, TurnRequest};
use serde::{Deserialize, Serialize};
use tandem_core::ChatMessage;
use tandem_provider::{StreamChunk, TokenUsage};
use tokio::sync::mpsc;
use tracing::warn;
use uuid::Uuid;

/// An event delivered to a streaming consumer.
///
/// Serialized with a lowercase `type` tag; this is the shape forwarded over
/// newline-delimited JSON and WebSocket frames.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DeliveryEvent {
    /// A non-empty content delta for the assistant message being generated.
    Content { message_id: Uuid, delta: String },
    /// The turn finished; `content` is the full accumulated text, now also
    /// written to the persisted message.
    Done {
        message_id: Uuid,
        content: String,
        usage: TokenUsage,
    },
    /// The turn failed. Terminal, like `Done`.
    Error { message: String },
}

/// What the stream has produced so far. Lives outside the happy path so the
/// error handler can salvage partial content.
#[derive(Default)]
struct StreamProgress {
    message_id: Option<Uuid>,
    accumulated: String,
}

impl TurnOrchestrator {
    /// Streaming variant of [`TurnOrchestrator::run`].
    ///
    /// Tools are not offered while streaming; the single-round protocol has
    /// no delivery shape for mid-stream tool execution. The assistant
    /// message id is allocated on the first non-empty delta and its content
    /// is written exactly once, at the end of the stream.
    pub fn run_streaming(self: &std::sync::Arc<Self>, req: TurnRequest) -> mpsc::Receiver<DeliveryEvent> {
        let (tx, rx) = mpsc::channel(64);
        let this = std::sync::Arc::clone(self);
        tokio::spawn(async move {
            this.stream_turn(req, tx).await;
        });
        rx
    }

    async fn stream_turn(&self, req: TurnRequest, tx: mpsc::Sender<DeliveryEvent>) {
        let mut progress = StreamProgress::default();
        if let Err(e) = self.stream_turn_inner(&req, &tx, &mut progress).await {
            warn!(conversation = %req.conversation_id, error = %e, "Streaming turn failed");

            // Deltas already delivered stay in the transcript; the message
            // allocated at the first delta gets whatever content arrived.
            if let Some(id) = progress.message_id {
                if !progress.accumulated.is_empty() {
                    if let Err(persist_err) = self
                        .store()
                        .update_message_content(id, progress.accumulated)
                        .await
                    {
                        warn!(error = %persist_err, "Could not persist partial streamed content");
                    }
                }
            }

            let content = format!("Error generating response: {e}");
            if let Err(persist_err) = self
                .store()
                .append_message(ChatMessage::assistant(&content, req.conversation_id))
                .await
            {
                warn!(error = %persist_err, "Could not persist streaming error message");
            }
            let _ = tx
                .send(DeliveryEvent::Error {
                    message: e.to_string(),
                })
                .await;
        }
    }

    async fn stream_turn_inner(
        &self,
        req: &TurnRequest,
        tx: &mpsc::Sender<DeliveryEvent>,
        progress: &mut StreamProgress,
    ) -> tandem_core::TandemResult<()> {
        let model = self.model_for(req);

        self.store()
            .append_message(ChatMessage::user(&req.content, req.conversation_id))
            .await?;

        let mut history = self.store().list_messages(req.conversation_id).await?;
        if req.use_memory {
            if let Some(augmented) = self.augment(req).await {
                if let Some(last) = history.last_mut() {
                    last.content = augmented;
                }
            }
        }

        let mut request = tandem_provider::ChatRequest::new(history, &model);
        request.temperature = self.settings().temperature;
        request.max_tokens = self.settings().max_tokens;

        let mut chunks = self.router().stream(&request).await?;

        while let Some(chunk) = chunks.recv().await {
            match chunk? {
                StreamChunk::Delta(delta) => {
                    if delta.is_empty() {
                        continue;
                    }
                    let id = match progress.message_id {
                        Some(id) => id,
                        None => {
                            // Allocate the message id as soon as there is
                            // content to attribute to it.
                            let id = self
                                .store()
                                .append_message(
                                    ChatMessage::assistant("", req.conversation_id)
                                        .with_model(&model),
                                )
                                .await?;
                            progress.message_id = Some(id);
                            id
                        }
                    };
                    progress.accumulated.push_str(&delta);
                    let _ = tx
                        .send(DeliveryEvent::Content {
                            message_id: id,
                            delta,
                        })
                        .await;
                }
                StreamChunk::Done { usage } => {
                    let id = match progress.message_id {
                        Some(id) => {
                            self.store()
                                .update_message_content(id, progress.accumulated.clone())
                                .await?;
                            id
                        }
                        // The provider produced no content at all; persist
                        // an empty assistant message so the turn still has
                        // a transcript entry.
                        None => {
                            self.store()
                                .append_message(
                                    ChatMessage::assistant("", req.conversation_id)
                                        .with_model(&model),
                                )
                                .await?
                        }
                    };

                    let accumulated = std::mem::take(&mut progress.accumulated);
                    if req.use_memory {
                        self.spawn_memory_write(req, &accumulated);
                    }

                    let _ = tx
                        .send(DeliveryEvent::Done {
                            message_id: id,
                            content: accumulated,
                            usage: usage.unwrap_or_default(),
                        })
                        .await;
                    return Ok(());
                }
            }
        }

        // Channel closed without a terminal chunk.
        Err(tandem_core::TandemError::Orchestration(
            "Provider stream ended without completion".to_string(),
        ))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn delivery_events_serialize_with_type_tag() {
        let id = Uuid::new_v4();
        let event = DeliveryEvent::Content {
            message_id: id,
            delta: "Hel".to_string(),
        };
        let json: serde_json::Value = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "content");
        assert_eq!(json["delta"], "Hel");

        let event = DeliveryEvent::Error {
            message: "boom".to_string(),
        };
        let json: serde_json::Value = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "error");
    }
}

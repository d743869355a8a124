use crate::message::ChatMessage;
use crate::{TandemError, TandemResult};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

/// Collaborator trait for conversation persistence.
///
/// The storage schema itself lives outside this engine; the orchestrator only
/// needs append, one in-place content update (streamed-message finalization),
/// and ordered listing.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Appends a message, returning its id.
    async fn append_message(&self, message: ChatMessage) -> TandemResult<Uuid>;

    /// Replaces the content of an existing message.
    async fn update_message_content(&self, id: Uuid, content: String) -> TandemResult<()>;

    /// Lists a conversation's messages in insertion order.
    async fn list_messages(&self, conversation_id: Uuid) -> TandemResult<Vec<ChatMessage>>;
}

/// In-memory conversation store. Suitable for tests and single-process use.
pub struct InMemoryConversationStore {
    conversations: RwLock<HashMap<Uuid, Vec<ChatMessage>>>,
}

impl InMemoryConversationStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self {
            conversations: RwLock::new(HashMap::new()),
        }
    }

    /// Total number of messages across all conversations.
    pub async fn message_count(&self) -> usize {
        self.conversations.read().await.values().map(Vec::len).sum()
    }
}

impl Default for InMemoryConversationStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ConversationStore for InMemoryConversationStore {
    async fn append_message(&self, message: ChatMessage) -> TandemResult<Uuid> {
        let id = message.id;
        let mut conversations = self.conversations.write().await;
        conversations
            .entry(message.conversation_id)
            .or_default()
            .push(message);
        Ok(id)
    }

    async fn update_message_content(&self, id: Uuid, content: String) -> TandemResult<()> {
        let mut conversations = self.conversations.write().await;
        for messages in conversations.values_mut() {
            if let Some(msg) = messages.iter_mut().find(|m| m.id == id) {
                msg.content = content;
                return Ok(());
            }
        }
        debug!(message_id = %id, "Content update for unknown message");
        Err(TandemError::Storage(format!("No message with id {id}")))
    }

    async fn list_messages(&self, conversation_id: Uuid) -> TandemResult<Vec<ChatMessage>> {
        let conversations = self.conversations.read().await;
        Ok(conversations
            .get(&conversation_id)
            .cloned()
            .unwrap_or_default())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::message::{Role, ToolCall};

    #[tokio::test]
    async fn append_and_list_preserves_insertion_order() {
        let store = InMemoryConversationStore::new();
        let cid = Uuid::new_v4();

        for i in 0..5 {
            store
                .append_message(ChatMessage::user(format!("msg{i}"), cid))
                .await
                .unwrap();
        }

        let messages = store.list_messages(cid).await.unwrap();
        assert_eq!(messages.len(), 5);
        for (i, msg) in messages.iter().enumerate() {
            assert_eq!(msg.content, format!("msg{i}"));
        }
    }

    #[tokio::test]
    async fn tool_call_linkage_survives_round_trip() {
        let store = InMemoryConversationStore::new();
        let cid = Uuid::new_v4();

        let assistant = ChatMessage::assistant("", cid).with_tool_calls(vec![ToolCall {
            id: "c1".into(),
            name: "calculator".into(),
            arguments: serde_json::json!({"expression": "2+2"}),
        }]);
        store.append_message(assistant).await.unwrap();
        store
            .append_message(ChatMessage::tool("{\"success\":true,\"result\":4}", cid, "c1"))
            .await
            .unwrap();

        let messages = store.list_messages(cid).await.unwrap();
        assert_eq!(messages[0].role, Role::Assistant);
        let calls = messages[0].tool_calls.as_ref().unwrap();
        assert_eq!(messages[1].tool_call_id.as_deref(), Some(calls[0].id.as_str()));
    }

    #[tokio::test]
    async fn update_message_content_replaces_in_place() {
        let store = InMemoryConversationStore::new();
        let cid = Uuid::new_v4();

        let id = store
            .append_message(ChatMessage::assistant("", cid))
            .await
            .unwrap();
        store
            .update_message_content(id, "Hello".into())
            .await
            .unwrap();

        let messages = store.list_messages(cid).await.unwrap();
        assert_eq!(messages[0].content, "Hello");
        assert_eq!(messages.len(), 1);
    }

    #[tokio::test]
    async fn update_unknown_message_errors() {
        let store = InMemoryConversationStore::new();
        let result = store
            .update_message_content(Uuid::new_v4(), "x".into())
            .await;
        assert!(matches!(result, Err(TandemError::Storage(_))));
    }

    #[tokio::test]
    async fn listing_unknown_conversation_is_empty() {
        let store = InMemoryConversationStore::new();
        let messages = store.list_messages(Uuid::new_v4()).await.unwrap();
        assert!(messages.is_empty());
    }
}

use crate::TandemResult;
use async_trait::async_trait;
use std::collections::HashSet;
use tokio::sync::RwLock;
use uuid::Uuid;

/// A memory entry returned by a relevance query, with its similarity score.
#[derive(Debug, Clone)]
pub struct MemoryHit {
    /// The stored text.
    pub content: String,
    /// Similarity score in `[0.0, 1.0]`.
    pub score: f32,
}

/// Collaborator trait for long-term semantic memory.
///
/// The orchestrator treats memory as best-effort: retrieval failures degrade
/// to an unaugmented prompt and write failures are logged, never surfaced.
#[async_trait]
pub trait MemoryStore: Send + Sync {
    /// Returns up to `limit` entries relevant to `query` for the given user,
    /// each scoring at or above `threshold`, best first.
    async fn retrieve_relevant(
        &self,
        query: &str,
        user_id: &str,
        limit: usize,
        threshold: f32,
        conversation_id: Option<Uuid>,
    ) -> TandemResult<Vec<MemoryHit>>;

    /// Stores a piece of content for later retrieval.
    async fn store(
        &self,
        content: &str,
        user_id: &str,
        kind: &str,
        importance: f32,
        conversation_id: Option<Uuid>,
    ) -> TandemResult<()>;
}

/// A memory store that remembers nothing and retrieves nothing.
///
/// Used when memory augmentation is disabled at deployment level.
pub struct NullMemoryStore;

#[async_trait]
impl MemoryStore for NullMemoryStore {
    async fn retrieve_relevant(
        &self,
        _query: &str,
        _user_id: &str,
        _limit: usize,
        _threshold: f32,
        _conversation_id: Option<Uuid>,
    ) -> TandemResult<Vec<MemoryHit>> {
        Ok(Vec::new())
    }

    async fn store(
        &self,
        _content: &str,
        _user_id: &str,
        _kind: &str,
        _importance: f32,
        _conversation_id: Option<Uuid>,
    ) -> TandemResult<()> {
        Ok(())
    }
}

struct StoredMemory {
    content: String,
    user_id: String,
    conversation_id: Option<Uuid>,
}

/// In-memory keyword-overlap memory store.
///
/// Scores by word overlap between the query and the stored content. Not a
/// substitute for embedding search; intended for tests and demos where a
/// deterministic, dependency-free scorer is preferable.
pub struct InMemoryMemoryStore {
    entries: RwLock<Vec<StoredMemory>>,
}

impl InMemoryMemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
        }
    }
}

impl Default for InMemoryMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn words(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(|w| w.to_lowercase())
        .collect()
}

/// Fraction of query words present in the content.
fn overlap_score(query: &HashSet<String>, content: &str) -> f32 {
    if query.is_empty() {
        return 0.0;
    }
    let content_words = words(content);
    let shared = query.iter().filter(|w| content_words.contains(*w)).count();
    shared as f32 / query.len() as f32
}

#[async_trait]
impl MemoryStore for InMemoryMemoryStore {
    async fn retrieve_relevant(
        &self,
        query: &str,
        user_id: &str,
        limit: usize,
        threshold: f32,
        conversation_id: Option<Uuid>,
    ) -> TandemResult<Vec<MemoryHit>> {
        let query_words = words(query);
        let entries = self.entries.read().await;

        let mut hits: Vec<MemoryHit> = entries
            .iter()
            .filter(|e| e.user_id == user_id)
            .filter(|e| conversation_id.is_none() || e.conversation_id == conversation_id)
            .map(|e| MemoryHit {
                content: e.content.clone(),
                score: overlap_score(&query_words, &e.content),
            })
            .filter(|h| h.score >= threshold)
            .collect();

        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(limit);
        Ok(hits)
    }

    async fn store(
        &self,
        content: &str,
        user_id: &str,
        _kind: &str,
        _importance: f32,
        conversation_id: Option<Uuid>,
    ) -> TandemResult<()> {
        let mut entries = self.entries.write().await;
        entries.push(StoredMemory {
            content: content.to_string(),
            user_id: user_id.to_string(),
            conversation_id,
        });
        Ok(())
    }
}

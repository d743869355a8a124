pub mod anthropic;
pub mod openai;

use crate::types::{ChatRequest, ProviderResponse, StreamChunk};
use async_trait::async_trait;
use tandem_core::TandemResult;
use tokio::sync::mpsc;

/// Trait for LLM provider backends.
///
/// Each provider implements this to handle API communication. To add a new
/// provider: create a module here, implement `ProviderBackend`, and wire a
/// route prefix in `ProviderRouter`.
#[async_trait]
pub trait ProviderBackend: Send + Sync {
    /// Stable provider name used in error messages and model listings.
    fn name(&self) -> &str;

    /// Models this backend serves, for the `available_models` listing.
    fn available_models(&self) -> Vec<String>;

    /// Non-streaming chat completion.
    async fn generate(&self, request: &ChatRequest) -> TandemResult<ProviderResponse>;

    /// Streaming chat completion.
    ///
    /// Returns a receiver yielding content deltas and a terminal
    /// [`StreamChunk::Done`]; a transport failure mid-stream arrives as an
    /// `Err` item.
    async fn stream(
        &self,
        request: &ChatRequest,
    ) -> TandemResult<mpsc::Receiver<TandemResult<StreamChunk>>>;
}

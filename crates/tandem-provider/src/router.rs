use crate::backends::anthropic::AnthropicBackend;
use crate::backends::openai::OpenAiBackend;
use crate::backends::ProviderBackend;
use crate::config::ProviderSettings;
use crate::types::{ChatRequest, ProviderResponse, StreamChunk};
use serde::Serialize;
use std::sync::Arc;
use tandem_core::{TandemError, TandemResult};
use tokio::sync::mpsc;
use tracing::debug;

/// Models offered by one configured provider.
#[derive(Debug, Clone, Serialize)]
pub struct ModelListing {
    pub provider: String,
    pub models: Vec<String>,
    pub default_model: String,
}

struct Route {
    prefix: &'static str,
    provider: &'static str,
    backend: Option<Arc<dyn ProviderBackend>>,
}

/// Routes requests to a backend by model name prefix.
///
/// `gpt-*` goes to OpenAI, `claude-*` to Anthropic, anything else to the
/// default (OpenAI). The table is built once; a route whose credentials were
/// absent at startup fails at call time, not at construction.
pub struct ProviderRouter {
    routes: Vec<Route>,
    default_route: Route,
}

impl ProviderRouter {
    /// Builds the router from provider settings.
    pub fn from_settings(settings: &ProviderSettings) -> Self {
        let openai: Option<Arc<dyn ProviderBackend>> = settings
            .openai_api_key
            .as_ref()
            .map(|key| {
                Arc::new(OpenAiBackend::new(key, settings.openai_base_url.clone()))
                    as Arc<dyn ProviderBackend>
            });
        let anthropic: Option<Arc<dyn ProviderBackend>> = settings
            .anthropic_api_key
            .as_ref()
            .map(|key| {
                Arc::new(AnthropicBackend::new(key, settings.anthropic_base_url.clone()))
                    as Arc<dyn ProviderBackend>
            });
        Self::from_backends(openai, anthropic)
    }

    /// Builds the router from pre-constructed backends. Used by tests and by
    /// callers embedding custom providers.
    pub fn from_backends(
        openai: Option<Arc<dyn ProviderBackend>>,
        anthropic: Option<Arc<dyn ProviderBackend>>,
    ) -> Self {
        Self {
            routes: vec![
                Route {
                    prefix: "gpt-",
                    provider: "openai",
                    backend: openai.clone(),
                },
                Route {
                    prefix: "claude-",
                    provider: "anthropic",
                    backend: anthropic,
                },
            ],
            default_route: Route {
                prefix: "",
                provider: "openai",
                backend: openai,
            },
        }
    }

    fn route(&self, model: &str) -> TandemResult<Arc<dyn ProviderBackend>> {
        let route = self
            .routes
            .iter()
            .find(|r| model.starts_with(r.prefix))
            .unwrap_or(&self.default_route);

        debug!(model = %model, provider = %route.provider, "Routing provider call");

        route.backend.clone().ok_or_else(|| {
            TandemError::Configuration(format!(
                "Provider '{}' is not configured (no API key)",
                route.provider
            ))
        })
    }

    /// Non-streaming completion on the backend the model routes to.
    pub async fn generate(&self, request: &ChatRequest) -> TandemResult<ProviderResponse> {
        self.route(&request.model)?.generate(request).await
    }

    /// Streaming completion on the backend the model routes to.
    pub async fn stream(
        &self,
        request: &ChatRequest,
    ) -> TandemResult<mpsc::Receiver<TandemResult<StreamChunk>>> {
        self.route(&request.model)?.stream(request).await
    }

    /// Models offered by each configured provider.
    pub fn available_models(&self) -> Vec<ModelListing> {
        self.routes
            .iter()
            .filter_map(|r| r.backend.as_ref().map(|b| (r, b)))
            .map(|(route, backend)| {
                let models = backend.available_models();
                ModelListing {
                    provider: route.provider.to_string(),
                    default_model: models.first().cloned().unwrap_or_default(),
                    models,
                }
            })
            .collect()
    }
}

use crate::config::{BackendConfig, ConfigError};
use crate::params::GenerationParams;
use crate::routing::Route;
use crate::stream::CompletionResult;
use async_trait::async_trait;
use shared::models::{Message, ProviderKind, ProviderStatus};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;

pub mod huggingface;
pub mod openai_compat;
pub mod openrouter;
pub mod sse;

pub use huggingface::HuggingFaceProvider;
pub use openai_compat::OpenAiCompatibleProvider;
pub use openrouter::OpenRouterProvider;

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Request to {provider} failed: {source}")]
    Http {
        provider: ProviderKind,
        #[source]
        source: reqwest::Error,
    },
    #[error("{provider} returned HTTP {status}: {body}")]
    Status {
        provider: ProviderKind,
        status: u16,
        body: String,
    },
    #[error("Invalid response from {provider}: {message}")]
    Decode {
        provider: ProviderKind,
        message: String,
    },
    #[error("OpenRouter error: {0}")]
    OpenRouter(#[from] async_openai::error::OpenAIError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("Provider not available for model: {0}")]
    Unavailable(String),
}

/// A hosted inference backend.
#[async_trait]
pub trait Provider: Send + Sync {
    fn kind(&self) -> ProviderKind;

    async fn generate_completion(
        &self,
        model_id: &str,
        messages: &[Message],
        params: &GenerationParams,
    ) -> Result<CompletionResult, ProviderError>;

    async fn status(&self) -> ProviderStatus;
}

/// Sends a lightweight probe and reports reachability and latency.
pub(crate) async fn probe(request: reqwest::RequestBuilder) -> ProviderStatus {
    let started = Instant::now();
    match request.send().await {
        Ok(response) if response.status().is_success() => ProviderStatus {
            available: true,
            error: None,
            response_time_ms: Some(started.elapsed().as_millis() as u64),
        },
        Ok(response) => ProviderStatus::unavailable(format!("HTTP {}", response.status().as_u16())),
        Err(e) => ProviderStatus::unavailable(e.to_string()),
    }
}

/// Registry of the providers this process has credentials for.
#[derive(Clone, Default)]
pub struct ProviderManager {
    providers: HashMap<ProviderKind, Arc<dyn Provider>>,
}

impl ProviderManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &BackendConfig) -> Self {
        let client = reqwest::Client::new();
        let mut manager = Self::new();

        if let Some(openrouter) = &config.openrouter {
            manager.register(Arc::new(OpenRouterProvider::new(client.clone(), openrouter)));
        }
        if let Some(key) = &config.huggingface_api_key {
            manager.register(Arc::new(HuggingFaceProvider::new(client.clone(), key.clone())));
        }
        if let Some(key) = &config.groq_api_key {
            manager.register(Arc::new(OpenAiCompatibleProvider::groq(client.clone(), key.clone())));
        }
        if let Some(key) = &config.openai_api_key {
            manager.register(Arc::new(OpenAiCompatibleProvider::openai(client, key.clone())));
        }

        for kind in ProviderKind::ALL {
            if manager.provider(kind).is_none() {
                tracing::warn!(
                    "{} not configured, {} is unavailable",
                    BackendConfig::credential_var(kind),
                    kind
                );
            }
        }
        manager
    }

    pub fn register(&mut self, provider: Arc<dyn Provider>) {
        self.providers.insert(provider.kind(), provider);
    }

    pub fn provider(&self, kind: ProviderKind) -> Option<Arc<dyn Provider>> {
        self.providers.get(&kind).cloned()
    }

    /// Provider that serves `model_id` along the route it resolves to.
    pub fn provider_for(&self, model_id: &str) -> Result<Arc<dyn Provider>, ProviderError> {
        self.provider(Route::for_model(model_id).provider())
            .ok_or_else(|| ProviderError::Unavailable(model_id.to_string()))
    }

    pub async fn status(&self, kind: ProviderKind) -> ProviderStatus {
        match self.provider(kind) {
            Some(provider) => provider.status().await,
            None => ProviderStatus::unavailable(
                ConfigError::MissingCredential(BackendConfig::credential_var(kind)).to_string(),
            ),
        }
    }

    pub async fn status_all(&self) -> BTreeMap<ProviderKind, ProviderStatus> {
        let statuses =
            futures::future::join_all(ProviderKind::ALL.into_iter().map(|kind| self.status(kind)))
                .await;
        ProviderKind::ALL.into_iter().zip(statuses).collect()
    }
}

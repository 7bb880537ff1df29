use super::sse::delta_byte_stream;
use super::{Provider, ProviderError, probe};
use crate::config::{GROQ_API_BASE, OPENAI_API_BASE};
use crate::params::GenerationParams;
use crate::stream::{CompletionObject, CompletionResult};
use async_trait::async_trait;
use serde::Serialize;
use shared::models::{Message, ProviderKind, ProviderStatus};

/// Providers speaking the OpenAI chat completions protocol (Groq, OpenAI).
pub struct OpenAiCompatibleProvider {
    kind: ProviderKind,
    client: reqwest::Client,
    api_base: String,
    api_key: String,
}

#[derive(Debug, Serialize)]
struct ChatCompletionBody<'a> {
    model: &'a str,
    messages: &'a [Message],
    temperature: f32,
    top_p: f32,
    max_tokens: u32,
    frequency_penalty: f32,
    presence_penalty: f32,
    stream: bool,
}

impl OpenAiCompatibleProvider {
    pub fn new(
        kind: ProviderKind,
        client: reqwest::Client,
        api_base: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            client,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }

    pub fn groq(client: reqwest::Client, api_key: String) -> Self {
        Self::new(ProviderKind::Groq, client, GROQ_API_BASE, api_key)
    }

    pub fn openai(client: reqwest::Client, api_key: String) -> Self {
        Self::new(ProviderKind::OpenAi, client, OPENAI_API_BASE, api_key)
    }

    fn api_url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.api_base, endpoint)
    }
}

// top_k and the repetition extras are not part of this protocol
fn request_body<'a>(
    model: &'a str,
    messages: &'a [Message],
    params: &GenerationParams,
) -> ChatCompletionBody<'a> {
    ChatCompletionBody {
        model,
        messages,
        temperature: params.temperature,
        top_p: params.top_p,
        max_tokens: params.max_tokens,
        frequency_penalty: params.frequency_penalty,
        presence_penalty: params.presence_penalty,
        stream: params.stream,
    }
}

#[async_trait]
impl Provider for OpenAiCompatibleProvider {
    fn kind(&self) -> ProviderKind {
        self.kind
    }

    async fn generate_completion(
        &self,
        model_id: &str,
        messages: &[Message],
        params: &GenerationParams,
    ) -> Result<CompletionResult, ProviderError> {
        let body = request_body(model_id, messages, params);

        let response = self
            .client
            .post(self.api_url("chat/completions"))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|source| ProviderError::Http {
                provider: self.kind,
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!("{} returned {}: {}", self.kind, status, body);
            return Err(ProviderError::Status {
                provider: self.kind,
                status: status.as_u16(),
                body,
            });
        }

        if params.stream {
            Ok(CompletionResult::Streaming(delta_byte_stream(
                response.bytes_stream(),
            )))
        } else {
            let completion: CompletionObject =
                response.json().await.map_err(|e| ProviderError::Decode {
                    provider: self.kind,
                    message: e.to_string(),
                })?;
            Ok(CompletionResult::Single(completion))
        }
    }

    async fn status(&self) -> ProviderStatus {
        probe(
            self.client
                .get(self.api_url("models"))
                .bearer_auth(&self.api_key),
        )
        .await
    }
}

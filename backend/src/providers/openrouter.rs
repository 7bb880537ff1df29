use super::{Provider, ProviderError, probe};
use crate::config::OpenRouterConfig;
use crate::params::GenerationParams;
use crate::stream::{CompletionResult, StreamError};
use async_openai::{
    Client,
    config::OpenAIConfig,
    types::chat::{
        ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestAssistantMessageContent,
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
    },
};
use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use shared::models::{Message, ProviderKind, ProviderStatus, Role};

/// Default route for every model not served directly by another provider.
pub struct OpenRouterProvider {
    client: Client<OpenAIConfig>,
    http: reqwest::Client,
    api_key: String,
    api_base: String,
}

impl OpenRouterProvider {
    pub fn new(http: reqwest::Client, config: &OpenRouterConfig) -> Self {
        let openai_config = OpenAIConfig::new()
            .with_api_key(config.api_key.clone())
            .with_api_base(config.api_base.clone());
        Self {
            client: Client::with_config(openai_config),
            http,
            api_key: config.api_key.clone(),
            api_base: config.api_base.trim_end_matches('/').to_string(),
        }
    }
}

/// Build the request conversation from the session history
fn build_conversation(messages: &[Message]) -> Vec<ChatCompletionRequestMessage> {
    messages
        .iter()
        .map(|msg| {
            let content = msg.content.clone();
            match msg.role {
                Role::System => {
                    let system_msg = ChatCompletionRequestSystemMessageArgs::default()
                        .content(content)
                        .build()
                        .unwrap_or_default();
                    ChatCompletionRequestMessage::System(system_msg)
                }
                Role::User => {
                    let user_msg = ChatCompletionRequestUserMessageArgs::default()
                        .content(content)
                        .build()
                        .unwrap_or_default();
                    ChatCompletionRequestMessage::User(user_msg)
                }
                Role::Assistant => {
                    let assistant_msg = ChatCompletionRequestAssistantMessageArgs::default()
                        .content(ChatCompletionRequestAssistantMessageContent::Text(content))
                        .build()
                        .unwrap_or_default();
                    ChatCompletionRequestMessage::Assistant(assistant_msg)
                }
            }
        })
        .collect()
}

#[async_trait]
impl Provider for OpenRouterProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::OpenRouter
    }

    async fn generate_completion(
        &self,
        model_id: &str,
        messages: &[Message],
        params: &GenerationParams,
    ) -> Result<CompletionResult, ProviderError> {
        // top_k has no counterpart in the chat completions request
        let request = CreateChatCompletionRequestArgs::default()
            .model(model_id)
            .messages(build_conversation(messages))
            .temperature(params.temperature)
            .top_p(params.top_p)
            .frequency_penalty(params.frequency_penalty)
            .presence_penalty(params.presence_penalty)
            .max_tokens(params.max_tokens)
            .build()?;

        let stream = self.client.chat().create_stream(request).await?;

        let deltas = stream.filter_map(|result| async move {
            match result {
                Ok(response) => response
                    .choices
                    .first()
                    .and_then(|choice| choice.delta.content.clone())
                    .filter(|content| !content.is_empty())
                    .map(|content| Ok(Bytes::from(content))),
                Err(e) => Some(Err(StreamError::Transport(e.to_string()))),
            }
        });

        Ok(CompletionResult::Streaming(Box::pin(deltas)))
    }

    async fn status(&self) -> ProviderStatus {
        probe(
            self.http
                .get(format!("{}/models", self.api_base))
                .bearer_auth(&self.api_key),
        )
        .await
    }
}

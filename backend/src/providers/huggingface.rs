use super::{Provider, ProviderError, probe};
use crate::config::HUGGINGFACE_API_BASE;
use crate::params::GenerationParams;
use crate::routing::upstream_model_id;
use crate::stream::{CompletionObject, CompletionResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use shared::models::{Message, ProviderKind, ProviderStatus, Role};

const STATUS_PROBE_MODEL: &str = "microsoft/DialoGPT-small";

/// Hugging Face hosted inference; answers with one JSON document, never a stream.
pub struct HuggingFaceProvider {
    client: reqwest::Client,
    api_base: String,
    api_key: String,
}

#[derive(Debug, Serialize)]
struct InferenceBody {
    inputs: String,
    parameters: InferenceParameters,
    options: InferenceOptions,
}

#[derive(Debug, Serialize)]
struct InferenceParameters {
    max_new_tokens: u32,
    temperature: f32,
    top_p: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_k: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    repetition_penalty: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    no_repeat_ngram_size: Option<u32>,
    return_full_text: bool,
}

#[derive(Debug, Serialize)]
struct InferenceOptions {
    wait_for_model: bool,
}

#[derive(Debug, Deserialize)]
struct Generated {
    generated_text: String,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum InferenceResponse {
    Batch(Vec<Generated>),
    One(Generated),
    Error { error: String },
}

impl HuggingFaceProvider {
    pub fn new(client: reqwest::Client, api_key: String) -> Self {
        Self {
            client,
            api_base: HUGGINGFACE_API_BASE.to_string(),
            api_key,
        }
    }

    fn model_url(&self, model_id: &str) -> String {
        format!("{}/{}", self.api_base, model_id)
    }
}

fn build_prompt(messages: &[Message]) -> String {
    let mut prompt = String::new();
    for msg in messages {
        let speaker = match msg.role {
            Role::System => "System",
            Role::User => "User",
            Role::Assistant => "Assistant",
        };
        prompt.push_str(&format!("{}: {}\n", speaker, msg.content));
    }
    prompt.push_str("Assistant:");
    prompt
}

fn build_body(messages: &[Message], params: &GenerationParams) -> InferenceBody {
    InferenceBody {
        inputs: build_prompt(messages),
        parameters: InferenceParameters {
            max_new_tokens: params.max_tokens,
            temperature: params.temperature,
            top_p: params.top_p,
            top_k: params.top_k,
            repetition_penalty: params.effective_repetition_penalty(),
            no_repeat_ngram_size: params.unfiltered.map(|t| t.no_repeat_ngram_size),
            return_full_text: false,
        },
        options: InferenceOptions {
            wait_for_model: true,
        },
    }
}

fn into_completion(response: InferenceResponse) -> Result<CompletionObject, ProviderError> {
    match response {
        InferenceResponse::Batch(batch) => Ok(CompletionObject::from_text(
            batch
                .into_iter()
                .next()
                .map(|g| g.generated_text.trim().to_string())
                .unwrap_or_default(),
        )),
        InferenceResponse::One(generated) => Ok(CompletionObject::from_text(
            generated.generated_text.trim(),
        )),
        InferenceResponse::Error { error } => Err(ProviderError::Decode {
            provider: ProviderKind::HuggingFace,
            message: error,
        }),
    }
}

#[async_trait]
impl Provider for HuggingFaceProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::HuggingFace
    }

    async fn generate_completion(
        &self,
        model_id: &str,
        messages: &[Message],
        params: &GenerationParams,
    ) -> Result<CompletionResult, ProviderError> {
        let response = self
            .client
            .post(self.model_url(upstream_model_id(model_id)))
            .bearer_auth(&self.api_key)
            .json(&build_body(messages, params))
            .send()
            .await
            .map_err(|source| ProviderError::Http {
                provider: ProviderKind::HuggingFace,
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!("huggingface returned {}: {}", status, body);
            return Err(ProviderError::Status {
                provider: ProviderKind::HuggingFace,
                status: status.as_u16(),
                body,
            });
        }

        let parsed: InferenceResponse =
            response.json().await.map_err(|e| ProviderError::Decode {
                provider: ProviderKind::HuggingFace,
                message: e.to_string(),
            })?;
        into_completion(parsed).map(CompletionResult::Single)
    }

    async fn status(&self) -> ProviderStatus {
        probe(
            self.client
                .head(self.model_url(STATUS_PROBE_MODEL))
                .bearer_auth(&self.api_key),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::normalize_params;
    use shared::models::Character;

    #[test]
    fn prompt_lists_turns_and_cues_the_assistant() {
        let prompt = build_prompt(&[
            Message::system("You are Ada."),
            Message::user("Hi"),
        ]);
        assert_eq!(prompt, "System: You are Ada.\nUser: Hi\nAssistant:");
    }

    #[test]
    fn unfiltered_models_send_repeat_guards() {
        let character = Character::new("Ada", "tutor");
        let flagged = build_body(
            &[],
            &normalize_params(&character, "NousResearch/Nous-Hermes-2-Mistral-7B-DPO"),
        );
        let json = serde_json::to_value(&flagged).unwrap();
        assert_eq!(json["parameters"]["no_repeat_ngram_size"], 3);
        assert!(json["parameters"]["repetition_penalty"].is_number());

        let plain = build_body(&[], &normalize_params(&character, "microsoft/DialoGPT-small"));
        let json = serde_json::to_value(&plain).unwrap();
        assert!(json["parameters"].get("no_repeat_ngram_size").is_none());
        assert!(json["parameters"].get("repetition_penalty").is_none());
    }

    #[test]
    fn responses_normalize_to_one_completion() {
        let batch: InferenceResponse =
            serde_json::from_str(r#"[{"generated_text":" Hello there "}]"#).unwrap();
        assert_eq!(into_completion(batch).unwrap().text(), "Hello there");

        let error: InferenceResponse =
            serde_json::from_str(r#"{"error":"Model is loading"}"#).unwrap();
        assert!(matches!(
            into_completion(error),
            Err(ProviderError::Decode { .. })
        ));
    }
}

use crate::catalog;
use crate::routing::{Route, upstream_model_id};
use serde::Serialize;
use shared::models::Character;

/// Fixed sampling extras sent to models flagged as unfiltered.
pub const UNFILTERED_REPETITION_PENALTY: f32 = 1.1;
pub const UNFILTERED_NO_REPEAT_NGRAM_SIZE: u32 = 3;

/// Fallback values used when a character leaves a setting unset.
///
/// The two routes have always shipped different defaults and are kept apart.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Defaults {
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: Option<u32>,
    pub max_tokens: u32,
}

pub const PROVIDER_DEFAULTS: Defaults = Defaults {
    temperature: 0.7,
    top_p: 0.9,
    top_k: None,
    max_tokens: 200,
};

pub const OPENROUTER_DEFAULTS: Defaults = Defaults {
    temperature: 1.0,
    top_p: 1.0,
    top_k: Some(0),
    max_tokens: 200,
};

impl Defaults {
    pub fn for_route(route: Route) -> Self {
        match route {
            Route::Direct(_) => PROVIDER_DEFAULTS,
            Route::Fallback => OPENROUTER_DEFAULTS,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct UnfilteredTuning {
    pub repetition_penalty: f32,
    pub no_repeat_ngram_size: u32,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct GenerationParams {
    pub temperature: f32,
    pub top_p: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u32>,
    pub max_tokens: u32,
    pub frequency_penalty: f32,
    pub presence_penalty: f32,
    /// Character-level setting, only sent when the character defines it
    #[serde(skip)]
    pub repetition_penalty: Option<f32>,
    #[serde(skip)]
    pub unfiltered: Option<UnfilteredTuning>,
    pub stream: bool,
}

impl GenerationParams {
    /// Repetition penalty to put on the wire; unfiltered tuning wins.
    pub fn effective_repetition_penalty(&self) -> Option<f32> {
        self.unfiltered
            .map(|t| t.repetition_penalty)
            .or(self.repetition_penalty)
    }
}

pub fn normalize_params(character: &Character, model_id: &str) -> GenerationParams {
    let defaults = Defaults::for_route(Route::for_model(model_id));

    let unfiltered =
        catalog::supports_unfiltered(upstream_model_id(model_id)).then_some(UnfilteredTuning {
            repetition_penalty: UNFILTERED_REPETITION_PENALTY,
            no_repeat_ngram_size: UNFILTERED_NO_REPEAT_NGRAM_SIZE,
        });

    GenerationParams {
        temperature: character.temperature.unwrap_or(defaults.temperature),
        top_p: character.top_p.unwrap_or(defaults.top_p),
        top_k: character.top_k.or(defaults.top_k),
        max_tokens: character.max_tokens.unwrap_or(defaults.max_tokens),
        frequency_penalty: character.frequency_penalty.unwrap_or(0.0),
        presence_penalty: character.presence_penalty.unwrap_or(0.0),
        repetition_penalty: character.repetition_penalty,
        unfiltered,
        stream: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_fields_take_route_defaults() {
        let character = Character::new("Ada", "A patient tutor");

        let groq = normalize_params(&character, "llama3-8b-8192");
        assert_eq!(groq.temperature, 0.7);
        assert_eq!(groq.top_p, 0.9);
        assert_eq!(groq.top_k, None);
        assert_eq!(groq.max_tokens, 200);

        let openrouter = normalize_params(&character, "anthropic/claude-3-haiku");
        assert_eq!(openrouter.temperature, 1.0);
        assert_eq!(openrouter.top_p, 1.0);
        assert_eq!(openrouter.top_k, Some(0));
        assert_eq!(openrouter.frequency_penalty, 0.0);
    }

    #[test]
    fn character_settings_override_defaults() {
        let mut character = Character::new("Ada", "A patient tutor");
        character.temperature = Some(0.2);
        character.max_tokens = Some(600);
        character.top_k = Some(40);

        let params = normalize_params(&character, "llama3-8b-8192");
        assert_eq!(params.temperature, 0.2);
        assert_eq!(params.max_tokens, 600);
        assert_eq!(params.top_k, Some(40));
    }

    #[test]
    fn only_unfiltered_models_get_extra_tuning() {
        let mut character = Character::new("Ada", "A patient tutor");
        character.repetition_penalty = Some(1.3);

        let flagged = normalize_params(&character, "mixtral-8x7b-32768");
        assert_eq!(
            flagged.unfiltered,
            Some(UnfilteredTuning {
                repetition_penalty: 1.1,
                no_repeat_ngram_size: 3
            })
        );
        assert_eq!(flagged.effective_repetition_penalty(), Some(1.1));

        let plain = normalize_params(&character, "llama3-8b-8192");
        assert_eq!(plain.unfiltered, None);
        assert_eq!(plain.effective_repetition_penalty(), Some(1.3));
    }

    #[test]
    fn routing_prefix_keeps_unfiltered_tuning() {
        let character = Character::new("Ada", "A patient tutor");

        let bare = normalize_params(&character, "NousResearch/Nous-Hermes-2-Mistral-7B-DPO");
        let prefixed =
            normalize_params(&character, "hf:NousResearch/Nous-Hermes-2-Mistral-7B-DPO");
        assert!(bare.unfiltered.is_some());
        assert_eq!(prefixed.unfiltered, bare.unfiltered);
        assert_eq!(prefixed.temperature, 0.7);

        let plain = normalize_params(&character, "huggingface/microsoft/DialoGPT-small");
        assert_eq!(plain.unfiltered, None);
    }
}

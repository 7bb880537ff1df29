use shared::models::{ProviderKind, ProviderModel};
use std::collections::BTreeMap;
use std::sync::LazyLock;

struct Entry {
    id: &'static str,
    name: &'static str,
    provider: ProviderKind,
    context_length: u32,
    streaming: bool,
    function_calling: bool,
    unfiltered: bool,
}

const ENTRIES: &[Entry] = &[
    Entry {
        id: "gryphe/mythomax-l2-13b",
        name: "MythoMax L2 13B",
        provider: ProviderKind::OpenRouter,
        context_length: 4096,
        streaming: true,
        function_calling: false,
        unfiltered: true,
    },
    Entry {
        id: "nousresearch/hermes-3-llama-3.1-405b",
        name: "Hermes 3 405B",
        provider: ProviderKind::OpenRouter,
        context_length: 131072,
        streaming: true,
        function_calling: true,
        unfiltered: true,
    },
    Entry {
        id: "meta-llama/llama-3.1-8b-instruct",
        name: "Llama 3.1 8B Instruct",
        provider: ProviderKind::OpenRouter,
        context_length: 131072,
        streaming: true,
        function_calling: true,
        unfiltered: false,
    },
    Entry {
        id: "microsoft/DialoGPT-small",
        name: "DialoGPT Small",
        provider: ProviderKind::HuggingFace,
        context_length: 1024,
        streaming: false,
        function_calling: false,
        unfiltered: false,
    },
    Entry {
        id: "microsoft/DialoGPT-medium",
        name: "DialoGPT Medium",
        provider: ProviderKind::HuggingFace,
        context_length: 1024,
        streaming: false,
        function_calling: false,
        unfiltered: false,
    },
    Entry {
        id: "NousResearch/Nous-Hermes-2-Mistral-7B-DPO",
        name: "Nous Hermes 2 Mistral 7B",
        provider: ProviderKind::HuggingFace,
        context_length: 8192,
        streaming: false,
        function_calling: false,
        unfiltered: true,
    },
    Entry {
        id: "llama3-8b-8192",
        name: "Llama 3 8B",
        provider: ProviderKind::Groq,
        context_length: 8192,
        streaming: true,
        function_calling: true,
        unfiltered: false,
    },
    Entry {
        id: "llama3-70b-8192",
        name: "Llama 3 70B",
        provider: ProviderKind::Groq,
        context_length: 8192,
        streaming: true,
        function_calling: true,
        unfiltered: false,
    },
    Entry {
        id: "mixtral-8x7b-32768",
        name: "Mixtral 8x7B",
        provider: ProviderKind::Groq,
        context_length: 32768,
        streaming: true,
        function_calling: true,
        unfiltered: true,
    },
    Entry {
        id: "gpt-4o-mini",
        name: "GPT-4o mini",
        provider: ProviderKind::OpenAi,
        context_length: 128000,
        streaming: true,
        function_calling: true,
        unfiltered: false,
    },
    Entry {
        id: "gpt-3.5-turbo",
        name: "GPT-3.5 Turbo",
        provider: ProviderKind::OpenAi,
        context_length: 16385,
        streaming: true,
        function_calling: true,
        unfiltered: false,
    },
];

static MODELS: LazyLock<Vec<ProviderModel>> = LazyLock::new(|| {
    ENTRIES
        .iter()
        .map(|e| ProviderModel {
            id: e.id.to_string(),
            name: e.name.to_string(),
            provider: e.provider,
            context_length: e.context_length,
            supports_streaming: e.streaming,
            supports_function_calling: e.function_calling,
            unfiltered: e.unfiltered,
        })
        .collect()
});

pub fn all_models() -> &'static [ProviderModel] {
    &MODELS
}

pub fn find_model(model_id: &str) -> Option<&'static ProviderModel> {
    MODELS.iter().find(|m| m.id == model_id)
}

pub fn supports_unfiltered(model_id: &str) -> bool {
    find_model(model_id).is_some_and(|m| m.unfiltered)
}

pub fn unfiltered_models() -> Vec<ProviderModel> {
    MODELS.iter().filter(|m| m.unfiltered).cloned().collect()
}

pub fn models_by_provider() -> BTreeMap<ProviderKind, Vec<ProviderModel>> {
    let mut grouped: BTreeMap<ProviderKind, Vec<ProviderModel>> = BTreeMap::new();
    for model in MODELS.iter() {
        grouped.entry(model.provider).or_default().push(model.clone());
    }
    grouped
}

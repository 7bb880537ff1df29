use crate::catalog;
use shared::models::ProviderKind;

const PREFIXES: &[(&str, ProviderKind)] = &[
    ("huggingface/", ProviderKind::HuggingFace),
    ("hf:", ProviderKind::HuggingFace),
    ("groq/", ProviderKind::Groq),
];

/// Which backend a model id belongs to, or `None` when it is not known.
///
/// Pure lookup: catalog ids first, then the explicit provider prefixes.
pub fn resolve_provider(model_id: &str) -> Option<ProviderKind> {
    if let Some(model) = catalog::find_model(model_id) {
        return Some(model.provider);
    }
    PREFIXES
        .iter()
        .find(|(prefix, _)| model_id.starts_with(prefix))
        .map(|(_, kind)| *kind)
}

/// Strips a routing prefix so the provider receives its own model name.
pub fn upstream_model_id(model_id: &str) -> &str {
    PREFIXES
        .iter()
        .find_map(|(prefix, _)| model_id.strip_prefix(prefix))
        .unwrap_or(model_id)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Route {
    /// Sent straight to the provider that serves the model
    Direct(ProviderKind),
    /// Sent through OpenRouter
    Fallback,
}

impl Route {
    pub fn for_model(model_id: &str) -> Self {
        match resolve_provider(model_id) {
            Some(kind @ (ProviderKind::HuggingFace | ProviderKind::Groq)) => Route::Direct(kind),
            Some(ProviderKind::OpenRouter | ProviderKind::OpenAi) | None => Route::Fallback,
        }
    }

    pub fn provider(&self) -> ProviderKind {
        match self {
            Route::Direct(kind) => *kind,
            Route::Fallback => ProviderKind::OpenRouter,
        }
    }
}

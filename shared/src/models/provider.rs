use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    OpenRouter,
    HuggingFace,
    Groq,
    OpenAi,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 4] = [
        ProviderKind::OpenRouter,
        ProviderKind::HuggingFace,
        ProviderKind::Groq,
        ProviderKind::OpenAi,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::OpenRouter => "openrouter",
            ProviderKind::HuggingFace => "huggingface",
            ProviderKind::Groq => "groq",
            ProviderKind::OpenAi => "openai",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownProvider(pub String);

impl fmt::Display for UnknownProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown provider: {}", self.0)
    }
}

impl std::error::Error for UnknownProvider {}

impl FromStr for ProviderKind {
    type Err = UnknownProvider;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ProviderKind::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownProvider(s.to_string()))
    }
}

/// Static catalog entry describing a model a provider serves.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderModel {
    pub id: String,
    pub name: String,
    pub provider: ProviderKind,
    pub context_length: u32,
    pub supports_streaming: bool,
    pub supports_function_calling: bool,
    /// Less-restricted generation; such models get extra sampling parameters
    pub unfiltered: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ProviderStatus {
    pub available: bool,
    pub error: Option<String>,
    pub response_time_ms: Option<u64>,
}

impl ProviderStatus {
    pub fn unavailable(error: impl Into<String>) -> Self {
        Self {
            available: false,
            error: Some(error.into()),
            response_time_ms: None,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct TestProviderRequest {
    #[serde(default)]
    pub provider: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct TestProviderResponse {
    pub success: bool,
    pub provider: ProviderKind,
    pub status: ProviderStatus,
}

/// Body of the provider overview endpoint.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ProviderOverview {
    pub success: bool,
    pub providers: ProviderSummary,
    pub status: BTreeMap<ProviderKind, ProviderStatus>,
    pub models: ModelListing,
    pub metadata: OverviewMetadata,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ProviderSummary {
    pub available: Vec<ProviderKind>,
    pub models_by_provider: BTreeMap<ProviderKind, Vec<ProviderModel>>,
    pub total_models: usize,
    pub unfiltered_models: usize,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ModelListing {
    pub all: Vec<ProviderModel>,
    pub unfiltered: Vec<ProviderModel>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct OverviewMetadata {
    pub timestamp: DateTime<Utc>,
    pub version: String,
}

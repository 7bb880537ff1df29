use shared::models::ProviderKind;
use std::path::PathBuf;
use thiserror::Error;

pub const DEFAULT_OPENROUTER_BASE: &str = "https://openrouter.ai/api/v1";
pub const GROQ_API_BASE: &str = "https://api.groq.com/openai/v1";
pub const OPENAI_API_BASE: &str = "https://api.openai.com/v1";
pub const HUGGINGFACE_API_BASE: &str = "https://api-inference.huggingface.co/models";
const DEFAULT_LOCAL_DB_PATH: &str = "db.json";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{0} not configured")]
    MissingCredential(&'static str),
    #[error("Invalid database url: {0}")]
    InvalidDatabaseUrl(String),
}

#[derive(Clone, Debug, PartialEq)]
pub enum DatabaseConfig {
    /// JSON file store; `None` keeps everything in memory
    Local { path: Option<PathBuf> },
    Sqlite { url: String },
}

impl DatabaseConfig {
    pub fn from_url(url: Option<&str>, local_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        match url {
            Some(url) if url.starts_with("sqlite:") => Ok(DatabaseConfig::Sqlite {
                url: url.to_string(),
            }),
            Some(url) if url.contains("://") => Err(ConfigError::InvalidDatabaseUrl(url.to_string())),
            Some(path) => Ok(DatabaseConfig::Local {
                path: Some(PathBuf::from(path.trim_start_matches("file:"))),
            }),
            None => Ok(DatabaseConfig::Local {
                path: Some(local_path.unwrap_or_else(|| PathBuf::from(DEFAULT_LOCAL_DB_PATH))),
            }),
        }
    }
}

#[derive(Clone, Debug)]
pub struct OpenRouterConfig {
    pub api_key: String,
    pub api_base: String,
}

/// Everything the backend needs to reach providers and storage.
///
/// Built once at startup and handed to the services that need it; no provider
/// client is created from ambient globals.
#[derive(Clone, Debug)]
pub struct BackendConfig {
    pub openrouter: Option<OpenRouterConfig>,
    pub huggingface_api_key: Option<String>,
    pub groq_api_key: Option<String>,
    pub openai_api_key: Option<String>,
    pub database: DatabaseConfig,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            openrouter: None,
            huggingface_api_key: None,
            groq_api_key: None,
            openai_api_key: None,
            database: DatabaseConfig::Local { path: None },
        }
    }
}

impl BackendConfig {
    pub fn from_env(local_db_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok(), local_db_path)
    }

    pub fn from_lookup<F>(lookup: F, local_db_path: Option<PathBuf>) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let openrouter = non_empty("OPENROUTER_API_KEY").map(|api_key| OpenRouterConfig {
            api_key,
            api_base: non_empty("OPENROUTER_API_BASE")
                .unwrap_or_else(|| DEFAULT_OPENROUTER_BASE.to_string()),
        });

        let database_url = non_empty("DATABASE_URL");
        let database = DatabaseConfig::from_url(database_url.as_deref(), local_db_path)?;

        Ok(Self {
            openrouter,
            huggingface_api_key: non_empty("HF_API_KEY"),
            groq_api_key: non_empty("GROQ_API_KEY"),
            openai_api_key: non_empty("OPENAI_API_KEY"),
            database,
        })
    }

    pub fn credential_var(kind: ProviderKind) -> &'static str {
        match kind {
            ProviderKind::OpenRouter => "OPENROUTER_API_KEY",
            ProviderKind::HuggingFace => "HF_API_KEY",
            ProviderKind::Groq => "GROQ_API_KEY",
            ProviderKind::OpenAi => "OPENAI_API_KEY",
        }
    }

    pub fn api_key(&self, kind: ProviderKind) -> Result<&str, ConfigError> {
        let key = match kind {
            ProviderKind::OpenRouter => self.openrouter.as_ref().map(|c| c.api_key.as_str()),
            ProviderKind::HuggingFace => self.huggingface_api_key.as_deref(),
            ProviderKind::Groq => self.groq_api_key.as_deref(),
            ProviderKind::OpenAi => self.openai_api_key.as_deref(),
        };
        key.ok_or(ConfigError::MissingCredential(Self::credential_var(kind)))
    }
}

use crate::config::DatabaseConfig;
use async_trait::async_trait;
use shared::models::{Character, ChatSession};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

pub mod local;
pub mod sqlite;

pub use local::LocalDatabase;
pub use sqlite::SqliteDatabase;

pub type DbResult<T> = Result<T, DbError>;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database error: {0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Entity not found: {0}")]
    NotFound(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Storage for characters and chat sessions.
///
/// Session reads and writes are independent; two turns racing on the same
/// session resolve as last write wins.
#[async_trait]
pub trait Database: Send + Sync {
    async fn get_characters(&self) -> DbResult<Vec<Character>>;
    async fn get_character(&self, character_id: Uuid) -> DbResult<Character>;
    async fn create_character(&self, character: Character) -> DbResult<()>;
    async fn delete_character(&self, character_id: Uuid) -> DbResult<()>;
    async fn record_character_interaction(&self, character_id: Uuid) -> DbResult<()>;

    async fn get_session(&self, session_id: Uuid) -> DbResult<ChatSession>;
    /// Session by id, only if it belongs to the given user and character.
    async fn find_session(
        &self,
        session_id: Uuid,
        user_id: &str,
        character_id: Uuid,
    ) -> DbResult<Option<ChatSession>>;
    /// Sessions of a user with one character, most recently updated first.
    async fn get_sessions(&self, user_id: &str, character_id: Uuid)
    -> DbResult<Vec<ChatSession>>;
    async fn get_user_sessions(&self, user_id: &str) -> DbResult<Vec<ChatSession>>;
    async fn create_session(&self, session: ChatSession) -> DbResult<()>;
    async fn update_session(&self, session: &ChatSession) -> DbResult<()>;

    async fn latest_session(
        &self,
        user_id: &str,
        character_id: Uuid,
    ) -> DbResult<Option<ChatSession>> {
        Ok(self
            .get_sessions(user_id, character_id)
            .await?
            .into_iter()
            .next())
    }
}

pub async fn connect(config: &DatabaseConfig) -> DbResult<Arc<dyn Database>> {
    match config {
        DatabaseConfig::Local { path: Some(path) } => {
            tracing::info!("Using local database at {}", path.display());
            Ok(Arc::new(LocalDatabase::load(path)?))
        }
        DatabaseConfig::Local { path: None } => Ok(Arc::new(LocalDatabase::in_memory())),
        DatabaseConfig::Sqlite { url } => {
            tracing::info!("Using sqlite database at {}", url);
            Ok(Arc::new(SqliteDatabase::connect(url).await?))
        }
    }
}

use crate::dbs::{Database, DbError, DbResult};
use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use shared::models::{Character, ChatSession};
use std::path::{Path, PathBuf};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use uuid::Uuid;

#[derive(Serialize, Deserialize, Default, Clone)]
struct Snapshot {
    characters: Vec<Character>,
    sessions: Vec<ChatSession>,
}

/// JSON file backed store, rewritten on every change.
pub struct LocalDatabase {
    path: Option<PathBuf>,
    data: RwLock<Snapshot>,
}

impl LocalDatabase {
    pub fn in_memory() -> Self {
        Self {
            path: None,
            data: RwLock::new(Snapshot::default()),
        }
    }

    pub fn load(path: impl AsRef<Path>) -> DbResult<Self> {
        let path = path.as_ref().to_path_buf();
        let data = if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            serde_json::from_str(&content)?
        } else {
            Snapshot::default()
        };
        Ok(Self {
            path: Some(path),
            data: RwLock::new(data),
        })
    }

    fn read(&self) -> DbResult<RwLockReadGuard<'_, Snapshot>> {
        self.data
            .read()
            .map_err(|e| DbError::Internal(e.to_string()))
    }

    fn write(&self) -> DbResult<RwLockWriteGuard<'_, Snapshot>> {
        self.data
            .write()
            .map_err(|e| DbError::Internal(e.to_string()))
    }

    fn save(&self, data: &Snapshot) -> DbResult<()> {
        if let Some(path) = &self.path {
            if let Some(parent) = path.parent()
                && !parent.as_os_str().is_empty()
            {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(path, serde_json::to_string_pretty(data)?)?;
        }
        Ok(())
    }
}

fn by_recency(sessions: &mut [ChatSession]) {
    sessions.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
}

#[async_trait]
impl Database for LocalDatabase {
    async fn get_characters(&self) -> DbResult<Vec<Character>> {
        Ok(self.read()?.characters.clone())
    }

    async fn get_character(&self, character_id: Uuid) -> DbResult<Character> {
        self.read()?
            .characters
            .iter()
            .find(|c| c.id == character_id)
            .cloned()
            .ok_or_else(|| DbError::NotFound(format!("character {}", character_id)))
    }

    async fn create_character(&self, character: Character) -> DbResult<()> {
        let mut db = self.write()?;
        db.characters.push(character);
        self.save(&db)
    }

    async fn delete_character(&self, character_id: Uuid) -> DbResult<()> {
        let mut db = self.write()?;
        db.characters.retain(|c| c.id != character_id);
        db.sessions.retain(|s| s.character_id != character_id);
        self.save(&db)
    }

    async fn record_character_interaction(&self, character_id: Uuid) -> DbResult<()> {
        let mut db = self.write()?;
        let character = db
            .characters
            .iter_mut()
            .find(|c| c.id == character_id)
            .ok_or_else(|| DbError::NotFound(format!("character {}", character_id)))?;
        character.interaction_count += 1;
        character.updated_at = Utc::now();
        self.save(&db)
    }

    async fn get_session(&self, session_id: Uuid) -> DbResult<ChatSession> {
        self.read()?
            .sessions
            .iter()
            .find(|s| s.id == session_id)
            .cloned()
            .ok_or_else(|| DbError::NotFound(format!("session {}", session_id)))
    }

    async fn find_session(
        &self,
        session_id: Uuid,
        user_id: &str,
        character_id: Uuid,
    ) -> DbResult<Option<ChatSession>> {
        Ok(self
            .read()?
            .sessions
            .iter()
            .find(|s| s.id == session_id && s.user_id == user_id && s.character_id == character_id)
            .cloned())
    }

    async fn get_sessions(
        &self,
        user_id: &str,
        character_id: Uuid,
    ) -> DbResult<Vec<ChatSession>> {
        let mut sessions: Vec<ChatSession> = self
            .read()?
            .sessions
            .iter()
            .filter(|s| s.user_id == user_id && s.character_id == character_id)
            .cloned()
            .collect();
        by_recency(&mut sessions);
        Ok(sessions)
    }

    async fn get_user_sessions(&self, user_id: &str) -> DbResult<Vec<ChatSession>> {
        let mut sessions: Vec<ChatSession> = self
            .read()?
            .sessions
            .iter()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect();
        by_recency(&mut sessions);
        Ok(sessions)
    }

    async fn create_session(&self, session: ChatSession) -> DbResult<()> {
        let mut db = self.write()?;
        db.sessions.push(session);
        self.save(&db)
    }

    async fn update_session(&self, session: &ChatSession) -> DbResult<()> {
        let mut db = self.write()?;
        let existing = db
            .sessions
            .iter_mut()
            .find(|s| s.id == session.id)
            .ok_or_else(|| DbError::NotFound(format!("session {}", session.id)))?;
        *existing = session.clone();
        self.save(&db)
    }
}

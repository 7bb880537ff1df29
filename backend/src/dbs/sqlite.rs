use crate::dbs::{Database, DbError, DbResult};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use shared::models::{Character, ChatSession, Message};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Pool, Row, Sqlite};
use std::str::FromStr;
use uuid::Uuid;

#[derive(Clone)]
pub struct SqliteDatabase {
    pool: Pool<Sqlite>,
}

// Fixed-width timestamps so text ordering matches time ordering
fn timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(raw: &str) -> DbResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| DbError::Internal(format!("bad timestamp {}: {}", raw, e)))
}

fn parse_id(raw: &str) -> DbResult<Uuid> {
    Uuid::parse_str(raw).map_err(|e| DbError::Internal(format!("bad id {}: {}", raw, e)))
}

fn character_from_row(row: &SqliteRow) -> DbResult<Character> {
    Ok(Character {
        id: parse_id(row.try_get("id")?)?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        greeting: row.try_get("greeting")?,
        temperature: row.try_get::<Option<f64>, _>("temperature")?.map(|v| v as f32),
        top_p: row.try_get::<Option<f64>, _>("top_p")?.map(|v| v as f32),
        top_k: row.try_get::<Option<i64>, _>("top_k")?.map(|v| v as u32),
        frequency_penalty: row
            .try_get::<Option<f64>, _>("frequency_penalty")?
            .map(|v| v as f32),
        presence_penalty: row
            .try_get::<Option<f64>, _>("presence_penalty")?
            .map(|v| v as f32),
        max_tokens: row.try_get::<Option<i64>, _>("max_tokens")?.map(|v| v as u32),
        repetition_penalty: row
            .try_get::<Option<f64>, _>("repetition_penalty")?
            .map(|v| v as f32),
        interaction_count: row.try_get::<i64, _>("interaction_count")? as u32,
        created_at: parse_timestamp(row.try_get("created_at")?)?,
        updated_at: parse_timestamp(row.try_get("updated_at")?)?,
    })
}

fn session_from_row(row: &SqliteRow) -> DbResult<ChatSession> {
    let messages: Vec<Message> = serde_json::from_str(row.try_get("messages")?)?;
    Ok(ChatSession {
        id: parse_id(row.try_get("id")?)?,
        user_id: row.try_get("user_id")?,
        character_id: parse_id(row.try_get("character_id")?)?,
        messages,
        interaction_count: row.try_get::<i64, _>("interaction_count")? as u32,
        last_message_timestamp: parse_timestamp(row.try_get("last_message_timestamp")?)?,
        created_at: parse_timestamp(row.try_get("created_at")?)?,
        updated_at: parse_timestamp(row.try_get("updated_at")?)?,
    })
}

impl SqliteDatabase {
    pub async fn connect(url: &str) -> DbResult<Self> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        // Every connection to an in-memory database would get its own copy
        let max_connections = if url.contains(":memory:") { 1 } else { 5 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;

        let db = Self { pool };
        db.init().await?;
        Ok(db)
    }

    async fn init(&self) -> DbResult<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS characters (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                description TEXT NOT NULL,
                greeting TEXT NOT NULL,
                temperature REAL,
                top_p REAL,
                top_k INTEGER,
                frequency_penalty REAL,
                presence_penalty REAL,
                max_tokens INTEGER,
                repetition_penalty REAL,
                interaction_count INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS chat_sessions (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                character_id TEXT NOT NULL,
                messages TEXT NOT NULL,
                interaction_count INTEGER NOT NULL DEFAULT 1,
                last_message_timestamp TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                FOREIGN KEY(character_id) REFERENCES characters(id)
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS chat_sessions_owner
                ON chat_sessions (user_id, character_id, updated_at)",
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl Database for SqliteDatabase {
    async fn get_characters(&self) -> DbResult<Vec<Character>> {
        let rows = sqlx::query(
            "SELECT id, name, description, greeting, temperature, top_p, top_k, frequency_penalty, presence_penalty, max_tokens, repetition_penalty, interaction_count, created_at, updated_at FROM characters ORDER BY created_at",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(character_from_row).collect()
    }

    async fn get_character(&self, character_id: Uuid) -> DbResult<Character> {
        let row = sqlx::query(
            "SELECT id, name, description, greeting, temperature, top_p, top_k, frequency_penalty, presence_penalty, max_tokens, repetition_penalty, interaction_count, created_at, updated_at FROM characters WHERE id = ?1",
        )
        .bind(character_id.to_string())
        .fetch_optional(&self.pool)
        .await?;
        match row {
            Some(row) => character_from_row(&row),
            None => Err(DbError::NotFound(format!("character {}", character_id))),
        }
    }

    async fn create_character(&self, character: Character) -> DbResult<()> {
        sqlx::query(
            "INSERT INTO characters (id, name, description, greeting, temperature, top_p, top_k, frequency_penalty, presence_penalty, max_tokens, repetition_penalty, interaction_count, created_at, updated_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
        )
        .bind(character.id.to_string())
        .bind(character.name)
        .bind(character.description)
        .bind(character.greeting)
        .bind(character.temperature.map(f64::from))
        .bind(character.top_p.map(f64::from))
        .bind(character.top_k.map(i64::from))
        .bind(character.frequency_penalty.map(f64::from))
        .bind(character.presence_penalty.map(f64::from))
        .bind(character.max_tokens.map(i64::from))
        .bind(character.repetition_penalty.map(f64::from))
        .bind(i64::from(character.interaction_count))
        .bind(timestamp(&character.created_at))
        .bind(timestamp(&character.updated_at))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete_character(&self, character_id: Uuid) -> DbResult<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM chat_sessions WHERE character_id = ?1")
            .bind(character_id.to_string())
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM characters WHERE id = ?1")
            .bind(character_id.to_string())
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn record_character_interaction(&self, character_id: Uuid) -> DbResult<()> {
        let res = sqlx::query(
            "UPDATE characters SET interaction_count = interaction_count + 1, updated_at = ?1 WHERE id = ?2",
        )
        .bind(timestamp(&Utc::now()))
        .bind(character_id.to_string())
        .execute(&self.pool)
        .await?;
        if res.rows_affected() == 0 {
            return Err(DbError::NotFound(format!("character {}", character_id)));
        }
        Ok(())
    }

    async fn get_session(&self, session_id: Uuid) -> DbResult<ChatSession> {
        let row = sqlx::query(
            "SELECT id, user_id, character_id, messages, interaction_count, last_message_timestamp, created_at, updated_at FROM chat_sessions WHERE id = ?1",
        )
        .bind(session_id.to_string())
        .fetch_optional(&self.pool)
        .await?;
        match row {
            Some(row) => session_from_row(&row),
            None => Err(DbError::NotFound(format!("session {}", session_id))),
        }
    }

    async fn find_session(
        &self,
        session_id: Uuid,
        user_id: &str,
        character_id: Uuid,
    ) -> DbResult<Option<ChatSession>> {
        let row = sqlx::query(
            "SELECT id, user_id, character_id, messages, interaction_count, last_message_timestamp, created_at, updated_at FROM chat_sessions WHERE id = ?1 AND user_id = ?2 AND character_id = ?3 LIMIT 1",
        )
        .bind(session_id.to_string())
        .bind(user_id)
        .bind(character_id.to_string())
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(session_from_row).transpose()
    }

    async fn get_sessions(
        &self,
        user_id: &str,
        character_id: Uuid,
    ) -> DbResult<Vec<ChatSession>> {
        let rows = sqlx::query(
            "SELECT id, user_id, character_id, messages, interaction_count, last_message_timestamp, created_at, updated_at FROM chat_sessions WHERE user_id = ?1 AND character_id = ?2 ORDER BY updated_at DESC",
        )
        .bind(user_id)
        .bind(character_id.to_string())
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(session_from_row).collect()
    }

    async fn get_user_sessions(&self, user_id: &str) -> DbResult<Vec<ChatSession>> {
        let rows = sqlx::query(
            "SELECT id, user_id, character_id, messages, interaction_count, last_message_timestamp, created_at, updated_at FROM chat_sessions WHERE user_id = ?1 ORDER BY updated_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(session_from_row).collect()
    }

    async fn create_session(&self, session: ChatSession) -> DbResult<()> {
        sqlx::query(
            "INSERT INTO chat_sessions (id, user_id, character_id, messages, interaction_count, last_message_timestamp, created_at, updated_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        )
        .bind(session.id.to_string())
        .bind(session.user_id)
        .bind(session.character_id.to_string())
        .bind(serde_json::to_string(&session.messages)?)
        .bind(i64::from(session.interaction_count))
        .bind(timestamp(&session.last_message_timestamp))
        .bind(timestamp(&session.created_at))
        .bind(timestamp(&session.updated_at))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_session(&self, session: &ChatSession) -> DbResult<()> {
        let res = sqlx::query(
            "UPDATE chat_sessions SET messages = ?1, interaction_count = ?2, \
             last_message_timestamp = ?3, updated_at = ?4 WHERE id = ?5",
        )
        .bind(serde_json::to_string(&session.messages)?)
        .bind(i64::from(session.interaction_count))
        .bind(timestamp(&session.last_message_timestamp))
        .bind(timestamp(&session.updated_at))
        .bind(session.id.to_string())
        .execute(&self.pool)
        .await?;
        if res.rows_affected() == 0 {
            return Err(DbError::NotFound(format!("session {}", session.id)));
        }
        Ok(())
    }
}

use super::message::Message;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChatSession {
    pub id: Uuid,
    pub user_id: String,
    pub character_id: Uuid,
    pub messages: Vec<Message>,
    pub interaction_count: u32,
    pub last_message_timestamp: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ChatSession {
    /// A fresh session counts as one interaction.
    pub fn new(user_id: impl Into<String>, character_id: Uuid, messages: Vec<Message>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.into(),
            character_id,
            messages,
            interaction_count: 1,
            last_message_timestamp: now,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct CreateSessionRequest {
    pub user_id: String,
    pub character_id: Uuid,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct CreateSessionResponse {
    pub id: Uuid,
}

/// Latest session per character, as listed in a user's conversation overview.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ConversationSummary {
    pub id: Uuid,
    pub character_id: Uuid,
    pub character_name: Option<String>,
    pub last_message_timestamp: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub interaction_count: u32,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ConversationRequest {
    pub messages: Vec<Message>,
    pub model_id: String,
    pub character_id: Uuid,
    #[serde(default)]
    pub session_id: Option<Uuid>,
    /// Sessions are only persisted for identified users
    #[serde(default)]
    pub user_id: Option<String>,
}

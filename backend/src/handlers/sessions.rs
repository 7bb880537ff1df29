use crate::AppState;
use crate::chat::ChatError;
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::Deserialize;
use shared::models::{
    ChatSession, ConversationSummary, CreateSessionRequest, CreateSessionResponse,
};
use uuid::Uuid;

#[derive(Deserialize)]
pub struct UserQuery {
    pub user_id: String,
}

fn status_for(e: ChatError) -> StatusCode {
    match e {
        ChatError::CharacterNotFound(_) => StatusCode::NOT_FOUND,
        e => {
            tracing::error!("Session request failed: {:?}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

pub async fn list_character_sessions(
    State(state): State<AppState>,
    Path(character_id): Path<Uuid>,
    Query(query): Query<UserQuery>,
) -> Result<Json<Vec<ChatSession>>, StatusCode> {
    let sessions = state
        .chat
        .sessions_for_character(&query.user_id, character_id)
        .await
        .map_err(status_for)?;
    Ok(Json(sessions))
}

pub async fn create_session(
    State(state): State<AppState>,
    Json(payload): Json<CreateSessionRequest>,
) -> Result<Json<CreateSessionResponse>, StatusCode> {
    if payload.user_id.is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }
    let id = state
        .chat
        .create_chat_session(&payload.user_id, payload.character_id)
        .await
        .map_err(status_for)?;
    Ok(Json(CreateSessionResponse { id }))
}

pub async fn list_conversations(
    State(state): State<AppState>,
    Query(query): Query<UserQuery>,
) -> Result<Json<Vec<ConversationSummary>>, StatusCode> {
    let conversations = state
        .chat
        .conversations(&query.user_id)
        .await
        .map_err(status_for)?;
    Ok(Json(conversations))
}

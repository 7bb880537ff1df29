use crate::AppState;
use crate::chat::ChatError;
use axum::{
    Json,
    body::Body,
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use futures::StreamExt;
use shared::models::ConversationRequest;
use std::convert::Infallible;

fn data_frame(chunk: &str) -> String {
    let encoded = serde_json::to_string(chunk)
        .unwrap_or_else(|_| format!("\"{}\"", chunk.replace('"', "\\\"")));
    format!("data: {}\n\n", encoded)
}

pub async fn continue_conversation(
    State(state): State<AppState>,
    Json(payload): Json<ConversationRequest>,
) -> Response {
    let mut text = match state.chat.continue_conversation(payload).await {
        Ok(text) => text,
        Err(ChatError::CharacterNotFound(_)) => {
            return (StatusCode::NOT_FOUND, "Character not found").into_response();
        }
        Err(e @ ChatError::Generation(_)) => {
            return (StatusCode::BAD_GATEWAY, e.to_string()).into_response();
        }
        Err(e) => {
            tracing::error!("Failed to start conversation turn: {:?}", e);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Database error").into_response();
        }
    };

    let body = Body::from_stream(async_stream::stream! {
        while let Some(item) = text.next().await {
            match item {
                Ok(chunk) => yield Ok::<String, Infallible>(data_frame(&chunk)),
                Err(e) => {
                    tracing::error!("Stream interrupted: {}", e);
                    yield Ok(format!("data: [ERROR] {}\n\n", e));
                    return;
                }
            }
        }
        yield Ok("data: [DONE]\n\n".to_string());
    });

    (
        [
            (header::CONTENT_TYPE, "text/event-stream"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        body,
    )
        .into_response()
}

pub mod catalog;
pub mod chat;
pub mod config;
pub mod dbs;
mod handlers;
pub mod params;
pub mod providers;
pub mod routing;
pub mod stream;
pub mod turn;

use crate::chat::ChatService;
use crate::config::BackendConfig;
use crate::dbs::{Database, DbResult};
use crate::handlers::*;
use crate::providers::ProviderManager;
use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<dyn Database>,
    pub chat: ChatService,
}

impl AppState {
    pub fn new(db: Arc<dyn Database>, providers: ProviderManager) -> Self {
        Self {
            chat: ChatService::new(db.clone(), providers),
            db,
        }
    }

    pub async fn from_config(config: &BackendConfig) -> DbResult<Self> {
        let db = dbs::connect(&config.database).await?;
        Ok(Self::new(db, ProviderManager::from_config(config)))
    }
}

pub fn init(router: Router<AppState>, state: AppState) -> Router<()> {
    router
        .route("/api/health", get(|| async { "OK" }))
        .route(
            "/api/characters",
            get(list_characters).post(create_character),
        )
        .route(
            "/api/characters/{character_id}",
            get(get_character).delete(delete_character),
        )
        .route(
            "/api/characters/{character_id}/sessions",
            get(list_character_sessions),
        )
        .route("/api/sessions", post(create_session))
        .route("/api/conversations", get(list_conversations))
        .route("/api/chat", post(continue_conversation))
        .route("/api/providers", get(list_providers))
        .route("/api/providers/test", post(test_provider))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dbs::LocalDatabase;
    use crate::providers::testing::{Reply, ScriptedProvider};
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode, header};
    use shared::models::{Character, ProviderKind, ProviderOverview};
    use tower::ServiceExt;

    async fn app(reply: Reply) -> (Router, Character) {
        let db: Arc<dyn Database> = Arc::new(LocalDatabase::in_memory());
        let mut character = Character::new("Ada", "You are Ada.");
        character.greeting = "Hello!".into();
        db.create_character(character.clone()).await.unwrap();

        let mut providers = ProviderManager::new();
        providers.register(Arc::new(ScriptedProvider::new(ProviderKind::Groq, reply)));
        (init(Router::new(), AppState::new(db, providers)), character)
    }

    fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_text(response: axum::response::Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn health_check() {
        let (app, _) = app(Reply::Chunks(vec![])).await;
        let response = app
            .oneshot(Request::get("/api/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "OK");
    }

    #[tokio::test]
    async fn chat_streams_sse_frames() {
        let (app, character) = app(Reply::Chunks(vec!["Hel", "lo"])).await;
        let request = json_request(
            "POST",
            "/api/chat",
            serde_json::json!({
                "messages": [{"role": "user", "content": "hi"}],
                "model_id": "llama3-8b-8192",
                "character_id": character.id,
            }),
        );

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/event-stream"
        );
        assert_eq!(
            body_text(response).await,
            "data: \"Hel\"\n\ndata: \"lo\"\n\ndata: [DONE]\n\n"
        );
    }

    #[tokio::test]
    async fn chat_reports_stream_errors_inline() {
        let (app, character) =
            app(Reply::ChunksThenError(vec!["Hel"], "connection reset")).await;
        let request = json_request(
            "POST",
            "/api/chat",
            serde_json::json!({
                "messages": [{"role": "user", "content": "hi"}],
                "model_id": "llama3-8b-8192",
                "character_id": character.id,
            }),
        );

        let body = body_text(app.oneshot(request).await.unwrap()).await;
        assert!(body.starts_with("data: \"Hel\"\n\ndata: [ERROR] "));
        assert!(!body.contains("[DONE]"));
    }

    #[tokio::test]
    async fn chat_with_unknown_character_is_not_found() {
        let (app, _) = app(Reply::Chunks(vec![])).await;
        let request = json_request(
            "POST",
            "/api/chat",
            serde_json::json!({
                "messages": [],
                "model_id": "llama3-8b-8192",
                "character_id": uuid::Uuid::new_v4(),
            }),
        );
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn chat_with_failing_provider_is_bad_gateway() {
        let (app, character) = app(Reply::Fail).await;
        let request = json_request(
            "POST",
            "/api/chat",
            serde_json::json!({
                "messages": [{"role": "user", "content": "hi"}],
                "model_id": "llama3-8b-8192",
                "character_id": character.id,
            }),
        );
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(
            body_text(response).await,
            "Failed to generate response. Please try again later."
        );
    }

    #[tokio::test]
    async fn provider_test_requires_known_provider() {
        let (app, _) = app(Reply::Chunks(vec![])).await;

        let missing = app
            .clone()
            .oneshot(json_request("POST", "/api/providers/test", serde_json::json!({})))
            .await
            .unwrap();
        assert_eq!(missing.status(), StatusCode::BAD_REQUEST);

        let unknown = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/providers/test",
                serde_json::json!({"provider": "anthropic"}),
            ))
            .await
            .unwrap();
        assert_eq!(unknown.status(), StatusCode::BAD_REQUEST);

        let groq = app
            .oneshot(json_request(
                "POST",
                "/api/providers/test",
                serde_json::json!({"provider": "groq"}),
            ))
            .await
            .unwrap();
        assert_eq!(groq.status(), StatusCode::OK);
        let body: serde_json::Value = serde_json::from_str(&body_text(groq).await).unwrap();
        assert_eq!(body["success"], true);
        assert_eq!(body["provider"], "groq");
    }

    #[tokio::test]
    async fn provider_overview_lists_catalog_and_status() {
        let (app, _) = app(Reply::Chunks(vec![])).await;
        let response = app
            .oneshot(Request::get("/api/providers").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let overview: ProviderOverview =
            serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(overview.providers.available, vec![ProviderKind::Groq]);
        assert_eq!(overview.models.all.len(), overview.providers.total_models);
        assert!(overview.models.unfiltered.iter().all(|m| m.unfiltered));
        assert_eq!(
            overview.status[&ProviderKind::HuggingFace].error.as_deref(),
            Some("HF_API_KEY not configured")
        );
        assert_eq!(overview.metadata.version, "1.0.0");
    }

    #[tokio::test]
    async fn sessions_and_conversations_round_trip() {
        let (app, character) = app(Reply::Chunks(vec![])).await;

        let created = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/sessions",
                serde_json::json!({"user_id": "u1", "character_id": character.id}),
            ))
            .await
            .unwrap();
        assert_eq!(created.status(), StatusCode::OK);
        let created: serde_json::Value =
            serde_json::from_str(&body_text(created).await).unwrap();

        let listed = app
            .oneshot(
                Request::get("/api/conversations?user_id=u1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let listed: serde_json::Value = serde_json::from_str(&body_text(listed).await).unwrap();
        assert_eq!(listed[0]["id"], created["id"]);
        assert_eq!(listed[0]["character_name"], "Ada");
    }
}

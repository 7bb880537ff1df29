use crate::dbs::{Database, DbError};
use crate::params::normalize_params;
use crate::providers::{ProviderError, ProviderManager};
use crate::routing::{Route, upstream_model_id};
use crate::stream::{TextChunkStream, adapt_to_text_stream};
use crate::turn::{BestEffort, TurnContext, complete_turn};
use futures::StreamExt;
use shared::models::{
    Character, ChatSession, ConversationRequest, ConversationSummary, Message, Role,
};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum ChatError {
    #[error("Character not found: {0}")]
    CharacterNotFound(Uuid),
    #[error(transparent)]
    Db(#[from] DbError),
    #[error("Failed to generate response. Please try again later.")]
    Generation(#[source] ProviderError),
}

/// Entry point for chat turns and the session bookkeeping around them.
#[derive(Clone)]
pub struct ChatService {
    db: Arc<dyn Database>,
    providers: ProviderManager,
}

impl ChatService {
    pub fn new(db: Arc<dyn Database>, providers: ProviderManager) -> Self {
        Self { db, providers }
    }

    pub fn db(&self) -> &Arc<dyn Database> {
        &self.db
    }

    pub fn providers(&self) -> &ProviderManager {
        &self.providers
    }

    async fn load_character(&self, character_id: Uuid) -> Result<Character, ChatError> {
        match self.db.get_character(character_id).await {
            Ok(character) => Ok(character),
            Err(DbError::NotFound(_)) => Err(ChatError::CharacterNotFound(character_id)),
            Err(e) => Err(e.into()),
        }
    }

    /// Opens a session seeded with the character prompt and greeting.
    pub async fn create_chat_session(
        &self,
        user_id: &str,
        character_id: Uuid,
    ) -> Result<Uuid, ChatError> {
        let character = self.load_character(character_id).await?;
        let session = ChatSession::new(
            user_id,
            character.id,
            vec![
                Message::system(character.description),
                Message::assistant(character.greeting),
            ],
        );
        let id = session.id;
        self.db.create_session(session).await?;
        tracing::info!("Created new chat session: {}", id);
        Ok(id)
    }

    /// Runs one chat turn and returns the reply as a text stream.
    ///
    /// When the request names a user, the session is stored once the stream
    /// has been read to the end.
    pub async fn continue_conversation(
        &self,
        request: ConversationRequest,
    ) -> Result<TextChunkStream, ChatError> {
        let character = self.load_character(request.character_id).await?;

        if let BestEffort::Degraded(reason) = BestEffort::from_result(
            "Failed to update interaction count",
            self.db.record_character_interaction(character.id).await,
        ) {
            tracing::debug!(
                "Continuing turn for character {} without counting it: {}",
                character.id,
                reason
            );
        }

        let route = Route::for_model(&request.model_id);
        let params = normalize_params(&character, &request.model_id);
        let messages = with_system_prompt(request.messages, &character);

        let provider = self
            .providers
            .provider_for(&request.model_id)
            .map_err(generation_failed)?;
        tracing::debug!(
            "Routing {} to {} ({:?})",
            request.model_id,
            provider.kind(),
            route
        );

        let result = provider
            .generate_completion(upstream_model_id(&request.model_id), &messages, &params)
            .await
            .map_err(generation_failed)?;
        let text = adapt_to_text_stream(result);

        match request.user_id {
            Some(user_id) => {
                let ctx = TurnContext {
                    user_id,
                    character_id: character.id,
                    session_id: request.session_id,
                };
                Ok(self.persist_on_finish(text, ctx, messages))
            }
            None => Ok(text),
        }
    }

    fn persist_on_finish(
        &self,
        mut text: TextChunkStream,
        ctx: TurnContext,
        messages: Vec<Message>,
    ) -> TextChunkStream {
        let db = self.db.clone();
        Box::pin(async_stream::stream! {
            let mut full_response = String::new();
            while let Some(item) = text.next().await {
                match item {
                    Ok(chunk) => {
                        full_response.push_str(&chunk);
                        yield Ok(chunk);
                    }
                    Err(e) => {
                        yield Err(e);
                        return;
                    }
                }
            }
            match complete_turn(db.as_ref(), &ctx, messages, full_response).await {
                BestEffort::Done(outcome) => tracing::debug!(
                    "Turn stored in session {} ({} interactions)",
                    outcome.session_id,
                    outcome.interaction_count
                ),
                BestEffort::Degraded(reason) => {
                    tracing::debug!("Turn for user {} was not stored: {}", ctx.user_id, reason)
                }
            }
        })
    }

    /// Latest session per character for one user, most recent first.
    pub async fn conversations(&self, user_id: &str) -> Result<Vec<ConversationSummary>, ChatError> {
        let sessions = self.db.get_user_sessions(user_id).await?;
        let names: HashMap<Uuid, String> = self
            .db
            .get_characters()
            .await?
            .into_iter()
            .map(|c| (c.id, c.name))
            .collect();

        let mut seen = HashSet::new();
        Ok(sessions
            .into_iter()
            .filter(|s| seen.insert(s.character_id))
            .map(|s| ConversationSummary {
                id: s.id,
                character_id: s.character_id,
                character_name: names.get(&s.character_id).cloned(),
                last_message_timestamp: s.last_message_timestamp,
                updated_at: s.updated_at,
                interaction_count: s.interaction_count,
            })
            .collect())
    }

    pub async fn sessions_for_character(
        &self,
        user_id: &str,
        character_id: Uuid,
    ) -> Result<Vec<ChatSession>, ChatError> {
        Ok(self.db.get_sessions(user_id, character_id).await?)
    }
}

fn generation_failed(e: ProviderError) -> ChatError {
    tracing::error!("Failed to generate or stream response: {}", e);
    ChatError::Generation(e)
}

fn with_system_prompt(mut messages: Vec<Message>, character: &Character) -> Vec<Message> {
    let has_system = messages.first().is_some_and(|m| m.role == Role::System);
    if !has_system && !character.description.is_empty() {
        messages.insert(0, Message::system(character.description.clone()));
    }
    messages
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dbs::{DbResult, LocalDatabase};
    use crate::providers::testing::{Reply, ScriptedProvider};
    use crate::stream::StreamError;
    use chrono::{Duration, Utc};
    use shared::models::ProviderKind;

    struct Fixture {
        service: ChatService,
        provider: Arc<ScriptedProvider>,
        character: Character,
    }

    async fn fixture(kind: ProviderKind, reply: Reply) -> Fixture {
        let db: Arc<dyn Database> = Arc::new(LocalDatabase::in_memory());
        let mut character = Character::new("Ada", "You are Ada, a patient tutor.");
        character.greeting = "Hello! Ready to learn?".into();
        db.create_character(character.clone()).await.unwrap();

        let provider = Arc::new(ScriptedProvider::new(kind, reply));
        let mut providers = ProviderManager::new();
        providers.register(provider.clone());

        Fixture {
            service: ChatService::new(db, providers),
            provider,
            character,
        }
    }

    fn request(fx: &Fixture, model_id: &str, user_id: Option<&str>) -> ConversationRequest {
        ConversationRequest {
            messages: vec![Message::user("What is a monad?")],
            model_id: model_id.into(),
            character_id: fx.character.id,
            session_id: None,
            user_id: user_id.map(String::from),
        }
    }

    #[tokio::test]
    async fn streams_reply_and_stores_session() {
        let fx = fixture(ProviderKind::Groq, Reply::Chunks(vec!["A monad ", "is a monoid."])).await;

        let stream = fx
            .service
            .continue_conversation(request(&fx, "llama3-8b-8192", Some("u1")))
            .await
            .unwrap();
        let chunks: Vec<_> = stream.collect().await;
        assert_eq!(
            chunks,
            vec![Ok("A monad ".to_string()), Ok("is a monoid.".to_string())]
        );

        let sessions = fx.service.sessions_for_character("u1", fx.character.id).await.unwrap();
        assert_eq!(sessions.len(), 1);
        let messages = &sessions[0].messages;
        assert_eq!(messages[0], Message::system("You are Ada, a patient tutor."));
        assert_eq!(messages.last(), Some(&Message::assistant("A monad is a monoid.")));

        let character = fx.service.db().get_character(fx.character.id).await.unwrap();
        assert_eq!(character.interaction_count, 1);
    }

    #[tokio::test]
    async fn anonymous_turns_are_not_stored() {
        let fx = fixture(ProviderKind::Groq, Reply::Chunks(vec!["Hi"])).await;
        let stream = fx
            .service
            .continue_conversation(request(&fx, "llama3-8b-8192", None))
            .await
            .unwrap();
        let _: Vec<_> = stream.collect().await;
        assert!(fx.service.db().get_user_sessions("u1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn interrupted_stream_skips_persistence() {
        let fx = fixture(
            ProviderKind::Groq,
            Reply::ChunksThenError(vec!["par"], "connection reset"),
        )
        .await;
        let stream = fx
            .service
            .continue_conversation(request(&fx, "llama3-8b-8192", Some("u1")))
            .await
            .unwrap();
        let chunks: Vec<_> = stream.collect().await;
        assert_eq!(
            chunks,
            vec![
                Ok("par".to_string()),
                Err(StreamError::Transport("connection reset".into()))
            ]
        );
        assert!(fx.service.db().get_user_sessions("u1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unknown_models_use_openrouter_defaults() {
        let fx = fixture(ProviderKind::OpenRouter, Reply::Single("Hi")).await;
        let stream = fx
            .service
            .continue_conversation(request(&fx, "anthropic/claude-3-haiku", None))
            .await
            .unwrap();
        let chunks: Vec<_> = stream.collect().await;
        assert_eq!(chunks, vec![Ok("Hi".to_string())]);

        let seen = fx.provider.seen.lock().unwrap();
        let (model, _, params) = &seen[0];
        assert_eq!(model, "anthropic/claude-3-haiku");
        assert_eq!(params.temperature, 1.0);
        assert_eq!(params.top_k, Some(0));
    }

    #[tokio::test]
    async fn provider_failure_is_a_generation_error() {
        let fx = fixture(ProviderKind::Groq, Reply::Fail).await;
        let err = fx
            .service
            .continue_conversation(request(&fx, "llama3-8b-8192", Some("u1")))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, ChatError::Generation(ProviderError::Status { status: 503, .. })));
        assert_eq!(
            err.to_string(),
            "Failed to generate response. Please try again later."
        );
    }

    #[tokio::test]
    async fn missing_route_provider_is_a_generation_error() {
        let fx = fixture(ProviderKind::Groq, Reply::Chunks(vec![])).await;
        let err = fx
            .service
            .continue_conversation(request(&fx, "microsoft/DialoGPT-small", None))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, ChatError::Generation(ProviderError::Unavailable(_))));
    }

    #[tokio::test]
    async fn unknown_character_is_reported() {
        let fx = fixture(ProviderKind::Groq, Reply::Chunks(vec![])).await;
        let mut req = request(&fx, "llama3-8b-8192", None);
        req.character_id = Uuid::new_v4();
        assert!(matches!(
            fx.service.continue_conversation(req).await,
            Err(ChatError::CharacterNotFound(_))
        ));
    }

    #[tokio::test]
    async fn new_session_is_seeded_with_prompt_and_greeting() {
        let fx = fixture(ProviderKind::Groq, Reply::Chunks(vec![])).await;
        let id = fx
            .service
            .create_chat_session("u1", fx.character.id)
            .await
            .unwrap();
        let session = fx.service.db().get_session(id).await.unwrap();
        assert_eq!(session.interaction_count, 1);
        assert_eq!(
            session.messages,
            vec![
                Message::system("You are Ada, a patient tutor."),
                Message::assistant("Hello! Ready to learn?"),
            ]
        );
    }

    #[tokio::test]
    async fn conversations_list_latest_session_per_character() {
        let fx = fixture(ProviderKind::Groq, Reply::Chunks(vec![])).await;
        let db = fx.service.db();

        let mut old = ChatSession::new("u1", fx.character.id, vec![]);
        old.updated_at = Utc::now() - Duration::hours(1);
        let recent = ChatSession::new("u1", fx.character.id, vec![]);
        let orphan = ChatSession::new("u1", Uuid::new_v4(), vec![]);
        for session in [old, recent.clone(), orphan.clone()] {
            db.create_session(session).await.unwrap();
        }

        let conversations = fx.service.conversations("u1").await.unwrap();
        assert_eq!(conversations.len(), 2);
        let ada = conversations
            .iter()
            .find(|c| c.character_id == fx.character.id)
            .unwrap();
        assert_eq!(ada.id, recent.id);
        assert_eq!(ada.character_name.as_deref(), Some("Ada"));
        let unknown = conversations
            .iter()
            .find(|c| c.id == orphan.id)
            .unwrap();
        assert_eq!(unknown.character_name, None);
    }

    /// Reads characters from an in-memory store but rejects every write.
    struct ReadOnlyDatabase(LocalDatabase);

    fn read_only() -> DbError {
        DbError::Internal("read-only".into())
    }

    #[async_trait::async_trait]
    impl Database for ReadOnlyDatabase {
        async fn get_characters(&self) -> DbResult<Vec<Character>> {
            self.0.get_characters().await
        }
        async fn get_character(&self, id: Uuid) -> DbResult<Character> {
            self.0.get_character(id).await
        }
        async fn create_character(&self, _: Character) -> DbResult<()> {
            Err(read_only())
        }
        async fn delete_character(&self, _: Uuid) -> DbResult<()> {
            Err(read_only())
        }
        async fn record_character_interaction(&self, _: Uuid) -> DbResult<()> {
            Err(read_only())
        }
        async fn get_session(&self, id: Uuid) -> DbResult<ChatSession> {
            self.0.get_session(id).await
        }
        async fn find_session(
            &self,
            id: Uuid,
            user_id: &str,
            character_id: Uuid,
        ) -> DbResult<Option<ChatSession>> {
            self.0.find_session(id, user_id, character_id).await
        }
        async fn get_sessions(&self, user_id: &str, character_id: Uuid) -> DbResult<Vec<ChatSession>> {
            self.0.get_sessions(user_id, character_id).await
        }
        async fn get_user_sessions(&self, user_id: &str) -> DbResult<Vec<ChatSession>> {
            self.0.get_user_sessions(user_id).await
        }
        async fn create_session(&self, _: ChatSession) -> DbResult<()> {
            Err(read_only())
        }
        async fn update_session(&self, _: &ChatSession) -> DbResult<()> {
            Err(read_only())
        }
    }

    #[tokio::test]
    async fn storage_failures_do_not_interrupt_the_reply() {
        let store = LocalDatabase::in_memory();
        let character = Character::new("Ada", "You are Ada.");
        store.create_character(character.clone()).await.unwrap();
        let db: Arc<dyn Database> = Arc::new(ReadOnlyDatabase(store));

        let mut providers = ProviderManager::new();
        providers.register(Arc::new(ScriptedProvider::new(
            ProviderKind::Groq,
            Reply::Chunks(vec!["Hel", "lo"]),
        )));
        let service = ChatService::new(db, providers);

        let stream = service
            .continue_conversation(ConversationRequest {
                messages: vec![Message::user("hi")],
                model_id: "llama3-8b-8192".into(),
                character_id: character.id,
                session_id: None,
                user_id: Some("u1".into()),
            })
            .await
            .unwrap();
        let chunks: Vec<_> = stream.collect().await;
        assert_eq!(chunks, vec![Ok("Hel".to_string()), Ok("lo".to_string())]);
        assert!(service.db().get_user_sessions("u1").await.unwrap().is_empty());
    }

    #[test]
    fn existing_system_prompt_is_kept() {
        let character = Character::new("Ada", "You are Ada.");
        let messages = with_system_prompt(
            vec![Message::system("Custom"), Message::user("hi")],
            &character,
        );
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].content, "Custom");
    }
}

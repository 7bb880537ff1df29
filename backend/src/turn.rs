use crate::dbs::{Database, DbResult};
use chrono::Utc;
use shared::models::{ChatSession, Message};
use std::fmt::Display;
use uuid::Uuid;

/// Outcome of work that runs after the user already has their answer.
///
/// Failures are logged where they happen and kept as `Degraded` so callers
/// can tell them apart from success without having to handle them.
#[derive(Debug, Clone, PartialEq)]
pub enum BestEffort<T> {
    Done(T),
    Degraded(String),
}

impl<T> BestEffort<T> {
    pub fn from_result<E: Display>(context: &str, result: Result<T, E>) -> Self {
        match result {
            Ok(value) => BestEffort::Done(value),
            Err(e) => {
                tracing::error!("{}: {}", context, e);
                BestEffort::Degraded(e.to_string())
            }
        }
    }

    pub fn is_done(&self) -> bool {
        matches!(self, BestEffort::Done(_))
    }

    pub fn ok(self) -> Option<T> {
        match self {
            BestEffort::Done(value) => Some(value),
            BestEffort::Degraded(_) => None,
        }
    }
}

/// Who the turn belongs to and which session it continues.
#[derive(Debug, Clone)]
pub struct TurnContext {
    pub user_id: String,
    pub character_id: Uuid,
    pub session_id: Option<Uuid>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TurnOutcome {
    pub session_id: Uuid,
    pub created: bool,
    pub interaction_count: u32,
    pub messages: Vec<Message>,
}

/// Appends the assistant reply and stores the conversation.
///
/// Not idempotent: running it twice for one turn appends the reply twice.
pub async fn complete_turn(
    db: &dyn Database,
    ctx: &TurnContext,
    mut messages: Vec<Message>,
    assistant_text: String,
) -> BestEffort<TurnOutcome> {
    messages.push(Message::assistant(assistant_text));
    BestEffort::from_result(
        "Failed to update chat session",
        persist_turn(db, ctx, messages).await,
    )
}

async fn persist_turn(
    db: &dyn Database,
    ctx: &TurnContext,
    messages: Vec<Message>,
) -> DbResult<TurnOutcome> {
    let existing = match ctx.session_id {
        Some(id) => db.find_session(id, &ctx.user_id, ctx.character_id).await?,
        None => db.latest_session(&ctx.user_id, ctx.character_id).await?,
    };

    match existing {
        Some(mut session) => {
            let now = Utc::now();
            session.messages = messages;
            session.interaction_count += 1;
            session.last_message_timestamp = now;
            session.updated_at = now;
            db.update_session(&session).await?;
            tracing::info!("Updated chat session: {}", session.id);
            Ok(TurnOutcome {
                session_id: session.id,
                created: false,
                interaction_count: session.interaction_count,
                messages: session.messages,
            })
        }
        None => {
            let session = ChatSession::new(ctx.user_id.clone(), ctx.character_id, messages);
            db.create_session(session.clone()).await?;
            tracing::info!("Created new chat session: {}", session.id);
            Ok(TurnOutcome {
                session_id: session.id,
                created: true,
                interaction_count: session.interaction_count,
                messages: session.messages,
            })
        }
    }
}

//! Customer conversations and staff replies.

use std::collections::BTreeMap;

use askama::Template;
use askama_web::WebTemplate;
use autosalon_core::{ChatMessage, MessageSender, NewMessage};
use axum::{
    Form, Router,
    extract::{Query, State},
    response::Redirect,
    routing::{get, post},
};
use serde::Deserialize;
use tracing::instrument;

use super::AdminPage;
use crate::error::{AppError, Result};
use crate::filters;
use crate::middleware::RequireAdminAuth;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/admin/chat", get(index))
        .route("/admin/chat/reply", post(reply))
}

#[derive(Debug, Clone)]
pub struct MessageView {
    pub from_customer: bool,
    pub author: String,
    pub body: String,
    pub sent_at: String,
}

/// One customer thread.
#[derive(Debug, Clone)]
pub struct Conversation {
    pub id: String,
    /// Name of the customer who opened the thread.
    pub customer: String,
    pub messages: Vec<MessageView>,
    /// Whether the last message is from the customer.
    pub awaiting_reply: bool,
    pub href: String,
}

/// Group messages (oldest first) into threads, most recently active first.
#[must_use]
pub fn conversations(messages: &[ChatMessage]) -> Vec<Conversation> {
    let mut threads: BTreeMap<&str, Vec<&ChatMessage>> = BTreeMap::new();
    for message in messages {
        threads.entry(message.conversation_id.as_str()).or_default().push(message);
    }

    let mut conversations: Vec<_> = threads
        .into_iter()
        .map(|(id, thread)| {
            let customer = thread
                .iter()
                .find(|m| m.sender == MessageSender::Customer)
                .map_or_else(|| "Customer".to_string(), |m| m.author.clone());
            let last = thread.last().map(|m| (m.created_at, m.sender));
            let conversation = Conversation {
                id: id.to_string(),
                customer,
                messages: thread
                    .iter()
                    .map(|m| MessageView {
                        from_customer: m.sender == MessageSender::Customer,
                        author: m.author.clone(),
                        body: m.body.clone(),
                        sent_at: m.created_at.format("%d.%m %H:%M").to_string(),
                    })
                    .collect(),
                awaiting_reply: last.is_some_and(|(_, sender)| sender == MessageSender::Customer),
                href: format!("/admin/chat?conversation={}", urlencoded(id)),
            };
            (last.map(|(at, _)| at), conversation)
        })
        .collect();

    conversations.sort_by(|a, b| b.0.cmp(&a.0));
    conversations.into_iter().map(|(_, c)| c).collect()
}

fn urlencoded(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

#[derive(Template, WebTemplate)]
#[template(path = "admin/chat.html")]
pub struct ChatTemplate {
    pub page: AdminPage,
    pub conversations: Vec<Conversation>,
    pub selected: Option<Conversation>,
    pub load_error: bool,
    pub max_body: usize,
}

#[derive(Debug, Default, Deserialize)]
pub struct ChatQuery {
    pub conversation: Option<String>,
}

/// GET /admin/chat
#[instrument(skip_all)]
pub async fn index(
    State(state): State<AppState>,
    RequireAdminAuth(admin): RequireAdminAuth,
    Query(query): Query<ChatQuery>,
) -> ChatTemplate {
    // Reads degrade to an empty list with a notice
    let (messages, load_error) = match state.context().remote().fetch_messages().await {
        Ok(messages) => (messages, false),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to load chat messages");
            (Vec::new(), true)
        }
    };

    let conversations = conversations(&messages);
    let selected = query
        .conversation
        .as_deref()
        .and_then(|id| conversations.iter().find(|c| c.id == id))
        .or_else(|| conversations.first())
        .cloned();

    ChatTemplate {
        page: AdminPage::build(&state, &admin, "/admin/chat").await,
        conversations,
        selected,
        load_error,
        max_body: NewMessage::MAX_BODY,
    }
}

#[derive(Debug, Deserialize)]
pub struct ReplyForm {
    pub conversation_id: String,
    pub body: String,
}

/// POST /admin/chat/reply
#[instrument(skip_all)]
pub async fn reply(
    State(state): State<AppState>,
    RequireAdminAuth(admin): RequireAdminAuth,
    Form(form): Form<ReplyForm>,
) -> Result<Redirect> {
    let message = NewMessage {
        conversation_id: form.conversation_id.trim().to_string(),
        sender: MessageSender::Admin,
        author: admin.email.to_string(),
        body: form.body.trim().to_string(),
    };
    if !message.is_valid() {
        return Err(AppError::BadRequest(format!(
            "reply must be 1 to {} characters",
            NewMessage::MAX_BODY
        )));
    }

    state.context().remote().insert_message(&message).await?;
    tracing::info!(conversation = %message.conversation_id, admin = %admin.email, "Chat reply sent");

    Ok(Redirect::to(&format!(
        "/admin/chat?conversation={}",
        urlencoded(&message.conversation_id)
    )))
}

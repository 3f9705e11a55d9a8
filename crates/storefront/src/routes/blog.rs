//! Blog page with the AI car-advice assistant.

use askama::Template;
use askama_web::WebTemplate;
use autosalon_sync::functions::MAX_QUESTION_CHARS;
use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use super::views::Layout;
use crate::error::Result;
use crate::filters;
use crate::middleware::Visitor;
use crate::state::AppState;

#[derive(Template, WebTemplate)]
#[template(path = "blog.html")]
pub struct BlogTemplate {
    pub layout: Layout,
    pub max_question: usize,
}

#[derive(Debug, Deserialize)]
pub struct AskRequest {
    pub question: String,
}

#[derive(Debug, Serialize)]
pub struct AskResponse {
    pub answer: String,
}

/// GET /blog
#[instrument(skip_all)]
pub async fn index(State(state): State<AppState>, visitor: Visitor) -> Result<BlogTemplate> {
    let favorites = state
        .context()
        .favorites(&visitor.owner, &state.request_token())
        .await;
    let compare = visitor.compare_list().await?;

    Ok(BlogTemplate {
        layout: Layout::build(&state, &favorites, &compare).await,
        max_question: MAX_QUESTION_CHARS,
    })
}

/// Ask the assistant a question.
///
/// POST /api/blog/ask
#[instrument(skip_all)]
pub async fn ask(
    State(state): State<AppState>,
    Json(request): Json<AskRequest>,
) -> Result<Json<AskResponse>> {
    let answer = state.functions().ask_assistant(&request.question).await?;
    Ok(Json(AskResponse { answer }))
}

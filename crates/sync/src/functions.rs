//! Client for the backend's serverless functions.
//!
//! - `blog-ai-assistant`: answers a visitor question for the blog widget.
//!   Answers are cached per normalized question for 10 minutes.
//! - `telegram-notify`: tells the sales team about a new inquiry.

use std::sync::Arc;
use std::time::Duration;

use autosalon_core::Order;
use moka::future::Cache;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, instrument};
use url::Url;

use crate::error::RemoteError;
use crate::remote::{RemoteConfig, authenticated_client, error_from_response};

const ASSISTANT_FUNCTION: &str = "blog-ai-assistant";
const NOTIFY_FUNCTION: &str = "telegram-notify";

/// Longest question the widget forwards.
pub const MAX_QUESTION_CHARS: usize = 500;

/// Serverless function errors.
#[derive(Debug, Error)]
pub enum FunctionsError {
    #[error("question is empty")]
    EmptyQuestion,

    #[error("question is too long (max {max} characters)")]
    QuestionTooLong { max: usize },

    #[error(transparent)]
    Remote(#[from] RemoteError),
}

impl From<reqwest::Error> for FunctionsError {
    fn from(err: reqwest::Error) -> Self {
        Self::Remote(err.into())
    }
}

#[derive(Serialize)]
struct AskRequest<'a> {
    question: &'a str,
}

#[derive(Deserialize)]
struct AskResponse {
    answer: String,
}

#[derive(Serialize)]
struct NotifyRequest<'a> {
    order: &'a Order,
    #[serde(rename = "adminChatIds", skip_serializing_if = "Option::is_none")]
    admin_chat_ids: Option<&'a [String]>,
}

/// Response of `telegram-notify`.
#[derive(Debug, Clone, Deserialize)]
pub struct NotifyResponse {
    pub message: String,
    /// Per-chat delivery results as returned by the bot API.
    #[serde(default)]
    pub results: Vec<serde_json::Value>,
}

/// Collapse whitespace and lowercase, so near-identical questions share a cache entry.
fn normalize_question(question: &str) -> String {
    question
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Client for the backend's serverless functions.
#[derive(Clone)]
pub struct FunctionsClient {
    inner: Arc<FunctionsInner>,
}

struct FunctionsInner {
    client: reqwest::Client,
    base: Url,
    answers: Cache<String, String>,
}

impl FunctionsClient {
    /// How long assistant answers stay cached.
    pub const ANSWER_TTL: Duration = Duration::from_secs(600);

    /// Create a new client. Functions are always called with the public key.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client fails to build or the base URL is invalid.
    pub fn new(config: &RemoteConfig) -> Result<Self, FunctionsError> {
        let client = authenticated_client(&config.anon_key, config.timeout)?;
        let base = config
            .endpoint("functions/v1/")
            .map_err(RemoteError::from)?;
        let answers = Cache::builder()
            .max_capacity(1000)
            .time_to_live(Self::ANSWER_TTL)
            .build();

        Ok(Self {
            inner: Arc::new(FunctionsInner {
                client,
                base,
                answers,
            }),
        })
    }

    async fn invoke<B: Serialize + Sync, R: DeserializeOwned>(
        &self,
        function: &str,
        body: &B,
    ) -> Result<R, FunctionsError> {
        let url = self.inner.base.join(function).map_err(RemoteError::from)?;
        let response = self.inner.client.post(url).json(body).send().await?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await.into());
        }
        response
            .json::<R>()
            .await
            .map_err(|e| RemoteError::Decode(e.to_string()).into())
    }

    /// Ask the blog assistant a question.
    ///
    /// # Errors
    ///
    /// Returns an error for empty or overlong questions, or when the function call fails.
    #[instrument(skip(self, question))]
    pub async fn ask_assistant(&self, question: &str) -> Result<String, FunctionsError> {
        let normalized = normalize_question(question);
        if normalized.is_empty() {
            return Err(FunctionsError::EmptyQuestion);
        }
        if normalized.chars().count() > MAX_QUESTION_CHARS {
            return Err(FunctionsError::QuestionTooLong {
                max: MAX_QUESTION_CHARS,
            });
        }

        if let Some(answer) = self.inner.answers.get(&normalized).await {
            debug!("Cache hit for assistant answer");
            return Ok(answer);
        }

        let response: AskResponse = self
            .invoke(ASSISTANT_FUNCTION, &AskRequest {
                question: question.trim(),
            })
            .await?;

        self.inner
            .answers
            .insert(normalized, response.answer.clone())
            .await;
        Ok(response.answer)
    }

    /// Notify the sales team about an order.
    ///
    /// `admin_chat_ids` overrides the function's default chat.
    ///
    /// # Errors
    ///
    /// Returns an error when the function call fails.
    #[instrument(skip(self, order, admin_chat_ids), fields(order_id = %order.id))]
    pub async fn notify_order(
        &self,
        order: &Order,
        admin_chat_ids: Option<&[String]>,
    ) -> Result<NotifyResponse, FunctionsError> {
        self.invoke(NOTIFY_FUNCTION, &NotifyRequest {
            order,
            admin_chat_ids,
        })
        .await
    }
}

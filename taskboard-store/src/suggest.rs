//! AI due-date and priority suggestions.
//!
//! `POST /api/task-suggest` builds a prompt from the task title and
//! description, asks a chat-completion model for a JSON suggestion, and
//! validates the answer against the suggestion window before returning it.
//! Any completion or validation failure is reported with one generic
//! message; the details only go to the log.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use taskboard_proto::suggest::{self, SuggestError, SuggestErrorBody, SuggestRequest, Suggestion};

use crate::server::ServerState;

/// Message returned with a 400 when the title is missing.
pub const MISSING_TITLE_MESSAGE: &str = "Missing title";

/// Message returned with a 500 for any suggestion failure.
pub const SUGGESTION_FAILED_MESSAGE: &str = "AI suggestion failed, please try again.";

/// A text-completion backend.
pub trait CompletionClient: Send + Sync + 'static {
    /// Sends a single-turn prompt and returns the model's text answer.
    fn complete(&self, prompt: &str) -> impl Future<Output = Result<String, SuggestError>> + Send;
}

/// Settings for [`OpenAiCompletion`].
#[derive(Debug, Clone)]
pub struct CompletionSettings {
    /// Chat-completions endpoint URL.
    pub api_url: String,
    /// Model name.
    pub model: String,
    /// Sampling temperature.
    pub temperature: f32,
    /// Request timeout.
    pub timeout: Duration,
    /// Bearer token; requests are sent unauthenticated without one.
    pub api_key: Option<String>,
}

/// Chat-completions client for OpenAI-compatible APIs.
#[derive(Debug, Clone)]
pub struct OpenAiCompletion {
    http: reqwest::Client,
    settings: CompletionSettings,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: Option<ChatAnswer>,
}

#[derive(Deserialize)]
struct ChatAnswer {
    content: Option<String>,
}

impl OpenAiCompletion {
    /// Builds a client with the given settings.
    ///
    /// # Errors
    ///
    /// Returns [`SuggestError::Service`] if the HTTP client cannot be built.
    pub fn new(settings: CompletionSettings) -> Result<Self, SuggestError> {
        let http = reqwest::Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|e| SuggestError::Service(e.to_string()))?;
        Ok(Self { http, settings })
    }
}

impl CompletionClient for OpenAiCompletion {
    async fn complete(&self, prompt: &str) -> Result<String, SuggestError> {
        let body = ChatRequest {
            model: &self.settings.model,
            messages: [ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: self.settings.temperature,
        };
        let mut request = self.http.post(&self.settings.api_url).json(&body);
        if let Some(key) = &self.settings.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| SuggestError::Service(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(SuggestError::Service(format!("completion API returned {status}")));
        }
        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| SuggestError::Service(e.to_string()))?;

        chat.choices
            .into_iter()
            .next()
            .and_then(|c| c.message)
            .and_then(|m| m.content)
            .filter(|text| !text.trim().is_empty())
            .ok_or(SuggestError::Empty)
    }
}

/// Produces a validated suggestion for `request` made on `today`.
///
/// # Errors
///
/// Returns [`SuggestError::MissingTitle`] for a blank title, or whatever the
/// completion or validation step reports.
pub async fn suggest<C: CompletionClient>(
    client: &C,
    request: &SuggestRequest,
    today: NaiveDate,
) -> Result<Suggestion, SuggestError> {
    if request.title.trim().is_empty() {
        return Err(SuggestError::MissingTitle);
    }
    let prompt = suggest::build_prompt(request, today);
    let text = client.complete(&prompt).await?;
    Suggestion::parse(&text, today)
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (
        status,
        Json(SuggestErrorBody {
            error: message.to_string(),
        }),
    )
        .into_response()
}

/// axum handler for `POST /api/task-suggest`.
pub async fn suggest_handler<C: CompletionClient>(
    State(state): State<Arc<ServerState<C>>>,
    Json(request): Json<SuggestRequest>,
) -> Response {
    let today = Utc::now().date_naive();
    match suggest(state.completion(), &request, today).await {
        Ok(suggestion) => {
            tracing::info!(
                due_date = %suggestion.due_date,
                priority = %suggestion.priority,
                "suggestion produced"
            );
            Json(suggestion).into_response()
        }
        Err(SuggestError::MissingTitle) => {
            tracing::warn!("suggestion requested without a title");
            error_response(StatusCode::BAD_REQUEST, MISSING_TITLE_MESSAGE)
        }
        Err(e) => {
            tracing::error!(error = %e, "AI suggestion error");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, SUGGESTION_FAILED_MESSAGE)
        }
    }
}

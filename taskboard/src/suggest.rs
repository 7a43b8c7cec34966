//! Client for the due-date and priority suggestion endpoint.

use std::future::Future;
use std::time::Duration;

use chrono::NaiveDate;
use taskboard_proto::suggest::{SuggestError, SuggestErrorBody, SuggestRequest, Suggestion};

/// Default request timeout for the suggestion endpoint.
pub const DEFAULT_SUGGEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Something that can turn a task title and description into a suggestion.
pub trait Suggester: Send + Sync {
    /// Requests a suggestion for `request`.
    fn suggest(
        &self,
        request: &SuggestRequest,
    ) -> impl Future<Output = Result<Suggestion, SuggestError>> + Send;
}

/// [`Suggester`] that posts to `taskboard-store`'s `/api/task-suggest`.
#[derive(Debug, Clone)]
pub struct HttpSuggester {
    http: reqwest::Client,
    url: String,
}

impl HttpSuggester {
    /// Builds a suggester for the endpoint at `url`.
    ///
    /// # Errors
    ///
    /// Returns [`SuggestError::Service`] if the HTTP client cannot be built.
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, SuggestError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SuggestError::Service(e.to_string()))?;
        Ok(Self {
            http,
            url: url.into(),
        })
    }
}

impl Suggester for HttpSuggester {
    async fn suggest(&self, request: &SuggestRequest) -> Result<Suggestion, SuggestError> {
        let response = self
            .http
            .post(&self.url)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                tracing::warn!(url = %self.url, err = %e, "suggestion request failed");
                SuggestError::Service(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let reason = response
                .json::<SuggestErrorBody>()
                .await
                .map_or_else(|_| format!("endpoint returned {status}"), |body| body.error);
            tracing::warn!(%status, reason = %reason, "suggestion endpoint refused");
            return Err(SuggestError::Service(reason));
        }

        response
            .json::<Suggestion>()
            .await
            .map_err(|e| SuggestError::Malformed(e.to_string()))
    }
}

/// Requests a suggestion and re-checks it against `today`.
///
/// # Errors
///
/// Returns [`SuggestError::MissingTitle`] for a blank title without calling
/// the endpoint, the suggester's error, or [`SuggestError::OutOfRange`] if
/// the answer falls outside the allowed window.
pub async fn request_suggestion(
    suggester: &impl Suggester,
    title: &str,
    description: &str,
    today: NaiveDate,
) -> Result<Suggestion, SuggestError> {
    if title.trim().is_empty() {
        return Err(SuggestError::MissingTitle);
    }
    let request = SuggestRequest {
        title: title.trim().to_string(),
        description: description.trim().to_string(),
    };
    let suggestion = suggester.suggest(&request).await?;
    suggestion.validate(today)?;
    Ok(suggestion)
}

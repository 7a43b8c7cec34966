//! AI due-date and priority suggestion contract.
//!
//! The suggestion endpoint accepts `{"title", "description"}` and answers
//! `{"dueDate":"YYYY-MM-DD","priority":"low|medium|high"}`. A suggested due
//! date must fall strictly after the request date and at most
//! [`SUGGESTION_WINDOW_DAYS`] days after it. Out-of-range or malformed
//! answers are rejected, never clamped.

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::task::Priority;

/// Number of days after the request date a suggested due date may fall.
pub const SUGGESTION_WINDOW_DAYS: u64 = 30;

/// Request body of the suggestion endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuggestRequest {
    /// Task title; required.
    #[serde(default)]
    pub title: String,
    /// Task description; may be empty.
    #[serde(default)]
    pub description: String,
}

/// A validated suggestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Suggestion {
    /// Suggested due date.
    pub due_date: NaiveDate,
    /// Suggested priority.
    pub priority: Priority,
}

/// Error body returned by the suggestion endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuggestErrorBody {
    /// Human-readable failure description.
    pub error: String,
}

/// Why a suggestion payload was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SuggestError {
    /// The request had no title.
    #[error("a title is required to suggest a due date and priority")]
    MissingTitle,
    /// The completion returned no content.
    #[error("empty response from AI")]
    Empty,
    /// The payload was not the expected JSON object.
    #[error("malformed suggestion: {0}")]
    Malformed(String),
    /// The due date was not a `YYYY-MM-DD` date.
    #[error("invalid due date {0:?}")]
    InvalidDate(String),
    /// The priority was not one of `low`, `medium`, `high`.
    #[error("invalid priority {0:?}")]
    InvalidPriority(String),
    /// The due date fell outside `(today, today + 30 days]`.
    #[error("AI returned out-of-range date: {due_date} (allowed after {today}, up to {latest})")]
    OutOfRange {
        /// The rejected date.
        due_date: NaiveDate,
        /// The request date.
        today: NaiveDate,
        /// Latest acceptable date.
        latest: NaiveDate,
    },
    /// The suggestion service could not be reached or failed.
    #[error("suggestion service failed: {0}")]
    Service(String),
}

/// Loosely typed payload as produced by a model.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSuggestion {
    due_date: String,
    priority: String,
}

/// Latest acceptable due date for a request made on `today`.
#[must_use]
pub fn latest_due_date(today: NaiveDate) -> NaiveDate {
    today
        .checked_add_days(Days::new(SUGGESTION_WINDOW_DAYS))
        .unwrap_or(NaiveDate::MAX)
}

impl Suggestion {
    /// Parses and validates a raw JSON suggestion produced on `today`.
    ///
    /// # Errors
    ///
    /// Returns [`SuggestError::Empty`], [`SuggestError::Malformed`],
    /// [`SuggestError::InvalidDate`], [`SuggestError::InvalidPriority`] or
    /// [`SuggestError::OutOfRange`].
    pub fn parse(text: &str, today: NaiveDate) -> Result<Self, SuggestError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(SuggestError::Empty);
        }
        let raw: RawSuggestion =
            serde_json::from_str(text).map_err(|e| SuggestError::Malformed(e.to_string()))?;
        let due_date = NaiveDate::parse_from_str(raw.due_date.trim(), "%Y-%m-%d")
            .map_err(|_| SuggestError::InvalidDate(raw.due_date.clone()))?;
        let priority = raw
            .priority
            .parse()
            .map_err(|_| SuggestError::InvalidPriority(raw.priority.clone()))?;
        let suggestion = Self { due_date, priority };
        suggestion.validate(today)?;
        Ok(suggestion)
    }

    /// Checks the due date against the suggestion window for `today`.
    ///
    /// # Errors
    ///
    /// Returns [`SuggestError::OutOfRange`] when the date is on or before
    /// `today`, or more than [`SUGGESTION_WINDOW_DAYS`] days after it.
    pub fn validate(&self, today: NaiveDate) -> Result<(), SuggestError> {
        let latest = latest_due_date(today);
        if self.due_date <= today || self.due_date > latest {
            return Err(SuggestError::OutOfRange {
                due_date: self.due_date,
                today,
                latest,
            });
        }
        Ok(())
    }
}

/// Builds the completion prompt for a suggestion request made on `today`.
#[must_use]
pub fn build_prompt(request: &SuggestRequest, today: NaiveDate) -> String {
    let latest = latest_due_date(today);
    format!(
        "You are a smart task assistant.\n\
         Given a task with title \"{title}\" and description \"{description}\",\n\
         suggest:\n\
         1) a due date *after* {today} and *on or before* {latest}, in YYYY-MM-DD format\n\
         2) a priority: low, medium, or high\n\n\
         Respond *only* with a JSON object, for example:\n\
         {{\"dueDate\":\"{example}\",\"priority\":\"medium\"}}",
        title = request.title,
        description = request.description,
        today = today.format("%Y-%m-%d"),
        latest = latest.format("%Y-%m-%d"),
        example = today
            .checked_add_days(Days::new(SUGGESTION_WINDOW_DAYS / 2))
            .unwrap_or(latest)
            .format("%Y-%m-%d"),
    )
}

//! Task model and title validation.
//!
//! A [`Task`] is owned by one user and assigned to exactly one column.
//! Display order is not stored on the task: boards order tasks by
//! `created_at`, so manual in-column reordering only lives in client
//! view-state.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::ids::{ColumnId, TaskId, UserId};

/// Maximum allowed task title length in characters.
pub const MAX_TASK_TITLE_LENGTH: usize = 256;

/// Maximum allowed column title length in characters.
pub const MAX_COLUMN_TITLE_LENGTH: usize = 64;

/// Errors raised when user input fails validation before any write.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
pub enum ValidationError {
    /// Task title is empty or whitespace.
    #[error("task title is required")]
    TitleEmpty,
    /// Task title exceeds [`MAX_TASK_TITLE_LENGTH`].
    #[error("task title too long (max {MAX_TASK_TITLE_LENGTH} characters)")]
    TitleTooLong,
    /// Column name is empty or whitespace.
    #[error("column name cannot be empty")]
    ColumnTitleEmpty,
    /// Column name exceeds [`MAX_COLUMN_TITLE_LENGTH`].
    #[error("column name too long (max {MAX_COLUMN_TITLE_LENGTH} characters)")]
    ColumnTitleTooLong,
}

/// Priority of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    /// Can wait.
    Low,
    /// Normal.
    Medium,
    /// Urgent.
    High,
}

impl Priority {
    /// All priorities, lowest first.
    pub const ALL: [Self; 3] = [Self::Low, Self::Medium, Self::High];

    /// Lowercase text form used in JSON and on the command line.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a string is not one of `low`, `medium`, `high`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown priority: {0:?} (expected low, medium or high)")]
pub struct ParsePriorityError(pub String);

impl std::str::FromStr for Priority {
    type Err = ParsePriorityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            _ => Err(ParsePriorityError(s.to_string())),
        }
    }
}

/// A unit of work on the board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    /// Unique task identifier.
    pub id: TaskId,
    /// Non-empty, trimmed title.
    pub title: String,
    /// Optional free-form description.
    pub description: Option<String>,
    /// Optional due date.
    pub due_date: Option<NaiveDate>,
    /// Optional priority.
    pub priority: Option<Priority>,
    /// Column the task is assigned to.
    pub column_id: ColumnId,
    /// Owner of the task.
    pub owner_id: UserId,
    /// Server-assigned creation time in milliseconds since epoch.
    pub created_at: u64,
}

/// Creation payload sent by a client. The store assigns the id, owner,
/// initial column and creation timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTask {
    /// Task title (validated by the store as well).
    pub title: String,
    /// Optional description.
    pub description: Option<String>,
    /// Optional due date.
    pub due_date: Option<NaiveDate>,
    /// Optional priority.
    pub priority: Option<Priority>,
}

/// Trims `title` and checks it against the task title rules.
///
/// # Errors
///
/// Returns [`ValidationError::TitleEmpty`] or [`ValidationError::TitleTooLong`].
pub fn validate_title(title: &str) -> Result<String, ValidationError> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::TitleEmpty);
    }
    if trimmed.chars().count() > MAX_TASK_TITLE_LENGTH {
        return Err(ValidationError::TitleTooLong);
    }
    Ok(trimmed.to_string())
}

/// Trims `title` and checks it against the column title rules.
///
/// # Errors
///
/// Returns [`ValidationError::ColumnTitleEmpty`] or
/// [`ValidationError::ColumnTitleTooLong`].
pub fn validate_column_title(title: &str) -> Result<String, ValidationError> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::ColumnTitleEmpty);
    }
    if trimmed.chars().count() > MAX_COLUMN_TITLE_LENGTH {
        return Err(ValidationError::ColumnTitleTooLong);
    }
    Ok(trimmed.to_string())
}

/// Trims an optional description, mapping blank text to `None`.
#[must_use]
pub fn normalize_description(description: Option<&str>) -> Option<String> {
    description
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map(str::to_string)
}

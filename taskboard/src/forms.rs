//! Task and column drafts entered by the user.

use chrono::NaiveDate;
use taskboard_proto::column::NewColumn;
use taskboard_proto::suggest::Suggestion;
use taskboard_proto::task::{self, NewTask, Priority, ValidationError};

/// A task being composed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskDraft {
    /// Title as typed.
    pub title: String,
    /// Description as typed.
    pub description: String,
    /// Optional due date.
    pub due_date: Option<NaiveDate>,
    /// Priority; new drafts start at [`Priority::Low`].
    pub priority: Priority,
}

impl Default for TaskDraft {
    fn default() -> Self {
        Self {
            title: String::new(),
            description: String::new(),
            due_date: None,
            priority: Priority::Low,
        }
    }
}

impl TaskDraft {
    /// A draft with just a title.
    #[must_use]
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    /// Validates the draft into a create request.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] if the trimmed title is empty or too long.
    pub fn to_new_task(&self) -> Result<NewTask, ValidationError> {
        Ok(NewTask {
            title: task::validate_title(&self.title)?,
            description: task::normalize_description(Some(&self.description)),
            due_date: self.due_date,
            priority: Some(self.priority),
        })
    }

    /// Fills due date and priority from a suggestion, both or neither.
    pub fn apply_suggestion(&mut self, suggestion: &Suggestion) {
        self.due_date = Some(suggestion.due_date);
        self.priority = suggestion.priority;
    }
}

/// A user column being composed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnDraft {
    /// Title as typed.
    pub title: String,
}

impl ColumnDraft {
    /// Validates the draft into a create request.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] if the trimmed title is empty or too long.
    pub fn to_new_column(&self) -> Result<NewColumn, ValidationError> {
        Ok(NewColumn {
            title: task::validate_column_title(&self.title)?,
        })
    }
}

//! Loosely typed stored documents and their validation into model types.
//!
//! Records read back from storage are not trusted: every field is optional
//! and free-form here, and [`Task::try_from`] / [`Column::try_from`] decide
//! whether a document is a valid record. Documents that fail are reported,
//! never cast.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::column::{self, Column};
use crate::ids::{ColumnId, TaskId, UserId};
use crate::task::{self, Task};

/// Reason a stored document was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DocumentError {
    /// A required field is absent or empty.
    #[error("missing field `{0}`")]
    MissingField(&'static str),
    /// A field is present but holds an invalid value.
    #[error("invalid field `{field}`: {reason}")]
    InvalidField {
        /// Name of the offending field.
        field: &'static str,
        /// What was wrong with it.
        reason: String,
    },
}

/// A task record as stored on disk.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TaskDocument {
    pub id: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub due_date: Option<String>,
    pub priority: Option<String>,
    pub status: Option<String>,
    pub owner_id: Option<String>,
    pub created_at: Option<u64>,
}

/// A user-created column record as stored on disk.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ColumnDocument {
    pub id: Option<String>,
    pub title: Option<String>,
    pub position: Option<u32>,
    pub owner_id: Option<String>,
}

fn required(value: Option<String>, field: &'static str) -> Result<String, DocumentError> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or(DocumentError::MissingField(field))
}

impl TryFrom<TaskDocument> for Task {
    type Error = DocumentError;

    fn try_from(doc: TaskDocument) -> Result<Self, Self::Error> {
        let id = required(doc.id, "id")?;
        let title = task::validate_title(&required(doc.title, "title")?).map_err(|e| {
            DocumentError::InvalidField {
                field: "title",
                reason: e.to_string(),
            }
        })?;
        let due_date = doc
            .due_date
            .filter(|d| !d.trim().is_empty())
            .map(|d| {
                NaiveDate::parse_from_str(d.trim(), "%Y-%m-%d").map_err(|e| {
                    DocumentError::InvalidField {
                        field: "dueDate",
                        reason: format!("{d:?}: {e}"),
                    }
                })
            })
            .transpose()?;
        let priority = doc
            .priority
            .filter(|p| !p.trim().is_empty())
            .map(|p| {
                p.parse().map_err(|e: task::ParsePriorityError| DocumentError::InvalidField {
                    field: "priority",
                    reason: e.to_string(),
                })
            })
            .transpose()?;

        Ok(Self {
            id: TaskId::new(id),
            title,
            description: task::normalize_description(doc.description.as_deref()),
            due_date,
            priority,
            column_id: ColumnId::new(required(doc.status, "status")?),
            owner_id: UserId::new(required(doc.owner_id, "ownerId")?),
            created_at: doc.created_at.ok_or(DocumentError::MissingField("createdAt"))?,
        })
    }
}

impl From<&Task> for TaskDocument {
    fn from(task: &Task) -> Self {
        Self {
            id: Some(task.id.to_string()),
            title: Some(task.title.clone()),
            description: task.description.clone(),
            due_date: task.due_date.map(|d| d.format("%Y-%m-%d").to_string()),
            priority: task.priority.map(|p| p.as_str().to_string()),
            status: Some(task.column_id.to_string()),
            owner_id: Some(task.owner_id.to_string()),
            created_at: Some(task.created_at),
        }
    }
}

impl TryFrom<ColumnDocument> for Column {
    type Error = DocumentError;

    fn try_from(doc: ColumnDocument) -> Result<Self, Self::Error> {
        let id = ColumnId::new(required(doc.id, "id")?);
        if column::is_builtin(&id) {
            return Err(DocumentError::InvalidField {
                field: "id",
                reason: format!("{id} is a built-in column"),
            });
        }
        let title = task::validate_column_title(&required(doc.title, "title")?).map_err(|e| {
            DocumentError::InvalidField {
                field: "title",
                reason: e.to_string(),
            }
        })?;

        Ok(Self {
            id,
            title,
            position: doc.position.unwrap_or_default(),
            owner_id: Some(UserId::new(required(doc.owner_id, "ownerId")?)),
        })
    }
}

impl From<&Column> for ColumnDocument {
    fn from(column: &Column) -> Self {
        Self {
            id: Some(column.id.to_string()),
            title: Some(column.title.clone()),
            position: Some(column.position),
            owner_id: column.owner_id.as_ref().map(ToString::to_string),
        }
    }
}

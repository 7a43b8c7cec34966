//! Board columns.
//!
//! Every board has the three built-in columns `todo`, `inprogress` and
//! `done`. Users may add their own columns after those; built-in columns
//! have no owner and can never be deleted.

use serde::{Deserialize, Serialize};

use crate::ids::{ColumnId, UserId};

/// Identifier of the built-in "To Do" column. New tasks land here.
pub const TODO: &str = "todo";
/// Identifier of the built-in "In Progress" column.
pub const IN_PROGRESS: &str = "inprogress";
/// Identifier of the built-in "Done" column.
pub const DONE: &str = "done";

const BUILTINS: [(&str, &str); 3] = [
    (TODO, "To Do"),
    (IN_PROGRESS, "In Progress"),
    (DONE, "Done"),
];

/// A named bucket that groups tasks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    /// Column identifier.
    pub id: ColumnId,
    /// Display title.
    pub title: String,
    /// Display order among the owner's user-created columns.
    pub position: u32,
    /// Owner of a user-created column; `None` for built-ins.
    pub owner_id: Option<UserId>,
}

impl Column {
    /// Returns the built-in columns in display order.
    #[must_use]
    pub fn builtins() -> Vec<Self> {
        BUILTINS
            .iter()
            .zip(0u32..)
            .map(|((id, title), position)| Self {
                id: ColumnId::from(*id),
                title: (*title).to_string(),
                position,
                owner_id: None,
            })
            .collect()
    }

    /// Returns `true` if this column is one of the built-ins.
    #[must_use]
    pub fn is_builtin(&self) -> bool {
        is_builtin(&self.id)
    }
}

/// Returns `true` if `id` names a built-in column.
#[must_use]
pub fn is_builtin(id: &ColumnId) -> bool {
    BUILTINS.iter().any(|(builtin, _)| *builtin == id.as_str())
}

/// The column new tasks are assigned to.
#[must_use]
pub fn default_column() -> ColumnId {
    ColumnId::from(TODO)
}

/// Creation payload for a user-created column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewColumn {
    /// Column title (validated by the store as well).
    pub title: String,
}

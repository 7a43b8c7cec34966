//! Store wire protocol between board clients and the store server.
//!
//! Messages are postcard-encoded and carried in WebSocket binary frames.
//! A connection starts with [`ClientMessage::Authenticate`]; after that the
//! client may open any number of snapshot subscriptions and issue writes.
//! Subscriptions and writes are correlated by client-chosen ids.

use serde::{Deserialize, Serialize};

use crate::column::{Column, NewColumn};
use crate::ids::{ColumnId, TaskId};
use crate::task::{NewTask, Task, ValidationError};

/// Error type for protocol encode/decode operations.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// Serialization or deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Creation-time ordering of task snapshots.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SortOrder {
    /// Oldest first.
    #[default]
    Ascending,
    /// Newest first.
    Descending,
}

impl std::str::FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "asc" | "ascending" => Ok(Self::Ascending),
            "desc" | "descending" => Ok(Self::Descending),
            other => Err(format!("unknown sort order {other:?} (expected asc or desc)")),
        }
    }
}

/// What a subscription watches. Both are implicitly filtered by the
/// authenticated owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Query {
    /// The owner's tasks, ordered by creation time.
    Tasks {
        /// Snapshot ordering.
        order: SortOrder,
    },
    /// The owner's user-created columns, ordered by position.
    Columns,
}

/// A single write against the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WriteOp {
    /// Create a task in the default column with a server timestamp.
    CreateTask(NewTask),
    /// Create a user column at the end of the owner's columns.
    CreateColumn(NewColumn),
    /// Change one task's column assignment; no other field is touched.
    UpdateTaskColumn {
        /// Task to move.
        task_id: TaskId,
        /// New column assignment.
        column_id: ColumnId,
    },
    /// Delete one task.
    DeleteTask {
        /// Task to delete.
        task_id: TaskId,
    },
    /// Delete a user column and, in the same batch, every task assigned to it.
    DeleteColumn {
        /// Column to delete.
        column_id: ColumnId,
    },
}

/// Result of an accepted write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WriteOutcome {
    /// The created task as stored.
    TaskCreated(Task),
    /// The created column as stored.
    ColumnCreated(Column),
    /// A field update was applied.
    Updated,
    /// A record was deleted, together with `tasks_removed` tasks.
    Deleted {
        /// Number of tasks removed by the operation.
        tasks_removed: u32,
    },
}

/// Why the store refused a write.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
pub enum WriteError {
    /// The payload failed validation.
    #[error("invalid input: {0}")]
    Invalid(ValidationError),
    /// No task with this id exists for the owner.
    #[error("task not found: {0}")]
    TaskNotFound(TaskId),
    /// No column with this id exists for the owner.
    #[error("column not found: {0}")]
    ColumnNotFound(ColumnId),
    /// Built-in columns cannot be deleted.
    #[error("built-in column {0} cannot be deleted")]
    BuiltinColumn(ColumnId),
    /// The connection has not authenticated.
    #[error("not authenticated")]
    NotAuthenticated,
    /// The store could not persist the change.
    #[error("storage failure: {0}")]
    Storage(String),
}

impl From<ValidationError> for WriteError {
    fn from(err: ValidationError) -> Self {
        Self::Invalid(err)
    }
}

/// Messages sent from a board client to the store server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClientMessage {
    /// Must be the first message on a connection.
    Authenticate {
        /// Identity-provider user id.
        user_id: String,
    },
    /// Open a snapshot subscription.
    Subscribe {
        /// Client-chosen id echoed in every snapshot.
        subscription_id: u64,
        /// What to watch.
        query: Query,
    },
    /// Close a snapshot subscription.
    Unsubscribe {
        /// Subscription to close.
        subscription_id: u64,
    },
    /// Issue a write.
    Write {
        /// Client-chosen id echoed in the answer.
        request_id: u64,
        /// The write.
        op: WriteOp,
    },
}

/// Messages sent from the store server to a board client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServerMessage {
    /// Authentication accepted.
    Authenticated {
        /// The authenticated user id, echoed back.
        user_id: String,
    },
    /// Full ordered task list for a subscription.
    TaskSnapshot {
        /// Subscription this snapshot belongs to.
        subscription_id: u64,
        /// All matching tasks in the subscribed order.
        tasks: Vec<Task>,
    },
    /// Full ordered user-column list for a subscription.
    ColumnSnapshot {
        /// Subscription this snapshot belongs to.
        subscription_id: u64,
        /// All of the owner's columns by position.
        columns: Vec<Column>,
    },
    /// A write was applied.
    WriteAccepted {
        /// Request this answers.
        request_id: u64,
        /// What happened.
        outcome: WriteOutcome,
    },
    /// A write was refused.
    WriteRejected {
        /// Request this answers.
        request_id: u64,
        /// Why.
        error: WriteError,
    },
    /// Connection-level error.
    Error {
        /// Human-readable error description.
        reason: String,
    },
}

/// Encodes a [`ClientMessage`] into bytes using postcard.
///
/// # Errors
///
/// Returns `CodecError::Serialization` if the message cannot be serialized.
pub fn encode_client(msg: &ClientMessage) -> Result<Vec<u8>, CodecError> {
    postcard::to_allocvec(msg).map_err(|e| CodecError::Serialization(e.to_string()))
}

/// Decodes a [`ClientMessage`] from bytes using postcard.
///
/// # Errors
///
/// Returns `CodecError::Serialization` if the bytes cannot be deserialized.
pub fn decode_client(bytes: &[u8]) -> Result<ClientMessage, CodecError> {
    postcard::from_bytes(bytes).map_err(|e| CodecError::Serialization(e.to_string()))
}

/// Encodes a [`ServerMessage`] into bytes using postcard.
///
/// # Errors
///
/// Returns `CodecError::Serialization` if the message cannot be serialized.
pub fn encode_server(msg: &ServerMessage) -> Result<Vec<u8>, CodecError> {
    postcard::to_allocvec(msg).map_err(|e| CodecError::Serialization(e.to_string()))
}

/// Decodes a [`ServerMessage`] from bytes using postcard.
///
/// # Errors
///
/// Returns `CodecError::Serialization` if the bytes cannot be deserialized.
pub fn decode_server(bytes: &[u8]) -> Result<ServerMessage, CodecError> {
    postcard::from_bytes(bytes).map_err(|e| CodecError::Serialization(e.to_string()))
}

//! Document store collaborator.
//!
//! Defines the [`BoardStore`] trait the board controller writes through and
//! subscribes to. The concrete implementation is [`remote::RemoteStore`],
//! a WebSocket client for `taskboard-store`.

pub mod remote;

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures_util::Stream;
use taskboard_proto::column::{Column, NewColumn};
use taskboard_proto::ids::{ColumnId, TaskId};
use taskboard_proto::sync::{SortOrder, WriteError};
use taskboard_proto::task::{NewTask, Task};
use tokio::sync::mpsc;

pub use remote::RemoteStore;

/// Errors that can occur when talking to the document store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The connection to the store has been closed.
    #[error("connection closed")]
    ConnectionClosed,

    /// The operation timed out before completing.
    #[error("store operation timed out")]
    Timeout,

    /// The store refused the write.
    #[error("write rejected: {0}")]
    Rejected(#[from] WriteError),

    /// The store answered something unexpected.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// An underlying I/O error occurred.
    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A live query: an unbounded sequence of full snapshots.
///
/// Each item replaces the previous one wholesale. Dropping the subscription
/// cancels it.
pub struct Subscription<T> {
    rx: mpsc::UnboundedReceiver<T>,
    on_drop: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl<T> Subscription<T> {
    /// Wraps a snapshot channel; `on_drop` runs once when the subscription
    /// is dropped.
    pub fn new(
        rx: mpsc::UnboundedReceiver<T>,
        on_drop: impl FnOnce() + Send + Sync + 'static,
    ) -> Self {
        Self {
            rx,
            on_drop: Some(Box::new(on_drop)),
        }
    }

    /// Wraps a snapshot channel with no cancellation hook.
    #[must_use]
    pub fn from_receiver(rx: mpsc::UnboundedReceiver<T>) -> Self {
        Self { rx, on_drop: None }
    }

    /// Waits for the next snapshot. Returns `None` once the store side ends.
    pub async fn next(&mut self) -> Option<T> {
        self.rx.recv().await
    }
}

impl<T> Stream for Subscription<T> {
    type Item = T;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<T>> {
        self.rx.poll_recv(cx)
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        if let Some(on_drop) = self.on_drop.take() {
            on_drop();
        }
    }
}

impl<T> std::fmt::Debug for Subscription<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").finish_non_exhaustive()
    }
}

/// Operations the board needs from a document store.
///
/// All queries are implicitly scoped to the authenticated owner.
pub trait BoardStore: Send + Sync + 'static {
    /// Subscribes to the owner's tasks in creation order.
    fn subscribe_tasks(
        &self,
        order: SortOrder,
    ) -> impl Future<Output = Result<Subscription<Vec<Task>>, StoreError>> + Send;

    /// Subscribes to the owner's user-created columns by position.
    fn subscribe_columns(
        &self,
    ) -> impl Future<Output = Result<Subscription<Vec<Column>>, StoreError>> + Send;

    /// Creates a task in the default column.
    fn create_task(&self, new: NewTask) -> impl Future<Output = Result<Task, StoreError>> + Send;

    /// Creates a user column after the existing ones.
    fn create_column(
        &self,
        new: NewColumn,
    ) -> impl Future<Output = Result<Column, StoreError>> + Send;

    /// Changes one task's column; no other field is written.
    fn update_task_column(
        &self,
        task_id: &TaskId,
        column_id: &ColumnId,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Deletes one task.
    fn delete_task(&self, task_id: &TaskId) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Deletes a user column and its tasks in one batch, returning how many
    /// tasks went with it.
    fn delete_column(
        &self,
        column_id: &ColumnId,
    ) -> impl Future<Output = Result<u32, StoreError>> + Send;
}

//! Board controller: the glue between user actions, the view-state and the
//! store.
//!
//! The controller is the only writer of [`BoardState`]. Store snapshots and
//! the results of spawned writes arrive as [`BoardEvent`]s on one channel and
//! are applied in arrival order by [`BoardController::handle_event`]. Every
//! failure is pushed as a notification and also returned to the caller.

use std::sync::Arc;

use chrono::NaiveDate;
use taskboard_proto::column::{self, Column};
use taskboard_proto::ids::{ColumnId, TaskId};
use taskboard_proto::suggest::{SuggestError, Suggestion};
use taskboard_proto::sync::SortOrder;
use taskboard_proto::task::{Task, ValidationError};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::board::{BoardAction, BoardState, ColumnWrite, DropKind, ReconcileError, reconcile_drop};
use crate::forms::{ColumnDraft, TaskDraft};
use crate::identity::Identity;
use crate::notify::{Notification, Notifications};
use crate::store::{BoardStore, StoreError};
use crate::suggest::{self, Suggester};

/// Everything that can go wrong with a board action.
#[derive(Debug, thiserror::Error)]
pub enum BoardError {
    /// Input failed validation; nothing was written.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The action needs a signed-in user.
    #[error("not signed in")]
    NotSignedIn,

    /// Built-in columns cannot be deleted.
    #[error("built-in column {0} cannot be deleted")]
    BuiltinColumn(ColumnId),

    /// No column with this id is on the board.
    #[error("unknown column {0}")]
    UnknownColumn(ColumnId),

    /// The drop could not be reconciled.
    #[error(transparent)]
    Reconcile(#[from] ReconcileError),

    /// A store call failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The suggestion could not be obtained.
    #[error(transparent)]
    Suggest(#[from] SuggestError),
}

/// Something that happened outside the controller and must be applied to
/// the board.
#[derive(Debug)]
pub enum BoardEvent {
    /// A new task snapshot from the store.
    TasksSnapshot(Vec<Task>),
    /// A new user-column snapshot from the store.
    ColumnsSnapshot(Vec<Column>),
    /// A column write issued by a drop was stored.
    WriteSucceeded(ColumnWrite),
    /// A column write issued by a drop failed.
    WriteFailed {
        /// The write that failed.
        write: ColumnWrite,
        /// Snapshot generation when the write was issued.
        generation: u64,
        /// Why it failed.
        error: StoreError,
    },
}

/// Live snapshot forwarding started by [`BoardController::sync`].
///
/// Dropping the feed stops forwarding and cancels both subscriptions.
#[derive(Debug)]
pub struct BoardFeed {
    tasks: JoinHandle<()>,
    columns: JoinHandle<()>,
}

impl BoardFeed {
    /// Returns `true` once either subscription has ended, usually because
    /// the store connection closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.tasks.is_finished() || self.columns.is_finished()
    }
}

impl Drop for BoardFeed {
    fn drop(&mut self) {
        self.tasks.abort();
        self.columns.abort();
    }
}

/// Drives one user's board.
pub struct BoardController<S> {
    store: Arc<S>,
    state: BoardState,
    identity: Identity,
    notifications: Notifications,
    events_tx: mpsc::UnboundedSender<BoardEvent>,
    events_rx: mpsc::UnboundedReceiver<BoardEvent>,
}

impl<S: BoardStore> BoardController<S> {
    /// Creates a controller with an empty board.
    #[must_use]
    pub fn new(store: Arc<S>, identity: Identity, sort_order: SortOrder) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            store,
            state: BoardState::new(sort_order),
            identity,
            notifications: Notifications::default(),
            events_tx,
            events_rx,
        }
    }

    /// The board view-state.
    #[must_use]
    pub const fn state(&self) -> &BoardState {
        &self.state
    }

    /// The current identity.
    #[must_use]
    pub const fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Pending notifications.
    #[must_use]
    pub const fn notifications(&self) -> &Notifications {
        &self.notifications
    }

    /// Removes and returns every pending notification.
    pub fn take_notifications(&mut self) -> Vec<Notification> {
        self.notifications.drain()
    }

    /// Applies a view-only action such as collapsing a column or changing
    /// the filter.
    pub fn apply(&mut self, action: BoardAction) -> bool {
        self.state.apply(action)
    }

    /// Subscribes to tasks and columns, applies the first snapshot of each
    /// and forwards later snapshots as events.
    ///
    /// # Errors
    ///
    /// Returns [`BoardError::Store`] if either subscription fails or ends
    /// before its first snapshot.
    pub async fn sync(&mut self) -> Result<BoardFeed, BoardError> {
        match self.open_feed().await {
            Ok(feed) => Ok(feed),
            Err(e) => self.fail(e),
        }
    }

    async fn open_feed(&mut self) -> Result<BoardFeed, BoardError> {
        let mut tasks = self.store.subscribe_tasks(self.state.sort_order()).await?;
        let mut columns = self.store.subscribe_columns().await?;

        let first_tasks = tasks.next().await.ok_or(StoreError::ConnectionClosed)?;
        let first_columns = columns.next().await.ok_or(StoreError::ConnectionClosed)?;
        self.handle_event(BoardEvent::TasksSnapshot(first_tasks));
        self.handle_event(BoardEvent::ColumnsSnapshot(first_columns));

        let tx = self.events_tx.clone();
        let tasks = tokio::spawn(async move {
            while let Some(snapshot) = tasks.next().await {
                if tx.send(BoardEvent::TasksSnapshot(snapshot)).is_err() {
                    break;
                }
            }
            tracing::debug!("task feed ended");
        });
        let tx = self.events_tx.clone();
        let columns = tokio::spawn(async move {
            while let Some(snapshot) = columns.next().await {
                if tx.send(BoardEvent::ColumnsSnapshot(snapshot)).is_err() {
                    break;
                }
            }
            tracing::debug!("column feed ended");
        });
        Ok(BoardFeed { tasks, columns })
    }

    /// Waits for the next snapshot or write result.
    pub async fn next_event(&mut self) -> Option<BoardEvent> {
        self.events_rx.recv().await
    }

    /// Applies an event. Returns `true` if the board changed.
    pub fn handle_event(&mut self, event: BoardEvent) -> bool {
        match event {
            BoardEvent::TasksSnapshot(mut tasks) => {
                tracing::debug!(count = tasks.len(), "task snapshot");
                tasks.sort_by_key(|t| t.created_at);
                if self.state.sort_order() == SortOrder::Descending {
                    tasks.reverse();
                }
                self.state.apply(BoardAction::ReplaceTasks(tasks))
            }
            BoardEvent::ColumnsSnapshot(columns) => {
                tracing::debug!(count = columns.len(), "column snapshot");
                self.state.apply(BoardAction::ReplaceColumns(columns))
            }
            BoardEvent::WriteSucceeded(write) => {
                tracing::info!(
                    task = %write.task_id,
                    column = %write.column_id,
                    "task column saved"
                );
                false
            }
            BoardEvent::WriteFailed {
                write,
                generation,
                error,
            } => {
                tracing::error!(
                    task = %write.task_id,
                    column = %write.column_id,
                    err = %error,
                    "failed to update task column"
                );
                self.notifications
                    .push(BoardError::Store(error).notification());
                self.state.apply(BoardAction::RevertWrite { write, generation })
            }
        }
    }

    /// Handles the end of a drag: reconciles the drop, applies it locally
    /// and, if the task changed column, writes the new column in the
    /// background. The write's result arrives later as a [`BoardEvent`].
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// - [`BoardError::NotSignedIn`] without a user; the board is untouched.
    /// - [`BoardError::Reconcile`] if the dragged task is not on the board.
    pub fn drag_end(
        &mut self,
        active_id: &TaskId,
        over_id: Option<&str>,
    ) -> Result<DropKind, BoardError> {
        if let Err(e) = self.identity.require_user() {
            return self.fail(e);
        }
        let outcome = match reconcile_drop(
            self.state.tasks(),
            active_id,
            over_id,
            &self.state.known_column_ids(),
        ) {
            Ok(outcome) => outcome,
            Err(e) => return self.fail(e.into()),
        };

        let kind = outcome.kind;
        let write = outcome.write.clone();
        let generation = self.state.generation();
        self.state.apply(BoardAction::ApplyDrop(outcome));
        tracing::debug!(task = %active_id, ?kind, "drop applied");

        if let Some(write) = write {
            self.spawn_column_write(write, generation);
        }
        Ok(kind)
    }

    fn spawn_column_write(&self, write: ColumnWrite, generation: u64) {
        let store = Arc::clone(&self.store);
        let tx = self.events_tx.clone();
        tokio::spawn(async move {
            let event = match store
                .update_task_column(&write.task_id, &write.column_id)
                .await
            {
                Ok(()) => BoardEvent::WriteSucceeded(write),
                Err(error) => BoardEvent::WriteFailed {
                    write,
                    generation,
                    error,
                },
            };
            let _ = tx.send(event);
        });
    }

    /// Creates a task from a draft in the default column.
    ///
    /// # Errors
    ///
    /// Returns [`BoardError::NotSignedIn`], [`BoardError::Validation`] or
    /// [`BoardError::Store`].
    pub async fn create_task(&mut self, draft: &TaskDraft) -> Result<Task, BoardError> {
        if let Err(e) = self.identity.require_user() {
            return self.fail(e);
        }
        let new = match draft.to_new_task() {
            Ok(new) => new,
            Err(e) => return self.fail(e.into()),
        };
        match self.store.create_task(new).await {
            Ok(task) => {
                tracing::info!(task = %task.id, "task created");
                self.notifications.push(Notification::success(
                    "Task created!",
                    "Your new task has been saved.",
                ));
                Ok(task)
            }
            Err(e) => self.fail(e.into()),
        }
    }

    /// Creates a user column after the existing ones.
    ///
    /// # Errors
    ///
    /// Returns [`BoardError::NotSignedIn`], [`BoardError::Validation`] or
    /// [`BoardError::Store`].
    pub async fn create_column(&mut self, draft: &ColumnDraft) -> Result<Column, BoardError> {
        if let Err(e) = self.identity.require_user() {
            return self.fail(e);
        }
        let new = match draft.to_new_column() {
            Ok(new) => new,
            Err(e) => return self.fail(e.into()),
        };
        match self.store.create_column(new).await {
            Ok(column) => {
                tracing::info!(column = %column.id, "column created");
                self.notifications.push(Notification::success(
                    "Column created",
                    format!("Column \"{}\" was added to the board.", column.title),
                ));
                Ok(column)
            }
            Err(e) => self.fail(e.into()),
        }
    }

    /// Deletes a task.
    ///
    /// # Errors
    ///
    /// Returns [`BoardError::NotSignedIn`] or [`BoardError::Store`].
    pub async fn delete_task(&mut self, task_id: &TaskId) -> Result<(), BoardError> {
        if let Err(e) = self.identity.require_user() {
            return self.fail(e);
        }
        match self.store.delete_task(task_id).await {
            Ok(()) => {
                tracing::info!(task = %task_id, "task deleted");
                self.notifications
                    .push(Notification::success("Task deleted", "The task was removed."));
                Ok(())
            }
            Err(e) => self.fail(e.into()),
        }
    }

    /// Deletes a user column together with its tasks. Returns how many
    /// tasks were removed.
    ///
    /// # Errors
    ///
    /// - [`BoardError::NotSignedIn`] without a user.
    /// - [`BoardError::BuiltinColumn`] for `todo`, `inprogress` or `done`;
    ///   nothing is sent to the store.
    /// - [`BoardError::UnknownColumn`] if the column is not on the board.
    /// - [`BoardError::Store`] if the delete fails.
    pub async fn delete_column(&mut self, column_id: &ColumnId) -> Result<u32, BoardError> {
        if let Err(e) = self.identity.require_user() {
            return self.fail(e);
        }
        if column::is_builtin(column_id) {
            return self.fail(BoardError::BuiltinColumn(column_id.clone()));
        }
        if !self.state.has_column(column_id) {
            return self.fail(BoardError::UnknownColumn(column_id.clone()));
        }
        match self.store.delete_column(column_id).await {
            Ok(removed) => {
                tracing::info!(column = %column_id, tasks_removed = removed, "column deleted");
                self.notifications.push(Notification::success(
                    "Column deleted",
                    format!("Removed the column and {removed} task(s)."),
                ));
                Ok(removed)
            }
            Err(e) => self.fail(e.into()),
        }
    }

    /// Asks for a due date and priority for the draft and applies them.
    ///
    /// The draft is only changed when a valid suggestion arrives, and then
    /// both fields are set together.
    ///
    /// # Errors
    ///
    /// Returns [`BoardError::Validation`] for a blank title, otherwise
    /// [`BoardError::Suggest`] on any failure.
    pub async fn suggest(
        &mut self,
        suggester: &impl Suggester,
        draft: &mut TaskDraft,
        today: NaiveDate,
    ) -> Result<Suggestion, BoardError> {
        let result =
            suggest::request_suggestion(suggester, &draft.title, &draft.description, today).await;
        match result {
            Ok(suggestion) => {
                draft.apply_suggestion(&suggestion);
                self.notifications.push(Notification::success(
                    "Suggestion applied!",
                    format!(
                        "Due {} with {} priority.",
                        suggestion.due_date, suggestion.priority
                    ),
                ));
                Ok(suggestion)
            }
            Err(SuggestError::MissingTitle) => self.fail(ValidationError::TitleEmpty.into()),
            Err(e) => self.fail(e.into()),
        }
    }

    fn fail<T>(&mut self, err: BoardError) -> Result<T, BoardError> {
        tracing::warn!(err = %err, "board action failed");
        self.notifications.push(err.notification());
        Err(err)
    }
}

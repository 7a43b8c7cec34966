//! In-memory document store with change notifications.
//!
//! The [`DocumentStore`] keeps every owner's tasks and user columns behind a
//! [`RwLock`]. Each successful write broadcasts a [`Change`] naming the owner
//! and the collections it touched; subscription tasks listen for those and
//! re-query a full snapshot. When a data file is configured every write is
//! persisted before it becomes visible, and rolled back if the save fails.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use taskboard_proto::column::{self, Column, NewColumn};
use taskboard_proto::ids::{ColumnId, TaskId, UserId};
use taskboard_proto::sync::{Query, SortOrder, WriteError};
use taskboard_proto::task::{self, NewTask, Task};
use tokio::sync::{RwLock, broadcast};

use crate::persist::{self, PersistError};

/// Capacity of the change notification channel.
const CHANGE_CHANNEL_CAPACITY: usize = 256;

/// All stored records.
#[derive(Debug, Clone, Default)]
pub struct Collections {
    /// Every owner's tasks by id.
    pub tasks: HashMap<TaskId, Task>,
    /// Every owner's user-created columns by id.
    pub columns: HashMap<ColumnId, Column>,
    /// Highest creation timestamp handed out so far.
    pub last_timestamp: u64,
}

impl Collections {
    fn column_exists(&self, owner: &UserId, column_id: &ColumnId) -> bool {
        column::is_builtin(column_id) || self.owned_column(owner, column_id).is_some()
    }

    fn owned_column(&self, owner: &UserId, column_id: &ColumnId) -> Option<&Column> {
        self.columns
            .get(column_id)
            .filter(|c| c.owner_id.as_ref() == Some(owner))
    }

    fn owned_task_mut(&mut self, owner: &UserId, task_id: &TaskId) -> Option<&mut Task> {
        self.tasks.get_mut(task_id).filter(|t| &t.owner_id == owner)
    }

    /// Server timestamp: wall clock, but strictly increasing so that
    /// creation order is total.
    fn next_timestamp(&mut self) -> u64 {
        let now = u64::try_from(
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_millis(),
        )
        .unwrap_or(u64::MAX);
        self.last_timestamp = now.max(self.last_timestamp.saturating_add(1));
        self.last_timestamp
    }
}

/// Which collections a change touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeScope {
    /// Only tasks changed.
    Tasks,
    /// Only columns changed.
    Columns,
    /// Both changed in one batch (column deletion cascade).
    TasksAndColumns,
}

/// Notification that one owner's records changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Change {
    /// Owner whose records changed.
    pub owner: UserId,
    /// What changed.
    pub scope: ChangeScope,
}

impl Change {
    /// Returns `true` if a subscription for `owner` and `query` must resync.
    #[must_use]
    pub fn affects(&self, owner: &UserId, query: &Query) -> bool {
        if &self.owner != owner {
            return false;
        }
        match (query, self.scope) {
            (Query::Tasks { .. }, ChangeScope::Tasks | ChangeScope::TasksAndColumns)
            | (Query::Columns, ChangeScope::Columns | ChangeScope::TasksAndColumns) => true,
            (Query::Tasks { .. }, ChangeScope::Columns) | (Query::Columns, ChangeScope::Tasks) => {
                false
            }
        }
    }
}

/// Per-owner task and column collections.
pub struct DocumentStore {
    inner: RwLock<Collections>,
    changes: broadcast::Sender<Change>,
    data_file: Option<PathBuf>,
}

impl Default for DocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentStore {
    /// Creates an empty, memory-only store.
    #[must_use]
    pub fn new() -> Self {
        Self::with_collections(Collections::default(), None)
    }

    /// Opens a store backed by `data_file`, loading any existing records.
    ///
    /// # Errors
    ///
    /// Returns [`PersistError`] if the file exists but cannot be read or parsed.
    pub async fn open(data_file: PathBuf) -> Result<Self, PersistError> {
        let collections = persist::load(&data_file).await?;
        tracing::info!(
            path = %data_file.display(),
            tasks = collections.tasks.len(),
            columns = collections.columns.len(),
            "loaded data file"
        );
        Ok(Self::with_collections(collections, Some(data_file)))
    }

    fn with_collections(collections: Collections, data_file: Option<PathBuf>) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            inner: RwLock::new(collections),
            changes,
            data_file,
        }
    }

    /// Returns a receiver of change notifications.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Change> {
        self.changes.subscribe()
    }

    /// Returns the owner's tasks ordered by creation time.
    pub async fn tasks(&self, owner: &UserId, order: SortOrder) -> Vec<Task> {
        let inner = self.inner.read().await;
        let mut tasks: Vec<Task> = inner
            .tasks
            .values()
            .filter(|t| &t.owner_id == owner)
            .cloned()
            .collect();
        drop(inner);
        tasks.sort_by(|a, b| (a.created_at, &a.id).cmp(&(b.created_at, &b.id)));
        if order == SortOrder::Descending {
            tasks.reverse();
        }
        tasks
    }

    /// Returns the owner's user-created columns ordered by position.
    pub async fn columns(&self, owner: &UserId) -> Vec<Column> {
        let inner = self.inner.read().await;
        let mut columns: Vec<Column> = inner
            .columns
            .values()
            .filter(|c| c.owner_id.as_ref() == Some(owner))
            .cloned()
            .collect();
        drop(inner);
        columns.sort_by(|a, b| (a.position, &a.id).cmp(&(b.position, &b.id)));
        columns
    }

    /// Creates a task in the default column with a server timestamp.
    ///
    /// # Errors
    ///
    /// Returns [`WriteError::Invalid`] for a bad title, or
    /// [`WriteError::Storage`] if persisting fails.
    pub async fn create_task(&self, owner: &UserId, new: NewTask) -> Result<Task, WriteError> {
        let title = task::validate_title(&new.title)?;
        self.commit(owner, ChangeScope::Tasks, |c| {
            let task = Task {
                id: TaskId::generate(),
                title,
                description: task::normalize_description(new.description.as_deref()),
                due_date: new.due_date,
                priority: new.priority,
                column_id: column::default_column(),
                owner_id: owner.clone(),
                created_at: c.next_timestamp(),
            };
            c.tasks.insert(task.id.clone(), task.clone());
            Ok(task)
        })
        .await
    }

    /// Creates a user column after the owner's existing columns.
    ///
    /// # Errors
    ///
    /// Returns [`WriteError::Invalid`] for a bad title, or
    /// [`WriteError::Storage`] if persisting fails.
    pub async fn create_column(
        &self,
        owner: &UserId,
        new: NewColumn,
    ) -> Result<Column, WriteError> {
        let title = task::validate_column_title(&new.title)?;
        self.commit(owner, ChangeScope::Columns, |c| {
            let position = c
                .columns
                .values()
                .filter(|col| col.owner_id.as_ref() == Some(owner))
                .map(|col| col.position.saturating_add(1))
                .max()
                .unwrap_or(0);
            let column = Column {
                id: ColumnId::generate(),
                title,
                position,
                owner_id: Some(owner.clone()),
            };
            c.columns.insert(column.id.clone(), column.clone());
            Ok(column)
        })
        .await
    }

    /// Changes a single task's column assignment.
    ///
    /// # Errors
    ///
    /// Returns [`WriteError::TaskNotFound`] if the owner has no such task,
    /// [`WriteError::ColumnNotFound`] if the column does not exist for the
    /// owner at write time, or [`WriteError::Storage`].
    pub async fn update_task_column(
        &self,
        owner: &UserId,
        task_id: &TaskId,
        column_id: &ColumnId,
    ) -> Result<(), WriteError> {
        self.commit(owner, ChangeScope::Tasks, |c| {
            if !c.column_exists(owner, column_id) {
                return Err(WriteError::ColumnNotFound(column_id.clone()));
            }
            let task = c
                .owned_task_mut(owner, task_id)
                .ok_or_else(|| WriteError::TaskNotFound(task_id.clone()))?;
            task.column_id = column_id.clone();
            Ok(())
        })
        .await
    }

    /// Deletes one task.
    ///
    /// # Errors
    ///
    /// Returns [`WriteError::TaskNotFound`] or [`WriteError::Storage`].
    pub async fn delete_task(&self, owner: &UserId, task_id: &TaskId) -> Result<(), WriteError> {
        self.commit(owner, ChangeScope::Tasks, |c| {
            if c.owned_task_mut(owner, task_id).is_none() {
                return Err(WriteError::TaskNotFound(task_id.clone()));
            }
            c.tasks.remove(task_id);
            Ok(())
        })
        .await
    }

    /// Deletes a user column and every task of the owner assigned to it,
    /// as one batch. Returns the number of tasks removed.
    ///
    /// # Errors
    ///
    /// Returns [`WriteError::BuiltinColumn`] for built-ins,
    /// [`WriteError::ColumnNotFound`] if the owner has no such column, or
    /// [`WriteError::Storage`].
    pub async fn delete_column(
        &self,
        owner: &UserId,
        column_id: &ColumnId,
    ) -> Result<u32, WriteError> {
        if column::is_builtin(column_id) {
            return Err(WriteError::BuiltinColumn(column_id.clone()));
        }
        self.commit(owner, ChangeScope::TasksAndColumns, |c| {
            if c.owned_column(owner, column_id).is_none() {
                return Err(WriteError::ColumnNotFound(column_id.clone()));
            }
            c.columns.remove(column_id);
            let before = c.tasks.len();
            c.tasks
                .retain(|_, t| !(&t.owner_id == owner && &t.column_id == column_id));
            Ok(u32::try_from(before - c.tasks.len()).unwrap_or(u32::MAX))
        })
        .await
    }

    /// Applies `apply` under the write lock, persists, then notifies.
    ///
    /// `apply` must either fully succeed or return an error without
    /// mutating. A failed save restores the previous collections.
    async fn commit<T>(
        &self,
        owner: &UserId,
        scope: ChangeScope,
        apply: impl FnOnce(&mut Collections) -> Result<T, WriteError>,
    ) -> Result<T, WriteError> {
        let mut inner = self.inner.write().await;
        let backup = self.data_file.as_ref().map(|_| inner.clone());
        let value = apply(&mut *inner)?;

        if let (Some(path), Some(backup)) = (&self.data_file, backup)
            && let Err(e) = persist::save(path, &inner).await
        {
            tracing::error!(error = %e, "failed to persist write, rolling back");
            *inner = backup;
            return Err(WriteError::Storage(e.to_string()));
        }
        drop(inner);

        // No receivers simply means nobody is subscribed.
        let _ = self.changes.send(Change {
            owner: owner.clone(),
            scope,
        });
        Ok(value)
    }
}

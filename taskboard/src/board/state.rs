//! Board view-state.
//!
//! [`BoardState`] is the only owner of the tasks and columns a board renders.
//! It changes solely through [`BoardState::apply`], so snapshots, optimistic
//! drops and rollbacks are all ordered through one place. Snapshots replace
//! the task list wholesale and bump the generation counter; a rollback only
//! applies if no snapshot arrived after the write it undoes was issued.

use std::collections::HashSet;

use taskboard_proto::column::Column;
use taskboard_proto::ids::ColumnId;
use taskboard_proto::sync::SortOrder;
use taskboard_proto::task::Task;

use super::filter::{PriorityFilter, TaskFilter};
use super::reconcile::{ColumnWrite, DropOutcome};

/// A change to the board view-state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoardAction {
    /// Replace every task with a store snapshot.
    ReplaceTasks(Vec<Task>),
    /// Replace the user-created columns with a store snapshot.
    ReplaceColumns(Vec<Column>),
    /// Apply an optimistic drop.
    ApplyDrop(DropOutcome),
    /// Undo a failed column write issued at `generation`.
    RevertWrite {
        /// The write that failed.
        write: ColumnWrite,
        /// Snapshot generation when the write was issued.
        generation: u64,
    },
    /// Change creation-time ordering and re-sort the local list.
    SetSortOrder(SortOrder),
    /// Collapse or expand a column.
    ToggleCollapsed(ColumnId),
    /// Change the search text.
    SetSearch(String),
    /// Change the priority filter.
    SetPriorityFilter(PriorityFilter),
}

/// Ephemeral board view-state.
#[derive(Debug, Clone, Default)]
pub struct BoardState {
    tasks: Vec<Task>,
    user_columns: Vec<Column>,
    generation: u64,
    sort_order: SortOrder,
    collapsed: HashSet<ColumnId>,
    filter: TaskFilter,
}

impl BoardState {
    /// Creates an empty board with the given ordering.
    #[must_use]
    pub fn new(sort_order: SortOrder) -> Self {
        Self {
            sort_order,
            ..Self::default()
        }
    }

    /// Applies an action. Returns `true` if anything changed.
    pub fn apply(&mut self, action: BoardAction) -> bool {
        match action {
            BoardAction::ReplaceTasks(tasks) => {
                self.tasks = tasks;
                self.generation += 1;
                true
            }
            BoardAction::ReplaceColumns(mut columns) => {
                columns.sort_by(|a, b| (a.position, &a.id).cmp(&(b.position, &b.id)));
                self.user_columns = columns;
                true
            }
            BoardAction::ApplyDrop(outcome) => {
                if !outcome.changed() {
                    return false;
                }
                self.tasks = outcome.tasks;
                true
            }
            BoardAction::RevertWrite { write, generation } => self.revert(&write, generation),
            BoardAction::SetSortOrder(order) => {
                self.sort_order = order;
                self.tasks.sort_by_key(|t| t.created_at);
                if order == SortOrder::Descending {
                    self.tasks.reverse();
                }
                true
            }
            BoardAction::ToggleCollapsed(column_id) => {
                if !self.collapsed.remove(&column_id) {
                    self.collapsed.insert(column_id);
                }
                true
            }
            BoardAction::SetSearch(search) => {
                self.filter.search = search;
                true
            }
            BoardAction::SetPriorityFilter(priority) => {
                self.filter.priority = priority;
                true
            }
        }
    }

    fn revert(&mut self, write: &ColumnWrite, generation: u64) -> bool {
        if generation != self.generation {
            tracing::debug!(task = %write.task_id, "snapshot arrived since write, keeping it");
            return false;
        }
        let Some(task) = self
            .tasks
            .iter_mut()
            .find(|t| t.id == write.task_id && t.column_id == write.column_id)
        else {
            return false;
        };
        task.column_id = write.previous_column_id.clone();
        true
    }

    /// Every task in list order.
    #[must_use]
    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    /// Built-in columns followed by user columns by position.
    #[must_use]
    pub fn columns(&self) -> Vec<Column> {
        let mut columns = Column::builtins();
        columns.extend(self.user_columns.iter().cloned());
        columns
    }

    /// The user-created columns by position.
    #[must_use]
    pub fn user_columns(&self) -> &[Column] {
        &self.user_columns
    }

    /// Ids of every column a task may be dropped on.
    #[must_use]
    pub fn known_column_ids(&self) -> Vec<ColumnId> {
        self.columns().into_iter().map(|c| c.id).collect()
    }

    /// Returns `true` if `column_id` is a built-in or user column.
    #[must_use]
    pub fn has_column(&self, column_id: &ColumnId) -> bool {
        taskboard_proto::column::is_builtin(column_id)
            || self.user_columns.iter().any(|c| &c.id == column_id)
    }

    fn filtered(&self, column_id: &ColumnId) -> Vec<&Task> {
        self.tasks
            .iter()
            .filter(|t| &t.column_id == column_id && self.filter.matches(t))
            .collect()
    }

    /// Tasks shown in `column_id`: filtered, and none while collapsed.
    #[must_use]
    pub fn visible_tasks(&self, column_id: &ColumnId) -> Vec<&Task> {
        if self.is_collapsed(column_id) {
            return Vec::new();
        }
        self.filtered(column_id)
    }

    /// Number of filtered tasks hidden by collapsing `column_id`.
    #[must_use]
    pub fn hidden_count(&self, column_id: &ColumnId) -> usize {
        if self.is_collapsed(column_id) {
            self.filtered(column_id).len()
        } else {
            0
        }
    }

    /// Returns `true` if `column_id` is collapsed.
    #[must_use]
    pub fn is_collapsed(&self, column_id: &ColumnId) -> bool {
        self.collapsed.contains(column_id)
    }

    /// Number of task snapshots applied so far.
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    /// Current creation-time ordering.
    #[must_use]
    pub const fn sort_order(&self) -> SortOrder {
        self.sort_order
    }

    /// Current filter.
    #[must_use]
    pub const fn filter(&self) -> &TaskFilter {
        &self.filter
    }
}

//! Drag-and-drop reconciliation.
//!
//! A drop names the dragged task and whatever it was released over: nothing,
//! a column, or another task. [`reconcile_drop`] computes the new ordered
//! task list and whether the column change must be written to the store.
//!
//! Only column assignments are durable. In-column reordering is applied to
//! the local list and lost on the next snapshot, which is ordered by creation
//! time.

use taskboard_proto::ids::{ColumnId, TaskId};
use taskboard_proto::task::Task;

/// Errors that can occur while reconciling a drop.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReconcileError {
    /// The dragged task is not in the list.
    #[error("dragged task not found: {0}")]
    UnknownTask(TaskId),
}

/// What a drop did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropKind {
    /// Released over nothing.
    NoTarget,
    /// Released over itself.
    SelfDrop,
    /// Released over the column it already belongs to.
    Unchanged,
    /// Released over a different column.
    MovedToColumn,
    /// Released over an id that resolves to nothing.
    StaleTarget,
    /// Released over a task in another column.
    MovedAcrossColumns,
    /// Released over a task in the same column.
    Reordered,
}

/// A column assignment to persist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnWrite {
    /// Task to update.
    pub task_id: TaskId,
    /// New column.
    pub column_id: ColumnId,
    /// Column before the drop, for rollback.
    pub previous_column_id: ColumnId,
}

/// Result of reconciling a drop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DropOutcome {
    /// The full task list after the drop.
    pub tasks: Vec<Task>,
    /// Column write to issue, if any.
    pub write: Option<ColumnWrite>,
    /// What happened.
    pub kind: DropKind,
}

impl DropOutcome {
    fn unchanged(tasks: &[Task], kind: DropKind) -> Self {
        Self {
            tasks: tasks.to_vec(),
            write: None,
            kind,
        }
    }

    /// Returns `true` if the task list differs from the input.
    #[must_use]
    pub const fn changed(&self) -> bool {
        matches!(
            self.kind,
            DropKind::MovedToColumn | DropKind::MovedAcrossColumns | DropKind::Reordered
        )
    }
}

/// Reconciles a drag-end event.
///
/// `over_id` is the id of the column or task the dragged task was released
/// over. Column ids take precedence: an id in `known_column_ids` is always
/// treated as a column drop.
///
/// # Errors
///
/// Returns [`ReconcileError::UnknownTask`] if `active_id` is not in `tasks`
/// and the drop has a target other than itself.
pub fn reconcile_drop(
    tasks: &[Task],
    active_id: &TaskId,
    over_id: Option<&str>,
    known_column_ids: &[ColumnId],
) -> Result<DropOutcome, ReconcileError> {
    let Some(over_id) = over_id else {
        return Ok(DropOutcome::unchanged(tasks, DropKind::NoTarget));
    };
    if over_id == active_id.as_str() {
        return Ok(DropOutcome::unchanged(tasks, DropKind::SelfDrop));
    }

    let active_index = tasks
        .iter()
        .position(|t| &t.id == active_id)
        .ok_or_else(|| ReconcileError::UnknownTask(active_id.clone()))?;

    if let Some(column_id) = known_column_ids.iter().find(|c| c.as_str() == over_id) {
        if &tasks[active_index].column_id == column_id {
            return Ok(DropOutcome::unchanged(tasks, DropKind::Unchanged));
        }
        return Ok(move_to_column(tasks, active_index, column_id, DropKind::MovedToColumn));
    }

    let Some(over_index) = tasks.iter().position(|t| t.id.as_str() == over_id) else {
        tracing::debug!(active = %active_id, over = over_id, "drop target no longer exists");
        return Ok(DropOutcome::unchanged(tasks, DropKind::StaleTarget));
    };

    let over_column = &tasks[over_index].column_id;
    if &tasks[active_index].column_id != over_column {
        return Ok(move_to_column(
            tasks,
            active_index,
            over_column,
            DropKind::MovedAcrossColumns,
        ));
    }

    Ok(DropOutcome {
        tasks: reorder(tasks, active_index, over_index),
        write: None,
        kind: DropKind::Reordered,
    })
}

/// Reassigns one task's column, keeping every task at its list position.
fn move_to_column(
    tasks: &[Task],
    active_index: usize,
    column_id: &ColumnId,
    kind: DropKind,
) -> DropOutcome {
    let mut next = tasks.to_vec();
    let active = &mut next[active_index];
    let previous_column_id = std::mem::replace(&mut active.column_id, column_id.clone());
    let write = ColumnWrite {
        task_id: active.id.clone(),
        column_id: column_id.clone(),
        previous_column_id,
    };
    DropOutcome {
        tasks: next,
        write: Some(write),
        kind,
    }
}

/// Moves the active task next to the over task within their shared column.
///
/// Moving forward lands after the over task, moving backward lands at its
/// position. Tasks of one column keep their relative order in the full list,
/// so comparing full-list indices is the same as comparing in-column ones.
fn reorder(tasks: &[Task], active_index: usize, over_index: usize) -> Vec<Task> {
    let over_id = tasks[over_index].id.clone();
    let moving_forward = active_index < over_index;

    let mut next = tasks.to_vec();
    let moved = next.remove(active_index);
    let over_now = next
        .iter()
        .position(|t| t.id == over_id)
        .unwrap_or(next.len());
    let insert_at = if moving_forward {
        over_now + 1
    } else {
        over_now
    };
    next.insert(insert_at.min(next.len()), moved);
    next
}

#[cfg(test)]
mod tests {
    use super::*;
    use taskboard_proto::column::{self, Column};
    use taskboard_proto::ids::UserId;

    fn task(id: &str, column: &str) -> Task {
        Task {
            id: TaskId::from(id),
            title: format!("Task {id}"),
            description: None,
            due_date: None,
            priority: None,
            column_id: ColumnId::from(column),
            owner_id: UserId::from("user-1"),
            created_at: 0,
        }
    }

    fn known() -> Vec<ColumnId> {
        Column::builtins().into_iter().map(|c| c.id).collect()
    }

    fn ids(tasks: &[Task]) -> Vec<&str> {
        tasks.iter().map(|t| t.id.as_str()).collect()
    }

    fn board() -> Vec<Task> {
        vec![
            task("1", column::TODO),
            task("2", column::IN_PROGRESS),
            task("3", column::TODO),
        ]
    }

    #[test]
    fn drop_on_column_moves_and_writes() {
        let out = reconcile_drop(&board(), &TaskId::from("1"), Some("done"), &known()).unwrap();
        assert_eq!(out.kind, DropKind::MovedToColumn);
        assert_eq!(ids(&out.tasks), vec!["1", "2", "3"]);
        assert_eq!(out.tasks[0].column_id.as_str(), "done");
        assert_eq!(out.tasks[1], board()[1]);
        assert_eq!(out.tasks[2], board()[2]);
        assert_eq!(
            out.write,
            Some(ColumnWrite {
                task_id: TaskId::from("1"),
                column_id: ColumnId::from("done"),
                previous_column_id: ColumnId::from("todo"),
            })
        );
    }

    #[test]
    fn drop_on_own_column_is_unchanged() {
        let out = reconcile_drop(&board(), &TaskId::from("1"), Some("todo"), &known()).unwrap();
        assert_eq!(out.kind, DropKind::Unchanged);
        assert_eq!(out.tasks, board());
        assert!(out.write.is_none());
    }

    #[test]
    fn no_target_and_self_drop_are_no_ops() {
        let a = reconcile_drop(&board(), &TaskId::from("1"), None, &known()).unwrap();
        assert_eq!(a.kind, DropKind::NoTarget);
        let b = reconcile_drop(&board(), &TaskId::from("1"), Some("1"), &known()).unwrap();
        assert_eq!(b.kind, DropKind::SelfDrop);
        assert_eq!(b.tasks, board());
        assert!(!b.changed());
    }

    #[test]
    fn drop_on_task_in_other_column_adopts_its_column() {
        let out = reconcile_drop(&board(), &TaskId::from("2"), Some("3"), &known()).unwrap();
        assert_eq!(out.kind, DropKind::MovedAcrossColumns);
        assert_eq!(ids(&out.tasks), vec!["1", "2", "3"]);
        assert_eq!(out.tasks[1].column_id.as_str(), "todo");
        assert_eq!(out.write.unwrap().column_id.as_str(), "todo");
    }

    #[test]
    fn reorder_forward_lands_after_target() {
        let tasks = vec![
            task("a", "todo"),
            task("x", "done"),
            task("b", "todo"),
            task("c", "todo"),
        ];
        let out = reconcile_drop(&tasks, &TaskId::from("a"), Some("b"), &known()).unwrap();
        assert_eq!(out.kind, DropKind::Reordered);
        assert!(out.write.is_none());
        assert_eq!(ids(&out.tasks), vec!["x", "b", "a", "c"]);
    }

    #[test]
    fn reorder_backward_lands_before_target() {
        let tasks = vec![
            task("a", "todo"),
            task("x", "done"),
            task("b", "todo"),
            task("c", "todo"),
        ];
        let out = reconcile_drop(&tasks, &TaskId::from("c"), Some("a"), &known()).unwrap();
        assert_eq!(ids(&out.tasks), vec!["c", "a", "x", "b"]);
    }

    #[test]
    fn stale_target_is_a_no_op() {
        let out = reconcile_drop(&board(), &TaskId::from("1"), Some("gone"), &known()).unwrap();
        assert_eq!(out.kind, DropKind::StaleTarget);
        assert_eq!(out.tasks, board());
    }

    #[test]
    fn unknown_dragged_task_is_an_error() {
        let err = reconcile_drop(&board(), &TaskId::from("9"), Some("done"), &known()).unwrap_err();
        assert_eq!(err, ReconcileError::UnknownTask(TaskId::from("9")));
    }

    #[test]
    fn user_column_ids_are_targets() {
        let mut columns = known();
        columns.push(ColumnId::from("review"));
        let out = reconcile_drop(&board(), &TaskId::from("3"), Some("review"), &columns).unwrap();
        assert_eq!(out.tasks[2].column_id.as_str(), "review");
    }
}

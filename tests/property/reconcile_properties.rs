//! Property-based tests for drag-and-drop reconciliation.
//!
//! Uses proptest to verify, for arbitrary boards:
//! 1. A drop on a known column assigns that column and keeps every task.
//! 2. A drop on itself leaves the list identical.
//! 3. A drop on a task in another column takes that column and keeps the
//!    relative order of every other task.
//! 4. A same-column drop lands after the target when moving forward and
//!    before it when moving backward, without a write.
//! 5. Repeating a column drop is a no-op.

use proptest::prelude::*;
use taskboard::board::{DropKind, reconcile_drop};
use taskboard_proto::column::Column;
use taskboard_proto::ids::{ColumnId, TaskId, UserId};
use taskboard_proto::task::Task;

const COLUMNS: [&str; 4] = ["todo", "inprogress", "done", "blocked"];

fn known_columns() -> Vec<ColumnId> {
    let mut ids: Vec<ColumnId> = Column::builtins().into_iter().map(|c| c.id).collect();
    ids.push(ColumnId::from("blocked"));
    ids
}

/// Strategy for a board of 2..16 tasks with ids `t0..tn` spread across the
/// known columns.
fn arb_board() -> impl Strategy<Value = Vec<Task>> {
    prop::collection::vec(0..COLUMNS.len(), 2..16).prop_map(|columns| {
        columns
            .into_iter()
            .enumerate()
            .map(|(i, c)| Task {
                id: TaskId::new(format!("t{i}")),
                title: format!("Task {i}"),
                description: None,
                due_date: None,
                priority: None,
                column_id: ColumnId::from(COLUMNS[c]),
                owner_id: UserId::from("alice"),
                created_at: i as u64,
            })
            .collect()
    })
}

/// Strategy for a board plus two indices `i < j` whose tasks share a column.
fn arb_same_column_pair() -> impl Strategy<Value = (Vec<Task>, usize, usize)> {
    (arb_board(), any::<prop::sample::Index>(), any::<prop::sample::Index>())
        .prop_map(|(mut tasks, x, y)| {
            let first = x.index(tasks.len());
            let mut second = y.index(tasks.len() - 1);
            if second >= first {
                second += 1;
            }
            let (i, j) = (first.min(second), first.max(second));
            tasks[j].column_id = tasks[i].column_id.clone();
            (tasks, i, j)
        })
}

fn ids(tasks: &[Task]) -> Vec<String> {
    tasks.iter().map(|t| t.id.to_string()).collect()
}

fn index_of(tasks: &[Task], id: &TaskId) -> usize {
    tasks.iter().position(|t| &t.id == id).expect("task present")
}

proptest! {
    /// Dropping on a known column assigns the column and keeps the size.
    #[test]
    fn column_drop_assigns_column(
        tasks in arb_board(),
        pick in any::<prop::sample::Index>(),
        column in 0..COLUMNS.len(),
    ) {
        let active = tasks[pick.index(tasks.len())].id.clone();
        let target = COLUMNS[column];
        let outcome = reconcile_drop(&tasks, &active, Some(target), &known_columns())
            .expect("active task exists");

        prop_assert_eq!(outcome.tasks.len(), tasks.len());
        prop_assert_eq!(ids(&outcome.tasks), ids(&tasks));
        let moved = &outcome.tasks[index_of(&outcome.tasks, &active)];
        prop_assert_eq!(moved.column_id.as_str(), target);

        let was_there = tasks[index_of(&tasks, &active)].column_id.as_str() == target;
        prop_assert_eq!(outcome.write.is_none(), was_there);
        if let Some(write) = outcome.write {
            prop_assert_eq!(write.task_id, active);
            prop_assert_eq!(write.column_id.as_str(), target);
        }
    }

    /// Dropping a task on itself changes nothing.
    #[test]
    fn self_drop_is_identity(tasks in arb_board(), pick in any::<prop::sample::Index>()) {
        let active = tasks[pick.index(tasks.len())].id.clone();
        let outcome = reconcile_drop(&tasks, &active, Some(active.as_str()), &known_columns())
            .expect("self drop never fails");
        prop_assert_eq!(outcome.kind, DropKind::SelfDrop);
        prop_assert_eq!(outcome.tasks, tasks);
        prop_assert!(outcome.write.is_none());
    }

    /// Dropping on a task in another column takes its column only.
    #[test]
    fn cross_column_drop_takes_target_column(
        tasks in arb_board(),
        a in any::<prop::sample::Index>(),
        b in any::<prop::sample::Index>(),
    ) {
        let a = &tasks[a.index(tasks.len())];
        let b = &tasks[b.index(tasks.len())];
        prop_assume!(a.column_id != b.column_id);

        let outcome = reconcile_drop(&tasks, &a.id, Some(b.id.as_str()), &known_columns())
            .expect("active task exists");
        prop_assert_eq!(outcome.kind, DropKind::MovedAcrossColumns);
        prop_assert_eq!(&outcome.tasks[index_of(&outcome.tasks, &a.id)].column_id, &b.column_id);

        let others_before: Vec<&Task> = tasks.iter().filter(|t| t.id != a.id).collect();
        let others_after: Vec<&Task> = outcome.tasks.iter().filter(|t| t.id != a.id).collect();
        prop_assert_eq!(others_before, others_after);

        let write = outcome.write.expect("cross-column drop writes");
        prop_assert_eq!(&write.previous_column_id, &a.column_id);
        prop_assert_eq!(&write.column_id, &b.column_id);
    }

    /// Same-column drops insert direction-dependently and never write.
    #[test]
    fn same_column_drop_is_direction_dependent(
        (tasks, i, j) in arb_same_column_pair(),
    ) {
        let (a, b) = (&tasks[i], &tasks[j]);

        // a before b, moving forward: a lands right after b.
        let forward = reconcile_drop(&tasks, &a.id, Some(b.id.as_str()), &known_columns())
            .expect("active task exists");
        prop_assert_eq!(forward.kind, DropKind::Reordered);
        prop_assert!(forward.write.is_none());
        prop_assert_eq!(
            index_of(&forward.tasks, &a.id),
            index_of(&forward.tasks, &b.id) + 1
        );

        // b after a, moving backward: b lands right before a.
        let backward = reconcile_drop(&tasks, &b.id, Some(a.id.as_str()), &known_columns())
            .expect("active task exists");
        prop_assert_eq!(backward.kind, DropKind::Reordered);
        prop_assert!(backward.write.is_none());
        prop_assert_eq!(
            index_of(&backward.tasks, &b.id) + 1,
            index_of(&backward.tasks, &a.id)
        );

        prop_assert_eq!(forward.tasks.len(), tasks.len());
        prop_assert_eq!(backward.tasks.len(), tasks.len());
    }

    /// A second identical column drop leaves the list as the first left it.
    #[test]
    fn column_drop_is_idempotent(
        tasks in arb_board(),
        pick in any::<prop::sample::Index>(),
        column in 0..COLUMNS.len(),
    ) {
        let active = tasks[pick.index(tasks.len())].id.clone();
        let target = COLUMNS[column];
        let first = reconcile_drop(&tasks, &active, Some(target), &known_columns())
            .expect("active task exists");
        let second = reconcile_drop(&first.tasks, &active, Some(target), &known_columns())
            .expect("active task exists");
        prop_assert_eq!(second.kind, DropKind::Unchanged);
        prop_assert!(second.write.is_none());
        prop_assert_eq!(second.tasks, first.tasks);
    }

    /// Ids that resolve to nothing leave the board alone.
    #[test]
    fn stale_target_is_ignored(tasks in arb_board(), pick in any::<prop::sample::Index>()) {
        let active = tasks[pick.index(tasks.len())].id.clone();
        let outcome = reconcile_drop(&tasks, &active, Some("gone"), &known_columns())
            .expect("active task exists");
        prop_assert_eq!(outcome.kind, DropKind::StaleTarget);
        prop_assert_eq!(outcome.tasks, tasks);
    }
}

//! Plain-text rendering of a board for the terminal.

use std::fmt::Write as _;

use taskboard_proto::task::Task;

use crate::board::BoardState;

/// Renders every column with its visible tasks, built-ins first.
///
/// Collapsed columns show only how many tasks they hide.
#[must_use]
pub fn render_board(state: &BoardState) -> String {
    let mut out = String::new();
    for column in state.columns() {
        let _ = writeln!(out, "== {} [{}] ==", column.title, column.id);
        if state.is_collapsed(&column.id) {
            let _ = writeln!(out, "  ({} hidden)", state.hidden_count(&column.id));
            continue;
        }
        let tasks = state.visible_tasks(&column.id);
        if tasks.is_empty() {
            out.push_str("  (empty)\n");
        }
        for task in tasks {
            let _ = writeln!(out, "  {}", render_task(task));
        }
    }
    out
}

/// One task on one line: id, title, then priority and due date if set.
#[must_use]
pub fn render_task(task: &Task) -> String {
    let mut line = format!("{}  {}", task.id, task.title);
    let mut meta = Vec::new();
    if let Some(priority) = task.priority {
        meta.push(priority.to_string());
    }
    if let Some(due) = task.due_date {
        meta.push(format!("due {due}"));
    }
    if !meta.is_empty() {
        let _ = write!(line, " ({})", meta.join(", "));
    }
    line
}

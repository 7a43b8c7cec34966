//! Search and priority filters applied when rendering columns.

use std::fmt;
use std::str::FromStr;

use taskboard_proto::task::{Priority, Task};

/// Priority filter selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PriorityFilter {
    /// Show every task.
    #[default]
    All,
    /// Show only tasks with this priority.
    Only(Priority),
}

impl PriorityFilter {
    /// Returns `true` if `priority` passes the filter.
    #[must_use]
    pub fn accepts(self, priority: Option<Priority>) -> bool {
        match self {
            Self::All => true,
            Self::Only(wanted) => priority == Some(wanted),
        }
    }
}

impl fmt::Display for PriorityFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => f.write_str("all"),
            Self::Only(p) => write!(f, "{p}"),
        }
    }
}

impl FromStr for PriorityFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("all") {
            return Ok(Self::All);
        }
        s.parse::<Priority>().map(Self::Only).map_err(|_| {
            format!("unknown priority filter {s:?} (expected all, low, medium or high)")
        })
    }
}

/// Combined search and priority filter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskFilter {
    /// Case-insensitive substring matched against title and description.
    pub search: String,
    /// Priority selection.
    pub priority: PriorityFilter,
}

impl TaskFilter {
    /// Returns `true` if `task` passes both filters.
    #[must_use]
    pub fn matches(&self, task: &Task) -> bool {
        self.priority.accepts(task.priority) && self.matches_search(task)
    }

    fn matches_search(&self, task: &Task) -> bool {
        let needle = self.search.trim().to_lowercase();
        if needle.is_empty() {
            return true;
        }
        task.title.to_lowercase().contains(&needle)
            || task
                .description
                .as_deref()
                .is_some_and(|d| d.to_lowercase().contains(&needle))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use taskboard_proto::ids::{ColumnId, TaskId, UserId};

    fn task(title: &str, description: Option<&str>, priority: Option<Priority>) -> Task {
        Task {
            id: TaskId::from("t"),
            title: title.to_string(),
            description: description.map(str::to_string),
            due_date: None,
            priority,
            column_id: ColumnId::from("todo"),
            owner_id: UserId::from("u"),
            created_at: 0,
        }
    }

    #[test]
    fn empty_filter_matches_everything() {
        assert!(TaskFilter::default().matches(&task("Anything", None, None)));
    }

    #[test]
    fn search_is_case_insensitive_over_title_and_description() {
        let filter = TaskFilter {
            search: "REPORT".to_string(),
            ..TaskFilter::default()
        };
        assert!(filter.matches(&task("Write report", None, None)));
        assert!(filter.matches(&task("Q2", Some("quarterly report"), None)));
        assert!(!filter.matches(&task("Groceries", Some("milk"), None)));
    }

    #[test]
    fn priority_filter_excludes_unset() {
        let filter = TaskFilter {
            priority: PriorityFilter::Only(Priority::High),
            ..TaskFilter::default()
        };
        assert!(filter.matches(&task("a", None, Some(Priority::High))));
        assert!(!filter.matches(&task("a", None, Some(Priority::Low))));
        assert!(!filter.matches(&task("a", None, None)));
    }

    #[test]
    fn priority_filter_text_form() {
        assert_eq!("all".parse::<PriorityFilter>().unwrap(), PriorityFilter::All);
        assert_eq!(
            "medium".parse::<PriorityFilter>().unwrap(),
            PriorityFilter::Only(Priority::Medium)
        );
        assert!("urgent".parse::<PriorityFilter>().is_err());
        assert_eq!(PriorityFilter::Only(Priority::Low).to_string(), "low");
    }
}

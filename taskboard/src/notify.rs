//! User-facing notifications.
//!
//! Every failure surfaces as a [`Notification`]; nothing is fatal. Warnings
//! mean the action was refused before any write, errors mean a remote call
//! failed.

use std::collections::VecDeque;
use std::fmt;

use crate::controller::BoardError;

/// Severity of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    /// The action completed.
    Success,
    /// The action was refused locally.
    Warning,
    /// A remote call failed.
    Error,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Success => "ok",
            Self::Warning => "warning",
            Self::Error => "error",
        })
    }
}

/// A single message shown to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    /// Severity.
    pub level: Level,
    /// Short headline.
    pub title: String,
    /// Optional detail line.
    pub description: Option<String>,
}

impl Notification {
    /// A success notification.
    #[must_use]
    pub fn success(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            level: Level::Success,
            title: title.into(),
            description: Some(description.into()),
        }
    }

    /// A warning notification.
    #[must_use]
    pub fn warning(title: impl Into<String>, description: Option<String>) -> Self {
        Self {
            level: Level::Warning,
            title: title.into(),
            description,
        }
    }

    /// An error notification.
    #[must_use]
    pub fn error(title: impl Into<String>, description: Option<String>) -> Self {
        Self {
            level: Level::Error,
            title: title.into(),
            description,
        }
    }
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.level, self.title)?;
        if let Some(description) = &self.description {
            write!(f, ": {description}")?;
        }
        Ok(())
    }
}

/// Ordered queue of pending notifications.
#[derive(Debug, Clone, Default)]
pub struct Notifications {
    queue: VecDeque<Notification>,
}

impl Notifications {
    /// Appends a notification.
    pub fn push(&mut self, notification: Notification) {
        tracing::debug!(level = %notification.level, title = %notification.title, "notification");
        self.queue.push_back(notification);
    }

    /// Removes the notification at `index`, if present.
    pub fn dismiss(&mut self, index: usize) -> Option<Notification> {
        self.queue.remove(index)
    }

    /// Removes and returns every pending notification, oldest first.
    pub fn drain(&mut self) -> Vec<Notification> {
        self.queue.drain(..).collect()
    }

    /// Pending notifications, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &Notification> {
        self.queue.iter()
    }

    /// Number of pending notifications.
    #[must_use]
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Returns `true` if nothing is pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

impl BoardError {
    /// The notification shown for this error.
    #[must_use]
    pub fn notification(&self) -> Notification {
        match self {
            Self::Validation(e) => Notification::warning(e.to_string(), None),
            Self::NotSignedIn => Notification::warning(
                "You need to be signed in to change the board",
                Some("Sign in with --user or TASKBOARD_USER.".to_string()),
            ),
            Self::BuiltinColumn(id) => Notification::warning(
                "Built-in columns cannot be deleted",
                Some(format!("Column {id} is part of every board.")),
            ),
            Self::UnknownColumn(id) => {
                Notification::warning(format!("No column named {id}"), None)
            }
            Self::Reconcile(e) => Notification::warning("Move ignored", Some(e.to_string())),
            Self::Store(e) => Notification::error(
                "Failed to save changes",
                Some(format!("{e}. Please try again.")),
            ),
            Self::Suggest(e) => {
                Notification::error("Failed to get suggestion", Some(e.to_string()))
            }
        }
    }
}

//! Opaque identifiers for tasks, columns and users.
//!
//! Identifiers are plain strings on the wire. The store server mints new
//! task and column ids as UUID v7 strings so that they sort by creation
//! time, but clients must treat every id as opaque.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wraps an existing identifier string.
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Returns the identifier as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Returns `true` if the identifier is the empty string.
            #[must_use]
            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_string())
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

string_id!(
    /// Identifier of a task record.
    TaskId
);

string_id!(
    /// Identifier of a column, either built-in (`todo`, `inprogress`,
    /// `done`) or user-created.
    ColumnId
);

string_id!(
    /// Stable opaque identifier supplied by the identity provider.
    UserId
);

impl TaskId {
    /// Mints a new time-ordered task identifier (UUID v7).
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::now_v7().to_string())
    }
}

impl ColumnId {
    /// Mints a new time-ordered column identifier (UUID v7).
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::now_v7().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_task_ids_are_uuid_strings() {
        let id = TaskId::generate();
        assert_eq!(id.as_str().len(), 36);
        assert!(Uuid::parse_str(id.as_str()).is_ok());
    }

    #[test]
    fn generated_ids_are_unique() {
        let a = ColumnId::generate();
        let b = ColumnId::generate();
        assert_ne!(a, b);
    }

    #[test]
    fn display_matches_inner_string() {
        let id = UserId::new("user_2abc");
        assert_eq!(id.to_string(), "user_2abc");
        assert_eq!(id.as_str(), "user_2abc");
    }

    #[test]
    fn json_form_is_a_bare_string() {
        let id = TaskId::from("t-1");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"t-1\"");
    }
}

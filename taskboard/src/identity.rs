//! Signed-in user.
//!
//! Without a user the board is read-only: no writes and no drag moves.

use taskboard_proto::ids::UserId;

use crate::controller::BoardError;

/// The current user, if any.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Identity {
    user: Option<UserId>,
}

impl Identity {
    /// A signed-in identity. Blank ids are treated as signed out.
    #[must_use]
    pub fn signed_in_as(user: impl Into<String>) -> Self {
        let user = user.into();
        if user.trim().is_empty() {
            return Self::anonymous();
        }
        Self {
            user: Some(UserId::new(user.trim())),
        }
    }

    /// A signed-out identity.
    #[must_use]
    pub const fn anonymous() -> Self {
        Self { user: None }
    }

    /// Returns `true` if a user is signed in.
    #[must_use]
    pub const fn signed_in(&self) -> bool {
        self.user.is_some()
    }

    /// The signed-in user, if any.
    #[must_use]
    pub const fn user(&self) -> Option<&UserId> {
        self.user.as_ref()
    }

    /// The signed-in user.
    ///
    /// # Errors
    ///
    /// Returns [`BoardError::NotSignedIn`] when nobody is signed in.
    pub fn require_user(&self) -> Result<&UserId, BoardError> {
        self.user.as_ref().ok_or(BoardError::NotSignedIn)
    }
}

impl From<Option<String>> for Identity {
    fn from(user: Option<String>) -> Self {
        user.map_or_else(Self::anonymous, Self::signed_in_as)
    }
}

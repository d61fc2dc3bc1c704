//! Authenticated identity accessor.
//!
//! Token storage lives outside the engine. The engine only needs to know
//! who "me" is, to answer authorship questions for the view.

use std::sync::RwLock;

use crate::model::{CurrentUser, UserId};

/// Process-wide session: set after login or `/auth/me`, cleared on logout.
#[derive(Debug, Default)]
pub struct Session {
    user: RwLock<Option<CurrentUser>>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(user: CurrentUser) -> Self {
        Self {
            user: RwLock::new(Some(user)),
        }
    }

    pub fn set(&self, user: CurrentUser) {
        *self.user.write().unwrap_or_else(|e| e.into_inner()) = Some(user);
    }

    pub fn clear(&self) {
        *self.user.write().unwrap_or_else(|e| e.into_inner()) = None;
    }

    pub fn current(&self) -> Option<CurrentUser> {
        self.user.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn user_id(&self) -> Option<UserId> {
        self.user
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .map(|u| u.id)
    }

    pub fn is_signed_in(&self) -> bool {
        self.user_id().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_and_clear() {
        let session = Session::new();
        assert!(!session.is_signed_in());

        session.set(CurrentUser {
            id: UserId(5),
            email: Some("me@campus.edu".into()),
            enrollment_number: None,
        });
        assert_eq!(session.user_id(), Some(UserId(5)));

        session.clear();
        assert!(session.current().is_none());
    }
}

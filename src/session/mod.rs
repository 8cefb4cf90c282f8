//! Remembered user identity backing the Authorization header.

mod file;

pub use file::FileSessionStore;

use std::sync::Mutex;

use serde::{Deserialize, Serialize};

/// Signed-in user as established by a successful login.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    pub token: String,
    pub user_name: String,
    #[serde(default)]
    pub claims: Vec<String>,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default)]
    pub access_rights: Vec<String>,
}

/// Holds the current session, if any.
///
/// `clear` is invoked by the HTTP layer when the server answers 401, so
/// implementations must tolerate being cleared while already empty.
#[cfg_attr(test, mockall::automock)]
pub trait SessionStore: Send + Sync {
    fn current(&self) -> Option<User>;
    fn set(&self, user: User);
    fn clear(&self);
}

/// Process-local store, the default for library use.
#[derive(Default)]
pub struct InMemorySessionStore {
    user: Mutex<Option<User>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for InMemorySessionStore {
    fn current(&self) -> Option<User> {
        self.user.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn set(&self, user: User) {
        *self.user.lock().unwrap_or_else(|e| e.into_inner()) = Some(user);
    }

    fn clear(&self) {
        *self.user.lock().unwrap_or_else(|e| e.into_inner()) = None;
    }
}

#[cfg(test)]
pub(crate) fn test_user(token: &str) -> User {
    User {
        token: token.to_string(),
        user_name: "alice".to_string(),
        claims: vec!["admin".to_string()],
        roles: vec!["ops".to_string()],
        access_rights: vec![],
    }
}

//! Current-user context for activity delivery.

use serde::{Deserialize, Serialize};
use std::sync::{PoisonError, RwLock};

/// Identity of the signed-in user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    pub id: String,
}

impl UserIdentity {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

/// Supplies the current user, if any.
pub trait AuthContext: Send + Sync {
    fn current_user(&self) -> Option<UserIdentity>;
}

/// An auth context with explicit sign in and sign out.
#[derive(Debug, Default)]
pub struct SessionAuth {
    user: RwLock<Option<UserIdentity>>,
}

impl SessionAuth {
    /// Create a context with nobody signed in.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a context with `user` signed in.
    pub fn signed_in(user: UserIdentity) -> Self {
        Self {
            user: RwLock::new(Some(user)),
        }
    }

    pub fn sign_in(&self, user: UserIdentity) {
        tracing::debug!(user_id = %user.id, "User signed in");
        *self.user.write().unwrap_or_else(PoisonError::into_inner) = Some(user);
    }

    pub fn sign_out(&self) {
        *self.user.write().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

impl AuthContext for SessionAuth {
    fn current_user(&self) -> Option<UserIdentity> {
        self.user
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

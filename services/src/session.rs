//! Explicit session identity.
//!
//! Populated at login and handed to every component that needs the current
//! user; nothing reads identity from ambient global state.

use crate::model::{Role, UserId};

#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    user_id: UserId,
    role: Role,
    token: Option<String>,
}

impl Session {
    pub fn new(user_id: impl Into<UserId>, role: Role) -> Self {
        Self {
            user_id: user_id.into(),
            role,
            token: None,
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    /// True when `target` names this session's user.
    pub fn is_target(&self, target: Option<&UserId>) -> bool {
        target == Some(&self.user_id)
    }
}

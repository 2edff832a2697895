use serde::{Deserialize, Serialize};

/// Authenticated caller as reported by the identity collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub username: String,
    pub is_admin: bool,
}

impl Principal {
    pub fn user(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            is_admin: false,
        }
    }

    pub fn admin(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            is_admin: true,
        }
    }
}

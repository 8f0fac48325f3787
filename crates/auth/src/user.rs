//! User accounts.

use serde::{Deserialize, Serialize};

use inventario_core::{DomainError, DomainResult, Entity, UserId};

use crate::Role;

/// A user account. The password is stored as an opaque hash computed by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: Role,
}

impl User {
    pub fn new(username: &str, password_hash: &str, role: Role) -> DomainResult<Self> {
        let username = username.trim();
        if username.is_empty() {
            return Err(DomainError::validation("username cannot be empty"));
        }
        if password_hash.is_empty() {
            return Err(DomainError::validation("password hash cannot be empty"));
        }
        Ok(Self {
            id: UserId::new(),
            username: username.to_string(),
            password_hash: password_hash.to_string(),
            role,
        })
    }
}

impl Entity for User {
    type Id = UserId;
    const KIND: &'static str = "user";

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

//! Who is asking.
//!
//! Sessions and logins live outside this crate; the trends engine only needs
//! the requesting user's id and role, resolved at the start of every scoped
//! operation.

use serde::{Deserialize, Serialize};

use crate::models::Id;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Admin,
    Member,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: Id,
    pub role: Role,
}

impl Identity {
    pub fn new(id: impl Into<Id>, role: Role) -> Self {
        Self {
            id: id.into(),
            role,
        }
    }

    pub fn admin(id: impl Into<Id>) -> Self {
        Self::new(id, Role::Admin)
    }

    pub fn member(id: impl Into<Id>) -> Self {
        Self::new(id, Role::Member)
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Resolves the identity attached to the current request.
pub trait IdentityProvider: Send + Sync {
    fn current_identity(&self) -> Option<Identity>;
}

/// An identity fixed at construction time (CLI flags, tests).
#[derive(Debug, Clone, Default)]
pub struct StaticIdentity(Option<Identity>);

impl StaticIdentity {
    pub fn new(identity: Identity) -> Self {
        Self(Some(identity))
    }

    pub fn anonymous() -> Self {
        Self(None)
    }
}

impl IdentityProvider for StaticIdentity {
    fn current_identity(&self) -> Option<Identity> {
        self.0.clone()
    }
}

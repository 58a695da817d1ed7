//! Caller identity and capabilities.
//!
//! Authentication happens outside the engine; every operation receives an
//! [`Actor`] describing who is asking. Permission checks only go through the
//! [`Capability`] trait so card lifecycle and transfers gate access the same
//! way.

use serde::{Deserialize, Serialize};

use crate::EngineError;

/// Identity used by background jobs such as the expiration sweep.
pub const SYSTEM_USER_ID: &str = "system";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Admin,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Admin => "admin",
        }
    }
}

impl TryFrom<&str> for Role {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "user" => Ok(Self::User),
            "admin" => Ok(Self::Admin),
            other => Err(EngineError::Validation(format!("invalid role: {other}"))),
        }
    }
}

/// What an identity is allowed to do.
pub trait Capability: Send + Sync {
    /// The user behind the request, `None` for the system.
    fn user_id(&self) -> Option<&str>;

    fn is_admin(&self) -> bool;

    fn is_system(&self) -> bool {
        self.user_id().is_none()
    }

    fn is_owner(&self, resource_owner_id: &str) -> bool {
        self.user_id() == Some(resource_owner_id)
    }

    fn is_owner_or_admin(&self, resource_owner_id: &str) -> bool {
        self.is_admin() || self.is_owner(resource_owner_id)
    }
}

/// The resolved identity of a caller.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Actor {
    User { user_id: String, role: Role },
    System,
}

impl Actor {
    pub fn user(user_id: impl Into<String>) -> Self {
        Self::User {
            user_id: user_id.into(),
            role: Role::User,
        }
    }

    pub fn admin(user_id: impl Into<String>) -> Self {
        Self::User {
            user_id: user_id.into(),
            role: Role::Admin,
        }
    }

    pub fn system() -> Self {
        Self::System
    }

    /// Name written into logs and history descriptions.
    pub fn label(&self) -> &str {
        match self {
            Self::User { user_id, .. } => user_id,
            Self::System => SYSTEM_USER_ID,
        }
    }
}

impl Capability for Actor {
    fn user_id(&self) -> Option<&str> {
        match self {
            Self::User { user_id, .. } => Some(user_id),
            Self::System => None,
        }
    }

    fn is_admin(&self) -> bool {
        matches!(
            self,
            Self::User {
                role: Role::Admin,
                ..
            }
        )
    }
}

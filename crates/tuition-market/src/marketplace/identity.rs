//! Caller identity and the capability checks composed in front of each operation.

use serde::Serialize;

use super::domain::Role;
use super::error::MarketplaceError;

/// Verified caller handed over by the authentication layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
    pub email: String,
    pub role: Role,
}

impl Identity {
    pub fn new(email: impl Into<String>, role: Role) -> Self {
        Self {
            email: email.into(),
            role,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn is(&self, email: &str) -> bool {
        self.email == email
    }
}

/// Outcome of a capability check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Allow,
    Deny,
}

impl Access {
    pub fn from_bool(allowed: bool) -> Self {
        if allowed {
            Access::Allow
        } else {
            Access::Deny
        }
    }

    pub fn or_forbid(self, reason: &str) -> Result<(), MarketplaceError> {
        match self {
            Access::Allow => Ok(()),
            Access::Deny => Err(MarketplaceError::Forbidden(reason.to_string())),
        }
    }
}

pub fn role_access(identity: &Identity, required: Role) -> Access {
    Access::from_bool(identity.role == required)
}

pub fn owner_or_admin_access(identity: &Identity, owner_email: &str) -> Access {
    Access::from_bool(identity.is_admin() || identity.is(owner_email))
}

pub fn require_role(identity: &Identity, required: Role) -> Result<(), MarketplaceError> {
    role_access(identity, required).or_forbid(match required {
        Role::Admin => "requires Admin role",
        Role::Tutor => "requires Tutor role",
        Role::Student => "requires Student role",
    })
}

pub fn require_self_or_admin(identity: &Identity, email: &str) -> Result<(), MarketplaceError> {
    owner_or_admin_access(identity, email).or_forbid("not the account owner")
}

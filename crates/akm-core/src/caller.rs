//! # Caller Identity
//!
//! Every engine operation runs on behalf of a [`Caller`]: an organization
//! plus the strongest role the caller holds in it. Roles are ordered so a
//! role check is a single comparison.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::identity::OrgId;

/// Caller roles, weakest first.
///
/// `OrgAdmin` implies `ActivationKeyAdmin`, which implies `User`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// A regular user. May read but not manage activation keys.
    User,
    /// May create, modify and delete activation keys.
    ActivationKeyAdmin,
    /// Organization administrator.
    OrgAdmin,
}

impl Role {
    /// Wire name of the role.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::ActivationKeyAdmin => "activation_key_admin",
            Self::OrgAdmin => "org_admin",
        }
    }

    /// Parse a wire name.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::UnknownRole`] for an unrecognized name.
    pub fn from_name(name: &str) -> Result<Self, ValidationError> {
        match name {
            "user" => Ok(Self::User),
            "activation_key_admin" => Ok(Self::ActivationKeyAdmin),
            "org_admin" => Ok(Self::OrgAdmin),
            other => Err(ValidationError::UnknownRole(other.to_string())),
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The organization and role an operation runs as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Caller {
    /// Organization all lookups are scoped to.
    pub org_id: OrgId,
    /// Strongest role held.
    pub role: Role,
}

impl Caller {
    /// Construct a caller.
    pub fn new(org_id: OrgId, role: Role) -> Self {
        Self { org_id, role }
    }

    /// Whether the caller holds at least `required`.
    pub fn has_role(&self, required: Role) -> bool {
        self.role >= required
    }
}

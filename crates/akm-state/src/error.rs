//! # Policy Errors
//!
//! Every rejection the engine can produce. Catalog lookup failures are
//! folded in with the offending label preserved.

use thiserror::Error;

use akm_catalog::{ChannelLookupError, Entitlement, EntitlementError, PackageError};
use akm_core::{KeyToken, Role, ValidationError};

/// Errors raised by activation-key operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PolicyError {
    /// A key, server group or other entity does not exist in the caller's
    /// organization.
    #[error("{kind} \"{id}\" not found")]
    NotFound {
        /// Entity kind.
        kind: &'static str,
        /// Identifier as supplied.
        id: String,
    },

    /// A channel or configuration channel label cannot be used here.
    #[error("invalid channel \"{label}\": {reason}")]
    InvalidChannel {
        /// Offending label.
        label: String,
        /// Why it was rejected.
        reason: String,
    },

    /// An entitlement requested at creation is unknown or not an add-on.
    #[error(transparent)]
    InvalidEntitlement(#[from] EntitlementError),

    /// The key lacks an entitlement the operation depends on.
    #[error("activation key {key} does not have the {entitlement} entitlement")]
    MissingEntitlement {
        /// The key.
        key: KeyToken,
        /// The required entitlement.
        entitlement: Entitlement,
    },

    /// The derived token already exists in the organization.
    #[error("activation key {0} already exists")]
    DuplicateKey(KeyToken),

    /// Malformed or out-of-range input.
    #[error("{0}")]
    Validator(String),

    /// Activating another system would exceed the key's usage limit.
    #[error("activation key {key} has reached its usage limit of {limit}")]
    UsageLimitExceeded {
        /// The key.
        key: KeyToken,
        /// Configured limit.
        limit: u64,
    },

    /// The caller's role is too weak.
    #[error("operation requires role {required}, caller has {actual}")]
    PermissionDenied {
        /// Minimum role.
        required: Role,
        /// Caller's role.
        actual: Role,
    },
}

impl PolicyError {
    pub(crate) fn key_not_found(token: &str) -> Self {
        Self::NotFound {
            kind: "activation key",
            id: token.to_string(),
        }
    }
}

impl From<ValidationError> for PolicyError {
    fn from(err: ValidationError) -> Self {
        Self::Validator(err.to_string())
    }
}

impl From<ChannelLookupError> for PolicyError {
    fn from(err: ChannelLookupError) -> Self {
        Self::InvalidChannel {
            label: err.label().to_string(),
            reason: err.to_string(),
        }
    }
}

impl From<PackageError> for PolicyError {
    fn from(err: PackageError) -> Self {
        Self::Validator(err.to_string())
    }
}

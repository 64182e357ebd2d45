//! # Validation Errors
//!
//! Shape violations in caller input, raised before any state is touched.
//! Each variant carries the rejected value so that a caller can correct the
//! request without inspecting server-side state.

use thiserror::Error;

/// Validation errors for identifiers and scalar inputs.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Explicit activation key contains characters outside `[A-Za-z0-9._-]`
    /// or is longer than the permitted length.
    #[error("invalid explicit key \"{0}\" (expected 1-64 characters of A-Z, a-z, 0-9, '.', '_', '-')")]
    InvalidExplicitKey(String),

    /// Key token is empty or contains whitespace.
    #[error("invalid activation key token \"{0}\"")]
    InvalidKeyToken(String),

    /// Usage limit must be a non-negative integer.
    #[error("usage limit must be non-negative, got {0}")]
    NegativeUsageLimit(i64),

    /// A package specification arrived without a name.
    #[error("package name must not be empty")]
    EmptyPackageName,

    /// A label argument (channel, entitlement, config channel) was empty.
    #[error("{kind} label must not be empty")]
    EmptyLabel {
        /// What kind of label was empty.
        kind: &'static str,
    },

    /// An identifier could not be parsed from its textual form.
    #[error("invalid {kind} identifier \"{value}\"")]
    InvalidIdentifier {
        /// Identifier kind (e.g. "organization").
        kind: &'static str,
        /// The rejected text.
        value: String,
    },

    /// A timestamp was not valid RFC 3339.
    #[error("invalid timestamp \"{0}\"")]
    InvalidTimestamp(String),

    /// Role name not recognized.
    #[error("unknown role \"{0}\"")]
    UnknownRole(String),
}

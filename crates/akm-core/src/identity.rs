//! # Identity Newtypes
//!
//! Identifiers used throughout the activation-key engine. Numeric database
//! style identifiers ([`OrgId`], [`SystemId`], [`ServerGroupId`],
//! [`PackageNameId`]) are always valid by construction. [`KeyToken`] is the
//! opaque activation key string and is validated at construction.
//!
//! ## Token format
//!
//! Tokens are always prefixed with the owning organization:
//!
//! ```text
//! <org_id>-<32 lowercase hex chars>     generated
//! <org_id>-<explicit key>               derived from a caller-supplied key
//! ```
//!
//! A caller-supplied key is never stored verbatim. The organization prefix
//! keeps explicit keys of different organizations from colliding.

use rand_core::{OsRng, RngCore};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Maximum length of a caller-supplied explicit key.
pub const MAX_EXPLICIT_KEY_LEN: usize = 64;

macro_rules! numeric_id {
    ($(#[$meta:meta])* $name:ident, $kind:literal) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(u64);

        impl $name {
            /// Wrap a raw numeric identifier.
            pub const fn new(id: u64) -> Self {
                Self(id)
            }

            /// Access the raw numeric value.
            pub const fn get(&self) -> u64 {
                self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = ValidationError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.trim()
                    .parse::<u64>()
                    .map(Self)
                    .map_err(|_| ValidationError::InvalidIdentifier {
                        kind: $kind,
                        value: s.to_string(),
                    })
            }
        }
    };
}

numeric_id!(
    /// An organization. All keys, channels, config channels and server
    /// groups are scoped to exactly one organization.
    OrgId,
    "organization"
);

numeric_id!(
    /// A registered (managed) system.
    SystemId,
    "system"
);

numeric_id!(
    /// A managed server group within an organization.
    ServerGroupId,
    "server group"
);

numeric_id!(
    /// A package-name catalog entry.
    PackageNameId,
    "package name"
);

/// An activation key token.
///
/// Unique within an organization. Constructed through [`KeyToken::generate`],
/// [`KeyToken::from_explicit`] (at key creation) or [`KeyToken::parse`]
/// (lookups of existing keys).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyToken(String);

impl KeyToken {
    /// Generate a random token for `org`.
    pub fn generate(org: OrgId) -> Self {
        let mut bytes = [0u8; 16];
        OsRng.fill_bytes(&mut bytes);
        let hex: String = bytes.iter().map(|b| format!("{b:02x}")).collect();
        Self(format!("{org}-{hex}"))
    }

    /// Derive a token for `org` from a caller-supplied explicit key.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidExplicitKey`] if the key is empty,
    /// longer than [`MAX_EXPLICIT_KEY_LEN`], or contains characters outside
    /// `[A-Za-z0-9._-]`.
    pub fn from_explicit(org: OrgId, explicit: &str) -> Result<Self, ValidationError> {
        let valid_chars = explicit
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'));
        if explicit.is_empty() || explicit.len() > MAX_EXPLICIT_KEY_LEN || !valid_chars {
            return Err(ValidationError::InvalidExplicitKey(explicit.to_string()));
        }
        Ok(Self(format!("{org}-{explicit}")))
    }

    /// Parse an existing token supplied by a caller for lookup.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidKeyToken`] if the token is empty or
    /// contains whitespace.
    pub fn parse(value: impl Into<String>) -> Result<Self, ValidationError> {
        let s = value.into();
        if s.is_empty() || s.chars().any(char::is_whitespace) {
            return Err(ValidationError::InvalidKeyToken(s));
        }
        Ok(Self(s))
    }

    /// Access the token string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for KeyToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const ORG: OrgId = OrgId::new(7);

    #[test]
    fn generated_tokens_are_prefixed_and_unique() {
        let a = KeyToken::generate(ORG);
        let b = KeyToken::generate(ORG);
        assert!(a.as_str().starts_with("7-"));
        assert_eq!(a.as_str().len(), "7-".len() + 32);
        assert_ne!(a, b);
    }

    #[test]
    fn explicit_key_is_never_used_verbatim() {
        let token = KeyToken::from_explicit(ORG, "myexplicitkey").unwrap();
        assert_ne!(token.as_str(), "myexplicitkey");
        assert_eq!(token.as_str(), "7-myexplicitkey");
    }

    #[test]
    fn explicit_key_rejects_bad_characters() {
        assert!(KeyToken::from_explicit(ORG, "has space").is_err());
        assert!(KeyToken::from_explicit(ORG, "comma,key").is_err());
        assert!(KeyToken::from_explicit(ORG, "").is_err());
        assert!(KeyToken::from_explicit(ORG, &"x".repeat(65)).is_err());
    }

    #[test]
    fn explicit_key_accepts_punctuation_subset() {
        assert!(KeyToken::from_explicit(ORG, "web-tier_01.prod").is_ok());
    }

    #[test]
    fn parse_rejects_empty_and_whitespace() {
        assert!(KeyToken::parse("").is_err());
        assert!(KeyToken::parse("1-abc def").is_err());
        assert_eq!(KeyToken::parse("1-abc").unwrap().as_str(), "1-abc");
    }

    #[test]
    fn numeric_ids_parse_and_display() {
        let org: OrgId = "42".parse().unwrap();
        assert_eq!(org.get(), 42);
        assert_eq!(org.to_string(), "42");
        assert!("forty-two".parse::<OrgId>().is_err());
    }

    #[test]
    fn numeric_ids_serialize_transparently() {
        let json = serde_json::to_string(&ServerGroupId::new(9)).unwrap();
        assert_eq!(json, "9");
        let token = KeyToken::parse("1-k").unwrap();
        assert_eq!(serde_json::to_string(&token).unwrap(), "\"1-k\"");
    }

    proptest! {
        #[test]
        fn valid_explicit_keys_round_trip_through_parse(key in "[A-Za-z0-9._-]{1,64}") {
            let token = KeyToken::from_explicit(ORG, &key).unwrap();
            let parsed = KeyToken::parse(token.as_str().to_string()).unwrap();
            prop_assert_eq!(parsed, token);
        }
    }
}

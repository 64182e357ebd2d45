//! Request shapes for creating and updating keys.

use serde::{Deserialize, Serialize};

/// Parameters for a new key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NewKey {
    /// Explicit key. Empty to generate a random token.
    pub key: String,
    /// Description.
    pub description: String,
    /// Base channel label. Empty for none.
    pub base_channel_label: String,
    /// Usage limit. `None` for unlimited.
    pub usage_limit: Option<i64>,
    /// Add-on entitlement labels.
    pub entitlements: Vec<String>,
    /// Make this the organization's universal default.
    pub universal_default: bool,
}

/// Partial update of a key's scalar attributes.
///
/// Absent fields are left untouched. `unlimited_usage_limit = true` wins
/// over `usage_limit`. An empty `base_channel_label` clears the base channel
/// and all child channels.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyDetailsUpdate {
    /// New description.
    pub description: Option<String>,
    /// New base channel.
    pub base_channel_label: Option<String>,
    /// New usage limit.
    pub usage_limit: Option<i64>,
    /// Remove the usage limit.
    pub unlimited_usage_limit: Option<bool>,
    /// Set or clear the universal default flag.
    pub universal_default: Option<bool>,
}

/// A package preset as requested: name plus optional architecture.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageSpec {
    /// Package name.
    pub name: String,
    /// Architecture. Absent or empty for no constraint.
    #[serde(default)]
    pub arch: Option<String>,
}

impl PackageSpec {
    /// A spec with no architecture constraint.
    pub fn name_only(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            arch: None,
        }
    }

    /// A spec with an architecture.
    pub fn with_arch(name: impl Into<String>, arch: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            arch: Some(arch.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_fields_default_to_absent() {
        let update: KeyDetailsUpdate = serde_json::from_str(r#"{"description":"x"}"#).unwrap();
        assert_eq!(update.description.as_deref(), Some("x"));
        assert!(update.base_channel_label.is_none());
        assert!(update.unlimited_usage_limit.is_none());
    }

    #[test]
    fn package_spec_arch_optional() {
        let spec: PackageSpec = serde_json::from_str(r#"{"name":"pkg3"}"#).unwrap();
        assert_eq!(spec, PackageSpec::name_only("pkg3"));
    }
}

//! # Activation Key
//!
//! The aggregate the policy engine transforms. Fields are crate-private:
//! only the transitions in [`crate::policy`] mutate a key, so the
//! channel, entitlement and package invariants hold for every value that
//! leaves this crate.
//!
//! ## Invariants
//!
//! - Zero or one base channel; every child channel is a direct child of it.
//! - Package presets exist only while `provisioning_entitled` is held.
//! - `enterprise_entitled` is always held.
//! - Configuration channels hold no duplicates; position is precedence.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use akm_catalog::{Entitlement, PackagePreset};
use akm_core::{KeyToken, OrgId, ServerGroupId, SystemId, Timestamp};

// ─── Activated System ────────────────────────────────────────────────

/// A system registered through a key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivatedSystem {
    /// The system.
    pub system_id: SystemId,
    /// Profile name at registration.
    pub name: String,
    /// When the system registered.
    pub activated: Timestamp,
}

// ─── Activation Key ──────────────────────────────────────────────────

/// An activation key and everything it owns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivationKey {
    pub(crate) token: KeyToken,
    pub(crate) org_id: OrgId,
    pub(crate) description: String,
    pub(crate) usage_limit: Option<u64>,
    pub(crate) universal_default: bool,
    pub(crate) config_deploy: bool,
    pub(crate) created: Timestamp,
    pub(crate) entitlements: BTreeSet<Entitlement>,
    pub(crate) base_channel: Option<String>,
    pub(crate) child_channels: BTreeSet<String>,
    pub(crate) packages: BTreeSet<PackagePreset>,
    pub(crate) server_groups: BTreeSet<ServerGroupId>,
    pub(crate) config_channels: Vec<String>,
    pub(crate) activated_systems: Vec<ActivatedSystem>,
}

impl ActivationKey {
    pub(crate) fn new(token: KeyToken, org_id: OrgId, created: Timestamp) -> Self {
        let mut entitlements = BTreeSet::new();
        entitlements.insert(Entitlement::Enterprise);
        Self {
            token,
            org_id,
            description: String::new(),
            usage_limit: None,
            universal_default: false,
            config_deploy: false,
            created,
            entitlements,
            base_channel: None,
            child_channels: BTreeSet::new(),
            packages: BTreeSet::new(),
            server_groups: BTreeSet::new(),
            config_channels: Vec::new(),
            activated_systems: Vec::new(),
        }
    }

    /// The key token.
    pub fn token(&self) -> &KeyToken {
        &self.token
    }

    /// Owning organization.
    pub fn org_id(&self) -> OrgId {
        self.org_id
    }

    /// Free-text description.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Usage limit. `None` means unlimited.
    pub fn usage_limit(&self) -> Option<u64> {
        self.usage_limit
    }

    /// Whether this is the organization's universal default key.
    pub fn is_universal_default(&self) -> bool {
        self.universal_default
    }

    /// Whether configuration files are deployed at registration.
    pub fn config_deploy(&self) -> bool {
        self.config_deploy
    }

    /// Creation time.
    pub fn created(&self) -> Timestamp {
        self.created
    }

    /// Granted entitlements.
    pub fn entitlements(&self) -> &BTreeSet<Entitlement> {
        &self.entitlements
    }

    /// Whether the key grants `entitlement`.
    pub fn has_entitlement(&self, entitlement: Entitlement) -> bool {
        self.entitlements.contains(&entitlement)
    }

    /// Base channel label.
    pub fn base_channel(&self) -> Option<&str> {
        self.base_channel.as_deref()
    }

    /// Child channel labels.
    pub fn child_channels(&self) -> &BTreeSet<String> {
        &self.child_channels
    }

    /// Package presets.
    pub fn packages(&self) -> &BTreeSet<PackagePreset> {
        &self.packages
    }

    /// Server groups joined at registration.
    pub fn server_groups(&self) -> &BTreeSet<ServerGroupId> {
        &self.server_groups
    }

    /// Configuration channel labels in rank order.
    pub fn config_channels(&self) -> &[String] {
        &self.config_channels
    }

    /// Systems activated with this key, oldest first.
    pub fn activated_systems(&self) -> &[ActivatedSystem] {
        &self.activated_systems
    }

    /// Flat details record.
    pub fn details(&self) -> KeyDetails {
        KeyDetails {
            key: self.token.to_string(),
            description: self.description.clone(),
            usage_limit: self.usage_limit,
            base_channel_label: self.base_channel.clone(),
            child_channel_labels: self.child_channels.iter().cloned().collect(),
            entitlements: self
                .entitlements
                .iter()
                .map(|e| e.label().to_string())
                .collect(),
            server_group_ids: self.server_groups.iter().map(|g| g.get()).collect(),
            package_names: self.packages.iter().map(ToString::to_string).collect(),
            universal_default: self.universal_default,
            config_deploy: self.config_deploy,
            created: self.created,
        }
    }
}

// ─── Details Projection ──────────────────────────────────────────────

/// The key as reported to callers.
///
/// `usage_limit` is omitted when the key is unlimited; a limit of zero is
/// reported as `0`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyDetails {
    /// Token.
    pub key: String,
    /// Description.
    pub description: String,
    /// Usage limit, absent when unlimited.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage_limit: Option<u64>,
    /// Base channel, absent when none.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_channel_label: Option<String>,
    /// Child channels.
    pub child_channel_labels: Vec<String>,
    /// Entitlement labels.
    pub entitlements: Vec<String>,
    /// Server group ids.
    pub server_group_ids: Vec<u64>,
    /// Presets as `name` or `name.arch`.
    pub package_names: Vec<String>,
    /// Universal default flag.
    pub universal_default: bool,
    /// Configuration deployment flag.
    pub config_deploy: bool,
    /// Creation time.
    pub created: Timestamp,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> ActivationKey {
        ActivationKey::new(
            KeyToken::parse("1-abc").unwrap(),
            OrgId::new(1),
            Timestamp::now(),
        )
    }

    #[test]
    fn new_key_defaults() {
        let k = key();
        assert!(k.has_entitlement(Entitlement::Enterprise));
        assert_eq!(k.entitlements().len(), 1);
        assert!(!k.config_deploy());
        assert!(!k.is_universal_default());
        assert_eq!(k.usage_limit(), None);
        assert!(k.base_channel().is_none());
    }

    #[test]
    fn details_omit_unlimited_usage_limit() {
        let k = key();
        let json = serde_json::to_value(k.details()).unwrap();
        assert!(json.get("usage_limit").is_none());
        assert!(json.get("base_channel_label").is_none());
        assert_eq!(json["entitlements"][0], "enterprise_entitled");
    }

    #[test]
    fn details_report_zero_limit() {
        let mut k = key();
        k.usage_limit = Some(0);
        let json = serde_json::to_value(k.details()).unwrap();
        assert_eq!(json["usage_limit"], 0);
    }
}

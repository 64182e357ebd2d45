//! # Activation-Key Policy Engine
//!
//! One transition per operation. Each transition validates every input
//! against the catalog before touching the key, then applies its change
//! together with every cascade it implies. No cascade happens anywhere
//! else: removing `provisioning_entitled` clears package presets here, and
//! changing the base channel drops foreign child channels here.
//!
//! Transitions return `Ok(true)` when the key changed and `Ok(false)` for
//! an idempotent no-op. Callers run them on copies and commit only when
//! every key in a batch succeeded.

use std::collections::BTreeSet;

use akm_catalog::{
    Catalog, ChannelHierarchy, ConfigChannelDirectory, Entitlement, EntitlementCatalog,
    PackagePresetStore, ServerGroupDirectory,
};
use akm_core::{KeyToken, OrgId, ServerGroupId, SystemId, Timestamp, ValidationError};

use crate::details::{KeyDetailsUpdate, NewKey, PackageSpec};
use crate::error::PolicyError;
use crate::key::{ActivatedSystem, ActivationKey};

fn usage_limit(raw: i64) -> Result<u64, PolicyError> {
    u64::try_from(raw).map_err(|_| ValidationError::NegativeUsageLimit(raw).into())
}

/// Dedupe `labels`, keeping first occurrences in order.
fn dedup_in_order(labels: &[String]) -> Vec<String> {
    let mut seen = BTreeSet::new();
    labels
        .iter()
        .filter(|l| seen.insert(l.as_str()))
        .cloned()
        .collect()
}

/// Transition functions bound to one organization's view of the catalog.
pub struct PolicyEngine<'a> {
    entitlements: &'a EntitlementCatalog,
    packages: &'a PackagePresetStore,
    channels: &'a dyn ChannelHierarchy,
    config_channels: &'a ConfigChannelDirectory,
    server_groups: &'a ServerGroupDirectory,
}

impl<'a> PolicyEngine<'a> {
    /// Engine for `org`.
    pub fn for_org(catalog: &'a Catalog, org: OrgId) -> Self {
        let entries = catalog.org(org);
        Self {
            entitlements: &catalog.entitlements,
            packages: &catalog.packages,
            channels: &entries.channels,
            config_channels: &entries.config_channels,
            server_groups: &entries.server_groups,
        }
    }

    // ─── Creation & Details ──────────────────────────────────────────

    /// Build a new key.
    ///
    /// The key always holds `enterprise_entitled` plus the requested
    /// add-ons.
    pub fn create(
        &self,
        token: KeyToken,
        org: OrgId,
        request: &NewKey,
        now: Timestamp,
    ) -> Result<ActivationKey, PolicyError> {
        let limit = request.usage_limit.map(usage_limit).transpose()?;

        let base = if request.base_channel_label.is_empty() {
            None
        } else {
            Some(self.channels.resolve_base(&request.base_channel_label)?.label)
        };

        let add_ons = request
            .entitlements
            .iter()
            .map(|label| self.entitlements.resolve_add_on(label))
            .collect::<Result<BTreeSet<_>, _>>()?;

        let mut key = ActivationKey::new(token, org, now);
        key.description = request.description.clone();
        key.usage_limit = limit;
        key.base_channel = base;
        key.universal_default = request.universal_default;
        key.entitlements
            .extend(self.entitlements.implied_base_entitlements(&add_ons));
        key.entitlements.extend(add_ons);
        Ok(key)
    }

    /// Apply a partial update.
    pub fn set_details(
        &self,
        key: &mut ActivationKey,
        update: &KeyDetailsUpdate,
    ) -> Result<bool, PolicyError> {
        let new_limit = if update.unlimited_usage_limit == Some(true) {
            Some(None)
        } else {
            update.usage_limit.map(usage_limit).transpose()?.map(Some)
        };

        let new_base = match update.base_channel_label.as_deref() {
            None => None,
            Some("") => Some(None),
            Some(label) => Some(Some(self.channels.resolve_base(label)?.label)),
        };

        let mut changed = false;
        if let Some(description) = &update.description {
            changed |= key.description != *description;
            key.description = description.clone();
        }
        if let Some(limit) = new_limit {
            changed |= key.usage_limit != limit;
            key.usage_limit = limit;
        }
        if let Some(flag) = update.universal_default {
            changed |= key.universal_default != flag;
            key.universal_default = flag;
        }
        if let Some(base) = new_base {
            changed |= self.replace_base(key, base);
        }
        Ok(changed)
    }

    /// Switch the base channel, dropping children not under the new base.
    fn replace_base(&self, key: &mut ActivationKey, base: Option<String>) -> bool {
        if key.base_channel == base {
            return false;
        }
        let before = key.child_channels.len();
        match &base {
            None => key.child_channels.clear(),
            Some(b) => key
                .child_channels
                .retain(|child| self.channels.is_descendant_of(child, b)),
        }
        if key.child_channels.len() != before {
            tracing::debug!(
                key = %key.token,
                dropped = before - key.child_channels.len(),
                "dropped child channels outside new base"
            );
        }
        key.base_channel = base;
        true
    }

    // ─── Child Channels ──────────────────────────────────────────────

    fn resolve_children(
        &self,
        key: &ActivationKey,
        labels: &[String],
    ) -> Result<Vec<String>, PolicyError> {
        let Some(first) = labels.first() else {
            return Ok(Vec::new());
        };
        let base = key
            .base_channel
            .as_deref()
            .ok_or_else(|| PolicyError::InvalidChannel {
                label: first.clone(),
                reason: format!("activation key {} has no base channel", key.token),
            })?;
        labels
            .iter()
            .map(|label| -> Result<String, PolicyError> {
                Ok(self.channels.resolve_child(label, base)?.label)
            })
            .collect()
    }

    /// Add child channels of the key's base.
    pub fn add_child_channels(
        &self,
        key: &mut ActivationKey,
        labels: &[String],
    ) -> Result<bool, PolicyError> {
        let children = self.resolve_children(key, labels)?;
        let mut changed = false;
        for child in children {
            changed |= key.child_channels.insert(child);
        }
        Ok(changed)
    }

    /// Remove child channels. Labels must still resolve under the base.
    pub fn remove_child_channels(
        &self,
        key: &mut ActivationKey,
        labels: &[String],
    ) -> Result<bool, PolicyError> {
        let children = self.resolve_children(key, labels)?;
        let mut changed = false;
        for child in &children {
            changed |= key.child_channels.remove(child);
        }
        Ok(changed)
    }

    // ─── Entitlements ────────────────────────────────────────────────

    fn resolve_add_ons(&self, labels: &[String]) -> Result<Vec<Entitlement>, PolicyError> {
        labels
            .iter()
            .map(|label| {
                self.entitlements
                    .resolve_add_on(label)
                    .map_err(|e| PolicyError::Validator(e.to_string()))
            })
            .collect()
    }

    /// Grant add-on entitlements.
    pub fn add_entitlements(
        &self,
        key: &mut ActivationKey,
        labels: &[String],
    ) -> Result<bool, PolicyError> {
        let add_ons = self.resolve_add_ons(labels)?;
        let mut changed = false;
        for base in self.entitlements.implied_base_entitlements(&add_ons) {
            changed |= key.entitlements.insert(base);
        }
        for add_on in add_ons {
            changed |= key.entitlements.insert(add_on);
        }
        Ok(changed)
    }

    /// Revoke add-on entitlements.
    ///
    /// Revoking `provisioning_entitled` clears every package preset.
    pub fn remove_entitlements(
        &self,
        key: &mut ActivationKey,
        labels: &[String],
    ) -> Result<bool, PolicyError> {
        let add_ons = self.resolve_add_ons(labels)?;
        let mut changed = false;
        for add_on in add_ons {
            changed |= key.entitlements.remove(&add_on);
        }
        if !key.has_entitlement(Entitlement::Provisioning) && !key.packages.is_empty() {
            tracing::debug!(
                key = %key.token,
                presets = key.packages.len(),
                "provisioning revoked, clearing package presets"
            );
            key.packages.clear();
            changed = true;
        }
        Ok(changed)
    }

    // ─── Packages ────────────────────────────────────────────────────

    fn require_provisioning(key: &ActivationKey) -> Result<(), PolicyError> {
        if key.has_entitlement(Entitlement::Provisioning) {
            Ok(())
        } else {
            Err(PolicyError::MissingEntitlement {
                key: key.token.clone(),
                entitlement: Entitlement::Provisioning,
            })
        }
    }

    /// Add package presets. Unknown names are registered, but only once
    /// every spec has passed its checks.
    pub fn add_packages(
        &self,
        key: &mut ActivationKey,
        specs: &[PackageSpec],
    ) -> Result<bool, PolicyError> {
        Self::require_provisioning(key)?;
        for spec in specs {
            PackagePresetStore::check(&spec.name, spec.arch.as_deref())?;
        }
        let presets = specs
            .iter()
            .map(|s| self.packages.resolve(&s.name, s.arch.as_deref()))
            .collect::<Result<Vec<_>, _>>()?;
        let mut changed = false;
        for preset in presets {
            changed |= key.packages.insert(preset);
        }
        Ok(changed)
    }

    /// Remove package presets matching exactly on (name, arch).
    pub fn remove_packages(
        &self,
        key: &mut ActivationKey,
        specs: &[PackageSpec],
    ) -> Result<bool, PolicyError> {
        Self::require_provisioning(key)?;
        let mut presets = Vec::with_capacity(specs.len());
        for spec in specs {
            if let Some(preset) = self.packages.lookup(&spec.name, spec.arch.as_deref())? {
                presets.push(preset);
            }
        }
        let mut changed = false;
        for preset in &presets {
            changed |= key.packages.remove(preset);
        }
        Ok(changed)
    }

    // ─── Server Groups ───────────────────────────────────────────────

    /// Join server groups. Every group must exist in the organization.
    pub fn add_server_groups(
        &self,
        key: &mut ActivationKey,
        groups: &[ServerGroupId],
    ) -> Result<bool, PolicyError> {
        if let Some(missing) = groups.iter().find(|g| !self.server_groups.contains(**g)) {
            return Err(PolicyError::NotFound {
                kind: "server group",
                id: missing.to_string(),
            });
        }
        let mut changed = false;
        for group in groups {
            changed |= key.server_groups.insert(*group);
        }
        Ok(changed)
    }

    /// Leave server groups. Absent ids are ignored.
    pub fn remove_server_groups(&self, key: &mut ActivationKey, groups: &[ServerGroupId]) -> bool {
        let mut changed = false;
        for group in groups {
            changed |= key.server_groups.remove(group);
        }
        changed
    }

    // ─── Configuration Channels ──────────────────────────────────────

    /// Check every label names a configuration channel of the organization.
    pub fn validate_config_channels(&self, labels: &[String]) -> Result<(), PolicyError> {
        match labels.iter().find(|l| !self.config_channels.contains(l)) {
            Some(label) => Err(PolicyError::InvalidChannel {
                label: label.clone(),
                reason: "no such configuration channel".to_string(),
            }),
            None => Ok(()),
        }
    }

    /// Replace the configuration channel list.
    pub fn set_config_channels(
        &self,
        key: &mut ActivationKey,
        labels: &[String],
    ) -> Result<bool, PolicyError> {
        self.validate_config_channels(labels)?;
        let ranked = dedup_in_order(labels);
        let changed = key.config_channels != ranked;
        key.config_channels = ranked;
        Ok(changed)
    }

    /// Subscribe to configuration channels, at the top or bottom.
    ///
    /// Labels already subscribed keep their position.
    pub fn add_config_channels(
        &self,
        key: &mut ActivationKey,
        labels: &[String],
        add_to_top: bool,
    ) -> Result<bool, PolicyError> {
        self.validate_config_channels(labels)?;
        let mut fresh: Vec<String> = dedup_in_order(labels)
            .into_iter()
            .filter(|l| !key.config_channels.contains(l))
            .collect();
        if fresh.is_empty() {
            return Ok(false);
        }
        if add_to_top {
            fresh.append(&mut key.config_channels);
            key.config_channels = fresh;
        } else {
            key.config_channels.append(&mut fresh);
        }
        Ok(true)
    }

    /// Unsubscribe from configuration channels, keeping the rest in order.
    pub fn remove_config_channels(
        &self,
        key: &mut ActivationKey,
        labels: &[String],
    ) -> Result<bool, PolicyError> {
        self.validate_config_channels(labels)?;
        let before = key.config_channels.len();
        key.config_channels.retain(|l| !labels.contains(l));
        Ok(key.config_channels.len() != before)
    }

    /// Turn configuration deployment on or off.
    pub fn set_config_deployment(&self, key: &mut ActivationKey, enabled: bool) -> bool {
        let changed = key.config_deploy != enabled;
        key.config_deploy = enabled;
        changed
    }

    // ─── Registration ────────────────────────────────────────────────

    /// Record a system registering with the key.
    ///
    /// A system already registered with the key is a no-op and does not
    /// consume quota.
    pub fn activate_system(
        &self,
        key: &mut ActivationKey,
        system_id: SystemId,
        name: &str,
        now: Timestamp,
    ) -> Result<bool, PolicyError> {
        if key
            .activated_systems
            .iter()
            .any(|s| s.system_id == system_id)
        {
            return Ok(false);
        }
        if let Some(limit) = key.usage_limit {
            if key.activated_systems.len() as u64 >= limit {
                return Err(PolicyError::UsageLimitExceeded {
                    key: key.token.clone(),
                    limit,
                });
            }
        }
        key.activated_systems.push(ActivatedSystem {
            system_id,
            name: name.to_string(),
            activated: now,
        });
        Ok(true)
    }
}

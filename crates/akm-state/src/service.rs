//! # Activation-Key Service
//!
//! Entry point for every activation-key operation. Each call:
//!
//! 1. checks the caller's role,
//! 2. takes the caller's organization lock in the [`KeyRepository`],
//! 3. resolves the target keys and runs the [`PolicyEngine`] transition on
//!    copies of them,
//! 4. commits every modified copy, or nothing if any key failed.
//!
//! The service is synchronous and never holds a lock beyond one call.

use std::collections::BTreeSet;
use std::sync::Arc;

use akm_catalog::{Catalog, ConfigChannel};
use akm_core::{Caller, KeyToken, Role, ServerGroupId, SystemId, Timestamp};

use crate::details::{KeyDetailsUpdate, NewKey, PackageSpec};
use crate::error::PolicyError;
use crate::key::{ActivatedSystem, ActivationKey, KeyDetails};
use crate::policy::PolicyEngine;
use crate::repository::KeyRepository;

fn parse_token(raw: &str) -> Result<KeyToken, PolicyError> {
    KeyToken::parse(raw).map_err(|_| PolicyError::key_not_found(raw))
}

/// Parse tokens, dropping repeats so a key appears once per batch.
fn parse_tokens(raw: &[String]) -> Result<Vec<KeyToken>, PolicyError> {
    let mut seen = BTreeSet::new();
    let mut tokens = Vec::with_capacity(raw.len());
    for r in raw {
        let token = parse_token(r)?;
        if seen.insert(token.clone()) {
            tokens.push(token);
        }
    }
    Ok(tokens)
}

/// Activation-key operations for all organizations.
#[derive(Debug)]
pub struct ActivationKeyService {
    catalog: Arc<Catalog>,
    repo: KeyRepository,
}

impl ActivationKeyService {
    /// Service over `catalog` with an empty repository.
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self {
            catalog,
            repo: KeyRepository::new(),
        }
    }

    /// The catalog keys are validated against.
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    fn require(caller: &Caller, required: Role, operation: &str) -> Result<(), PolicyError> {
        if caller.has_role(required) {
            return Ok(());
        }
        tracing::warn!(
            org = %caller.org_id,
            role = %caller.role,
            operation,
            "permission denied"
        );
        Err(PolicyError::PermissionDenied {
            required,
            actual: caller.role,
        })
    }

    /// Run `transition` on copies of `tokens` and commit all of them or none.
    ///
    /// Returns whether any key changed.
    fn mutate<F>(
        &self,
        caller: &Caller,
        operation: &'static str,
        tokens: &[String],
        transition: F,
    ) -> Result<bool, PolicyError>
    where
        F: Fn(&PolicyEngine<'_>, &mut ActivationKey) -> Result<bool, PolicyError>,
    {
        Self::require(caller, Role::ActivationKeyAdmin, operation)?;
        let tokens = parse_tokens(tokens)?;
        let engine = PolicyEngine::for_org(&self.catalog, caller.org_id);

        self.repo
            .transaction(caller.org_id, |table| -> Result<bool, PolicyError> {
                let mut modified = Vec::new();
                for token in &tokens {
                    let mut key = table.lookup(token)?.clone();
                    if transition(&engine, &mut key)? {
                        modified.push(key);
                    } else {
                        tracing::debug!(org = %caller.org_id, key = %token, operation, "no change");
                    }
                }
                for key in &modified {
                    tracing::info!(
                        org = %caller.org_id,
                        key = %key.token(),
                        operation,
                        "activation key updated"
                    );
                }
                let changed = !modified.is_empty();
                table.commit(modified);
                Ok(changed)
            })
            .map_err(|err| {
                tracing::debug!(org = %caller.org_id, operation, error = %err, "rejected");
                err
            })
    }

    fn mutate_one<F>(
        &self,
        caller: &Caller,
        operation: &'static str,
        token: &str,
        transition: F,
    ) -> Result<bool, PolicyError>
    where
        F: Fn(&PolicyEngine<'_>, &mut ActivationKey) -> Result<bool, PolicyError>,
    {
        self.mutate(caller, operation, &[token.to_string()], transition)
    }

    fn read<R>(
        &self,
        caller: &Caller,
        operation: &'static str,
        token: &str,
        f: impl FnOnce(&ActivationKey) -> R,
    ) -> Result<R, PolicyError> {
        Self::require(caller, Role::User, operation)?;
        let token = parse_token(token)?;
        self.repo
            .transaction(caller.org_id, |table| table.lookup(&token).map(f))
    }

    // ─── Lifecycle ───────────────────────────────────────────────────

    /// Create a key and return its token.
    pub fn create(&self, caller: &Caller, request: &NewKey) -> Result<KeyToken, PolicyError> {
        Self::require(caller, Role::ActivationKeyAdmin, "create")?;
        let org = caller.org_id;
        let token = if request.key.is_empty() {
            KeyToken::generate(org)
        } else {
            KeyToken::from_explicit(org, &request.key)?
        };
        let key = PolicyEngine::for_org(&self.catalog, org).create(
            token.clone(),
            org,
            request,
            Timestamp::now(),
        )?;
        self.repo.transaction(org, |table| table.insert(key))?;
        tracing::info!(
            org = %org,
            key = %token,
            universal_default = request.universal_default,
            "activation key created"
        );
        Ok(token)
    }

    /// Delete a key and everything it owns.
    pub fn delete(&self, caller: &Caller, token: &str) -> Result<(), PolicyError> {
        Self::require(caller, Role::ActivationKeyAdmin, "delete")?;
        let token = parse_token(token)?;
        let removed = self
            .repo
            .transaction(caller.org_id, |table| table.remove(&token))?;
        tracing::info!(
            org = %caller.org_id,
            key = %token,
            was_default = removed.is_universal_default(),
            "activation key deleted"
        );
        Ok(())
    }

    /// Apply a partial update of scalar attributes.
    pub fn set_details(
        &self,
        caller: &Caller,
        token: &str,
        update: &KeyDetailsUpdate,
    ) -> Result<(), PolicyError> {
        self.mutate_one(caller, "set_details", token, |engine, key| {
            engine.set_details(key, update)
        })?;
        Ok(())
    }

    // ─── Channels ────────────────────────────────────────────────────

    /// Add child channels to every key in `tokens`.
    pub fn add_child_channels(
        &self,
        caller: &Caller,
        tokens: &[String],
        labels: &[String],
    ) -> Result<(), PolicyError> {
        self.mutate(caller, "add_child_channels", tokens, |engine, key| {
            engine.add_child_channels(key, labels)
        })?;
        Ok(())
    }

    /// Remove child channels from every key in `tokens`.
    pub fn remove_child_channels(
        &self,
        caller: &Caller,
        tokens: &[String],
        labels: &[String],
    ) -> Result<(), PolicyError> {
        self.mutate(caller, "remove_child_channels", tokens, |engine, key| {
            engine.remove_child_channels(key, labels)
        })?;
        Ok(())
    }

    // ─── Entitlements ────────────────────────────────────────────────

    /// Grant add-on entitlements.
    pub fn add_entitlements(
        &self,
        caller: &Caller,
        token: &str,
        labels: &[String],
    ) -> Result<(), PolicyError> {
        self.mutate_one(caller, "add_entitlements", token, |engine, key| {
            engine.add_entitlements(key, labels)
        })?;
        Ok(())
    }

    /// Revoke add-on entitlements.
    pub fn remove_entitlements(
        &self,
        caller: &Caller,
        token: &str,
        labels: &[String],
    ) -> Result<(), PolicyError> {
        self.mutate_one(caller, "remove_entitlements", token, |engine, key| {
            engine.remove_entitlements(key, labels)
        })?;
        Ok(())
    }

    // ─── Packages ────────────────────────────────────────────────────

    /// Add presets without architecture. Returns whether the key changed.
    pub fn add_package_names(
        &self,
        caller: &Caller,
        token: &str,
        names: &[String],
    ) -> Result<bool, PolicyError> {
        let specs: Vec<_> = names.iter().map(PackageSpec::name_only).collect();
        self.mutate_one(caller, "add_package_names", token, |engine, key| {
            engine.add_packages(key, &specs)
        })
    }

    /// Remove presets without architecture. Returns whether the key changed.
    pub fn remove_package_names(
        &self,
        caller: &Caller,
        token: &str,
        names: &[String],
    ) -> Result<bool, PolicyError> {
        let specs: Vec<_> = names.iter().map(PackageSpec::name_only).collect();
        self.mutate_one(caller, "remove_package_names", token, |engine, key| {
            engine.remove_packages(key, &specs)
        })
    }

    /// Add presets. Returns whether the key changed.
    pub fn add_packages(
        &self,
        caller: &Caller,
        token: &str,
        specs: &[PackageSpec],
    ) -> Result<bool, PolicyError> {
        self.mutate_one(caller, "add_packages", token, |engine, key| {
            engine.add_packages(key, specs)
        })
    }

    /// Remove presets. Returns whether the key changed.
    pub fn remove_packages(
        &self,
        caller: &Caller,
        token: &str,
        specs: &[PackageSpec],
    ) -> Result<bool, PolicyError> {
        self.mutate_one(caller, "remove_packages", token, |engine, key| {
            engine.remove_packages(key, specs)
        })
    }

    // ─── Server Groups ───────────────────────────────────────────────

    /// Join server groups of the caller's organization.
    pub fn add_server_groups(
        &self,
        caller: &Caller,
        token: &str,
        groups: &[ServerGroupId],
    ) -> Result<(), PolicyError> {
        self.mutate_one(caller, "add_server_groups", token, |engine, key| {
            engine.add_server_groups(key, groups)
        })?;
        Ok(())
    }

    /// Leave server groups.
    pub fn remove_server_groups(
        &self,
        caller: &Caller,
        token: &str,
        groups: &[ServerGroupId],
    ) -> Result<(), PolicyError> {
        self.mutate_one(caller, "remove_server_groups", token, |engine, key| {
            Ok(engine.remove_server_groups(key, groups))
        })?;
        Ok(())
    }

    // ─── Configuration Channels ──────────────────────────────────────

    fn validate_config_labels(&self, caller: &Caller, labels: &[String]) -> Result<(), PolicyError> {
        PolicyEngine::for_org(&self.catalog, caller.org_id).validate_config_channels(labels)
    }

    /// Replace the configuration channel list of every key in `tokens`.
    pub fn set_config_channels(
        &self,
        caller: &Caller,
        tokens: &[String],
        labels: &[String],
    ) -> Result<(), PolicyError> {
        Self::require(caller, Role::ActivationKeyAdmin, "set_config_channels")?;
        self.validate_config_labels(caller, labels)?;
        self.mutate(caller, "set_config_channels", tokens, |engine, key| {
            engine.set_config_channels(key, labels)
        })?;
        Ok(())
    }

    /// Subscribe every key in `tokens` to configuration channels.
    pub fn add_config_channels(
        &self,
        caller: &Caller,
        tokens: &[String],
        labels: &[String],
        add_to_top: bool,
    ) -> Result<(), PolicyError> {
        Self::require(caller, Role::ActivationKeyAdmin, "add_config_channels")?;
        self.validate_config_labels(caller, labels)?;
        self.mutate(caller, "add_config_channels", tokens, |engine, key| {
            engine.add_config_channels(key, labels, add_to_top)
        })?;
        Ok(())
    }

    /// Unsubscribe every key in `tokens` from configuration channels.
    pub fn remove_config_channels(
        &self,
        caller: &Caller,
        tokens: &[String],
        labels: &[String],
    ) -> Result<(), PolicyError> {
        Self::require(caller, Role::ActivationKeyAdmin, "remove_config_channels")?;
        self.validate_config_labels(caller, labels)?;
        self.mutate(caller, "remove_config_channels", tokens, |engine, key| {
            engine.remove_config_channels(key, labels)
        })?;
        Ok(())
    }

    /// Turn configuration deployment on.
    pub fn enable_config_deployment(&self, caller: &Caller, token: &str) -> Result<(), PolicyError> {
        self.mutate_one(caller, "enable_config_deployment", token, |engine, key| {
            Ok(engine.set_config_deployment(key, true))
        })?;
        Ok(())
    }

    /// Turn configuration deployment off.
    pub fn disable_config_deployment(
        &self,
        caller: &Caller,
        token: &str,
    ) -> Result<(), PolicyError> {
        self.mutate_one(caller, "disable_config_deployment", token, |engine, key| {
            Ok(engine.set_config_deployment(key, false))
        })?;
        Ok(())
    }

    /// Whether configuration deployment is on.
    pub fn check_config_deployment(&self, caller: &Caller, token: &str) -> Result<bool, PolicyError> {
        self.read(caller, "check_config_deployment", token, |key| key.config_deploy())
    }

    // ─── Registration ────────────────────────────────────────────────

    /// Register a system with a key, enforcing the usage limit.
    pub fn activate_system(
        &self,
        caller: &Caller,
        token: &str,
        system_id: SystemId,
        name: &str,
    ) -> Result<(), PolicyError> {
        Self::require(caller, Role::User, "activate_system")?;
        let token = parse_token(token)?;
        let engine = PolicyEngine::for_org(&self.catalog, caller.org_id);
        let now = Timestamp::now();
        self.repo
            .transaction(caller.org_id, |table| -> Result<(), PolicyError> {
                let mut key = table.lookup(&token)?.clone();
                if engine.activate_system(&mut key, system_id, name, now)? {
                    tracing::info!(
                        org = %caller.org_id,
                        key = %token,
                        system = %system_id,
                        used = key.activated_systems().len(),
                        "system activated"
                    );
                    table.commit([key]);
                }
                Ok(())
            })
    }

    // ─── Queries ─────────────────────────────────────────────────────

    /// Details of one key.
    pub fn get_details(&self, caller: &Caller, token: &str) -> Result<KeyDetails, PolicyError> {
        self.read(caller, "get_details", token, ActivationKey::details)
    }

    /// Details of every key of the caller's organization, ordered by token.
    pub fn list_activation_keys(&self, caller: &Caller) -> Result<Vec<KeyDetails>, PolicyError> {
        Self::require(caller, Role::User, "list_activation_keys")?;
        Ok(self.repo.transaction(caller.org_id, |table| {
            table.list().map(ActivationKey::details).collect::<Vec<_>>()
        }))
    }

    /// Systems activated with a key, oldest first.
    pub fn list_activated_systems(
        &self,
        caller: &Caller,
        token: &str,
    ) -> Result<Vec<ActivatedSystem>, PolicyError> {
        self.read(caller, "list_activated_systems", token, |key| {
            key.activated_systems().to_vec()
        })
    }

    /// Configuration channels of a key in rank order.
    pub fn list_config_channels(
        &self,
        caller: &Caller,
        token: &str,
    ) -> Result<Vec<ConfigChannel>, PolicyError> {
        let labels = self.read(caller, "list_config_channels", token, |key| {
            key.config_channels().to_vec()
        })?;
        let directory = &self.catalog.org(caller.org_id).config_channels;
        Ok(labels
            .into_iter()
            .map(|label| match directory.get(&label) {
                Some(channel) => channel.clone(),
                None => ConfigChannel {
                    name: label.clone(),
                    label,
                },
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use akm_core::OrgId;

    const ORG: OrgId = OrgId::new(1);

    fn service() -> ActivationKeyService {
        let mut catalog = Catalog::new();
        let org = catalog.org_mut(ORG);
        org.channels.add_base("base").unwrap();
        org.channels.add_child("child", "base").unwrap();
        org.config_channels.register("cfg", "Config").unwrap();
        ActivationKeyService::new(Arc::new(catalog))
    }

    fn admin() -> Caller {
        Caller::new(ORG, Role::ActivationKeyAdmin)
    }

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn regular_user_cannot_create() {
        let svc = service();
        let user = Caller::new(ORG, Role::User);
        let err = svc.create(&user, &NewKey::default()).unwrap_err();
        assert!(matches!(err, PolicyError::PermissionDenied { .. }));
    }

    #[test]
    fn explicit_key_is_prefixed_and_unique() {
        let svc = service();
        let request = NewKey {
            key: "myexplicitkey".into(),
            ..NewKey::default()
        };
        let token = svc.create(&admin(), &request).unwrap();
        assert_eq!(token.as_str(), "1-myexplicitkey");
        assert!(matches!(
            svc.create(&admin(), &request),
            Err(PolicyError::DuplicateKey(_))
        ));
    }

    #[test]
    fn invalid_explicit_key_is_validator_error() {
        let svc = service();
        let request = NewKey {
            key: "not valid!".into(),
            ..NewKey::default()
        };
        assert!(matches!(
            svc.create(&admin(), &request),
            Err(PolicyError::Validator(_))
        ));
    }

    #[test]
    fn batch_is_all_or_nothing() {
        let svc = service();
        let with_base = svc
            .create(
                &admin(),
                &NewKey {
                    base_channel_label: "base".into(),
                    ..NewKey::default()
                },
            )
            .unwrap();
        let without_base = svc.create(&admin(), &NewKey::default()).unwrap();
        let tokens = vec![with_base.to_string(), without_base.to_string()];
        assert!(svc
            .add_child_channels(&admin(), &tokens, &strings(&["child"]))
            .is_err());
        let details = svc.get_details(&admin(), with_base.as_str()).unwrap();
        assert!(details.child_channel_labels.is_empty());
    }

    #[test]
    fn config_labels_checked_before_keys() {
        let svc = service();
        let err = svc
            .set_config_channels(&admin(), &strings(&["1-missing"]), &strings(&["nope"]))
            .unwrap_err();
        assert!(matches!(err, PolicyError::InvalidChannel { .. }));
    }

    #[test]
    fn config_deployment_defaults_off() {
        let svc = service();
        let token = svc.create(&admin(), &NewKey::default()).unwrap();
        assert!(!svc.check_config_deployment(&admin(), token.as_str()).unwrap());
        svc.enable_config_deployment(&admin(), token.as_str()).unwrap();
        assert!(svc.check_config_deployment(&admin(), token.as_str()).unwrap());
    }

    #[test]
    fn list_config_channels_in_rank_order() {
        let svc = service();
        let token = svc.create(&admin(), &NewKey::default()).unwrap();
        svc.set_config_channels(&admin(), &[token.to_string()], &strings(&["cfg"]))
            .unwrap();
        let channels = svc.list_config_channels(&admin(), token.as_str()).unwrap();
        assert_eq!(channels.len(), 1);
        assert_eq!(channels[0].name, "Config");
    }

    #[test]
    fn delete_then_lookup_not_found() {
        let svc = service();
        let token = svc.create(&admin(), &NewKey::default()).unwrap();
        svc.delete(&admin(), token.as_str()).unwrap();
        assert!(matches!(
            svc.get_details(&admin(), token.as_str()),
            Err(PolicyError::NotFound { .. })
        ));
        assert!(svc.delete(&admin(), token.as_str()).is_err());
    }

    #[test]
    fn keys_of_other_orgs_are_invisible() {
        let svc = service();
        let token = svc.create(&admin(), &NewKey::default()).unwrap();
        let stranger = Caller::new(OrgId::new(2), Role::OrgAdmin);
        assert!(matches!(
            svc.get_details(&stranger, token.as_str()),
            Err(PolicyError::NotFound { .. })
        ));
        assert!(svc.list_activation_keys(&stranger).unwrap().is_empty());
    }
}

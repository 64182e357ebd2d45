//! # Activation-Key Repository
//!
//! In-memory, organization-scoped key storage. Each organization's keys
//! live in one [`OrgKeyTable`] behind its own `parking_lot::Mutex`; an
//! operation holds that lock from first lookup to final commit, so every
//! operation is a transaction scoped to the organization and concurrent
//! mutations of the same key serialize.
//!
//! The table enforces that at most one key per organization carries the
//! universal-default flag: storing a default key clears the flag on every
//! other key in the same critical section.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use akm_core::{KeyToken, OrgId};

use crate::error::PolicyError;
use crate::key::ActivationKey;

/// One organization's keys, ordered by token.
#[derive(Debug, Default)]
pub struct OrgKeyTable {
    keys: BTreeMap<KeyToken, ActivationKey>,
}

impl OrgKeyTable {
    /// Look a key up.
    pub fn lookup(&self, token: &KeyToken) -> Result<&ActivationKey, PolicyError> {
        self.keys
            .get(token)
            .ok_or_else(|| PolicyError::key_not_found(token.as_str()))
    }

    /// Whether the token is taken.
    pub fn contains(&self, token: &KeyToken) -> bool {
        self.keys.contains_key(token)
    }

    /// All keys ordered by token.
    pub fn list(&self) -> impl Iterator<Item = &ActivationKey> {
        self.keys.values()
    }

    /// The universal default key, if any.
    pub fn default_key(&self) -> Option<&ActivationKey> {
        self.keys.values().find(|k| k.universal_default)
    }

    /// Store a new key.
    ///
    /// # Errors
    ///
    /// [`PolicyError::DuplicateKey`] if the token is taken.
    pub fn insert(&mut self, key: ActivationKey) -> Result<(), PolicyError> {
        if self.keys.contains_key(&key.token) {
            return Err(PolicyError::DuplicateKey(key.token.clone()));
        }
        self.store(key);
        Ok(())
    }

    /// Replace existing keys with modified copies.
    pub fn commit(&mut self, keys: impl IntoIterator<Item = ActivationKey>) {
        for key in keys {
            self.store(key);
        }
    }

    /// Delete a key.
    ///
    /// # Errors
    ///
    /// [`PolicyError::NotFound`] if the key does not exist.
    pub fn remove(&mut self, token: &KeyToken) -> Result<ActivationKey, PolicyError> {
        self.keys
            .remove(token)
            .ok_or_else(|| PolicyError::key_not_found(token.as_str()))
    }

    /// Number of keys.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Whether the organization has no keys.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    fn store(&mut self, key: ActivationKey) {
        if key.universal_default {
            for other in self.keys.values_mut() {
                if other.universal_default && other.token != key.token {
                    tracing::info!(
                        org = %key.org_id,
                        previous = %other.token,
                        key = %key.token,
                        "universal default replaced"
                    );
                    other.universal_default = false;
                }
            }
        }
        self.keys.insert(key.token.clone(), key);
    }
}

/// Keys of every organization.
#[derive(Debug, Default)]
pub struct KeyRepository {
    orgs: RwLock<HashMap<OrgId, Arc<Mutex<OrgKeyTable>>>>,
}

impl KeyRepository {
    /// Empty repository.
    pub fn new() -> Self {
        Self::default()
    }

    fn table(&self, org: OrgId) -> Arc<Mutex<OrgKeyTable>> {
        if let Some(table) = self.orgs.read().get(&org) {
            return Arc::clone(table);
        }
        Arc::clone(self.orgs.write().entry(org).or_default())
    }

    /// Run `f` with exclusive access to `org`'s table.
    ///
    /// Nothing `f` does is visible to other operations on the organization
    /// until it returns.
    pub fn transaction<R>(&self, org: OrgId, f: impl FnOnce(&mut OrgKeyTable) -> R) -> R {
        let table = self.table(org);
        let mut guard = table.lock();
        f(&mut guard)
    }
}

//! Managed server groups of an organization.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use akm_core::ServerGroupId;

use crate::CatalogError;

/// A managed server group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerGroup {
    /// Group id.
    pub id: ServerGroupId,
    /// Group name.
    pub name: String,
}

/// Server groups by id.
#[derive(Debug, Clone, Default)]
pub struct ServerGroupDirectory {
    groups: BTreeMap<ServerGroupId, ServerGroup>,
}

impl ServerGroupDirectory {
    /// Empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a group.
    pub fn register(&mut self, id: ServerGroupId, name: impl Into<String>) -> Result<(), CatalogError> {
        if self.groups.contains_key(&id) {
            return Err(CatalogError::Duplicate {
                kind: "server group",
                id: id.to_string(),
            });
        }
        self.groups.insert(
            id,
            ServerGroup {
                id,
                name: name.into(),
            },
        );
        Ok(())
    }

    /// Look a group up.
    pub fn get(&self, id: ServerGroupId) -> Option<&ServerGroup> {
        self.groups.get(&id)
    }

    /// Whether the group exists.
    pub fn contains(&self, id: ServerGroupId) -> bool {
        self.groups.contains_key(&id)
    }

    /// Groups ordered by id.
    pub fn iter(&self) -> impl Iterator<Item = &ServerGroup> {
        self.groups.values()
    }
}

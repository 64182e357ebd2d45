//! Global configuration channels visible to an organization.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::CatalogError;

/// A global configuration channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigChannel {
    /// Unique label within the organization.
    pub label: String,
    /// Display name.
    pub name: String,
}

/// Configuration channels by label.
#[derive(Debug, Clone, Default)]
pub struct ConfigChannelDirectory {
    by_label: BTreeMap<String, ConfigChannel>,
}

impl ConfigChannelDirectory {
    /// Empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a channel.
    pub fn register(
        &mut self,
        label: impl Into<String>,
        name: impl Into<String>,
    ) -> Result<(), CatalogError> {
        let label = label.into();
        if label.is_empty() {
            return Err(CatalogError::EmptyLabel("config channel"));
        }
        if self.by_label.contains_key(&label) {
            return Err(CatalogError::Duplicate {
                kind: "config channel",
                id: label,
            });
        }
        let channel = ConfigChannel {
            label: label.clone(),
            name: name.into(),
        };
        self.by_label.insert(label, channel);
        Ok(())
    }

    /// Look a channel up.
    pub fn get(&self, label: &str) -> Option<&ConfigChannel> {
        self.by_label.get(label)
    }

    /// Whether `label` exists.
    pub fn contains(&self, label: &str) -> bool {
        self.by_label.contains_key(label)
    }

    /// Channels ordered by label.
    pub fn iter(&self) -> impl Iterator<Item = &ConfigChannel> {
        self.by_label.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_and_lookup() {
        let mut dir = ConfigChannelDirectory::new();
        dir.register("web-conf", "Web server config").unwrap();
        assert!(dir.contains("web-conf"));
        assert_eq!(dir.get("web-conf").unwrap().name, "Web server config");
        assert!(dir.get("db-conf").is_none());
    }

    #[test]
    fn duplicates_and_empty_labels_rejected() {
        let mut dir = ConfigChannelDirectory::new();
        dir.register("a", "A").unwrap();
        assert!(dir.register("a", "again").is_err());
        assert!(dir.register("", "blank").is_err());
        assert_eq!(dir.iter().count(), 1);
    }
}

//! # Package Presets
//!
//! A package preset is a package name with an optional architecture
//! constraint, installed on systems registered with a key. Package names
//! live in a global name catalog: adding a preset for a name the catalog
//! has never seen registers it, while removal only looks names up.
//!
//! An empty architecture string is the same as no constraint.

use std::collections::BTreeMap;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use akm_core::{PackageNameId, ValidationError};

/// Architecture labels accepted as package constraints.
pub const KNOWN_ARCHES: &[&str] = &[
    "i386", "i486", "i586", "i686", "athlon", "x86_64", "ia64", "aarch64", "armv7hl", "ppc",
    "ppc64", "ppc64le", "s390", "s390x", "noarch", "amd64-deb", "all-deb",
];

/// Whether `arch` is a known architecture label.
pub fn is_known_arch(arch: &str) -> bool {
    KNOWN_ARCHES.contains(&arch)
}

/// Treat an empty or whitespace-only arch as absent.
pub fn normalize_arch(arch: Option<&str>) -> Option<&str> {
    arch.map(str::trim).filter(|a| !a.is_empty())
}

/// Errors resolving a package preset.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PackageError {
    /// Malformed input such as an empty name.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The architecture is not in the arch catalog.
    #[error("unknown package architecture \"{0}\"")]
    UnknownArch(String),
}

/// A (name, arch) pair held by an activation key.
///
/// Ordered by name, then arch. Equality is by the exact pair.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PackagePreset {
    /// Package name.
    pub name: String,
    /// Architecture constraint, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arch: Option<String>,
    /// Catalog id of the name.
    pub name_id: PackageNameId,
}

impl std::fmt::Display for PackagePreset {
    /// `name` or `name.arch`.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.arch {
            Some(arch) => write!(f, "{}.{}", self.name, arch),
            None => f.write_str(&self.name),
        }
    }
}

#[derive(Debug, Default)]
struct NameTable {
    by_name: BTreeMap<String, PackageNameId>,
    next_id: u64,
}

/// The global package-name catalog.
///
/// Safe to share between threads; registration takes a short write lock.
#[derive(Debug, Default)]
pub struct PackagePresetStore {
    names: RwLock<NameTable>,
}

impl PackagePresetStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Check a preset without registering anything.
    ///
    /// # Errors
    ///
    /// Empty name or unknown architecture.
    pub fn check(name: &str, arch: Option<&str>) -> Result<(), PackageError> {
        let arch = normalize_arch(arch);
        if name.trim().is_empty() {
            return Err(ValidationError::EmptyPackageName.into());
        }
        match arch {
            Some(a) if !is_known_arch(a) => Err(PackageError::UnknownArch(a.to_string())),
            _ => Ok(()),
        }
    }

    /// Resolve a preset, registering `name` if it is new.
    ///
    /// # Errors
    ///
    /// Empty name or unknown architecture.
    pub fn resolve(&self, name: &str, arch: Option<&str>) -> Result<PackagePreset, PackageError> {
        let arch = normalize_arch(arch);
        Self::check(name, arch)?;
        let name = name.trim();

        if let Some(id) = self.names.read().by_name.get(name).copied() {
            return Ok(preset(name, arch, id));
        }

        let mut table = self.names.write();
        let id = match table.by_name.get(name) {
            Some(id) => *id,
            None => {
                table.next_id += 1;
                let id = PackageNameId::new(table.next_id);
                table.by_name.insert(name.to_string(), id);
                tracing::debug!(package = name, id = %id, "registered package name");
                id
            }
        };
        Ok(preset(name, arch, id))
    }

    /// Resolve a preset without registering anything.
    ///
    /// Returns `Ok(None)` for an unregistered name or unknown architecture.
    ///
    /// # Errors
    ///
    /// Empty name.
    pub fn lookup(
        &self,
        name: &str,
        arch: Option<&str>,
    ) -> Result<Option<PackagePreset>, PackageError> {
        let arch = normalize_arch(arch);
        match Self::check(name, arch) {
            Ok(()) => {}
            Err(PackageError::UnknownArch(_)) => return Ok(None),
            Err(e) => return Err(e),
        }
        let name = name.trim();
        Ok(self
            .names
            .read()
            .by_name
            .get(name)
            .map(|id| preset(name, arch, *id)))
    }

    /// Number of registered names.
    pub fn len(&self) -> usize {
        self.names.read().by_name.len()
    }

    /// Whether no name is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn preset(name: &str, arch: Option<&str>, name_id: PackageNameId) -> PackagePreset {
    PackagePreset {
        name: name.to_string(),
        arch: arch.map(str::to_string),
        name_id,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn resolve_registers_unknown_names() {
        let store = PackagePresetStore::new();
        let a = store.resolve("pkg1", Some("i386")).unwrap();
        let b = store.resolve("pkg1", None).unwrap();
        assert_eq!(a.name_id, b.name_id);
        assert_ne!(a, b);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn empty_arch_means_no_constraint() {
        let store = PackagePresetStore::new();
        let a = store.resolve("pkg2", Some("")).unwrap();
        let b = store.resolve("pkg2", None).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.arch, None);
        assert_eq!(a.to_string(), "pkg2");
    }

    #[test]
    fn display_includes_arch() {
        let store = PackagePresetStore::new();
        let p = store.resolve("kernel", Some("x86_64")).unwrap();
        assert_eq!(p.to_string(), "kernel.x86_64");
    }

    #[test]
    fn lookup_never_registers() {
        let store = PackagePresetStore::new();
        assert_eq!(store.lookup("ghost", None).unwrap(), None);
        assert!(store.is_empty());
        store.resolve("real", None).unwrap();
        assert!(store.lookup("real", Some("noarch")).unwrap().is_some());
    }

    #[test]
    fn unknown_arch_rejected_on_resolve_ignored_on_lookup() {
        let store = PackagePresetStore::new();
        assert_eq!(
            store.resolve("pkg", Some("vax")),
            Err(PackageError::UnknownArch("vax".into()))
        );
        assert!(store.is_empty());
        store.resolve("pkg", None).unwrap();
        assert_eq!(store.lookup("pkg", Some("vax")).unwrap(), None);
    }

    #[test]
    fn check_leaves_store_untouched() {
        let store = PackagePresetStore::new();
        assert!(PackagePresetStore::check("fresh", Some("x86_64")).is_ok());
        assert!(PackagePresetStore::check("fresh", Some("")).is_ok());
        assert_eq!(
            PackagePresetStore::check("fresh", Some("vax")),
            Err(PackageError::UnknownArch("vax".into()))
        );
        assert!(store.is_empty());
    }

    #[test]
    fn empty_name_rejected() {
        let store = PackagePresetStore::new();
        assert_eq!(
            store.resolve("  ", None),
            Err(PackageError::Validation(ValidationError::EmptyPackageName))
        );
        assert!(store.lookup("", None).is_err());
    }

    proptest! {
        #[test]
        fn resolve_is_stable(name in "[a-z][a-z0-9-]{0,20}", arch_idx in 0usize..KNOWN_ARCHES.len()) {
            let store = PackagePresetStore::new();
            let first = store.resolve(&name, Some(KNOWN_ARCHES[arch_idx])).unwrap();
            let second = store.resolve(&name, Some(KNOWN_ARCHES[arch_idx])).unwrap();
            prop_assert_eq!(first, second);
            prop_assert_eq!(store.len(), 1);
        }
    }
}

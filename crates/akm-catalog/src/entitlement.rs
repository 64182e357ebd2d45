//! # Entitlement Catalog
//!
//! The closed set of entitlements a key can grant, each classified as a
//! BASE (system membership) or ADD-ON (extra capability) entitlement.
//!
//! ```text
//! BASE     enterprise_entitled   sw_mgr_entitled
//!              ▲
//!              │ implied by every add-on
//!              │
//! ADD-ON   provisioning_entitled  virtualization_host
//!          virtualization_host_platform  monitoring_entitled
//! ```
//!
//! Only ADD-ON entitlements can be added to or removed from an existing
//! key. Requesting `virtualization_host` never grants
//! `virtualization_host_platform`.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ─── Entitlement ─────────────────────────────────────────────────────

/// A known entitlement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Entitlement {
    /// Management base entitlement. Held by every activation key.
    #[serde(rename = "enterprise_entitled")]
    Enterprise,
    /// Update-only base entitlement.
    #[serde(rename = "sw_mgr_entitled")]
    SoftwareManager,
    /// Kickstart / package preset provisioning.
    #[serde(rename = "provisioning_entitled")]
    Provisioning,
    /// Virtualization host.
    #[serde(rename = "virtualization_host")]
    VirtualizationHost,
    /// Virtualization host platform.
    #[serde(rename = "virtualization_host_platform")]
    VirtualizationHostPlatform,
    /// Monitoring.
    #[serde(rename = "monitoring_entitled")]
    Monitoring,
}

impl Entitlement {
    /// Every entitlement, base entitlements first.
    pub const ALL: [Entitlement; 6] = [
        Self::Enterprise,
        Self::SoftwareManager,
        Self::Provisioning,
        Self::VirtualizationHost,
        Self::VirtualizationHostPlatform,
        Self::Monitoring,
    ];

    /// The entitlement label used on the wire.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Enterprise => "enterprise_entitled",
            Self::SoftwareManager => "sw_mgr_entitled",
            Self::Provisioning => "provisioning_entitled",
            Self::VirtualizationHost => "virtualization_host",
            Self::VirtualizationHostPlatform => "virtualization_host_platform",
            Self::Monitoring => "monitoring_entitled",
        }
    }

    /// Look an entitlement up by label.
    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|e| e.label() == label)
    }

    /// BASE or ADD-ON.
    pub fn kind(&self) -> EntitlementKind {
        match self {
            Self::Enterprise | Self::SoftwareManager => EntitlementKind::Base,
            _ => EntitlementKind::AddOn,
        }
    }
}

impl std::fmt::Display for Entitlement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Classification of an entitlement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntitlementKind {
    /// Grants system membership.
    Base,
    /// Grants an extra capability; requires a base entitlement.
    AddOn,
}

// ─── Errors ──────────────────────────────────────────────────────────

/// Errors resolving entitlement labels.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EntitlementError {
    /// The label is not a known entitlement.
    #[error("unknown entitlement \"{0}\"")]
    UnknownEntitlement(String),

    /// The label names a base entitlement where an add-on is required.
    #[error("entitlement \"{0}\" is not an add-on entitlement")]
    InvalidEntitlementKind(String),
}

// ─── Catalog ─────────────────────────────────────────────────────────

/// Classification and implication rules over [`Entitlement`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntitlementCatalog {
    known: BTreeSet<Entitlement>,
}

impl EntitlementCatalog {
    /// The catalog with every entitlement available.
    pub fn standard() -> Self {
        Self {
            known: Entitlement::ALL.into_iter().collect(),
        }
    }

    fn lookup(&self, label: &str) -> Option<Entitlement> {
        Entitlement::from_label(label).filter(|e| self.known.contains(e))
    }

    /// Whether `label` names a BASE entitlement.
    pub fn is_base_entitlement(&self, label: &str) -> bool {
        self.lookup(label)
            .is_some_and(|e| e.kind() == EntitlementKind::Base)
    }

    /// Whether `label` names an ADD-ON entitlement.
    pub fn is_add_on_entitlement(&self, label: &str) -> bool {
        self.lookup(label)
            .is_some_and(|e| e.kind() == EntitlementKind::AddOn)
    }

    /// Base entitlements implied by a set of requested add-ons.
    ///
    /// Any add-on implies [`Entitlement::Enterprise`] and nothing else. A
    /// request without add-ons implies no base; keys carry the management
    /// base from construction regardless.
    pub fn implied_base_entitlements<'a>(
        &self,
        requested: impl IntoIterator<Item = &'a Entitlement>,
    ) -> BTreeSet<Entitlement> {
        let mut implied = BTreeSet::new();
        if requested
            .into_iter()
            .any(|e| e.kind() == EntitlementKind::AddOn)
        {
            implied.insert(Entitlement::Enterprise);
        }
        implied
    }

    /// Resolve a label that must name an ADD-ON entitlement.
    ///
    /// # Errors
    ///
    /// [`EntitlementError::UnknownEntitlement`] for a label outside the
    /// catalog, [`EntitlementError::InvalidEntitlementKind`] for a base.
    pub fn resolve_add_on(&self, label: &str) -> Result<Entitlement, EntitlementError> {
        let entitlement = self
            .lookup(label)
            .ok_or_else(|| EntitlementError::UnknownEntitlement(label.to_string()))?;
        if entitlement.kind() != EntitlementKind::AddOn {
            return Err(EntitlementError::InvalidEntitlementKind(label.to_string()));
        }
        Ok(entitlement)
    }
}

impl Default for EntitlementCatalog {
    fn default() -> Self {
        Self::standard()
    }
}

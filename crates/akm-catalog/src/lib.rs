#![deny(missing_docs)]

//! # akm-catalog: What the Policy Engine Validates Against
//!
//! Read-side data the activation-key engine consults but never owns:
//!
//! - [`EntitlementCatalog`]: base vs add-on classification and implication.
//! - [`ChannelHierarchy`] / [`ChannelRegistry`]: base and child channels.
//! - [`PackagePresetStore`]: global package-name catalog plus the
//!   architecture list.
//! - [`ConfigChannelDirectory`] and [`ServerGroupDirectory`]: per-org
//!   configuration channels and server groups.
//!
//! [`Catalog`] bundles these, keeping channels, configuration channels and
//! server groups per organization. An organization never sees another
//! organization's entries; an unknown organization sees an empty catalog.

pub mod channel;
pub mod config_channel;
pub mod entitlement;
pub mod package;
pub mod server_group;

use std::collections::HashMap;

use thiserror::Error;

use akm_core::OrgId;

pub use channel::{Channel, ChannelHierarchy, ChannelLookupError, ChannelRegistry};
pub use config_channel::{ConfigChannel, ConfigChannelDirectory};
pub use entitlement::{Entitlement, EntitlementCatalog, EntitlementError, EntitlementKind};
pub use package::{PackageError, PackagePreset, PackagePresetStore, KNOWN_ARCHES};
pub use server_group::{ServerGroup, ServerGroupDirectory};

/// Errors building a catalog.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CatalogError {
    /// An entry with this identifier already exists.
    #[error("duplicate {kind} \"{id}\"")]
    Duplicate {
        /// Entry kind.
        kind: &'static str,
        /// Duplicate identifier.
        id: String,
    },

    /// A child channel named a parent that is missing or not a base.
    #[error("channel \"{channel}\" has invalid parent \"{parent}\"")]
    InvalidParent {
        /// The child being registered.
        channel: String,
        /// The named parent.
        parent: String,
    },

    /// An entry label was empty.
    #[error("{0} label must not be empty")]
    EmptyLabel(&'static str),
}

/// Catalog entries owned by one organization.
#[derive(Debug, Clone, Default)]
pub struct OrgCatalog {
    /// Software channels.
    pub channels: ChannelRegistry,
    /// Global configuration channels.
    pub config_channels: ConfigChannelDirectory,
    /// Managed server groups.
    pub server_groups: ServerGroupDirectory,
}

/// Everything the engine validates against.
#[derive(Debug, Default)]
pub struct Catalog {
    /// Entitlement rules.
    pub entitlements: EntitlementCatalog,
    /// Global package-name catalog.
    pub packages: PackagePresetStore,
    orgs: HashMap<OrgId, OrgCatalog>,
    empty: OrgCatalog,
}

impl Catalog {
    /// Empty catalog with the standard entitlements.
    pub fn new() -> Self {
        Self::default()
    }

    /// The entries of `org`. Empty when the org has none.
    pub fn org(&self, org: OrgId) -> &OrgCatalog {
        self.orgs.get(&org).unwrap_or(&self.empty)
    }

    /// Mutable entries of `org`, created on first use.
    pub fn org_mut(&mut self, org: OrgId) -> &mut OrgCatalog {
        self.orgs.entry(org).or_default()
    }

    /// Organizations with catalog entries.
    pub fn org_ids(&self) -> impl Iterator<Item = OrgId> + '_ {
        self.orgs.keys().copied()
    }
}

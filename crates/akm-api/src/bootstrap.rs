//! # Catalog Bootstrap
//!
//! Loads the catalog the engine validates against from a YAML file named by
//! `AKM_CATALOG`. Without it the server starts with an empty catalog: keys
//! can be created, but no channel, configuration channel or server group
//! resolves.
//!
//! ```yaml
//! organizations:
//!   - id: 1
//!     channels:
//!       - label: rhel-9-base
//!         children: [rhel-9-appstream, rhel-9-tools]
//!     config_channels:
//!       - { label: web-conf, name: Web servers }
//!     server_groups:
//!       - { id: 10, name: web }
//!     systems:
//!       - id: 1000010000
//!         exporters:
//!           - name: node_exporter
//!             address: ":9100"
//!             path: /metrics
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;

use akm_catalog::{Catalog, CatalogError};
use akm_core::{OrgId, ServerGroupId, SystemId};
use akm_monitoring::{EndpointDirectory, EndpointInfo, ExporterConfig};

use crate::state::{AppConfig, AppState};

/// Environment variable naming the catalog file.
pub const CATALOG_ENV: &str = "AKM_CATALOG";

/// Errors loading the catalog.
#[derive(Debug, thiserror::Error)]
pub enum BootstrapError {
    /// The catalog file does not exist.
    #[error("catalog file not found: {path}")]
    CatalogNotFound {
        /// Path as configured.
        path: String,
    },

    /// The file is not a valid catalog document.
    #[error("invalid catalog file {path}: {source}")]
    Parse {
        /// Path as configured.
        path: String,
        /// Parser error.
        #[source]
        source: serde_yaml::Error,
    },

    /// The document parsed but its entries conflict.
    #[error("invalid catalog entry in organization {org}: {source}")]
    InvalidEntry {
        /// Organization the entry belongs to.
        org: OrgId,
        /// What was wrong.
        #[source]
        source: CatalogError,
    },

    /// IO error reading the file.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

// ─── Manifest ────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct CatalogManifest {
    #[serde(default)]
    organizations: Vec<OrgManifest>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct OrgManifest {
    id: OrgId,
    #[serde(default)]
    channels: Vec<BaseChannelManifest>,
    #[serde(default)]
    config_channels: Vec<ConfigChannelManifest>,
    #[serde(default)]
    server_groups: Vec<ServerGroupManifest>,
    #[serde(default)]
    systems: Vec<SystemManifest>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct BaseChannelManifest {
    label: String,
    #[serde(default)]
    children: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigChannelManifest {
    label: String,
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ServerGroupManifest {
    id: ServerGroupId,
    name: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SystemManifest {
    id: SystemId,
    #[serde(default)]
    exporters: Vec<ExporterManifest>,
}

#[derive(Debug, Deserialize)]
struct ExporterManifest {
    #[serde(flatten)]
    exporter: ExporterConfig,
    #[serde(default)]
    path: Option<String>,
    #[serde(default)]
    module: Option<String>,
}

// ─── Loading ─────────────────────────────────────────────────────────

/// Parse a catalog document.
pub fn parse_catalog(
    source: &str,
    path: &str,
) -> Result<(Catalog, EndpointDirectory), BootstrapError> {
    let manifest: CatalogManifest =
        serde_yaml::from_str(source).map_err(|source| BootstrapError::Parse {
            path: path.to_string(),
            source,
        })?;

    let mut catalog = Catalog::new();
    let mut endpoints = EndpointDirectory::new();

    for org in manifest.organizations {
        let invalid = |source| BootstrapError::InvalidEntry {
            org: org.id,
            source,
        };
        let entries = catalog.org_mut(org.id);
        for base in &org.channels {
            entries.channels.add_base(&base.label).map_err(invalid)?;
            for child in &base.children {
                entries
                    .channels
                    .add_child(child, &base.label)
                    .map_err(invalid)?;
            }
        }
        for cc in org.config_channels {
            let name = cc.name.unwrap_or_else(|| cc.label.clone());
            entries
                .config_channels
                .register(cc.label, name)
                .map_err(invalid)?;
        }
        for group in org.server_groups {
            entries
                .server_groups
                .register(group.id, group.name)
                .map_err(invalid)?;
        }
        for system in org.systems {
            for e in system.exporters {
                let mut info = EndpointInfo::from_exporter(system.id, &e.exporter);
                info.path = e.path;
                info.module = e.module;
                endpoints.register(org.id, info);
            }
        }
        tracing::info!(
            org = %org.id,
            channels = org.channels.len(),
            "catalog organization loaded"
        );
    }

    Ok((catalog, endpoints))
}

/// Read and parse a catalog file.
pub fn load_catalog(path: &Path) -> Result<(Catalog, EndpointDirectory), BootstrapError> {
    let display = path.display().to_string();
    if !path.exists() {
        return Err(BootstrapError::CatalogNotFound { path: display });
    }
    let source = std::fs::read_to_string(path)?;
    parse_catalog(&source, &display)
}

/// Build the application state, loading the catalog from `path` if given.
pub fn bootstrap_from(
    config: AppConfig,
    path: Option<PathBuf>,
) -> Result<AppState, BootstrapError> {
    match path {
        Some(path) => {
            let (catalog, endpoints) = load_catalog(&path)?;
            tracing::info!(path = %path.display(), "catalog loaded");
            Ok(AppState::from_parts(config, catalog, endpoints))
        }
        None => {
            tracing::warn!("{CATALOG_ENV} not set, starting with an empty catalog");
            Ok(AppState::with_config(config))
        }
    }
}

/// Build the application state from the environment.
pub fn bootstrap(config: AppConfig) -> Result<AppState, BootstrapError> {
    bootstrap_from(config, std::env::var_os(CATALOG_ENV).map(PathBuf::from))
}

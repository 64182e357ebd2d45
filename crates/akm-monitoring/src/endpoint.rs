//! # Monitoring Endpoints
//!
//! Flat descriptors of metrics endpoints on managed systems, and a
//! per-organization directory answering "which endpoints do these systems
//! expose".

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use akm_core::{OrgId, SystemId};

use crate::exporter::ExporterConfig;

/// One metrics endpoint. Absent fields are omitted when serialized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointInfo {
    /// The system exposing the endpoint.
    pub system_id: SystemId,
    /// Endpoint name.
    pub endpoint_name: String,
    /// Exporter serving it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exporter_name: Option<String>,
    /// Exporter module (e.g. a blackbox probe module).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module: Option<String>,
    /// HTTP path of the metrics document.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// TCP port.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
}

impl EndpointInfo {
    /// Endpoint with only the required fields set.
    pub fn new(system_id: SystemId, endpoint_name: impl Into<String>) -> Self {
        Self {
            system_id,
            endpoint_name: endpoint_name.into(),
            exporter_name: None,
            module: None,
            path: None,
            port: None,
        }
    }

    /// Endpoint served by `exporter`, named after it, with its port.
    pub fn from_exporter(system_id: SystemId, exporter: &ExporterConfig) -> Self {
        Self {
            exporter_name: Some(exporter.name.clone()),
            port: exporter.port(),
            ..Self::new(system_id, exporter.name.clone())
        }
    }

    /// Set the metrics path.
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Set the exporter module.
    pub fn with_module(mut self, module: impl Into<String>) -> Self {
        self.module = Some(module.into());
        self
    }
}

/// Endpoints by organization and system.
#[derive(Debug, Clone, Default)]
pub struct EndpointDirectory {
    endpoints: BTreeMap<(OrgId, SystemId), Vec<EndpointInfo>>,
}

impl EndpointDirectory {
    /// Empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an endpoint of a system in `org`.
    pub fn register(&mut self, org: OrgId, endpoint: EndpointInfo) {
        if endpoint.port.is_none() {
            tracing::warn!(
                org = %org,
                system = %endpoint.system_id,
                endpoint = %endpoint.endpoint_name,
                "monitoring endpoint has no port"
            );
        }
        self.endpoints
            .entry((org, endpoint.system_id))
            .or_default()
            .push(endpoint);
    }

    /// Endpoints of `systems` in `org`, in request then registration order.
    ///
    /// Systems of other organizations and unknown systems contribute
    /// nothing.
    pub fn list_endpoints(&self, org: OrgId, systems: &[SystemId]) -> Vec<EndpointInfo> {
        systems
            .iter()
            .filter_map(|system| self.endpoints.get(&(org, *system)))
            .flatten()
            .cloned()
            .collect()
    }
}

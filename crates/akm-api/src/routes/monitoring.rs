//! # Monitoring Endpoint Methods
//!
//! - `POST /rpc/system.monitoring.listEndpoints`: Exporter endpoints of the
//!   given systems, restricted to the caller's organization.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use akm_core::SystemId;
use akm_monitoring::EndpointInfo;

use crate::auth::CallerIdentity;
use crate::error::AppError;
use crate::extractors::{extract_validated_json, require_non_empty, Validate};
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request / Response types
// ---------------------------------------------------------------------------

/// Parameters of `system.monitoring.listEndpoints`.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct ListEndpointsRequest {
    /// Systems to report on.
    pub system_ids: Vec<u64>,
}

impl Validate for ListEndpointsRequest {
    fn validate(&self) -> Result<(), String> {
        require_non_empty(&self.system_ids, "system_ids must not be empty")
    }
}

/// A monitoring endpoint. Absent values are omitted.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct EndpointResponse {
    /// System the exporter runs on.
    pub system_id: u64,
    /// Endpoint name.
    pub endpoint_name: String,
    /// Exporter name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exporter_name: Option<String>,
    /// Exporter module.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub module: Option<String>,
    /// Metrics path.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Listening port.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
}

impl From<EndpointInfo> for EndpointResponse {
    fn from(e: EndpointInfo) -> Self {
        Self {
            system_id: e.system_id.get(),
            endpoint_name: e.endpoint_name,
            exporter_name: e.exporter_name,
            module: e.module,
            path: e.path,
            port: e.port,
        }
    }
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Build the monitoring router.
pub fn router() -> Router<AppState> {
    Router::new().route("/rpc/system.monitoring.listEndpoints", post(list_endpoints))
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// Exporter endpoints of the given systems.
#[utoipa::path(
    post,
    path = "/rpc/system.monitoring.listEndpoints",
    request_body = ListEndpointsRequest,
    responses(
        (status = 200, description = "Endpoints", body = Vec<EndpointResponse>),
        (status = 422, description = "No systems given", body = crate::error::ErrorBody),
    ),
    tag = "monitoring"
)]
pub(crate) async fn list_endpoints(
    State(state): State<AppState>,
    identity: CallerIdentity,
    body: Result<Json<ListEndpointsRequest>, JsonRejection>,
) -> Result<Json<Vec<EndpointResponse>>, AppError> {
    let req = extract_validated_json(body)?;
    let systems: Vec<SystemId> = req.system_ids.into_iter().map(SystemId::new).collect();
    let endpoints = state
        .endpoints
        .list_endpoints(identity.caller().org_id, &systems);
    tracing::debug!(
        org = %identity.caller().org_id,
        systems = systems.len(),
        found = endpoints.len(),
        "monitoring endpoints listed"
    );
    Ok(Json(endpoints.into_iter().map(Into::into).collect()))
}

//! # OpenAPI Document
//!
//! Assembles the utoipa-annotated methods into one document served at
//! `/openapi.json`.

use axum::routing::get;
use axum::{Json, Router};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::state::AppState;

/// Adds the bearer credential scheme.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("{role}:{org_id}:{secret}")
                        .description(Some(
                            "Role, organization and shared secret. The secret is set via AUTH_TOKEN.",
                        ))
                        .build(),
                ),
            );
        }
    }
}

/// The assembled document.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Activation Key API",
        description = "Activation-key policy engine: key lifecycle, channel, entitlement, package, server group and configuration channel associations, system activation quota, and monitoring endpoints.\n\nEvery method is `POST` with a JSON body of named parameters. Authentication: `Authorization: Bearer {role}:{org_id}:{secret}`. Health probes (`/health/*`) are unauthenticated.",
        license(name = "GPL-2.0-only")
    ),
    security(
        ("bearer_auth" = [])
    ),
    paths(
        // ── Lifecycle and details ───────────────────────────────────────
        crate::routes::activation_keys::create,
        crate::routes::activation_keys::delete,
        crate::routes::activation_keys::get_details,
        crate::routes::activation_keys::set_details,
        crate::routes::activation_keys::list_activation_keys,
        crate::routes::activation_keys::list_activated_systems,
        crate::routes::activation_keys::activate_system,
        // ── Channels and entitlements ───────────────────────────────────
        crate::routes::activation_keys::add_child_channels,
        crate::routes::activation_keys::remove_child_channels,
        crate::routes::activation_keys::add_entitlements,
        crate::routes::activation_keys::remove_entitlements,
        // ── Packages and server groups ──────────────────────────────────
        crate::routes::activation_keys::add_package_names,
        crate::routes::activation_keys::remove_package_names,
        crate::routes::activation_keys::add_packages,
        crate::routes::activation_keys::remove_packages,
        crate::routes::activation_keys::add_server_groups,
        crate::routes::activation_keys::remove_server_groups,
        // ── Configuration channels ──────────────────────────────────────
        crate::routes::activation_keys::list_config_channels,
        crate::routes::activation_keys::set_config_channels,
        crate::routes::activation_keys::add_config_channels,
        crate::routes::activation_keys::remove_config_channels,
        crate::routes::activation_keys::enable_config_deployment,
        crate::routes::activation_keys::disable_config_deployment,
        crate::routes::activation_keys::check_config_deployment,
        // ── Monitoring ──────────────────────────────────────────────────
        crate::routes::monitoring::list_endpoints,
    ),
    components(
        schemas(
            crate::error::ErrorBody,
            crate::error::ErrorDetail,
            crate::routes::activation_keys::CreateKeyRequest,
            crate::routes::activation_keys::KeyRequest,
            crate::routes::activation_keys::DetailsUpdate,
            crate::routes::activation_keys::SetDetailsRequest,
            crate::routes::activation_keys::ChildChannelsRequest,
            crate::routes::activation_keys::EntitlementsRequest,
            crate::routes::activation_keys::PackageNamesRequest,
            crate::routes::activation_keys::PackageInput,
            crate::routes::activation_keys::PackagesRequest,
            crate::routes::activation_keys::ServerGroupsRequest,
            crate::routes::activation_keys::ConfigChannelsRequest,
            crate::routes::activation_keys::ActivateSystemRequest,
            crate::routes::activation_keys::KeyDetailsResponse,
            crate::routes::activation_keys::ActivatedSystemResponse,
            crate::routes::activation_keys::ConfigChannelResponse,
            crate::routes::monitoring::ListEndpointsRequest,
            crate::routes::monitoring::EndpointResponse,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "activationkey", description = "Activation key management"),
        (name = "monitoring", description = "Exporter endpoints of managed systems"),
    )
)]
pub struct ApiDoc;

/// Router serving `/openapi.json`.
pub fn router() -> Router<AppState> {
    Router::new().route("/openapi.json", get(openapi_json))
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_every_method() {
        let doc = ApiDoc::openapi();
        assert_eq!(doc.paths.paths.len(), 25);
        assert!(doc.paths.paths.contains_key("/rpc/activationkey.create"));
        assert!(doc
            .paths
            .paths
            .contains_key("/rpc/system.monitoring.listEndpoints"));
    }

    #[test]
    fn document_has_bearer_scheme() {
        let doc = ApiDoc::openapi();
        let components = doc.components.expect("components");
        assert!(components.security_schemes.contains_key("bearer_auth"));
    }
}

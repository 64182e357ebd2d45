//! # Integration Tests for akm-api
//!
//! Drives the full router with `oneshot`: health probes, authentication and
//! organization scoping, the activation key methods, error status mapping,
//! monitoring endpoints, request metrics, and the OpenAPI document.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use akm_api::bootstrap::parse_catalog;
use akm_api::state::{AppConfig, AppState};

const CATALOG: &str = r#"
organizations:
  - id: 1
    channels:
      - label: base-b
        children: [child-c, child-e]
      - label: base-b2
        children: [child-d]
    config_channels:
      - { label: cfg-1, name: First }
      - { label: cfg-2, name: Second }
      - { label: cfg-3, name: Third }
    server_groups:
      - { id: 10, name: web }
    systems:
      - id: 1000
        exporters:
          - name: node_exporter
            address: ":9100"
            path: /metrics
          - name: postgres_exporter
            args: "--web.listen-address=\":9187\""
  - id: 2
    channels:
      - label: base-b
"#;

/// Helper: app with the sample catalog and the given auth token.
fn app_with(auth_token: Option<&str>) -> Router {
    let (catalog, endpoints) = parse_catalog(CATALOG, "test").unwrap();
    let config = AppConfig {
        port: 8080,
        auth_token: auth_token.map(str::to_string),
    };
    akm_api::app(AppState::from_parts(config, catalog, endpoints))
}

/// Helper: app with auth disabled (caller is an org admin of org 1).
fn test_app() -> Router {
    app_with(None)
}

/// Helper: read response body as string.
async fn body_string(response: axum::http::Response<Body>) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

/// Helper: call a method and return status and JSON body.
async fn call(app: &Router, method: &str, body: Value, auth: Option<&str>) -> (StatusCode, Value) {
    let mut builder = Request::builder()
        .method("POST")
        .uri(format!("/rpc/{method}"))
        .header("content-type", "application/json");
    if let Some(credential) = auth {
        builder = builder.header("authorization", format!("Bearer {credential}"));
    }
    let request = builder.body(Body::from(body.to_string())).unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let text = body_string(response).await;
    let value = serde_json::from_str(&text).unwrap_or(Value::String(text));
    (status, value)
}

async fn rpc(app: &Router, method: &str, body: Value) -> (StatusCode, Value) {
    call(app, method, body, None).await
}

// -- Health Probes ------------------------------------------------------------

#[tokio::test]
async fn test_health_probes_are_unauthenticated() {
    let app = app_with(Some("secret"));
    for (uri, expected) in [("/health/liveness", "ok"), ("/health/readiness", "ready")] {
        let response = app
            .clone()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, expected);
    }
}

// -- Authentication -----------------------------------------------------------

#[tokio::test]
async fn test_missing_credential_is_rejected() {
    let app = app_with(Some("secret"));
    let (status, body) = call(&app, "activationkey.listActivationKeys", json!({}), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn test_wrong_secret_is_rejected() {
    let app = app_with(Some("secret"));
    let (status, _) = call(
        &app,
        "activationkey.listActivationKeys",
        json!({}),
        Some("org_admin:1:wrong"),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_user_role_cannot_mutate_but_can_read() {
    let app = app_with(Some("secret"));
    let (status, body) = call(
        &app,
        "activationkey.create",
        json!({ "key": "web" }),
        Some("user:1:secret"),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], "FORBIDDEN");

    let (status, _) = call(
        &app,
        "activationkey.create",
        json!({ "key": "web" }),
        Some("activation_key_admin:1:secret"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = call(
        &app,
        "activationkey.getDetails",
        json!({ "key": "1-web" }),
        Some("user:1:secret"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["key"], "1-web");
}

#[tokio::test]
async fn test_keys_of_other_orgs_are_invisible() {
    let app = app_with(Some("secret"));
    let (status, token) = call(
        &app,
        "activationkey.create",
        json!({}),
        Some("org_admin:1:secret"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = call(
        &app,
        "activationkey.getDetails",
        json!({ "key": token }),
        Some("org_admin:2:secret"),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, keys) = call(
        &app,
        "activationkey.listActivationKeys",
        json!({}),
        Some("org_admin:2:secret"),
    )
    .await;
    assert_eq!(keys, json!([]));
}

// -- Key lifecycle ------------------------------------------------------------

#[tokio::test]
async fn test_create_and_get_details() {
    let app = test_app();
    let (status, token) = rpc(
        &app,
        "activationkey.create",
        json!({
            "description": "web tier",
            "base_channel_label": "base-b",
            "usage_limit": 5,
            "entitlements": ["provisioning_entitled", "virtualization_host"],
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let token = token.as_str().unwrap().to_string();
    assert!(token.starts_with("1-"));
    assert_eq!(token.len(), 2 + 32);

    let (status, details) = rpc(&app, "activationkey.getDetails", json!({ "key": token })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(details["description"], "web tier");
    assert_eq!(details["usage_limit"], 5);
    assert_eq!(details["base_channel_label"], "base-b");
    assert_eq!(details["entitlements"].as_array().unwrap().len(), 3);
    assert_eq!(details["universal_default"], false);
    assert!(details["created"].as_str().unwrap().ends_with('Z'));
}

#[tokio::test]
async fn test_unlimited_key_omits_usage_limit() {
    let app = test_app();
    let (_, token) = rpc(&app, "activationkey.create", json!({ "usage_limit": 0 })).await;
    let (_, details) = rpc(&app, "activationkey.getDetails", json!({ "key": token })).await;
    assert_eq!(details["usage_limit"], 0);

    rpc(
        &app,
        "activationkey.setDetails",
        json!({ "key": token, "details": { "unlimited_usage_limit": true, "usage_limit": 3 } }),
    )
    .await;
    let (_, details) = rpc(&app, "activationkey.getDetails", json!({ "key": token })).await;
    assert!(details.get("usage_limit").is_none());
    assert!(details.get("base_channel_label").is_none());
}

#[tokio::test]
async fn test_delete_then_lookup_is_not_found() {
    let app = test_app();
    let (_, token) = rpc(&app, "activationkey.create", json!({ "key": "gone" })).await;
    let (status, body) = rpc(&app, "activationkey.delete", json!({ "key": token })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!(1));
    let (status, body) = rpc(&app, "activationkey.getDetails", json!({ "key": "1-gone" })).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_second_universal_default_replaces_first() {
    let app = test_app();
    rpc(
        &app,
        "activationkey.create",
        json!({ "key": "a", "universal_default": true }),
    )
    .await;
    rpc(
        &app,
        "activationkey.create",
        json!({ "key": "b", "universal_default": true }),
    )
    .await;
    let (_, keys) = rpc(&app, "activationkey.listActivationKeys", json!({})).await;
    let defaults: Vec<&str> = keys
        .as_array()
        .unwrap()
        .iter()
        .filter(|k| k["universal_default"] == true)
        .map(|k| k["key"].as_str().unwrap())
        .collect();
    assert_eq!(defaults, ["1-b"]);
}

// -- Error mapping --------------------------------------------------------------

#[tokio::test]
async fn test_duplicate_explicit_key_conflicts() {
    let app = test_app();
    let (status, _) = rpc(&app, "activationkey.create", json!({ "key": "dup" })).await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = rpc(&app, "activationkey.create", json!({ "key": "dup" })).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "CONFLICT");
}

#[tokio::test]
async fn test_invalid_inputs_are_unprocessable() {
    let app = test_app();
    for body in [
        json!({ "key": "has space" }),
        json!({ "base_channel_label": "child-c" }),
        json!({ "base_channel_label": "no-such-channel" }),
        json!({ "entitlements": ["enterprise_entitled"] }),
        json!({ "entitlements": ["bogus"] }),
        json!({ "usage_limit": -1 }),
    ] {
        let (status, response) = rpc(&app, "activationkey.create", body.clone()).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY, "{body}");
        assert_eq!(response["error"]["code"], "VALIDATION_ERROR");
    }
    let (_, keys) = rpc(&app, "activationkey.listActivationKeys", json!({})).await;
    assert_eq!(keys, json!([]));
}

#[tokio::test]
async fn test_malformed_body_is_bad_request() {
    let app = test_app();
    let request = Request::builder()
        .method("POST")
        .uri("/rpc/activationkey.getDetails")
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_blank_key_fails_validation() {
    let app = test_app();
    let (status, _) = rpc(&app, "activationkey.getDetails", json!({ "key": "" })).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

// -- Associations -------------------------------------------------------------

#[tokio::test]
async fn test_child_channels_follow_base() {
    let app = test_app();
    let (_, token) = rpc(
        &app,
        "activationkey.create",
        json!({ "base_channel_label": "base-b" }),
    )
    .await;
    let keys = json!([token]);

    let (status, _) = rpc(
        &app,
        "activationkey.addChildChannels",
        json!({ "keys": keys, "channel_labels": ["child-c", "child-e"] }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = rpc(
        &app,
        "activationkey.addChildChannels",
        json!({ "keys": keys, "channel_labels": ["child-d"] }),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (_, details) = rpc(&app, "activationkey.getDetails", json!({ "key": token })).await;
    assert_eq!(details["child_channel_labels"], json!(["child-c", "child-e"]));

    rpc(
        &app,
        "activationkey.setDetails",
        json!({ "key": token, "details": { "base_channel_label": "" } }),
    )
    .await;
    let (_, details) = rpc(&app, "activationkey.getDetails", json!({ "key": token })).await;
    assert_eq!(details["child_channel_labels"], json!([]));
}

#[tokio::test]
async fn test_package_methods_report_modification() {
    let app = test_app();
    let (_, token) = rpc(&app, "activationkey.create", json!({})).await;

    let (status, _) = rpc(
        &app,
        "activationkey.addPackageNames",
        json!({ "key": token, "package_names": ["vim"] }),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    rpc(
        &app,
        "activationkey.addEntitlements",
        json!({ "key": token, "entitlements": ["provisioning_entitled"] }),
    )
    .await;
    let packages = json!([
        { "name": "pkg1", "arch": "i386" },
        { "name": "pkg2", "arch": "" },
        { "name": "pkg3" },
    ]);
    let (_, changed) = rpc(
        &app,
        "activationkey.addPackages",
        json!({ "key": token, "packages": packages }),
    )
    .await;
    assert_eq!(changed, json!(1));
    let (_, changed) = rpc(
        &app,
        "activationkey.addPackages",
        json!({ "key": token, "packages": packages }),
    )
    .await;
    assert_eq!(changed, json!(0));

    let (_, details) = rpc(&app, "activationkey.getDetails", json!({ "key": token })).await;
    assert_eq!(
        details["package_names"],
        json!(["pkg1.i386", "pkg2", "pkg3"])
    );

    rpc(
        &app,
        "activationkey.removeEntitlements",
        json!({ "key": token, "entitlements": ["provisioning_entitled"] }),
    )
    .await;
    let (_, details) = rpc(&app, "activationkey.getDetails", json!({ "key": token })).await;
    assert_eq!(details["package_names"], json!([]));
}

#[tokio::test]
async fn test_server_groups() {
    let app = test_app();
    let (_, token) = rpc(&app, "activationkey.create", json!({})).await;
    let (status, _) = rpc(
        &app,
        "activationkey.addServerGroups",
        json!({ "key": token, "server_group_ids": [99] }),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = rpc(
        &app,
        "activationkey.addServerGroups",
        json!({ "key": token, "server_group_ids": [10] }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let (_, details) = rpc(&app, "activationkey.getDetails", json!({ "key": token })).await;
    assert_eq!(details["server_group_ids"], json!([10]));
}

#[tokio::test]
async fn test_config_channels_keep_rank_order() {
    let app = test_app();
    let (_, token) = rpc(&app, "activationkey.create", json!({})).await;
    let keys = json!([token]);

    rpc(
        &app,
        "activationkey.setConfigChannels",
        json!({ "keys": keys, "config_channel_labels": ["cfg-3", "cfg-1"] }),
    )
    .await;
    rpc(
        &app,
        "activationkey.addConfigChannels",
        json!({ "keys": keys, "config_channel_labels": ["cfg-2"], "add_to_top": true }),
    )
    .await;
    let (_, channels) = rpc(
        &app,
        "activationkey.listConfigChannels",
        json!({ "key": token }),
    )
    .await;
    let labels: Vec<&str> = channels
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["label"].as_str().unwrap())
        .collect();
    assert_eq!(labels, ["cfg-2", "cfg-3", "cfg-1"]);
    assert_eq!(channels[0]["name"], "Second");

    let (status, _) = rpc(
        &app,
        "activationkey.removeConfigChannels",
        json!({ "keys": keys, "config_channel_labels": ["missing"] }),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_config_deployment_flag() {
    let app = test_app();
    let (_, token) = rpc(&app, "activationkey.create", json!({})).await;
    let (_, enabled) = rpc(
        &app,
        "activationkey.checkConfigDeployment",
        json!({ "key": token }),
    )
    .await;
    assert_eq!(enabled, json!(0));
    rpc(
        &app,
        "activationkey.enableConfigDeployment",
        json!({ "key": token }),
    )
    .await;
    let (_, enabled) = rpc(
        &app,
        "activationkey.checkConfigDeployment",
        json!({ "key": token }),
    )
    .await;
    assert_eq!(enabled, json!(1));
}

#[tokio::test]
async fn test_activation_enforces_usage_limit() {
    let app = test_app();
    let (_, token) = rpc(&app, "activationkey.create", json!({ "usage_limit": 1 })).await;
    let (status, _) = rpc(
        &app,
        "activationkey.activateSystem",
        json!({ "key": token, "system_id": 1000, "name": "web01" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = rpc(
        &app,
        "activationkey.activateSystem",
        json!({ "key": token, "system_id": 1000, "name": "web01" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = rpc(
        &app,
        "activationkey.activateSystem",
        json!({ "key": token, "system_id": 1001, "name": "web02" }),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "CONFLICT");

    let (_, systems) = rpc(
        &app,
        "activationkey.listActivatedSystems",
        json!({ "key": token }),
    )
    .await;
    assert_eq!(systems.as_array().unwrap().len(), 1);
    assert_eq!(systems[0]["system_id"], 1000);
}

// -- Monitoring ---------------------------------------------------------------

#[tokio::test]
async fn test_monitoring_endpoints() {
    let app = test_app();
    let (status, endpoints) = rpc(
        &app,
        "system.monitoring.listEndpoints",
        json!({ "system_ids": [1000, 4242] }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let endpoints = endpoints.as_array().unwrap();
    assert_eq!(endpoints.len(), 2);
    let port_of = |name: &str| {
        endpoints
            .iter()
            .find(|e| e["exporter_name"] == name)
            .map(|e| e["port"].clone())
    };
    assert_eq!(port_of("node_exporter"), Some(json!(9100)));
    assert_eq!(port_of("postgres_exporter"), Some(json!(9187)));
}

#[tokio::test]
async fn test_monitoring_endpoints_are_org_scoped() {
    let app = app_with(Some("secret"));
    let (status, endpoints) = call(
        &app,
        "system.monitoring.listEndpoints",
        json!({ "system_ids": [1000] }),
        Some("user:2:secret"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(endpoints, json!([]));
}

// -- Metrics & OpenAPI ----------------------------------------------------------

#[tokio::test]
async fn test_metrics_count_requests_and_errors() {
    let app = test_app();
    rpc(&app, "activationkey.listActivationKeys", json!({})).await;
    rpc(&app, "activationkey.getDetails", json!({ "key": "1-nope" })).await;

    let response = app
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers()["content-type"]
        .to_str()
        .unwrap()
        .starts_with("text/plain"));
    let body = body_string(response).await;
    assert!(body.contains(
        r#"akm_http_requests_total{method="POST",path="/rpc/activationkey.listActivationKeys",status="200"} 1"#
    ));
    assert!(body.contains(
        r#"akm_http_errors_total{method="POST",path="/rpc/activationkey.getDetails",status="404"} 1"#
    ));
    assert!(body.contains("akm_http_request_duration_seconds_bucket"));
    assert!(body.contains("akm_package_names_total 0"));
}

#[tokio::test]
async fn test_rejected_package_request_registers_no_names() {
    let app = test_app();
    let (_, token) = rpc(
        &app,
        "activationkey.create",
        json!({ "entitlements": ["provisioning_entitled"] }),
    )
    .await;
    let (status, _) = rpc(
        &app,
        "activationkey.addPackages",
        json!({
            "key": token,
            "packages": [{ "name": "brand-new-a" }, { "name": "pkg", "arch": "vax" }],
        }),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let response = app
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert!(body_string(response).await.contains("akm_package_names_total 0"));
}

#[tokio::test]
async fn test_openapi_spec_is_served() {
    let app = test_app();
    let response = app
        .oneshot(
            Request::builder()
                .uri("/openapi.json")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_string(response).await;
    assert!(body.contains("/rpc/activationkey.setConfigChannels"));
    assert!(body.contains("bearer_auth"));
}

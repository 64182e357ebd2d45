//! # API Contract
//!
//! The channel and package scenarios driven through the HTTP router, with
//! the catalog loaded the way the binary loads it.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use akm_api::bootstrap::parse_catalog;
use akm_api::state::{AppConfig, AppState};

const CATALOG: &str = "
organizations:
  - id: 1
    channels:
      - { label: base-b, children: [child-c] }
      - { label: base-b2, children: [child-d] }
";

fn app() -> Router {
    let (catalog, endpoints) = parse_catalog(CATALOG, "contract").unwrap();
    akm_api::app(AppState::from_parts(AppConfig::default(), catalog, endpoints))
}

async fn rpc(app: &Router, method: &str, body: Value) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri(format!("/rpc/activationkey.{method}"))
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap())
}

async fn channel_count(app: &Router, token: &Value) -> usize {
    let (_, details) = rpc(app, "getDetails", json!({ "key": token })).await;
    let base = usize::from(details.get("base_channel_label").is_some());
    base + details["child_channel_labels"].as_array().unwrap().len()
}

#[tokio::test]
async fn channel_scenario_over_http() {
    let app = app();
    let (status, token) = rpc(&app, "create", json!({ "base_channel_label": "base-b" })).await;
    assert_eq!(status, StatusCode::OK);
    let keys = json!([token]);

    rpc(&app, "addChildChannels", json!({ "keys": keys, "channel_labels": ["child-c"] })).await;
    assert_eq!(channel_count(&app, &token).await, 2);

    let (status, body) = rpc(
        &app,
        "addChildChannels",
        json!({ "keys": keys, "channel_labels": ["child-d"] }),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["error"]["message"].as_str().unwrap().contains("child-d"));
    assert_eq!(channel_count(&app, &token).await, 2);

    rpc(&app, "removeChildChannels", json!({ "keys": keys, "channel_labels": ["child-c"] })).await;
    assert_eq!(channel_count(&app, &token).await, 1);
}

#[tokio::test]
async fn package_scenario_over_http() {
    let app = app();
    let (_, token) = rpc(
        &app,
        "create",
        json!({ "entitlements": ["provisioning_entitled"] }),
    )
    .await;

    let (_, changed) = rpc(
        &app,
        "addPackages",
        json!({ "key": token, "packages": [
            { "name": "pkg1", "arch": "i386" },
            { "name": "pkg2", "arch": "" },
            { "name": "pkg3" },
        ] }),
    )
    .await;
    assert_eq!(changed, json!(1));

    let (_, changed) = rpc(
        &app,
        "removePackageNames",
        json!({ "key": token, "package_names": ["pkg2"] }),
    )
    .await;
    assert_eq!(changed, json!(1));

    let (_, details) = rpc(&app, "getDetails", json!({ "key": token })).await;
    assert_eq!(details["package_names"], json!(["pkg1.i386", "pkg3"]));
}

#![deny(missing_docs)]

//! # akm-api: Activation Key Method-Call Surface
//!
//! Axum server exposing the activation-key engine as named methods.
//!
//! ## Method namespaces
//!
//! | Prefix                         | Module                         |
//! |--------------------------------|--------------------------------|
//! | `/rpc/activationkey.*`         | [`routes::activation_keys`]    |
//! | `/rpc/system.monitoring.*`     | [`routes::monitoring`]         |
//! | `/openapi.json`                | [`openapi`]                    |
//! | `/health/*`                    | unauthenticated probes         |
//! | `/metrics`                     | Prometheus scrape, no auth     |
//!
//! ## Middleware order (outermost first)
//!
//! `TraceLayer` → metrics → auth → handler. The caller's organization comes
//! from the bearer credential (see [`auth`]); request bodies never name it.

pub mod auth;
pub mod bootstrap;
pub mod error;
pub mod extractors;
pub mod middleware;
pub mod openapi;
pub mod routes;
pub mod state;

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::middleware::from_fn;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Extension, Router};
use tower_http::trace::TraceLayer;

use crate::auth::AuthConfig;
use crate::middleware::metrics::ApiMetrics;
use crate::state::AppState;

/// Build the application router.
pub fn app(state: AppState) -> Router {
    let auth_config = AuthConfig {
        token: state.config.auth_token.clone(),
    };
    let metrics = ApiMetrics::new();

    let api = Router::new()
        .merge(routes::activation_keys::router())
        .merge(routes::monitoring::router())
        .merge(openapi::router())
        .layer(from_fn(auth::auth_middleware))
        .layer(from_fn(middleware::metrics::metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(Extension(auth_config))
        .layer(Extension(metrics.clone()))
        .with_state(state.clone());

    let unauthenticated = Router::new()
        .route("/health/liveness", get(liveness))
        .route("/health/readiness", get(readiness))
        .route("/metrics", get(prometheus_metrics))
        .layer(Extension(metrics))
        .with_state(state);

    Router::new().merge(unauthenticated).merge(api)
}

async fn liveness() -> &'static str {
    "ok"
}

async fn readiness() -> &'static str {
    "ready"
}

/// Prometheus scrape. Refreshes catalog gauges, then encodes every metric
/// in text exposition format.
async fn prometheus_metrics(
    State(state): State<AppState>,
    Extension(metrics): Extension<ApiMetrics>,
) -> Response {
    let names = i64::try_from(state.keys.catalog().packages.len()).unwrap_or(i64::MAX);
    metrics.package_names_total().set(names);

    match metrics.gather_and_encode() {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!("failed to encode Prometheus metrics: {e}");
            (StatusCode::INTERNAL_SERVER_ERROR, e).into_response()
        }
    }
}

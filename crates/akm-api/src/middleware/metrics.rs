//! # Prometheus Metrics
//!
//! HTTP request metrics are recorded by [`metrics_middleware`] into a
//! Prometheus registry. Catalog gauges are refreshed on each `/metrics`
//! scrape (pull model), see the handler in `lib.rs`.
//!
//! Request paths are labelled by method name. Anything that is not a
//! method call or the OpenAPI document collapses to `other` so unknown
//! paths cannot grow the label set.

use std::sync::Arc;
use std::time::Instant;

use axum::extract::Request;
use axum::middleware::Next;
use axum::response::Response;
use prometheus::core::Collector;
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};

/// Shared metrics state backed by a Prometheus registry.
#[derive(Clone)]
pub struct ApiMetrics {
    inner: Arc<Inner>,
}

struct Inner {
    registry: Registry,
    http_requests_total: IntCounterVec,
    http_request_duration_seconds: HistogramVec,
    http_errors_total: IntCounterVec,
    package_names_total: IntGauge,
}

impl Inner {
    fn build() -> prometheus::Result<Self> {
        let registry = Registry::new();

        let http_requests_total = IntCounterVec::new(
            Opts::new("akm_http_requests_total", "Total HTTP requests"),
            &["method", "path", "status"],
        )?;
        let http_request_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "akm_http_request_duration_seconds",
                "HTTP request duration in seconds",
            )
            .buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5]),
            &["method", "path"],
        )?;
        let http_errors_total = IntCounterVec::new(
            Opts::new("akm_http_errors_total", "Total HTTP errors (4xx and 5xx)"),
            &["method", "path", "status"],
        )?;
        let package_names_total = IntGauge::new(
            "akm_package_names_total",
            "Package names registered in the global catalog",
        )?;

        registry.register(Box::new(http_requests_total.clone()))?;
        registry.register(Box::new(http_request_duration_seconds.clone()))?;
        registry.register(Box::new(http_errors_total.clone()))?;
        registry.register(Box::new(package_names_total.clone()))?;

        Ok(Self {
            registry,
            http_requests_total,
            http_request_duration_seconds,
            http_errors_total,
            package_names_total,
        })
    }
}

impl std::fmt::Debug for ApiMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiMetrics")
            .field("requests", &self.requests())
            .field("errors", &self.errors())
            .finish()
    }
}

impl ApiMetrics {
    /// Fresh registry with every metric at zero.
    pub fn new() -> Self {
        // Names and label sets are constants; registration cannot collide
        // in a fresh registry.
        let inner = Inner::build().expect("static metric definitions are valid");
        Self {
            inner: Arc::new(inner),
        }
    }

    /// Requests served, summed across labels.
    pub fn requests(&self) -> u64 {
        counter_sum(&self.inner.http_requests_total)
    }

    /// Requests answered with a 4xx or 5xx status, summed across labels.
    pub fn errors(&self) -> u64 {
        counter_sum(&self.inner.http_errors_total)
    }

    /// Gauge of registered package names.
    pub fn package_names_total(&self) -> &IntGauge {
        &self.inner.package_names_total
    }

    fn record_request(&self, method: &str, path: &str, status: u16, duration_secs: f64) {
        let status = status.to_string();
        self.inner
            .http_requests_total
            .with_label_values(&[method, path, &status])
            .inc();
        self.inner
            .http_request_duration_seconds
            .with_label_values(&[method, path])
            .observe(duration_secs);
        if status.starts_with('4') || status.starts_with('5') {
            self.inner
                .http_errors_total
                .with_label_values(&[method, path, &status])
                .inc();
        }
    }

    /// Gather every metric in Prometheus text exposition format.
    pub fn gather_and_encode(&self) -> Result<String, String> {
        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&self.inner.registry.gather(), &mut buffer)
            .map_err(|e| format!("failed to encode metrics: {e}"))?;
        String::from_utf8(buffer).map_err(|e| format!("metrics encoding produced invalid UTF-8: {e}"))
    }
}

impl Default for ApiMetrics {
    fn default() -> Self {
        Self::new()
    }
}

fn counter_sum(counter: &IntCounterVec) -> u64 {
    counter
        .collect()
        .iter()
        .flat_map(|family| family.get_metric())
        .map(|m| m.get_counter().get_value() as u64)
        .sum()
}

/// Label for a request path.
fn path_label(path: &str) -> &str {
    let is_method = path.strip_prefix("/rpc/").is_some_and(|m| {
        !m.is_empty() && m.len() <= 64 && m.chars().all(|c| c.is_ascii_alphabetic() || c == '.')
    });
    if is_method || path == "/openapi.json" {
        path
    } else {
        "other"
    }
}

/// Record count, latency and errors of every request.
pub async fn metrics_middleware(request: Request, next: Next) -> Response {
    let metrics = request.extensions().get::<ApiMetrics>().cloned();
    let method = request.method().to_string();
    let path = path_label(request.uri().path()).to_string();
    let start = Instant::now();

    let response = next.run(request).await;

    if let Some(m) = metrics {
        m.record_request(
            &method,
            &path,
            response.status().as_u16(),
            start.elapsed().as_secs_f64(),
        );
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::StatusCode;
    use axum::middleware::from_fn;
    use axum::routing::post;
    use axum::Router;
    use tower::ServiceExt;

    #[test]
    fn new_metrics_start_at_zero() {
        let m = ApiMetrics::new();
        assert_eq!(m.requests(), 0);
        assert_eq!(m.errors(), 0);
    }

    #[test]
    fn errors_are_counted_per_status() {
        let m = ApiMetrics::new();
        m.record_request("POST", "/rpc/activationkey.create", 200, 0.01);
        m.record_request("POST", "/rpc/activationkey.getDetails", 404, 0.01);
        m.record_request("POST", "/rpc/activationkey.getDetails", 500, 0.01);
        assert_eq!(m.requests(), 3);
        assert_eq!(m.errors(), 2);
    }

    #[test]
    fn clones_share_the_registry() {
        let m = ApiMetrics::new();
        let clone = m.clone();
        clone.record_request("POST", "/rpc/activationkey.delete", 422, 0.002);
        assert_eq!(m.requests(), 1);
        assert_eq!(m.errors(), 1);
    }

    #[test]
    fn unknown_paths_collapse() {
        assert_eq!(path_label("/rpc/activationkey.addPackages"), "/rpc/activationkey.addPackages");
        assert_eq!(path_label("/openapi.json"), "/openapi.json");
        assert_eq!(path_label("/rpc/"), "other");
        assert_eq!(path_label("/rpc/activationkey.create/../x"), "other");
        assert_eq!(path_label("/wp-admin/login.php"), "other");
    }

    #[test]
    fn exposition_names_every_metric() {
        let m = ApiMetrics::new();
        m.record_request("POST", "/rpc/activationkey.create", 200, 0.01);
        m.package_names_total().set(7);
        let text = m.gather_and_encode().unwrap();
        assert!(text.contains("akm_http_requests_total"));
        assert!(text.contains("akm_http_request_duration_seconds_bucket"));
        assert!(text.contains("akm_package_names_total 7"));
        assert!(text.contains(r#"path="/rpc/activationkey.create""#));
    }

    #[tokio::test]
    async fn middleware_records_requests_and_errors() {
        let metrics = ApiMetrics::new();
        let app = Router::new()
            .route("/rpc/ok", post(|| async { "1" }))
            .route("/rpc/fail", post(|| async { StatusCode::NOT_FOUND }))
            .layer(from_fn(metrics_middleware))
            .layer(axum::Extension(metrics.clone()));

        for uri in ["/rpc/ok", "/rpc/fail", "/rpc/ok"] {
            let request = axum::http::Request::builder()
                .method("POST")
                .uri(uri)
                .body(Body::empty())
                .unwrap();
            app.clone().oneshot(request).await.unwrap();
        }
        assert_eq!(metrics.requests(), 3);
        assert_eq!(metrics.errors(), 1);
        let text = metrics.gather_and_encode().unwrap();
        assert!(text.contains(r#"status="404""#));
    }
}

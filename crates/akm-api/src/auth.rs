//! # Authentication & Authorization Middleware
//!
//! Bearer tokens carry the caller's role and organization:
//!
//! ```text
//! Bearer {role}:{org_id}:{secret}
//! ```
//!
//! `role` is `user`, `activation_key_admin` or `org_admin`. The secret is
//! compared in constant time against the configured token. On success a
//! [`CallerIdentity`] is placed in the request extensions; handlers pull it
//! out through its `FromRequestParts` implementation.
//!
//! With no token configured, every request runs as an org admin of
//! organization 1.

use axum::extract::Request;
use axum::http::request::Parts;
use axum::http::{header, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use subtle::ConstantTimeEq;

use akm_core::{Caller, OrgId, Role};

use crate::error::{AppError, ErrorBody, ErrorDetail};

/// Organization used when authentication is disabled.
pub const DEFAULT_ORG: OrgId = OrgId::new(1);

// ── CallerIdentity ──────────────────────────────────────────────────────────

/// The authenticated caller of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallerIdentity(pub Caller);

impl CallerIdentity {
    /// The engine-level caller.
    pub fn caller(&self) -> &Caller {
        &self.0
    }
}

#[axum::async_trait]
impl<S: Send + Sync> axum::extract::FromRequestParts<S> for CallerIdentity {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CallerIdentity>()
            .copied()
            .ok_or_else(|| AppError::Unauthorized("no caller identity in request context".into()))
    }
}

// ── Auth Configuration ──────────────────────────────────────────────────────

/// Expected bearer secret, injected as a request extension.
///
/// `Debug` redacts the secret.
#[derive(Clone)]
pub struct AuthConfig {
    /// The secret. `None` disables authentication.
    pub token: Option<String>,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

// ── Token Validation ────────────────────────────────────────────────────────

fn constant_time_token_eq(provided: &str, expected: &str) -> bool {
    let provided = provided.as_bytes();
    let expected = expected.as_bytes();
    if provided.len() != expected.len() {
        let _ = expected.ct_eq(expected);
        return false;
    }
    provided.ct_eq(expected).into()
}

/// Parse `{role}:{org_id}:{secret}` and check the secret.
pub fn parse_bearer_token(provided: &str, expected_secret: &str) -> Result<CallerIdentity, String> {
    let parts: Vec<&str> = provided.splitn(3, ':').collect();
    let [role, org, secret] = parts.as_slice() else {
        return Err("invalid token format, expected {role}:{org_id}:{secret}".into());
    };

    if !constant_time_token_eq(secret, expected_secret) {
        return Err("invalid bearer token".into());
    }

    let role = Role::from_name(role).map_err(|e| e.to_string())?;
    let org_id = org.parse::<OrgId>().map_err(|e| e.to_string())?;
    Ok(CallerIdentity(Caller::new(org_id, role)))
}

// ── Middleware ───────────────────────────────────────────────────────────────

/// Authenticate the request and attach its [`CallerIdentity`].
pub async fn auth_middleware(mut request: Request, next: Next) -> Response {
    let expected_token = request.extensions().get::<AuthConfig>().cloned();

    match expected_token {
        Some(AuthConfig {
            token: Some(ref expected),
        }) => {
            let auth_header = request
                .headers()
                .get(header::AUTHORIZATION)
                .and_then(|v| v.to_str().ok());

            match auth_header.map(|h| h.strip_prefix("Bearer ")) {
                Some(Some(provided)) => match parse_bearer_token(provided, expected) {
                    Ok(identity) => {
                        request.extensions_mut().insert(identity);
                        next.run(request).await
                    }
                    Err(msg) => {
                        tracing::warn!(reason = %msg, "authentication failed: invalid bearer token");
                        unauthorized_response(&msg)
                    }
                },
                Some(None) => {
                    tracing::warn!("authentication failed: non-Bearer authorization scheme");
                    unauthorized_response("authorization header must use Bearer scheme")
                }
                None => {
                    tracing::warn!("authentication failed: missing authorization header");
                    unauthorized_response("missing authorization header")
                }
            }
        }
        _ => {
            request
                .extensions_mut()
                .insert(CallerIdentity(Caller::new(DEFAULT_ORG, Role::OrgAdmin)));
            next.run(request).await
        }
    }
}

fn unauthorized_response(message: &str) -> Response {
    let body = ErrorBody {
        error: ErrorDetail {
            code: "UNAUTHORIZED".to_string(),
            message: message.to_string(),
            details: None,
        },
    };
    (StatusCode::UNAUTHORIZED, Json(body)).into_response()
}

//! # Request Bodies
//!
//! Every method takes a JSON body of named parameters. A body that fails to
//! parse answers 400; one that parses but breaks a [`Validate`] rule answers
//! 422 before the engine sees it. The shared rules for key tokens and label
//! lists live here so each request type states only which ones apply.

use axum::extract::rejection::JsonRejection;
use axum::Json;

use crate::error::AppError;

/// Rules a request must satisfy beyond deserialization.
pub trait Validate {
    /// Check the request. Returns a message on failure.
    fn validate(&self) -> Result<(), String>;
}

/// Unwrap a JSON body, mapping parse failures to 400.
pub fn extract_json<T>(result: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    result
        .map(|Json(v)| v)
        .map_err(|err| AppError::BadRequest(err.body_text()))
}

/// Unwrap and validate a JSON body; validation failures become 422.
pub fn extract_validated_json<T: Validate>(
    result: Result<Json<T>, JsonRejection>,
) -> Result<T, AppError> {
    let value = extract_json(result)?;
    value.validate().map_err(|message| {
        tracing::debug!(%message, "request failed validation");
        AppError::Validation(message)
    })?;
    Ok(value)
}

/// Fail with `message` when `items` is empty.
pub(crate) fn require_non_empty<T>(items: &[T], message: &str) -> Result<(), String> {
    if items.is_empty() {
        Err(message.to_string())
    } else {
        Ok(())
    }
}

/// A single key token must not be blank.
pub(crate) fn require_key(key: &str) -> Result<(), String> {
    if key.trim().is_empty() {
        return Err("key must not be empty".into());
    }
    Ok(())
}

/// A batch names at least one key and none of them is blank.
pub(crate) fn require_keys(keys: &[String]) -> Result<(), String> {
    require_non_empty(keys, "keys must not be empty")?;
    keys.iter().try_for_each(|k| require_key(k))
}

/// No entry of the `field` list is blank.
pub(crate) fn require_labels(labels: &[String], field: &str) -> Result<(), String> {
    match labels.iter().position(|l| l.trim().is_empty()) {
        Some(index) => Err(format!("{field}[{index}] must not be empty")),
        None => Ok(()),
    }
}

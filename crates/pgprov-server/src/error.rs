use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use pgprov_core::ProvisionError;

use crate::jobs::JobError;

// ---------------------------------------------------------------------------
// Internal sentinels for explicit 404 / 409 errors
// ---------------------------------------------------------------------------

/// Carries an explicit HTTP 409 through the `anyhow::Error` chain.
#[derive(Debug)]
struct ConflictError(String);

impl std::fmt::Display for ConflictError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for ConflictError {}

/// Carries an explicit HTTP 404 through the `anyhow::Error` chain.
#[derive(Debug)]
struct NotFoundError(String);

impl std::fmt::Display for NotFoundError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for NotFoundError {}

// ---------------------------------------------------------------------------
// Status and body mapping
// ---------------------------------------------------------------------------

pub fn provision_status(err: &ProvisionError) -> StatusCode {
    match err {
        ProvisionError::Validation { .. } | ProvisionError::InvalidStep(_) => {
            StatusCode::BAD_REQUEST
        }
        ProvisionError::Precondition { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        ProvisionError::ProcessLaunch { .. } => StatusCode::SERVICE_UNAVAILABLE,
        ProvisionError::ProcessExit { .. } | ProvisionError::Inventory(_) => {
            StatusCode::BAD_GATEWAY
        }
        ProvisionError::Render(_)
        | ProvisionError::Io(_)
        | ProvisionError::Yaml(_)
        | ProvisionError::Json(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// JSON error payload. Tool diagnostics are included verbatim.
pub fn provision_body(err: &ProvisionError) -> serde_json::Value {
    let mut body = serde_json::json!({
        "error": err.to_string(),
        "kind": err.kind(),
    });
    match err {
        ProvisionError::ProcessExit {
            program,
            exit_code,
            stderr,
        } => {
            body["program"] = serde_json::json!(program);
            body["exit_code"] = serde_json::json!(exit_code);
            body["stderr"] = serde_json::json!(stderr);
        }
        ProvisionError::ProcessLaunch { program, .. } => {
            body["program"] = serde_json::json!(program);
        }
        ProvisionError::Precondition {
            step,
            missing,
            produced_by,
        } => {
            body["step"] = serde_json::json!(step);
            body["missing"] = serde_json::json!(missing);
            body["produced_by"] = serde_json::json!(produced_by);
        }
        ProvisionError::Validation { field, .. } => {
            body["field"] = serde_json::json!(field);
        }
        _ => {}
    }
    body
}

// ---------------------------------------------------------------------------
// AppError — unified error type for HTTP responses
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct AppError(pub anyhow::Error);

impl AppError {
    pub fn conflict(msg: impl Into<String>) -> Self {
        Self(ConflictError(msg.into()).into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self(NotFoundError(msg.into()).into())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if let Some(c) = self.0.downcast_ref::<ConflictError>() {
            let body = serde_json::json!({ "error": c.0.clone(), "kind": "busy" });
            return (StatusCode::CONFLICT, axum::Json(body)).into_response();
        }
        if let Some(n) = self.0.downcast_ref::<NotFoundError>() {
            let body = serde_json::json!({ "error": n.0.clone(), "kind": "not_found" });
            return (StatusCode::NOT_FOUND, axum::Json(body)).into_response();
        }
        if let Some(e) = self.0.downcast_ref::<ProvisionError>() {
            return (provision_status(e), axum::Json(provision_body(e))).into_response();
        }
        if let Some(e) = self.0.downcast_ref::<JobError>() {
            return (e.status(), axum::Json(e.body())).into_response();
        }

        tracing::error!(error = %self.0, "unhandled error");
        let body = serde_json::json!({ "error": self.0.to_string(), "kind": "internal" });
        (StatusCode::INTERNAL_SERVER_ERROR, axum::Json(body)).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

//! API error types with HTTP status code mapping.
//!
//! [`ApiError`] implements `IntoResponse` and renders every failure as
//! `{ "success": false, "error": { code, message, details? } }`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use netforge_check::ShapeViolation;
use netforge_compiler::CompileError;
use netforge_core::CoreError;
use netforge_storage::StorageError;

use crate::training::TrainingError;

/// Structured error detail in API responses.
#[derive(Debug, Clone, Serialize)]
pub struct ApiErrorDetail {
    /// Machine-readable error code (e.g., "NOT_FOUND", "BAD_REQUEST").
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// 404.
    #[error("not found: {0}")]
    NotFound(String),

    /// 400.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// The graph has shape violations (422).
    #[error("validation failed")]
    ValidationFailed(Vec<ShapeViolation>),

    /// The graph could not be compiled (422).
    #[error("compile failed: {0}")]
    CompileFailed(CompileError),

    /// The training or inference service failed or answered badly (502).
    #[error("upstream error: {0}")]
    Upstream(String),

    /// 409.
    #[error("conflict: {0}")]
    Conflict(String),

    /// 500.
    #[error("internal error: {0}")]
    InternalError(String),
}

impl ApiError {
    fn parts(&self) -> (StatusCode, &'static str, Option<serde_json::Value>) {
        match self {
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND", None),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", None),
            ApiError::ValidationFailed(violations) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "VALIDATION_FAILED",
                serde_json::to_value(violations).ok(),
            ),
            ApiError::CompileFailed(err) => {
                let details = match err {
                    CompileError::AmbiguousStart { candidates } => {
                        Some(serde_json::json!({ "candidates": candidates }))
                    }
                    CompileError::InvalidLayer { node, .. } => {
                        Some(serde_json::json!({ "node": node }))
                    }
                    _ => None,
                };
                (StatusCode::UNPROCESSABLE_ENTITY, "COMPILE_FAILED", details)
            }
            ApiError::Upstream(_) => (StatusCode::BAD_GATEWAY, "UPSTREAM_ERROR", None),
            ApiError::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT", None),
            ApiError::InternalError(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", None)
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, details) = self.parts();
        let message = match &self {
            ApiError::ValidationFailed(v) => format!("{} shape violation(s)", v.len()),
            ApiError::NotFound(m)
            | ApiError::BadRequest(m)
            | ApiError::Upstream(m)
            | ApiError::Conflict(m)
            | ApiError::InternalError(m) => m.clone(),
            ApiError::CompileFailed(e) => e.to_string(),
        };
        let detail = ApiErrorDetail {
            code: code.to_string(),
            message,
            details,
        };
        let body = serde_json::json!({
            "success": false,
            "error": detail,
        });
        (status, axum::Json(body)).into_response()
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        match &err {
            CoreError::NodeNotFound { .. } | CoreError::EdgeNotFound { .. } => {
                ApiError::NotFound(err.to_string())
            }
            CoreError::DuplicateNode { .. } | CoreError::DuplicateEdge { .. } => {
                ApiError::Conflict(err.to_string())
            }
            CoreError::InvalidEdge { .. }
            | CoreError::UnknownBlockKind { .. }
            | CoreError::UnknownParameter { .. }
            | CoreError::ReadOnlyParameter { .. }
            | CoreError::InvalidParameterValue { .. }
            | CoreError::MalformedBlock { .. } => ApiError::BadRequest(err.to_string()),
        }
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        match &err {
            StorageError::ProjectNotFound(_)
            | StorageError::NodeNotFound { .. }
            | StorageError::EdgeNotFound { .. } => ApiError::NotFound(err.to_string()),
            StorageError::IntegrityError { .. } => ApiError::Conflict(err.to_string()),
            _ => ApiError::InternalError(err.to_string()),
        }
    }
}

impl From<CompileError> for ApiError {
    fn from(err: CompileError) -> Self {
        match err {
            CompileError::Core(core) => core.into(),
            other => ApiError::CompileFailed(other),
        }
    }
}

impl From<TrainingError> for ApiError {
    fn from(err: TrainingError) -> Self {
        ApiError::Upstream(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use netforge_core::NodeId;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (ApiError::from(CoreError::NodeNotFound { id: NodeId::from("x") }), StatusCode::NOT_FOUND),
            (
                ApiError::from(CoreError::ReadOnlyParameter {
                    kind: "poolingBlock".into(),
                    param: "channels".into(),
                }),
                StatusCode::BAD_REQUEST,
            ),
            (ApiError::from(StorageError::ProjectNotFound(3)), StatusCode::NOT_FOUND),
            (ApiError::from(CompileError::NoLayers), StatusCode::UNPROCESSABLE_ENTITY),
            (ApiError::Upstream("refused".into()), StatusCode::BAD_GATEWAY),
        ];
        for (err, status) in cases {
            assert_eq!(err.into_response().status(), status);
        }
    }

    #[test]
    fn test_core_inside_compile_error_keeps_its_status() {
        let err = ApiError::from(CompileError::Core(CoreError::NodeNotFound {
            id: NodeId::from("gone"),
        }));
        assert!(matches!(err, ApiError::NotFound(_)));
    }
}

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use engine::EngineError;
use serde_json::json;

/// Error returned by every handler.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Engine(#[from] EngineError),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    /// HTTP status and stable error code for this error.
    pub fn classify(&self) -> (StatusCode, &'static str) {
        let ApiError::Engine(err) = self;
        match err {
            EngineError::NoPermittedMachines => (StatusCode::FORBIDDEN, "NO_PERMITTED_MACHINES"),
            EngineError::HookRejected { .. } => (StatusCode::FORBIDDEN, "HOOK_REJECTED"),
            EngineError::QuotaExceeded { .. } => (StatusCode::TOO_MANY_REQUESTS, "QUOTA_EXCEEDED"),
            EngineError::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, "VALIDATION_ERROR"),
            EngineError::InvalidRestriction { .. } => {
                (StatusCode::UNPROCESSABLE_ENTITY, "INVALID_RESTRICTION")
            }
            EngineError::InvalidGroupCount => (StatusCode::UNPROCESSABLE_ENTITY, "INVALID_GROUP_COUNT"),
            EngineError::UnknownEnvironment(_) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "UNKNOWN_ENVIRONMENT")
            }
            EngineError::UnknownHook(_) => (StatusCode::UNPROCESSABLE_ENTITY, "UNKNOWN_HOOK"),
            EngineError::TemplateNotFound(_) | EngineError::OperationNotFound(_) => {
                (StatusCode::NOT_FOUND, "NOT_FOUND")
            }
            EngineError::Database(db::DbError::NotFound { .. }) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            EngineError::Database(db::DbError::Duplicate(_)) => (StatusCode::CONFLICT, "DUPLICATE"),
            EngineError::PartialSchedule { .. } => (StatusCode::CONFLICT, "PARTIAL_SCHEDULE"),
            EngineError::NotReleasable { .. } => (StatusCode::CONFLICT, "NOT_RELEASABLE"),
            EngineError::Factory(_) | EngineError::Dispatch(_) | EngineError::Database(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR")
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.classify();
        let ApiError::Engine(err) = &self;

        let body = if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %err, "request failed");
            json!({ "error": "an internal error occurred", "code": code })
        } else if let EngineError::PartialSchedule { admitted, .. } = err {
            tracing::warn!(error = %err, "group scheduling stopped early");
            json!({ "error": err.to_string(), "code": code, "admitted": admitted })
        } else {
            json!({ "error": err.to_string(), "code": code })
        };

        (status, Json(body)).into_response()
    }
}

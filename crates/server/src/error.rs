//! Converts every service-layer error into the HTTP status implied by
//! spec.md §7's taxonomy, modeled on the `ApiError`/`IntoResponse` pattern
//! used throughout vibe-kanban's `routes::*` modules.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use af_core::ErrorClass;
use af_utils::ApiResponse;

pub struct ApiError {
    class: ErrorClass,
    message: String,
}

impl ApiError {
    pub fn new(class: ErrorClass, message: impl Into<String>) -> Self {
        Self {
            class,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.class.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(ApiResponse::<()>::error(self.message))).into_response()
    }
}

impl From<af_orchestrator::OrchestratorError> for ApiError {
    fn from(e: af_orchestrator::OrchestratorError) -> Self {
        let class = e.class();
        Self::new(class, e.to_string())
    }
}

impl From<af_db::DbError> for ApiError {
    fn from(e: af_db::DbError) -> Self {
        let class = e.class();
        Self::new(class, e.to_string())
    }
}

impl From<af_utils::PathError> for ApiError {
    fn from(e: af_utils::PathError) -> Self {
        Self::new(ErrorClass::PathTraversal, e.to_string())
    }
}

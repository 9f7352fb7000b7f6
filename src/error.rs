use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::notifier::NotifyError;
use crate::rate_limit::Rejection;
use crate::store::StoreError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Method not allowed")]
    MethodNotAllowed,

    #[error("Origin not allowed")]
    OriginNotAllowed,

    #[error("Rate limited: {0:?}")]
    RateLimited(Rejection),

    #[error("Malformed payload: {0}")]
    MalformedPayload(#[from] serde_json::Error),

    #[error("Failed to read request body: {0}")]
    Body(#[from] axum::Error),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Notification failed: {0}")]
    Notify(#[from] NotifyError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match &self {
            AppError::MethodNotAllowed => (
                StatusCode::METHOD_NOT_ALLOWED,
                Json(json!({ "message": "Method not allowed" })),
            )
                .into_response(),
            AppError::OriginNotAllowed => (
                StatusCode::FORBIDDEN,
                Json(json!({ "error": "Origin not allowed" })),
            )
                .into_response(),
            AppError::RateLimited(rejection) => {
                (StatusCode::TOO_MANY_REQUESTS, Json(rejection.body())).into_response()
            }
            AppError::MalformedPayload(_)
            | AppError::Body(_)
            | AppError::Store(_)
            | AppError::Notify(_) => {
                // detail stays in the log
                error!("Feedback submission failed: {self}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": "Internal server error" })),
                )
                    .into_response()
            }
        }
    }
}

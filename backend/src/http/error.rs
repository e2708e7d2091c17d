//! HTTP error handling.
//!
//! Every failure is rendered as
//! `{ "timestamp", "requestId", "statusCode", "error", "message" }` so API
//! consumers can branch on the status code alone.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::db::repository::RepositoryError;
use crate::models::ValidationError;
use crate::services::websoc::WebsocError;

/// Error response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiError {
    pub timestamp: DateTime<Utc>,
    pub request_id: String,
    pub status_code: u16,
    /// Short label, e.g. "Bad Request"
    pub error: String,
    /// Human-readable error message
    pub message: String,
}

/// Application error type for HTTP handlers.
#[derive(Debug)]
pub enum AppError {
    /// Resource not found
    NotFound(String),
    /// Invalid request (validation error)
    BadRequest(String),
    Repository(RepositoryError),
    Websoc(WebsocError),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Websoc(e) => StatusCode::from_u16(e.status_code())
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
        }
    }

    /// Message shown to the caller. Internal details are logged, not returned.
    fn public_message(&self) -> String {
        match self {
            AppError::NotFound(msg) | AppError::BadRequest(msg) => msg.clone(),
            AppError::Websoc(e @ WebsocError::Validation(_))
            | AppError::Websoc(e @ WebsocError::UpstreamUnavailable(_)) => e.to_string(),
            AppError::Repository(_)
            | AppError::Websoc(WebsocError::Repository(_)) => {
                "Internal server error. Please try again later.".to_string()
            }
        }
    }
}

/// An [`AppError`] tagged with the id of the request that produced it.
#[derive(Debug)]
pub struct RequestError {
    pub request_id: String,
    pub error: AppError,
}

impl IntoResponse for RequestError {
    fn into_response(self) -> Response {
        let status = self.error.status();
        if status.is_server_error() {
            error!(request_id = %self.request_id, error = ?self.error, "Request failed");
        }
        let body = ApiError {
            timestamp: Utc::now(),
            request_id: self.request_id,
            status_code: status.as_u16(),
            error: status
                .canonical_reason()
                .unwrap_or("Error")
                .to_string(),
            message: self.error.public_message(),
        };
        (status, Json(body)).into_response()
    }
}

impl From<RepositoryError> for AppError {
    fn from(err: RepositoryError) -> Self {
        AppError::Repository(err)
    }
}

impl From<WebsocError> for AppError {
    fn from(err: WebsocError) -> Self {
        AppError::Websoc(err)
    }
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        AppError::BadRequest(err.0)
    }
}

//! Request id extraction.
//!
//! `SetRequestIdLayer` stamps every request with an `x-request-id` header
//! before it reaches a handler; the extractor falls back to a fresh uuid
//! when the router runs without that layer (e.g. in handler tests).

use std::convert::Infallible;

use axum::{extract::FromRequestParts, http::request::Parts};
use uuid::Uuid;

use super::error::{AppError, RequestError};

pub const REQUEST_ID_HEADER: &str = "x-request-id";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestId(pub String);

impl RequestId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Attach this id to a handler error.
    pub fn error(&self, error: impl Into<AppError>) -> RequestError {
        RequestError {
            request_id: self.0.clone(),
            error: error.into(),
        }
    }
}

impl<S> FromRequestParts<S> for RequestId
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let id = parts
            .headers
            .get(REQUEST_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(|value| RequestId(value.to_string()))
            .unwrap_or_else(RequestId::generate);
        Ok(id)
    }
}

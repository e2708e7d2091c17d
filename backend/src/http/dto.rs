//! Data Transfer Objects for the HTTP API.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::request_id::RequestId;
use crate::models::{Quarter, Term, ValidationError};
use crate::services::ingest::IngestRequest;
use crate::services::job_tracker::{Job, JobStatus, LogEntry};

pub use crate::models::{WebsocParams, WebsocResponse};

/// Success envelope: `{ "timestamp", "requestId", "statusCode", "payload" }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T> {
    pub timestamp: DateTime<Utc>,
    pub request_id: String,
    pub status_code: u16,
    pub payload: T,
}

impl<T> ApiResponse<T> {
    pub fn ok(request_id: &RequestId, payload: T) -> Self {
        Self::with_status(request_id, StatusCode::OK, payload)
    }

    pub fn with_status(request_id: &RequestId, status: StatusCode, payload: T) -> Self {
        Self {
            timestamp: Utc::now(),
            request_id: request_id.as_str().to_string(),
            status_code: status.as_u16(),
            payload,
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::OK);
        (status, Json(self)).into_response()
    }
}

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Status of the service
    pub status: String,
    /// Version of the API
    pub version: String,
    /// Section cache status
    pub database: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TermDto {
    pub year: u16,
    pub quarter: Quarter,
    /// Registrar term code, e.g. "2024-92"
    pub code: String,
    /// Display name, e.g. "2024 Fall"
    pub name: String,
}

impl From<Term> for TermDto {
    fn from(term: Term) -> Self {
        Self {
            year: term.year,
            quarter: term.quarter,
            code: term.code(),
            name: term.to_string(),
        }
    }
}

/// Request body for starting an ingestion job.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestJobRequest {
    pub year: u16,
    pub quarter: String,
    pub departments: Vec<String>,
    #[serde(default)]
    pub tag_ge: bool,
}

impl IngestJobRequest {
    pub fn into_ingest_request(self) -> Result<IngestRequest, ValidationError> {
        let quarter: Quarter = self.quarter.parse().map_err(ValidationError::new)?;
        let departments: Vec<String> = self
            .departments
            .into_iter()
            .map(|d| d.trim().to_uppercase())
            .filter(|d| !d.is_empty())
            .collect();
        if departments.is_empty() {
            return Err(ValidationError::new("departments must not be empty"));
        }
        Ok(IngestRequest {
            term: Term::new(self.year, quarter),
            departments,
            tag_ge: self.tag_ge,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestJobResponse {
    /// Job ID for tracking the background run
    pub job_id: String,
    pub message: String,
}

/// Job status response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatusResponse {
    pub job_id: String,
    pub description: String,
    pub status: JobStatus,
    pub logs: Vec<LogEntry>,
    /// Result if completed
    pub result: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<Job> for JobStatusResponse {
    fn from(job: Job) -> Self {
        Self {
            job_id: job.job_id,
            description: job.description,
            status: job.status,
            logs: job.logs,
            result: job.result,
            created_at: job.created_at,
            completed_at: job.completed_at,
        }
    }
}

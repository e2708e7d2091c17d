//! HTTP handlers for the REST API.
//!
//! Each handler corresponds to an API endpoint and delegates to the
//! service layer.

use std::convert::Infallible;
use std::time::Duration;

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use futures::stream::Stream;
use tracing::info;

use super::dto::{
    ApiResponse, HealthResponse, IngestJobRequest, IngestJobResponse, JobStatusResponse, TermDto,
};
use super::error::{AppError, RequestError};
use super::request_id::RequestId;
use super::state::AppState;
use crate::models::{WebsocParams, WebsocRequest, WebsocResponse};
use crate::services::ingest::run_ingest_job;

/// Result type for handlers.
pub type HandlerResult<T> = Result<ApiResponse<T>, RequestError>;

// =============================================================================
// Health Check
// =============================================================================

/// GET /health
///
/// Health check endpoint to verify the service is running and the section
/// cache is reachable.
pub async fn health_check(
    State(state): State<AppState>,
    request_id: RequestId,
) -> ApiResponse<HealthResponse> {
    let db_status = match state.repository.health_check().await {
        Ok(true) => "connected".to_string(),
        Ok(false) => "disconnected".to_string(),
        Err(e) => format!("error: {}", e),
    };

    ApiResponse::ok(
        &request_id,
        HealthResponse {
            status: "ok".to_string(),
            version: "v1".to_string(),
            database: db_status,
        },
    )
}

// =============================================================================
// WebSoc
// =============================================================================

/// GET /v1/websoc
///
/// Query sections by term and filters; served from the cache when allowed.
pub async fn get_websoc(
    State(state): State<AppState>,
    request_id: RequestId,
    params: Result<Query<WebsocParams>, QueryRejection>,
) -> HandlerResult<WebsocResponse> {
    let Query(params) = params.map_err(|e| request_id.error(AppError::BadRequest(e.body_text())))?;
    let request = WebsocRequest::from_params(params).map_err(|e| request_id.error(e))?;

    let response = state
        .websoc
        .query_websoc(&request)
        .await
        .map_err(|e| request_id.error(e))?;

    Ok(ApiResponse::ok(&request_id, response))
}

/// GET /v1/websoc/terms
///
/// Terms present in the cache, newest first.
pub async fn list_terms(
    State(state): State<AppState>,
    request_id: RequestId,
) -> HandlerResult<Vec<TermDto>> {
    let terms = state
        .repository
        .list_terms()
        .await
        .map_err(|e| request_id.error(e))?;
    Ok(ApiResponse::ok(
        &request_id,
        terms.into_iter().map(TermDto::from).collect(),
    ))
}

/// POST /v1/websoc/ingest
///
/// Start a background ingestion job. Returns a job ID for tracking progress.
pub async fn start_ingest(
    State(state): State<AppState>,
    request_id: RequestId,
    body: Result<Json<IngestJobRequest>, JsonRejection>,
) -> HandlerResult<IngestJobResponse> {
    let Json(body) = body.map_err(|e| request_id.error(AppError::BadRequest(e.body_text())))?;
    let request = body
        .into_ingest_request()
        .map_err(|e| request_id.error(e))?;

    let job_id = state.job_tracker.create_job(format!(
        "ingest {} ({} departments)",
        request.term,
        request.departments.len()
    ));
    info!(job_id = %job_id, term = %request.term, "Ingestion job accepted");

    let tracker = state.job_tracker.clone();
    let service = state.websoc.clone();
    let spawned_id = job_id.clone();
    tokio::spawn(async move {
        let _ = run_ingest_job(spawned_id, tracker, service, request).await;
    });

    Ok(ApiResponse::with_status(
        &request_id,
        StatusCode::ACCEPTED,
        IngestJobResponse {
            message: format!("Ingestion started. Track progress at /v1/jobs/{}/logs", job_id),
            job_id,
        },
    ))
}

// =============================================================================
// Jobs
// =============================================================================

/// GET /v1/jobs/{job_id}
pub async fn get_job_status(
    State(state): State<AppState>,
    request_id: RequestId,
    Path(job_id): Path<String>,
) -> HandlerResult<JobStatusResponse> {
    let job = state
        .job_tracker
        .get_job(&job_id)
        .ok_or_else(|| request_id.error(AppError::NotFound(format!("Job {} not found", job_id))))?;

    Ok(ApiResponse::ok(&request_id, job.into()))
}

/// GET /v1/jobs/{job_id}/logs
///
/// Stream job logs via Server-Sent Events (SSE). A final `complete` event
/// carries the job status and result.
pub async fn stream_job_logs(
    State(state): State<AppState>,
    request_id: RequestId,
    Path(job_id): Path<String>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, RequestError> {
    if state.job_tracker.get_job(&job_id).is_none() {
        return Err(request_id.error(AppError::NotFound(format!("Job {} not found", job_id))));
    }

    let tracker = state.job_tracker.clone();
    let stream = async_stream::stream! {
        let mut sent = 0;
        loop {
            let (logs, status) = tracker.logs_since(&job_id, sent);
            sent += logs.len();
            for log in &logs {
                let data = serde_json::to_string(log).unwrap_or_default();
                yield Ok(Event::default().data(data));
            }

            match status {
                Some(status) if status.is_finished() => {
                    let result = tracker.get_job(&job_id).and_then(|job| job.result);
                    let final_event = serde_json::json!({
                        "status": status,
                        "result": result,
                    });
                    yield Ok(Event::default()
                        .event("complete")
                        .data(final_event.to_string()));
                    break;
                }
                Some(_) => {}
                None => break,
            }

            tokio::time::sleep(Duration::from_millis(200)).await;
        }
    };

    Ok(Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(1))
            .text("keep-alive"),
    ))
}

//! Serving path: answer one WebSoc request from the cache or the upstream.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, warn};

use super::batch::{self, BatchError, RetryPolicy};
use super::merge::merge_responses;
use super::sort::sort_response;
use crate::db::models::SectionFilter;
use crate::db::repository::{RepositoryError, SectionRepository};
use crate::models::{ValidationError, WebsocRequest, WebsocResponse};
use crate::upstream::WebsocClient;

/// Largest result served unless the caller asks for cache-only data.
pub const DEFAULT_SECTION_LIMIT: usize = 900;

/// Errors surfaced to callers of the serving path.
#[derive(Debug, Error)]
pub enum WebsocError {
    #[error("{0}")]
    Validation(String),

    /// Per-query reasons are logged by the executor; callers only get this.
    #[error("WebSoc is unavailable right now. Please try again later.")]
    UpstreamUnavailable(#[source] BatchError),

    #[error("Section cache error: {0}")]
    Repository(#[from] RepositoryError),
}

impl WebsocError {
    /// HTTP-equivalent status code.
    pub fn status_code(&self) -> u16 {
        match self {
            WebsocError::Validation(_) => 400,
            WebsocError::UpstreamUnavailable(_) | WebsocError::Repository(_) => 500,
        }
    }

    /// Short label for the error envelope.
    pub fn label(&self) -> &'static str {
        match self {
            WebsocError::Validation(_) => "Bad Request",
            WebsocError::UpstreamUnavailable(_) | WebsocError::Repository(_) => {
                "Internal Server Error"
            }
        }
    }
}

impl From<ValidationError> for WebsocError {
    fn from(err: ValidationError) -> Self {
        WebsocError::Validation(err.0)
    }
}

impl From<BatchError> for WebsocError {
    fn from(err: BatchError) -> Self {
        WebsocError::UpstreamUnavailable(err)
    }
}

/// Reject results above `limit` sections unless `cache_only` is set.
pub fn enforce_section_limit(
    response: WebsocResponse,
    limit: usize,
    cache_only: bool,
) -> Result<WebsocResponse, WebsocError> {
    let count = response.section_count();
    if !cache_only && count > limit {
        return Err(WebsocError::Validation(format!(
            "More than {} sections matched your search criteria ({} found). \
             Please narrow your search, or set cacheOnly to retrieve every cached section.",
            limit, count
        )));
    }
    Ok(response)
}

/// Cache and upstream handles shared by every request.
#[derive(Clone)]
pub struct WebsocService {
    repository: Arc<dyn SectionRepository>,
    client: Arc<dyn WebsocClient>,
    policy: RetryPolicy,
    section_limit: usize,
}

impl WebsocService {
    pub fn new(repository: Arc<dyn SectionRepository>, client: Arc<dyn WebsocClient>) -> Self {
        Self {
            repository,
            client,
            policy: RetryPolicy::default(),
            section_limit: DEFAULT_SECTION_LIMIT,
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_section_limit(mut self, limit: usize) -> Self {
        self.section_limit = limit;
        self
    }

    pub fn repository(&self) -> &Arc<dyn SectionRepository> {
        &self.repository
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn section_limit(&self) -> usize {
        self.section_limit
    }

    /// Answer a request with a merged, sorted tree.
    ///
    /// With `cache` set, matching cached fragments are served when any
    /// exist. An empty cache result falls through to WebSoc, unless
    /// `cache_only` is also set, in which case the empty tree is returned.
    pub async fn query_websoc(&self, request: &WebsocRequest) -> Result<WebsocResponse, WebsocError> {
        request.validate()?;

        if request.cache {
            let filter = SectionFilter::from_request(request);
            let rows = self.repository.find_sections(&filter).await?;
            debug!(term = %request.term, rows = rows.len(), "Cache lookup finished");

            if !rows.is_empty() {
                let merged = merge_responses(rows.iter().map(|row| &row.data));
                let merged = enforce_section_limit(merged, self.section_limit, request.cache_only)?;
                return Ok(sort_response(merged));
            }
            if request.cache_only {
                return Ok(WebsocResponse::default());
            }
            info!(term = %request.term, "Cache miss, querying WebSoc");
        }

        let merged = self.fetch_upstream(request).await?;
        let merged = enforce_section_limit(merged, self.section_limit, request.cache_only)?;
        Ok(sort_response(merged))
    }

    /// Plan and execute a request against WebSoc. The result is merged but
    /// not sorted.
    pub async fn fetch_upstream(&self, request: &WebsocRequest) -> Result<WebsocResponse, WebsocError> {
        let queries = batch::plan(request);
        debug!(term = %request.term, queries = queries.len(), "Planned WebSoc queries");
        batch::execute(self.client.as_ref(), queries, &self.policy)
            .await
            .map_err(|e| {
                warn!(term = %request.term, error = %e, "WebSoc retry budget exhausted");
                WebsocError::from(e)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Course, Department, School, Section};

    fn response_with_sections(n: usize) -> WebsocResponse {
        WebsocResponse {
            schools: vec![School {
                school_name: "ICS".into(),
                departments: vec![Department {
                    dept_code: "I&C SCI".into(),
                    courses: vec![Course {
                        course_number: "31".into(),
                        course_title: "INTRO TO PROGRMG".into(),
                        sections: (0..n)
                            .map(|i| Section {
                                section_code: format!("{:05}", i),
                                ..Default::default()
                            })
                            .collect(),
                        ..Default::default()
                    }],
                    ..Default::default()
                }],
                ..Default::default()
            }],
        }
    }

    #[test]
    fn test_overflow_rejected_without_cache_only() {
        let err = enforce_section_limit(response_with_sections(901), 900, false).unwrap_err();
        assert_eq!(err.status_code(), 400);
        assert!(err.to_string().contains("900"));
    }

    #[test]
    fn test_overflow_allowed_with_cache_only() {
        let response = enforce_section_limit(response_with_sections(901), 900, true).unwrap();
        assert_eq!(response.section_count(), 901);
    }

    #[test]
    fn test_limit_is_inclusive() {
        assert!(enforce_section_limit(response_with_sections(900), 900, false).is_ok());
    }

    #[test]
    fn test_exhausted_upstream_maps_to_500() {
        let err = WebsocError::from(BatchError::Exhausted {
            failed: 1,
            total: 4,
            attempts: 3,
        });
        assert_eq!(err.status_code(), 500);
        assert!(err.to_string().contains("try again later"));
        assert!(!err.to_string().contains("4"));
    }
}

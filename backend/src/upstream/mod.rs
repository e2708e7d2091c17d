//! WebSoc upstream collaborator.
//!
//! The registrar endpoint accepts a POSTed form of term + filter fields and
//! answers with a School → Department → Course → Section document in raw
//! form (string fields, un-normalized times, one building per meeting).
//! [`WebsocClient`] hides how that document is fetched; implementations hand
//! back an already normalized [`WebsocResponse`].

pub mod http;
pub mod raw;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{Term, WebsocRequest, WebsocResponse};

pub use http::HttpWebsocClient;
pub use raw::RawResponse;

/// A single planned upstream call failed.
///
/// Every variant is treated as transient by the batch executor.
#[derive(Debug, Clone, Error)]
pub enum UpstreamError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Upstream returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Failed to decode upstream document: {0}")]
    Decode(String),

    #[error("Client configuration error: {0}")]
    Configuration(String),
}

/// One upstream-compliant call.
///
/// `filters` carries every non-batched filter of the originating request.
/// The batched fields are taken from `units` and `section_codes` on the query
/// itself, never from `filters`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamQuery {
    pub filters: Arc<WebsocRequest>,
    pub units: Option<String>,
    pub section_codes: Vec<String>,
}

impl UpstreamQuery {
    pub fn term(&self) -> Term {
        self.filters.term
    }

    /// Form fields understood by the WebSoc endpoint.
    pub fn form_fields(&self) -> Vec<(&'static str, String)> {
        let f = &self.filters;
        let mut fields = vec![
            ("YearTerm", f.term.code()),
            ("ShowComments", "on".to_string()),
            ("ShowFinals", "on".to_string()),
            (
                "Breadth",
                f.ge.map(|g| g.as_str().to_string())
                    .unwrap_or_else(|| "ANY".to_string()),
            ),
            (
                "Dept",
                f.department.clone().unwrap_or_else(|| " ALL".to_string()),
            ),
            ("Division", f.division.upstream_value().to_string()),
            (
                "ClassType",
                f.section_type.clone().unwrap_or_else(|| "ALL".to_string()),
            ),
            ("FullCourses", f.full_courses.as_str().to_string()),
            ("CancelledCourses", f.cancelled_courses.as_str().to_string()),
        ];

        let optional = [
            ("CourseTitle", f.course_title.clone()),
            ("CourseNum", f.course_number.clone()),
            ("InstrName", f.instructor_name.clone()),
            ("Days", f.days.clone()),
            ("Bldg", f.building.clone()),
            ("Room", f.room.clone()),
            ("StartTime", f.start_time_param()),
            ("EndTime", f.end_time_param()),
            ("MaxCap", f.max_capacity.clone()),
            ("Units", self.units.clone()),
        ];
        fields.extend(
            optional
                .into_iter()
                .filter_map(|(name, value)| value.map(|v| (name, v))),
        );

        if !self.section_codes.is_empty() {
            fields.push(("CourseCodes", self.section_codes.join(",")));
        }
        fields
    }
}

/// Upstream WebSoc data source.
#[async_trait]
pub trait WebsocClient: Send + Sync {
    async fn query(&self, query: &UpstreamQuery) -> Result<WebsocResponse, UpstreamError>;
}

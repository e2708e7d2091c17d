//! Cache ingestion.
//!
//! Scrapes one term department by department, tags courses with the GE
//! categories they satisfy, flattens the merged tree into one cache row per
//! section and writes the rows whose checksum changed. Designed to run as a
//! background job reporting progress through the [`JobTracker`].

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use super::job_tracker::{JobTracker, LogLevel};
use super::merge::merge_into;
use super::websoc::WebsocService;
use crate::db::models::{SectionFilter, StoredSection};
use crate::db::repository::RepositoryError;
use crate::models::{GeCategory, Term, WebsocRequest, WebsocResponse};

/// What to ingest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestRequest {
    pub term: Term,
    pub departments: Vec<String>,
    /// Also query every GE category and tag matching courses.
    #[serde(default)]
    pub tag_ge: bool,
}

/// Outcome of one ingestion run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestSummary {
    pub term: Option<Term>,
    pub departments_requested: usize,
    pub departments_failed: Vec<String>,
    pub ge_categories_failed: Vec<GeCategory>,
    pub sections_seen: usize,
    pub rows_written: usize,
    pub rows_unchanged: usize,
    pub rows_deleted: usize,
}

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("At least one department is required")]
    NoDepartments,

    #[error("Every department failed to download ({0} attempted)")]
    NothingFetched(usize),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Run one ingestion pass.
///
/// Departments that exhaust their retry budget are recorded in the summary
/// and skipped; the run fails only if none could be fetched. A GE category
/// that fails keeps the tags already stored for it. Cached sections missing
/// from a department that was fetched are deleted.
pub async fn ingest_term<P>(
    service: &WebsocService,
    request: &IngestRequest,
    progress: P,
) -> Result<IngestSummary, IngestError>
where
    P: Fn(LogLevel, String) + Send + Sync,
{
    if request.departments.is_empty() {
        return Err(IngestError::NoDepartments);
    }
    let term = request.term;
    let mut summary = IngestSummary {
        term: Some(term),
        departments_requested: request.departments.len(),
        ..Default::default()
    };

    let mut merged = WebsocResponse::default();
    let mut fetched = Vec::new();
    for department in &request.departments {
        progress(LogLevel::Info, format!("Fetching {} for {}", department, term));
        let query = WebsocRequest::for_department(term, department.clone());
        match service.fetch_upstream(&query).await {
            Ok(response) => {
                progress(
                    LogLevel::Success,
                    format!("✓ {}: {} sections", department, response.section_count()),
                );
                merge_into(&mut merged, &response);
                fetched.push(department.clone());
            }
            Err(e) => {
                warn!(%term, department = %department, error = ?e, "Skipping department");
                progress(LogLevel::Warning, format!("✗ {}: {}", department, e));
                summary.departments_failed.push(department.clone());
            }
        }
    }
    if fetched.is_empty() {
        return Err(IngestError::NothingFetched(request.departments.len()));
    }

    let tags = if request.tag_ge {
        progress(LogLevel::Info, "Tagging GE categories".to_string());
        let mut tags = collect_ge_tags(service, term, &mut summary, &progress).await;
        for &ge in &summary.ge_categories_failed {
            keep_stored_tags(service, term, ge, &mut tags).await?;
        }
        tags
    } else {
        HashMap::new()
    };

    let rows = flatten(term, &merged, &tags)?;
    summary.sections_seen = rows.len();

    let existing = service.repository().section_checksums(term).await?;
    let changed: Vec<StoredSection> = rows
        .iter()
        .filter(|row| existing.get(&row.section_code) != Some(&row.checksum))
        .cloned()
        .collect();
    summary.rows_unchanged = summary.sections_seen - changed.len();

    progress(
        LogLevel::Info,
        format!(
            "Writing {} changed sections ({} unchanged)",
            changed.len(),
            summary.rows_unchanged
        ),
    );
    summary.rows_written = service.repository().upsert_sections(&changed).await?;

    let stale = stale_sections(service, term, &fetched, &rows).await?;
    if !stale.is_empty() {
        progress(
            LogLevel::Info,
            format!("Removing {} sections no longer listed", stale.len()),
        );
        summary.rows_deleted = service.repository().delete_sections(term, &stale).await?;
    }

    info!(
        %term,
        sections = summary.sections_seen,
        written = summary.rows_written,
        deleted = summary.rows_deleted,
        failed_departments = summary.departments_failed.len(),
        "Ingestion finished"
    );
    Ok(summary)
}

type CourseKey = (String, String);

async fn collect_ge_tags<P>(
    service: &WebsocService,
    term: Term,
    summary: &mut IngestSummary,
    progress: &P,
) -> HashMap<CourseKey, Vec<GeCategory>>
where
    P: Fn(LogLevel, String) + Send + Sync,
{
    let mut tags: HashMap<CourseKey, Vec<GeCategory>> = HashMap::new();
    for &ge in GeCategory::ALL {
        let query = WebsocRequest::for_ge(term, ge);
        match service.fetch_upstream(&query).await {
            Ok(response) => {
                for path in response.paths() {
                    let key = (
                        path.department.dept_code.clone(),
                        path.course.course_number.clone(),
                    );
                    let entry = tags.entry(key).or_default();
                    if !entry.contains(&ge) {
                        entry.push(ge);
                    }
                }
            }
            Err(e) => {
                warn!(%term, %ge, error = ?e, "GE category fetch failed");
                progress(LogLevel::Warning, format!("✗ {}: {}", ge, e));
                summary.ge_categories_failed.push(ge);
            }
        }
    }
    tags
}

/// Re-apply `ge` to every course the cache already tags with it.
async fn keep_stored_tags(
    service: &WebsocService,
    term: Term,
    ge: GeCategory,
    tags: &mut HashMap<CourseKey, Vec<GeCategory>>,
) -> Result<(), RepositoryError> {
    let filter = SectionFilter {
        ge: Some(ge),
        ..SectionFilter::for_term(term)
    };
    for row in service.repository().find_sections(&filter).await? {
        let entry = tags
            .entry((row.department, row.course_number))
            .or_default();
        if !entry.contains(&ge) {
            entry.push(ge);
        }
    }
    Ok(())
}

/// Codes cached for the fetched departments that the fresh rows no longer
/// contain.
async fn stale_sections(
    service: &WebsocService,
    term: Term,
    fetched: &[String],
    rows: &[StoredSection],
) -> Result<Vec<String>, RepositoryError> {
    let seen: HashSet<&str> = rows.iter().map(|row| row.section_code.as_str()).collect();
    let mut stale = Vec::new();
    for department in fetched {
        let filter = SectionFilter {
            department: Some(department.clone()),
            ..SectionFilter::for_term(term)
        };
        for row in service.repository().find_sections(&filter).await? {
            if !seen.contains(row.section_code.as_str()) {
                stale.push(row.section_code);
            }
        }
    }
    Ok(stale)
}

/// One cache row per section in `merged`.
pub fn flatten(
    term: Term,
    merged: &WebsocResponse,
    tags: &HashMap<CourseKey, Vec<GeCategory>>,
) -> Result<Vec<StoredSection>, RepositoryError> {
    merged
        .paths()
        .map(|path| {
            let key = (
                path.department.dept_code.clone(),
                path.course.course_number.clone(),
            );
            let mut ge = tags.get(&key).cloned().unwrap_or_default();
            ge.sort_by_key(|g| GeCategory::ALL.iter().position(|known| known == g));
            StoredSection::from_path(term, path, ge)
        })
        .collect()
}

/// Background wrapper around [`ingest_term`] that reports to `tracker`.
pub async fn run_ingest_job(
    job_id: String,
    tracker: JobTracker,
    service: WebsocService,
    request: IngestRequest,
) -> Result<IngestSummary, String> {
    tracker.log(
        &job_id,
        LogLevel::Info,
        format!(
            "Starting ingestion of {} departments for {}",
            request.departments.len(),
            request.term
        ),
    );

    let progress = |level: LogLevel, message: String| tracker.log(&job_id, level, message);
    match ingest_term(&service, &request, progress).await {
        Ok(summary) => {
            tracker.log(
                &job_id,
                LogLevel::Success,
                format!(
                    "✓ Ingested {} sections ({} written, {} unchanged, {} removed)",
                    summary.sections_seen,
                    summary.rows_written,
                    summary.rows_unchanged,
                    summary.rows_deleted
                ),
            );
            tracker.complete_job(&job_id, serde_json::to_value(&summary).ok());
            Ok(summary)
        }
        Err(e) => {
            let msg = format!("Ingestion failed: {}", e);
            tracker.fail_job(&job_id, &msg);
            Err(msg)
        }
    }
}

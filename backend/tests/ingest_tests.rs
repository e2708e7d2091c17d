//! Ingestion path: scrape, tag, flatten and write only what changed.

mod support;

use std::sync::Arc;

use parking_lot::Mutex;
use support::{fall_2024, tree, MockWebsocClient};
use websoc_api::db::{LocalRepository, SectionFilter, SectionRepository};
use websoc_api::models::GeCategory;
use websoc_api::services::{
    ingest_term, run_ingest_job, IngestError, IngestRequest, JobStatus, JobTracker, LogLevel,
    WebsocService,
};

fn request(departments: &[&str], tag_ge: bool) -> IngestRequest {
    IngestRequest {
        term: fall_2024(),
        departments: departments.iter().map(|d| d.to_string()).collect(),
        tag_ge,
    }
}

fn scripted_client() -> MockWebsocClient {
    MockWebsocClient::new()
        .with_department("COMPSCI", tree("COMPSCI", "161", &["34250", "34251"]))
        .with_department("I&C SCI", tree("I&C SCI", "31", &["36010"]))
}

fn no_progress(_: LogLevel, _: String) {}

#[tokio::test]
async fn test_ingest_writes_one_row_per_section() {
    let repo = Arc::new(LocalRepository::new());
    let svc = WebsocService::new(repo.clone(), Arc::new(scripted_client()));

    let summary = ingest_term(&svc, &request(&["COMPSCI", "I&C SCI"], false), no_progress)
        .await
        .unwrap();

    assert_eq!(summary.sections_seen, 3);
    assert_eq!(summary.rows_written, 3);
    assert_eq!(summary.rows_unchanged, 0);
    assert!(summary.departments_failed.is_empty());
    assert_eq!(repo.section_count(), 3);

    let rows = repo
        .find_sections(&SectionFilter::for_term(fall_2024()))
        .await
        .unwrap();
    assert!(rows.iter().all(|row| row.data.section_count() == 1));
}

#[tokio::test]
async fn test_second_run_skips_unchanged_rows() {
    let repo = Arc::new(LocalRepository::new());
    let svc = WebsocService::new(repo.clone(), Arc::new(scripted_client()));
    let req = request(&["COMPSCI", "I&C SCI"], false);

    ingest_term(&svc, &req, no_progress).await.unwrap();
    let again = ingest_term(&svc, &req, no_progress).await.unwrap();

    assert_eq!(again.rows_written, 0);
    assert_eq!(again.rows_unchanged, 3);
}

#[tokio::test]
async fn test_ge_tags_are_attached_to_courses() {
    let repo = Arc::new(LocalRepository::new());
    let client = scripted_client().with_ge(GeCategory::Ge5B, tree("I&C SCI", "31", &["36010"]));
    let svc = WebsocService::new(repo.clone(), Arc::new(client));

    ingest_term(&svc, &request(&["COMPSCI", "I&C SCI"], true), no_progress)
        .await
        .unwrap();

    let mut filter = SectionFilter::for_term(fall_2024());
    filter.ge = Some(GeCategory::Ge5B);
    let tagged = repo.find_sections(&filter).await.unwrap();
    assert_eq!(tagged.len(), 1);
    assert_eq!(tagged[0].section_code, "36010");
    assert_eq!(tagged[0].ge_categories, vec![GeCategory::Ge5B]);
}

#[tokio::test(start_paused = true)]
async fn test_failed_department_is_skipped() {
    let repo = Arc::new(LocalRepository::new());
    let client = scripted_client().fail_times("I&C SCI", 10);
    let svc = WebsocService::new(repo.clone(), Arc::new(client));

    let logged = Mutex::new(Vec::new());
    let summary = ingest_term(&svc, &request(&["COMPSCI", "I&C SCI"], false), |level, msg| {
        logged.lock().push((level, msg))
    })
    .await
    .unwrap();

    assert_eq!(summary.departments_failed, vec!["I&C SCI"]);
    assert_eq!(summary.rows_written, 2);
    assert!(logged
        .lock()
        .iter()
        .any(|(level, msg)| *level == LogLevel::Warning && msg.contains("I&C SCI")));
}

#[tokio::test(start_paused = true)]
async fn test_all_departments_failing_is_an_error() {
    let client = scripted_client().fail_times("COMPSCI", 10);
    let svc = WebsocService::new(Arc::new(LocalRepository::new()), Arc::new(client));

    let err = ingest_term(&svc, &request(&["COMPSCI"], false), no_progress)
        .await
        .unwrap_err();
    assert!(matches!(err, IngestError::NothingFetched(1)));
}

#[tokio::test]
async fn test_empty_department_list_is_rejected() {
    let svc = WebsocService::new(Arc::new(LocalRepository::new()), Arc::new(scripted_client()));
    let err = ingest_term(&svc, &request(&[], false), no_progress)
        .await
        .unwrap_err();
    assert!(matches!(err, IngestError::NoDepartments));
}

#[tokio::test]
async fn test_background_job_reports_to_tracker() {
    let repo = Arc::new(LocalRepository::new());
    let svc = WebsocService::new(repo, Arc::new(scripted_client()));
    let tracker = JobTracker::new();
    let job_id = tracker.create_job("ingest");

    let summary = run_ingest_job(job_id.clone(), tracker.clone(), svc, request(&["COMPSCI"], false))
        .await
        .unwrap();

    let job = tracker.get_job(&job_id).unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.result.unwrap()["rowsWritten"], summary.rows_written);
    assert!(job.logs.iter().any(|l| l.level == LogLevel::Success));
}

#[tokio::test]
async fn test_background_job_failure_marks_job_failed() {
    let svc = WebsocService::new(Arc::new(LocalRepository::new()), Arc::new(scripted_client()));
    let tracker = JobTracker::new();
    let job_id = tracker.create_job("ingest");

    let result = run_ingest_job(job_id.clone(), tracker.clone(), svc, request(&[], false)).await;
    assert!(result.is_err());
    assert_eq!(tracker.get_job(&job_id).unwrap().status, JobStatus::Failed);
}

#[tokio::test(start_paused = true)]
async fn test_failed_ge_category_keeps_stored_tags() {
    let repo = Arc::new(LocalRepository::new());
    let ge2 = || tree("COMPSCI", "161", &["34250"]);
    let req = request(&["COMPSCI", "I&C SCI"], true);

    let first = WebsocService::new(
        repo.clone(),
        Arc::new(scripted_client().with_ge(GeCategory::Ge2, ge2())),
    );
    ingest_term(&first, &req, no_progress).await.unwrap();

    let flaky = scripted_client()
        .with_ge(GeCategory::Ge2, ge2())
        .fail_times("GE-2", 5);
    let second = WebsocService::new(repo.clone(), Arc::new(flaky));
    let summary = ingest_term(&second, &req, no_progress).await.unwrap();

    assert_eq!(summary.ge_categories_failed, vec![GeCategory::Ge2]);
    assert_eq!(summary.rows_written, 0);
    assert_eq!(summary.rows_unchanged, 3);

    let mut filter = SectionFilter::for_term(fall_2024());
    filter.ge = Some(GeCategory::Ge2);
    let tagged = repo.find_sections(&filter).await.unwrap();
    let codes: Vec<_> = tagged.iter().map(|row| row.section_code.as_str()).collect();
    assert_eq!(codes, ["34250", "34251"]);
}

#[tokio::test]
async fn test_sections_dropped_upstream_are_removed() {
    let repo = Arc::new(LocalRepository::new());
    let req = request(&["COMPSCI", "I&C SCI"], false);
    let first = WebsocService::new(repo.clone(), Arc::new(scripted_client()));
    ingest_term(&first, &req, no_progress).await.unwrap();

    let shrunk = MockWebsocClient::new()
        .with_department("COMPSCI", tree("COMPSCI", "161", &["34250"]))
        .with_department("I&C SCI", tree("I&C SCI", "31", &["36010"]));
    let second = WebsocService::new(repo.clone(), Arc::new(shrunk));
    let summary = ingest_term(&second, &req, no_progress).await.unwrap();

    assert_eq!(summary.rows_deleted, 1);
    assert_eq!(repo.section_count(), 2);
    let codes: Vec<_> = repo
        .find_sections(&SectionFilter::for_term(fall_2024()))
        .await
        .unwrap()
        .into_iter()
        .map(|row| row.section_code)
        .collect();
    assert_eq!(codes, ["34250", "36010"]);
}

#[tokio::test(start_paused = true)]
async fn test_failed_department_keeps_its_cached_sections() {
    let repo = Arc::new(LocalRepository::new());
    let req = request(&["COMPSCI", "I&C SCI"], false);
    let first = WebsocService::new(repo.clone(), Arc::new(scripted_client()));
    ingest_term(&first, &req, no_progress).await.unwrap();

    let second = WebsocService::new(
        repo.clone(),
        Arc::new(scripted_client().fail_times("I&C SCI", 10)),
    );
    let summary = ingest_term(&second, &req, no_progress).await.unwrap();

    assert_eq!(summary.rows_deleted, 0);
    assert_eq!(repo.section_count(), 3);
}

//! Batch planning and the retrying executor against a scripted upstream.

mod support;

use std::time::Duration;

use support::{fall_2024, section_codes, MockWebsocClient};
use websoc_api::models::WebsocRequest;
use websoc_api::services::batch::{execute, plan, BatchError, RetryPolicy};
use websoc_api::services::sort_response;

fn codes(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("{}", 34000 + i)).collect()
}

fn request_with_codes(n: usize) -> WebsocRequest {
    WebsocRequest {
        section_codes: codes(n),
        ..WebsocRequest::new(fall_2024())
    }
}

#[test]
fn test_plan_cartesian_product_of_units_and_code_chunks() {
    let request = WebsocRequest {
        units: vec!["4".into(), "5".into()],
        ..request_with_codes(12)
    };
    let queries = plan(&request);
    assert_eq!(queries.len(), 6);

    for query in &queries {
        assert!(query.section_codes.len() <= 5);
        assert!(query.units.is_some());
    }
    let four_unit_codes: Vec<String> = queries
        .iter()
        .filter(|q| q.units.as_deref() == Some("4"))
        .flat_map(|q| q.section_codes.clone())
        .collect();
    assert_eq!(four_unit_codes, codes(12));
}

#[test]
fn test_plan_single_query_when_within_limits() {
    let queries = plan(&request_with_codes(5));
    assert_eq!(queries.len(), 1);
    assert_eq!(queries[0].units, None);
}

#[tokio::test(start_paused = true)]
async fn test_retry_rounds_recover_every_query() {
    // 50 codes -> 10 queries. Three fail in round 0; two of them recover in
    // round 1 and the last one in round 2.
    let queries = plan(&request_with_codes(50));
    assert_eq!(queries.len(), 10);
    let key = |i: usize| MockWebsocClient::key(&queries[i]);

    let client = MockWebsocClient::new()
        .fail_times(&key(1), 1)
        .fail_times(&key(4), 1)
        .fail_times(&key(7), 2);

    let started = tokio::time::Instant::now();
    let merged = execute(&client, queries.clone(), &RetryPolicy::default())
        .await
        .unwrap();
    let elapsed = started.elapsed();

    assert!(elapsed >= Duration::from_secs(3), "elapsed {:?}", elapsed);
    assert_eq!(merged.section_count(), 50);
    assert_eq!(section_codes(&sort_response(merged)), codes(50));

    // 10 first-round calls, 3 in round 1, 1 in round 2.
    assert_eq!(client.calls().len(), 14);
}

#[tokio::test(start_paused = true)]
async fn test_exhausted_budget_fails_whole_execution() {
    let queries = plan(&request_with_codes(10));
    let stubborn = MockWebsocClient::key(&queries[1]);
    let client = MockWebsocClient::new().fail_times(&stubborn, 10);

    let err = execute(&client, queries, &RetryPolicy::default())
        .await
        .unwrap_err();
    assert_eq!(
        err,
        BatchError::Exhausted {
            failed: 1,
            total: 2,
            attempts: 3
        }
    );
}

#[tokio::test(start_paused = true)]
async fn test_zero_retries_means_single_attempt() {
    let queries = plan(&request_with_codes(3));
    let key = MockWebsocClient::key(&queries[0]);
    let client = MockWebsocClient::new().fail_times(&key, 1);

    let policy = RetryPolicy::new(0, Duration::from_millis(1000));
    assert!(execute(&client, queries, &policy).await.is_err());
    assert_eq!(client.calls().len(), 1);
}

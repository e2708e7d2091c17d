//! Batch query planning and retrying execution.
//!
//! WebSoc rejects calls carrying more than one `units` value or more than
//! five section codes. [`plan`] expands a request into calls that respect
//! those limits; [`execute`] fans them out round by round, merging each
//! success as it lands and retrying only the failures.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use thiserror::Error;
use tracing::{info, warn};

use super::merge::merge_into;
use crate::models::{WebsocRequest, WebsocResponse};
use crate::upstream::{UpstreamQuery, WebsocClient};

pub const MAX_UNITS_PER_QUERY: usize = 1;
pub const MAX_SECTION_CODES_PER_QUERY: usize = 5;

/// Retry budget for one execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retry rounds after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry round; doubles every round.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_millis(1000),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
        }
    }

    /// Backoff before retry round `retry_index` (0 for the first retry).
    pub fn delay_for(&self, retry_index: u32) -> Duration {
        self.base_delay
            .saturating_mul(2u32.saturating_pow(retry_index))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BatchError {
    #[error("{failed} of {total} upstream queries still failing after {attempts} attempts")]
    Exhausted {
        failed: usize,
        total: usize,
        attempts: u32,
    },
}

/// Expand a request into upstream-compliant queries.
///
/// Yields `max(1, |units|) * max(1, ceil(|section_codes| / 5))` queries, all
/// sharing the request's other filters.
pub fn plan(request: &WebsocRequest) -> Vec<UpstreamQuery> {
    let filters = Arc::new(request.clone());

    if request.units.len() <= MAX_UNITS_PER_QUERY
        && request.section_codes.len() <= MAX_SECTION_CODES_PER_QUERY
    {
        return vec![UpstreamQuery {
            units: request.units.first().cloned(),
            section_codes: request.section_codes.clone(),
            filters,
        }];
    }

    let units: Vec<Option<String>> = if request.units.is_empty() {
        vec![None]
    } else {
        request.units.iter().cloned().map(Some).collect()
    };
    let chunks: Vec<Vec<String>> = if request.section_codes.is_empty() {
        vec![Vec::new()]
    } else {
        request
            .section_codes
            .chunks(MAX_SECTION_CODES_PER_QUERY)
            .map(<[String]>::to_vec)
            .collect()
    };

    units
        .iter()
        .flat_map(|unit| {
            chunks.iter().map(|chunk| UpstreamQuery {
                filters: Arc::clone(&filters),
                units: unit.clone(),
                section_codes: chunk.clone(),
            })
        })
        .collect()
}

/// Run planned queries with bounded retries and merge every success.
///
/// Any query still failing once the retry budget is spent fails the whole
/// execution; partial merges are never returned.
pub async fn execute(
    client: &dyn WebsocClient,
    queries: Vec<UpstreamQuery>,
    policy: &RetryPolicy,
) -> Result<WebsocResponse, BatchError> {
    let total = queries.len();
    let mut merged = WebsocResponse::default();
    let mut pending = queries;

    for attempt in 0..=policy.max_retries {
        if attempt > 0 {
            let delay = policy.delay_for(attempt - 1);
            info!(
                attempt,
                pending = pending.len(),
                delay_ms = delay.as_millis() as u64,
                "Retrying failed WebSoc queries"
            );
            tokio::time::sleep(delay).await;
        }

        let results = join_all(pending.iter().map(|query| client.query(query))).await;

        let mut failed = Vec::new();
        for (query, result) in pending.into_iter().zip(results) {
            match result {
                Ok(response) => merge_into(&mut merged, &response),
                Err(e) => {
                    warn!(
                        attempt,
                        term = %query.term(),
                        units = ?query.units,
                        section_codes = ?query.section_codes,
                        error = %e,
                        "WebSoc query failed"
                    );
                    failed.push(query);
                }
            }
        }

        if failed.is_empty() {
            return Ok(merged);
        }
        pending = failed;
    }

    Err(BatchError::Exhausted {
        failed: pending.len(),
        total,
        attempts: policy.max_retries + 1,
    })
}

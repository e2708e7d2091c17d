#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use parking_lot::Mutex as PlMutex;

use websoc_api::models::{
    Course, Department, GeCategory, Meeting, MeetingTime, Quarter, School, Section, Term,
    WebsocResponse,
};
use websoc_api::upstream::{UpstreamError, UpstreamQuery, WebsocClient};

static ENV_LOCK: Mutex<()> = Mutex::new(());

/// Runs `f` with environment variables temporarily modified.
///
/// This is panic-safe (restores variables on unwind) and also serializes access to
/// process-global env vars to avoid flaky tests when Rust runs tests in parallel.
///
/// `changes` is a list of `(key, value)` pairs:
/// - `Some(v)` sets the variable to `v`
/// - `None` removes the variable
pub fn with_scoped_env<F, R>(changes: &[(&str, Option<&str>)], f: F) -> R
where
    F: FnOnce() -> R,
{
    let _lock = ENV_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    let _guard = ScopedEnv::new(changes);
    f()
}

struct ScopedEnv {
    snapshot: Vec<(String, Option<String>)>,
}

impl ScopedEnv {
    fn new(changes: &[(&str, Option<&str>)]) -> Self {
        let keys: HashSet<&str> = changes.iter().map(|(k, _)| *k).collect();
        let snapshot = keys
            .into_iter()
            .map(|k| (k.to_string(), std::env::var(k).ok()))
            .collect::<Vec<_>>();

        for (k, v) in changes {
            match v {
                Some(val) => std::env::set_var(k, val),
                None => std::env::remove_var(k),
            }
        }

        Self { snapshot }
    }
}

impl Drop for ScopedEnv {
    fn drop(&mut self) {
        for (k, v) in self.snapshot.drain(..) {
            match v {
                Some(val) => std::env::set_var(&k, val),
                None => std::env::remove_var(&k),
            }
        }
    }
}

// =============================================================================
// Fixtures
// =============================================================================

pub fn fall_2024() -> Term {
    Term::new(2024, Quarter::Fall)
}

pub fn meeting(days: &str, time: &str, bldg: &str) -> Meeting {
    Meeting {
        days: days.to_string(),
        time: time.to_string(),
        bldg: vec![bldg.to_string()],
        schedule: websoc_api::models::parse_meeting_time(time).unwrap_or(MeetingTime::Tba),
    }
}

pub fn section(code: &str) -> Section {
    Section {
        section_code: code.to_string(),
        section_type: "Lec".to_string(),
        section_num: "A".to_string(),
        units: "4".to_string(),
        instructors: vec!["PATTIS, R.".to_string()],
        meetings: vec![meeting("MWF", "9:00-9:50a", "ICS 174")],
        status: "OPEN".to_string(),
        ..Default::default()
    }
}

/// A tree with one school, one department and one course holding `codes`.
pub fn tree(dept: &str, course_number: &str, codes: &[&str]) -> WebsocResponse {
    WebsocResponse {
        schools: vec![School {
            school_name: "Donald Bren School of Information and Computer Sciences".to_string(),
            departments: vec![Department {
                dept_code: dept.to_string(),
                dept_name: format!("{} Department", dept),
                courses: vec![Course {
                    course_number: course_number.to_string(),
                    course_title: format!("{} {}", dept, course_number),
                    sections: codes.iter().map(|c| section(c)).collect(),
                    ..Default::default()
                }],
                ..Default::default()
            }],
            ..Default::default()
        }],
    }
}

/// Section codes in canonical leaf order.
pub fn section_codes(response: &WebsocResponse) -> Vec<String> {
    response
        .sections()
        .map(|s| s.section_code.clone())
        .collect()
}

// =============================================================================
// Scripted WebSoc client
// =============================================================================

/// Scripted stand-in for WebSoc.
///
/// * Queries carrying section codes are answered with one section per code.
/// * Department and GE queries are answered from the registered trees, or
///   with an empty tree.
/// * `fail_times(key, n)` makes the first `n` calls for a key fail.
#[derive(Default)]
pub struct MockWebsocClient {
    by_department: HashMap<String, WebsocResponse>,
    by_ge: HashMap<GeCategory, WebsocResponse>,
    failures: PlMutex<HashMap<String, u32>>,
    calls: PlMutex<Vec<String>>,
}

impl MockWebsocClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_department(mut self, dept: &str, response: WebsocResponse) -> Self {
        self.by_department.insert(dept.to_string(), response);
        self
    }

    pub fn with_ge(mut self, ge: GeCategory, response: WebsocResponse) -> Self {
        self.by_ge.insert(ge, response);
        self
    }

    pub fn fail_times(self, key: &str, times: u32) -> Self {
        self.failures.lock().insert(key.to_string(), times);
        self
    }

    /// Keys of every call received, in arrival order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    /// Identifies a query: its section codes, else its GE category, else
    /// its department. The unit filter is appended when present.
    pub fn key(query: &UpstreamQuery) -> String {
        let base = if !query.section_codes.is_empty() {
            query.section_codes.join(",")
        } else if let Some(ge) = query.filters.ge {
            ge.to_string()
        } else {
            query.filters.department.clone().unwrap_or_default()
        };
        match &query.units {
            Some(units) => format!("{}@{}", base, units),
            None => base,
        }
    }
}

#[async_trait]
impl WebsocClient for MockWebsocClient {
    async fn query(&self, query: &UpstreamQuery) -> Result<WebsocResponse, UpstreamError> {
        let key = Self::key(query);
        self.calls.lock().push(key.clone());

        if let Some(remaining) = self.failures.lock().get_mut(&key) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(UpstreamError::Status {
                    status: 503,
                    body: format!("scripted failure for {}", key),
                });
            }
        }

        if !query.section_codes.is_empty() {
            let codes: Vec<&str> = query.section_codes.iter().map(String::as_str).collect();
            return Ok(tree("COMPSCI", "161", &codes));
        }
        if let Some(ge) = query.filters.ge {
            return Ok(self.by_ge.get(&ge).cloned().unwrap_or_default());
        }
        Ok(query
            .filters
            .department
            .as_ref()
            .and_then(|d| self.by_department.get(d))
            .cloned()
            .unwrap_or_default())
    }
}

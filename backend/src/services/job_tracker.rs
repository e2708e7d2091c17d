//! Job tracking for background ingestion runs.
//!
//! Jobs and their progress logs live in memory only and are lost on restart.
//! Every log line is mirrored to `tracing` with the job id attached.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single log entry with timestamp and message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_finished(&self) -> bool {
        !matches!(self, JobStatus::Running)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub job_id: String,
    /// What the job does, e.g. "ingest 2024 Fall".
    pub description: String,
    pub status: JobStatus,
    pub logs: Vec<LogEntry>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Job output on success (the ingest summary).
    pub result: Option<serde_json::Value>,
}

/// In-memory job tracker, cheap to clone.
#[derive(Clone, Default)]
pub struct JobTracker {
    jobs: Arc<RwLock<HashMap<String, Job>>>,
}

impl JobTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a running job and return its id.
    pub fn create_job(&self, description: impl Into<String>) -> String {
        let job_id = Uuid::new_v4().to_string();
        let job = Job {
            job_id: job_id.clone(),
            description: description.into(),
            status: JobStatus::Running,
            logs: Vec::new(),
            created_at: Utc::now(),
            completed_at: None,
            result: None,
        };
        self.jobs.write().insert(job_id.clone(), job);
        job_id
    }

    pub fn log(&self, job_id: &str, level: LogLevel, message: impl Into<String>) {
        let message = message.into();
        match level {
            LogLevel::Warning => tracing::warn!(job_id, "{}", message),
            LogLevel::Error => tracing::error!(job_id, "{}", message),
            LogLevel::Info | LogLevel::Success => tracing::info!(job_id, "{}", message),
        }
        if let Some(job) = self.jobs.write().get_mut(job_id) {
            job.logs.push(LogEntry {
                timestamp: Utc::now(),
                level,
                message,
            });
        }
    }

    pub fn complete_job(&self, job_id: &str, result: Option<serde_json::Value>) {
        if let Some(job) = self.jobs.write().get_mut(job_id) {
            job.status = JobStatus::Completed;
            job.completed_at = Some(Utc::now());
            job.result = result;
        }
    }

    /// Mark a job as failed, recording `error_message` as its last log line.
    pub fn fail_job(&self, job_id: &str, error_message: impl Into<String>) {
        self.log(job_id, LogLevel::Error, error_message);
        if let Some(job) = self.jobs.write().get_mut(job_id) {
            job.status = JobStatus::Failed;
            job.completed_at = Some(Utc::now());
        }
    }

    pub fn get_job(&self, job_id: &str) -> Option<Job> {
        self.jobs.read().get(job_id).cloned()
    }

    pub fn get_logs(&self, job_id: &str) -> Vec<LogEntry> {
        self.logs_since(job_id, 0).0
    }

    /// Log entries from index `offset` on, plus the job status. Used by the
    /// SSE stream to send only new lines on each poll.
    pub fn logs_since(&self, job_id: &str, offset: usize) -> (Vec<LogEntry>, Option<JobStatus>) {
        let jobs = self.jobs.read();
        match jobs.get(job_id) {
            Some(job) => (
                job.logs.get(offset..).map(<[LogEntry]>::to_vec).unwrap_or_default(),
                Some(job.status),
            ),
            None => (Vec::new(), None),
        }
    }
}

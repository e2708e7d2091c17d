//! Service layer: the reconciliation core and the orchestration around it.
//!
//! `isolate`, `merge` and `sort` are pure tree transformations. `batch`
//! drives the upstream fan-out, `websoc` is the serving path and `ingest`
//! fills the cache in the background.

pub mod batch;
pub mod ingest;
pub mod isolate;
pub mod job_tracker;
pub mod merge;
pub mod sort;
pub mod websoc;

pub use batch::{plan, BatchError, RetryPolicy};
pub use ingest::{ingest_term, run_ingest_job, IngestError, IngestRequest, IngestSummary};
pub use isolate::isolate;
pub use job_tracker::{Job, JobStatus, JobTracker, LogEntry, LogLevel};
pub use merge::{merge_into, merge_responses};
pub use sort::sort_response;
pub use websoc::{enforce_section_limit, WebsocError, WebsocService};

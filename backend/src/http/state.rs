//! Application state for the HTTP server.

use std::sync::Arc;

use crate::db::repository::SectionRepository;
use crate::services::job_tracker::JobTracker;
use crate::services::websoc::WebsocService;

/// Shared application state passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub repository: Arc<dyn SectionRepository>,
    pub websoc: WebsocService,
    /// Background ingestion jobs
    pub job_tracker: JobTracker,
}

impl AppState {
    pub fn new(websoc: WebsocService) -> Self {
        Self {
            repository: Arc::clone(websoc.repository()),
            websoc,
            job_tracker: JobTracker::new(),
        }
    }
}

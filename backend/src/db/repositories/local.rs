//! In-memory local repository.
//!
//! Stores rows in a `HashMap` keyed by (term, section code). Suitable for
//! unit tests and local development that need isolation and speed.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::db::models::{SectionFilter, StoredSection};
use crate::db::repository::{ErrorContext, RepositoryError, RepositoryResult, SectionRepository};
use crate::models::Term;

/// In-memory section cache.
///
/// # Example
/// ```
/// use websoc_api::db::repositories::LocalRepository;
///
/// let repo = LocalRepository::new();
/// assert_eq!(repo.section_count(), 0);
/// ```
#[derive(Clone, Default)]
pub struct LocalRepository {
    data: Arc<RwLock<LocalData>>,
}

struct LocalData {
    sections: HashMap<(Term, String), StoredSection>,
    connected: bool,
    // Connection health, toggled by tests
    is_healthy: bool,
}

impl Default for LocalData {
    fn default() -> Self {
        Self {
            sections: HashMap::new(),
            connected: true,
            is_healthy: true,
        }
    }
}

impl LocalRepository {
    /// Create an empty, connected repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a repository pre-populated with `rows`.
    pub fn with_sections(rows: impl IntoIterator<Item = StoredSection>) -> Self {
        let repo = Self::new();
        {
            let mut data = repo.data.write();
            for row in rows {
                data.sections
                    .insert((row.term, row.section_code.clone()), row);
            }
        }
        repo
    }

    /// Set the health status for testing connection failures.
    pub fn set_healthy(&self, healthy: bool) {
        self.data.write().is_healthy = healthy;
    }

    pub fn clear(&self) {
        self.data.write().sections.clear();
    }

    pub fn section_count(&self) -> usize {
        self.data.read().sections.len()
    }

    pub fn is_connected(&self) -> bool {
        self.data.read().connected
    }

    fn check_available(&self, operation: &str) -> RepositoryResult<()> {
        let data = self.data.read();
        if !data.connected {
            return Err(RepositoryError::connection_with_context(
                "Repository is closed",
                ErrorContext::new(operation),
            ));
        }
        if !data.is_healthy {
            return Err(RepositoryError::connection_with_context(
                "Repository is not healthy",
                ErrorContext::new(operation),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl SectionRepository for LocalRepository {
    async fn connect(&self) -> RepositoryResult<()> {
        self.data.write().connected = true;
        Ok(())
    }

    async fn close(&self) -> RepositoryResult<()> {
        self.data.write().connected = false;
        Ok(())
    }

    async fn health_check(&self) -> RepositoryResult<bool> {
        let data = self.data.read();
        Ok(data.connected && data.is_healthy)
    }

    async fn find_sections(&self, filter: &SectionFilter) -> RepositoryResult<Vec<StoredSection>> {
        self.check_available("find_sections")?;
        let data = self.data.read();

        let mut rows: Vec<StoredSection> = data
            .sections
            .values()
            .filter(|row| filter.matches(row))
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.section_code.cmp(&b.section_code));
        Ok(rows)
    }

    async fn section_checksums(&self, term: Term) -> RepositoryResult<HashMap<String, String>> {
        self.check_available("section_checksums")?;
        let data = self.data.read();
        Ok(data
            .sections
            .values()
            .filter(|row| row.term == term)
            .map(|row| (row.section_code.clone(), row.checksum.clone()))
            .collect())
    }

    async fn upsert_sections(&self, rows: &[StoredSection]) -> RepositoryResult<usize> {
        self.check_available("upsert_sections")?;
        let mut data = self.data.write();
        for row in rows {
            data.sections
                .insert((row.term, row.section_code.clone()), row.clone());
        }
        Ok(rows.len())
    }

    async fn delete_sections(&self, term: Term, section_codes: &[String]) -> RepositoryResult<usize> {
        self.check_available("delete_sections")?;
        let mut data = self.data.write();
        Ok(section_codes
            .iter()
            .filter(|code| data.sections.remove(&(term, (*code).clone())).is_some())
            .count())
    }

    async fn list_terms(&self) -> RepositoryResult<Vec<Term>> {
        self.check_available("list_terms")?;
        let data = self.data.read();
        let terms: BTreeSet<Term> = data.sections.keys().map(|(term, _)| *term).collect();
        Ok(terms.into_iter().rev().collect())
    }
}

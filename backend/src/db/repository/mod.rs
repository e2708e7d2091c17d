//! Repository trait for the section cache.
//!
//! The cache stores one isolated fragment per (term, section code) together
//! with the indexed columns used to select it. Implementations must be
//! `Send + Sync`; they are shared behind an `Arc` by every request.

pub mod error;

use std::collections::HashMap;

use async_trait::async_trait;

use super::models::{SectionFilter, StoredSection};
use crate::models::Term;

pub use error::{ErrorContext, RepositoryError, RepositoryResult};

#[async_trait]
pub trait SectionRepository: Send + Sync {
    // ==================== Lifecycle ====================

    /// Open connections. Called once at startup, before any other method.
    async fn connect(&self) -> RepositoryResult<()>;

    /// Release connections. Later calls fail with a connection error until
    /// `connect` is called again.
    async fn close(&self) -> RepositoryResult<()>;

    /// Check if the backing store is reachable.
    ///
    /// # Returns
    /// - `Ok(true)` if connection is healthy
    /// - `Ok(false)` if connection is unhealthy but no error occurred
    /// - `Err(RepositoryError)` if an error occurred during the check
    async fn health_check(&self) -> RepositoryResult<bool>;

    // ==================== Sections ====================

    /// Rows matching `filter`, in no particular order.
    async fn find_sections(&self, filter: &SectionFilter) -> RepositoryResult<Vec<StoredSection>>;

    /// Stored checksums for a term, keyed by section code.
    async fn section_checksums(&self, term: Term) -> RepositoryResult<HashMap<String, String>>;

    /// Insert or replace rows by (term, section code).
    ///
    /// # Returns
    /// Number of rows written.
    async fn upsert_sections(&self, rows: &[StoredSection]) -> RepositoryResult<usize>;

    /// Remove rows of `term` by section code. Unknown codes are ignored.
    ///
    /// # Returns
    /// Number of rows removed.
    async fn delete_sections(&self, term: Term, section_codes: &[String]) -> RepositoryResult<usize>;

    /// Terms with at least one cached section, newest first.
    async fn list_terms(&self) -> RepositoryResult<Vec<Term>>;
}

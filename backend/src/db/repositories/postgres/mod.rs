//! Postgres repository implementation using Diesel.
//!
//! ## Features
//!
//! - Connection pooling with r2d2
//! - Automatic retry for transient failures
//! - Connection health monitoring
//! - Automatic migration execution on `connect`
//!
//! Sections live in a single `websoc_sections` table keyed by
//! (year, quarter, section_code). The term, department and section-code
//! predicates run in SQL; the remaining filters are applied to the decoded
//! fragments.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel::sql_query;
use diesel::upsert::excluded;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use parking_lot::RwLock;
use tokio::task;
use tracing::{debug, info};

use crate::config::PostgresConfig;
use crate::db::models::{SectionFilter, StoredSection};
use crate::db::repository::{ErrorContext, RepositoryError, RepositoryResult, SectionRepository};
use crate::models::Term;

mod models;
mod schema;

use models::{term_from_columns, NewSectionRow, SectionRow};
use schema::websoc_sections;

type PgPool = Pool<ConnectionManager<PgConnection>>;

const MIGRATIONS: EmbeddedMigrations = embed_migrations!("src/db/repositories/postgres/migrations");

/// Rows per INSERT statement. Eight bind parameters per row keeps this well
/// under the Postgres limit of 65535.
const UPSERT_CHUNK: usize = 1000;

/// Diesel-backed section cache.
///
/// The pool is created by [`SectionRepository::connect`] and dropped by
/// [`SectionRepository::close`].
#[derive(Clone)]
pub struct PostgresRepository {
    pool: Arc<RwLock<Option<PgPool>>>,
    config: PostgresConfig,
    // Metrics counters
    total_queries: Arc<AtomicU64>,
    failed_queries: Arc<AtomicU64>,
    retried_operations: Arc<AtomicU64>,
}

impl PostgresRepository {
    /// Create an unconnected repository.
    pub fn new(config: PostgresConfig) -> Self {
        Self {
            pool: Arc::new(RwLock::new(None)),
            config,
            total_queries: Arc::new(AtomicU64::new(0)),
            failed_queries: Arc::new(AtomicU64::new(0)),
            retried_operations: Arc::new(AtomicU64::new(0)),
        }
    }

    fn build_pool(config: &PostgresConfig) -> RepositoryResult<PgPool> {
        let manager = ConnectionManager::<PgConnection>::new(&config.database_url);

        let pool = Pool::builder()
            .max_size(config.max_connections)
            .min_idle(Some(config.min_connections))
            .connection_timeout(Duration::from_secs(config.connect_timeout))
            .idle_timeout(Some(Duration::from_secs(config.idle_timeout)))
            .test_on_check_out(true)
            .build(manager)
            .map_err(|e| {
                RepositoryError::connection_with_context(
                    e.to_string(),
                    ErrorContext::new("create_pool")
                        .with_details(format!("max_size={}", config.max_connections)),
                )
            })?;

        {
            let mut conn = pool.get().map_err(|e| {
                RepositoryError::connection_with_context(
                    e.to_string(),
                    ErrorContext::new("get_connection_for_migrations"),
                )
            })?;
            Self::run_migrations(&mut conn)?;
        }

        Ok(pool)
    }

    /// Run pending database migrations.
    fn run_migrations(conn: &mut PgConnection) -> RepositoryResult<()> {
        conn.run_pending_migrations(MIGRATIONS).map_err(|e| {
            RepositoryError::internal_with_context(
                format!("Migration failed: {}", e),
                ErrorContext::new("run_migrations"),
            )
        })?;

        Ok(())
    }

    fn current_pool(&self, operation: &str) -> RepositoryResult<PgPool> {
        self.pool.read().clone().ok_or_else(|| {
            RepositoryError::connection_with_context(
                "Repository is not connected",
                ErrorContext::new(operation),
            )
        })
    }

    /// Execute a database operation with automatic retry for transient failures.
    ///
    /// This method will retry the operation up to `max_retries` times if a
    /// retryable error occurs (connection errors, timeouts, serialization failures).
    async fn with_conn<T, F>(&self, operation: &str, f: F) -> RepositoryResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut PgConnection) -> RepositoryResult<T> + Send + 'static + Clone,
    {
        let pool = self.current_pool(operation)?;
        let max_retries = self.config.max_retries;
        let retry_delay_ms = self.config.retry_delay_ms;
        let total_queries = self.total_queries.clone();
        let failed_queries = self.failed_queries.clone();
        let retried_operations = self.retried_operations.clone();

        task::spawn_blocking(move || {
            let mut last_error = None;
            let mut retry_delay = Duration::from_millis(retry_delay_ms);

            for attempt in 0..=max_retries {
                if attempt > 0 {
                    retried_operations.fetch_add(1, Ordering::Relaxed);
                    std::thread::sleep(retry_delay);
                    retry_delay *= 2;
                }

                let mut conn = match pool.get() {
                    Ok(c) => c,
                    Err(e) => {
                        let err = RepositoryError::connection_with_context(
                            e.to_string(),
                            ErrorContext::new("get_connection")
                                .with_details(format!("attempt={}", attempt + 1)),
                        );
                        if attempt < max_retries {
                            last_error = Some(err);
                            continue;
                        }
                        failed_queries.fetch_add(1, Ordering::Relaxed);
                        return Err(err);
                    }
                };

                total_queries.fetch_add(1, Ordering::Relaxed);
                match f.clone()(&mut conn) {
                    Ok(result) => return Ok(result),
                    Err(e) if e.is_retryable() && attempt < max_retries => {
                        last_error = Some(e);
                        continue;
                    }
                    Err(e) => {
                        failed_queries.fetch_add(1, Ordering::Relaxed);
                        return Err(e);
                    }
                }
            }

            failed_queries.fetch_add(1, Ordering::Relaxed);
            Err(last_error.unwrap_or_else(|| {
                RepositoryError::internal("Max retries exceeded with no error captured")
            }))
        })
        .await
        .map_err(|e| {
            RepositoryError::internal_with_context(
                format!("Task join error: {}", e),
                ErrorContext::new("spawn_blocking"),
            )
        })?
    }
}

#[async_trait]
impl SectionRepository for PostgresRepository {
    async fn connect(&self) -> RepositoryResult<()> {
        if self.pool.read().is_some() {
            return Ok(());
        }
        let config = self.config.clone();
        let pool = task::spawn_blocking(move || Self::build_pool(&config))
            .await
            .map_err(|e| {
                RepositoryError::internal_with_context(
                    format!("Task join error: {}", e),
                    ErrorContext::new("connect"),
                )
            })??;
        *self.pool.write() = Some(pool);
        info!(
            max_connections = self.config.max_connections,
            "Connected to Postgres section cache"
        );
        Ok(())
    }

    async fn close(&self) -> RepositoryResult<()> {
        if self.pool.write().take().is_some() {
            info!(
                total_queries = self.total_queries.load(Ordering::Relaxed),
                failed_queries = self.failed_queries.load(Ordering::Relaxed),
                retried_operations = self.retried_operations.load(Ordering::Relaxed),
                "Closed Postgres section cache"
            );
        }
        Ok(())
    }

    async fn health_check(&self) -> RepositoryResult<bool> {
        if self.pool.read().is_none() {
            return Ok(false);
        }
        self.with_conn("health_check", |conn| {
            sql_query("SELECT 1")
                .execute(conn)
                .map(|_| true)
                .map_err(RepositoryError::from)
        })
        .await
    }

    async fn find_sections(&self, filter: &SectionFilter) -> RepositoryResult<Vec<StoredSection>> {
        let year = i32::from(filter.term.year);
        let quarter = filter.term.quarter.as_str().to_string();
        let department = filter.indexed_department().map(str::to_string);
        let codes = filter.section_codes.clone();

        let rows = self
            .with_conn("find_sections", move |conn| {
                let mut query = websoc_sections::table
                    .filter(websoc_sections::year.eq(year))
                    .filter(websoc_sections::quarter.eq(quarter))
                    .into_boxed();
                if let Some(dept) = department {
                    query = query.filter(websoc_sections::department.eq(dept));
                }
                if !codes.is_empty() {
                    query = query.filter(websoc_sections::section_code.eq_any(codes));
                }
                query
                    .order(websoc_sections::section_code.asc())
                    .select(SectionRow::as_select())
                    .load::<SectionRow>(conn)
                    .map_err(RepositoryError::from)
            })
            .await?;

        let candidates = rows.len();
        let mut sections = Vec::with_capacity(candidates);
        for row in rows {
            let stored = StoredSection::try_from(row)?;
            if filter.matches(&stored) {
                sections.push(stored);
            }
        }
        debug!(
            term = %filter.term,
            candidates,
            matched = sections.len(),
            "Filtered cached sections"
        );
        Ok(sections)
    }

    async fn section_checksums(&self, term: Term) -> RepositoryResult<HashMap<String, String>> {
        let year = i32::from(term.year);
        let quarter = term.quarter.as_str().to_string();

        let pairs = self
            .with_conn("section_checksums", move |conn| {
                websoc_sections::table
                    .filter(websoc_sections::year.eq(year))
                    .filter(websoc_sections::quarter.eq(quarter))
                    .select((websoc_sections::section_code, websoc_sections::checksum))
                    .load::<(String, String)>(conn)
                    .map_err(RepositoryError::from)
            })
            .await?;
        Ok(pairs.into_iter().collect())
    }

    async fn upsert_sections(&self, rows: &[StoredSection]) -> RepositoryResult<usize> {
        if rows.is_empty() {
            return Ok(0);
        }
        let new_rows = rows
            .iter()
            .map(NewSectionRow::from_stored)
            .collect::<RepositoryResult<Vec<_>>>()?;

        self.with_conn("upsert_sections", move |conn| {
            conn.transaction(|conn| {
                let mut written = 0;
                for chunk in new_rows.chunks(UPSERT_CHUNK) {
                    written += diesel::insert_into(websoc_sections::table)
                        .values(chunk)
                        .on_conflict((
                            websoc_sections::year,
                            websoc_sections::quarter,
                            websoc_sections::section_code,
                        ))
                        .do_update()
                        .set((
                            websoc_sections::department.eq(excluded(websoc_sections::department)),
                            websoc_sections::course_number
                                .eq(excluded(websoc_sections::course_number)),
                            websoc_sections::ge_categories
                                .eq(excluded(websoc_sections::ge_categories)),
                            websoc_sections::checksum.eq(excluded(websoc_sections::checksum)),
                            websoc_sections::data.eq(excluded(websoc_sections::data)),
                            websoc_sections::updated_at.eq(diesel::dsl::now),
                        ))
                        .execute(conn)?;
                }
                Ok::<usize, diesel::result::Error>(written)
            })
            .map_err(RepositoryError::from)
        })
        .await
    }

    async fn delete_sections(&self, term: Term, section_codes: &[String]) -> RepositoryResult<usize> {
        if section_codes.is_empty() {
            return Ok(0);
        }
        let year = i32::from(term.year);
        let quarter = term.quarter.as_str().to_string();
        let codes = section_codes.to_vec();

        self.with_conn("delete_sections", move |conn| {
            diesel::delete(
                websoc_sections::table
                    .filter(websoc_sections::year.eq(year))
                    .filter(websoc_sections::quarter.eq(quarter))
                    .filter(websoc_sections::section_code.eq_any(codes)),
            )
            .execute(conn)
            .map_err(RepositoryError::from)
        })
        .await
    }

    async fn list_terms(&self) -> RepositoryResult<Vec<Term>> {
        let pairs = self
            .with_conn("list_terms", |conn| {
                websoc_sections::table
                    .select((websoc_sections::year, websoc_sections::quarter))
                    .distinct()
                    .load::<(i32, String)>(conn)
                    .map_err(RepositoryError::from)
            })
            .await?;

        let mut terms = pairs
            .iter()
            .map(|(year, quarter)| term_from_columns(*year, quarter))
            .collect::<RepositoryResult<Vec<_>>>()?;
        terms.sort_unstable_by(|a, b| b.cmp(a));
        Ok(terms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Quarter;

    #[tokio::test]
    async fn test_unconnected_repository_is_unhealthy() {
        let repo = PostgresRepository::new(PostgresConfig::with_url("postgres://localhost/unused"));
        assert!(!repo.health_check().await.unwrap());
        let err = repo.list_terms().await.unwrap_err();
        assert!(matches!(err, RepositoryError::ConnectionError { .. }));
    }

    #[test]
    fn test_term_columns_round_trip() {
        let term = term_from_columns(2024, "Fall").unwrap();
        assert_eq!(term, Term::new(2024, Quarter::Fall));
        assert!(term_from_columns(-1, "Fall").is_err());
        assert!(term_from_columns(2024, "Autumn").is_err());
    }
}

//! Repository factory for dependency injection.
//!
//! Creates the section cache selected by [`AppConfig`]. Repositories are
//! returned unconnected; callers invoke [`SectionRepository::connect`] during
//! startup.

use std::str::FromStr;
use std::sync::Arc;

use super::repositories::LocalRepository;
#[cfg(feature = "postgres-repo")]
use super::repositories::PostgresRepository;
use super::repository::{RepositoryResult, SectionRepository};
use crate::config::{AppConfig, PostgresConfig};

/// Repository type configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepositoryType {
    /// Postgres + Diesel implementation
    Postgres,
    /// In-memory local repository
    Local,
}

impl FromStr for RepositoryType {
    type Err = String;

    /// Parse repository type from string ("postgres", "pg", "local").
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "postgres" | "pg" => Ok(Self::Postgres),
            "local" => Ok(Self::Local),
            _ => Err(format!("Unknown repository type: {}", s)),
        }
    }
}

/// Repository factory for creating repository instances.
///
/// # Example
/// ```
/// use websoc_api::config::AppConfig;
/// use websoc_api::db::RepositoryFactory;
///
/// let repo = RepositoryFactory::create(&AppConfig::default()).unwrap();
/// # let _ = repo;
/// ```
pub struct RepositoryFactory;

impl RepositoryFactory {
    /// Create the repository named by `config.repository.type`.
    ///
    /// # Returns
    /// * `Ok(Arc<dyn SectionRepository>)` - Unconnected repository instance
    /// * `Err(RepositoryError)` - Unknown type, missing settings, or a
    ///   backend whose feature is not compiled in
    pub fn create(config: &AppConfig) -> RepositoryResult<Arc<dyn SectionRepository>> {
        match config.repository_type()? {
            RepositoryType::Postgres => {
                let pg = Self::create_postgres(config.postgres_config()?)?;
                Ok(pg)
            }
            RepositoryType::Local => Ok(Self::create_local()),
        }
    }

    /// Create a Postgres repository.
    #[cfg(feature = "postgres-repo")]
    pub fn create_postgres(config: &PostgresConfig) -> RepositoryResult<Arc<dyn SectionRepository>> {
        Ok(Arc::new(PostgresRepository::new(config.clone())))
    }

    #[cfg(not(feature = "postgres-repo"))]
    pub fn create_postgres(_config: &PostgresConfig) -> RepositoryResult<Arc<dyn SectionRepository>> {
        Err(super::repository::RepositoryError::configuration(
            "Postgres repository feature not enabled",
        ))
    }

    /// Create an in-memory repository.
    pub fn create_local() -> Arc<dyn SectionRepository> {
        Arc::new(LocalRepository::new())
    }
}

//! Section cache storage.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │  services::websoc / services::ingest                    │
//! └───────────────────┬─────────────────────────────────────┘
//!                     │
//! ┌───────────────────▼─────────────────────────────────────┐
//! │  SectionRepository (repository/mod.rs)                  │
//! └───────────────────┬─────────────────────────────────────┘
//!                     │
//!     ┌───────────────┴──────────────┐
//!     │ LocalRepository              │ PostgresRepository
//!     │ (in-memory)                  │ (Diesel, feature "postgres-repo")
//!     └──────────────────────────────┘
//! ```
//!
//! - `models`: cached row type and the filter predicate
//! - `checksum`: change detection for ingest
//! - `factory`: backend selection from configuration

#[cfg(not(any(feature = "postgres-repo", feature = "local-repo")))]
compile_error!("Enable at least one repository backend feature.");

pub mod checksum;
pub mod factory;
pub mod models;
pub mod repositories;
pub mod repository;

pub use checksum::{calculate_checksum, section_checksum};
pub use factory::{RepositoryFactory, RepositoryType};
pub use models::{CourseNumberFilter, SectionFilter, StoredSection};
pub use repositories::LocalRepository;
#[cfg(feature = "postgres-repo")]
pub use repositories::PostgresRepository;
pub use repository::{ErrorContext, RepositoryError, RepositoryResult, SectionRepository};

//! Section repository implementations:
//! - `local`: in-memory, for unit testing and local development
//! - `postgres`: PostgreSQL with Diesel ORM
pub mod local;
#[cfg(feature = "postgres-repo")]
pub mod postgres;

pub use local::LocalRepository;
#[cfg(feature = "postgres-repo")]
pub use postgres::PostgresRepository;

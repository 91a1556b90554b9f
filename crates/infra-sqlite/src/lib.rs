// lagprobe Infrastructure - SQLite Adapter
// Implements: JobRepository, TransactionalJobRepository, ProbeStore

mod connection;
mod error;
mod job_repository;
mod migration;
mod probe_store;
mod transaction;

pub use connection::create_pool;
pub use job_repository::SqliteJobRepository;
pub use migration::{run_migrations, run_store_migrations};
pub use probe_store::SqliteProbeStore;
pub use transaction::SqliteJobTransaction;

// Note: sqlx::Error conversion is handled by map_sqlx_error
// due to Rust's orphan rules (cannot implement From<sqlx::Error> for AppError here)

// SQLite Connection Pool Setup

use crate::error::map_sqlx_error;
use lagprobe_core::error::{AppError, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Create SQLite connection pool with WAL mode and a busy timeout
///
/// Accepts either a `sqlite:` URL or a plain file path. Parent directories
/// of file paths are created. In-memory databases get a single, never
/// recycled connection so every query sees the same database.
pub async fn create_pool(database: &str) -> Result<SqlitePool> {
    let in_memory = database.contains(":memory:");

    let options = if in_memory {
        SqliteConnectOptions::from_str("sqlite::memory:").map_err(map_sqlx_error)?
    } else if database.starts_with("sqlite:") {
        SqliteConnectOptions::from_str(database).map_err(map_sqlx_error)?
    } else {
        if let Some(parent) = Path::new(database).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        SqliteConnectOptions::new().filename(database)
    };

    let options = options
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_secs(5))
        .create_if_missing(true);

    let pool_options = if in_memory {
        SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
    } else {
        SqlitePoolOptions::new().max_connections(10)
    };

    let pool = pool_options
        .connect_with(options)
        .await
        .map_err(|e| AppError::Database(format!("Failed to open {}: {}", database, e)))?;

    Ok(pool)
}

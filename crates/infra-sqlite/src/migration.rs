// Migration Runner

use crate::error::map_sqlx_error;
use lagprobe_core::error::Result;
use sqlx::SqlitePool;
use tracing::info;

struct Migration {
    version: i64,
    name: &'static str,
    sql: &'static str,
}

const QUEUE_MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    name: "create jobs",
    sql: include_str!("../migrations/queue/001_create_jobs.sql"),
}];

const STORE_MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    name: "create examples",
    sql: include_str!("../migrations/store/001_create_examples.sql"),
}];

/// Run job queue migrations
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    apply_pending(pool, "queue", QUEUE_MIGRATIONS).await
}

/// Run probe store migrations (primary and secondary share the schema)
pub async fn run_store_migrations(pool: &SqlitePool) -> Result<()> {
    apply_pending(pool, "store", STORE_MIGRATIONS).await
}

/// Apply every migration of `component` newer than the recorded version.
///
/// Versions are tracked per component, so the queue and a store may live in
/// the same file.
async fn apply_pending(pool: &SqlitePool, component: &str, migrations: &[Migration]) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            component TEXT NOT NULL,
            version INTEGER NOT NULL,
            applied_at INTEGER NOT NULL,
            PRIMARY KEY (component, version)
        )
        "#,
    )
    .execute(pool)
    .await
    .map_err(map_sqlx_error)?;

    let current_version: i64 =
        sqlx::query_scalar("SELECT COALESCE(MAX(version), 0) FROM schema_version WHERE component = ?")
            .bind(component)
            .fetch_one(pool)
            .await
            .map_err(map_sqlx_error)?;

    info!(component, current_version, "Running database migrations");

    for migration in migrations.iter().filter(|m| m.version > current_version) {
        info!(
            component,
            version = migration.version,
            name = migration.name,
            "Applying migration"
        );
        apply_migration(pool, component, migration).await?;
    }

    Ok(())
}

/// Apply a single migration SQL file and record it, in one transaction
async fn apply_migration(pool: &SqlitePool, component: &str, migration: &Migration) -> Result<()> {
    let mut tx = pool.begin().await.map_err(map_sqlx_error)?;

    // Split by semicolon and execute each statement
    for statement in migration.sql.split(';') {
        // Remove comments and trim
        let clean_statement: String = statement
            .lines()
            .filter(|line| !line.trim().starts_with("--"))
            .collect::<Vec<_>>()
            .join("\n")
            .trim()
            .to_string();

        if !clean_statement.is_empty() {
            sqlx::query(&clean_statement)
                .execute(&mut *tx)
                .await
                .map_err(map_sqlx_error)?;
        }
    }

    sqlx::query(
        "INSERT INTO schema_version (component, version, applied_at) \
         VALUES (?, ?, CAST(strftime('%s', 'now') AS INTEGER) * 1000)",
    )
    .bind(component)
    .bind(migration.version)
    .execute(&mut *tx)
    .await
    .map_err(map_sqlx_error)?;

    tx.commit().await.map_err(map_sqlx_error)?;
    Ok(())
}

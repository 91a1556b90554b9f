// SQLite ProbeStore Implementation - the `examples` table

use crate::error::map_sqlx_error;
use async_trait::async_trait;
use lagprobe_core::domain::ProbeRow;
use lagprobe_core::error::Result;
use lagprobe_core::port::ProbeStore;
use sqlx::SqlitePool;

pub struct SqliteProbeStore {
    pool: SqlitePool,
}

impl SqliteProbeStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProbeStore for SqliteProbeStore {
    async fn insert_row(&self, content: i64, created_at: i64) -> Result<i64> {
        let result = sqlx::query("INSERT INTO examples (content, created_at) VALUES (?, ?)")
            .bind(content)
            .bind(created_at)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        Ok(result.last_insert_rowid())
    }

    async fn count_rows(&self) -> Result<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM examples")
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx_error)
    }

    async fn truncate(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM examples")
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        Ok(result.rows_affected())
    }

    async fn max_row_id(&self) -> Result<i64> {
        sqlx::query_scalar("SELECT COALESCE(MAX(id), 0) FROM examples")
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx_error)
    }

    async fn rows_after(&self, after_id: i64, limit: i64) -> Result<Vec<ProbeRow>> {
        let rows: Vec<(i64, i64, i64)> = sqlx::query_as(
            r#"
            SELECT id, content, created_at FROM examples
            WHERE id > ?
            ORDER BY id ASC
            LIMIT ?
            "#,
        )
        .bind(after_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows
            .into_iter()
            .map(|(id, content, created_at)| ProbeRow {
                id,
                content,
                created_at,
            })
            .collect())
    }

    async fn count_rows_through(&self, max_id: i64) -> Result<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM examples WHERE id <= ?")
            .bind(max_id)
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx_error)
    }

    async fn apply_rows(&self, rows: &[ProbeRow]) -> Result<u64> {
        if rows.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;
        let mut applied = 0;

        for row in rows {
            let result = sqlx::query(
                "INSERT OR IGNORE INTO examples (id, content, created_at) VALUES (?, ?, ?)",
            )
            .bind(row.id)
            .bind(row.content)
            .bind(row.created_at)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
            applied += result.rows_affected();
        }

        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(applied)
    }
}

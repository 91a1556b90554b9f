// SQLite JobRepository Implementation

use crate::error::map_sqlx_error;
use crate::SqliteJobTransaction;
use async_trait::async_trait;
use lagprobe_core::domain::{Job, JobId, JobPayload, JobState, JobType};
use lagprobe_core::error::{AppError, Result};
use lagprobe_core::port::{
    JobRepository, JobRepositoryTransaction, TimeProvider, TransactionalJobRepository,
};
use sqlx::{Executor, Sqlite, SqlitePool};
use std::sync::Arc;

pub struct SqliteJobRepository {
    pool: SqlitePool,
    time_provider: Arc<dyn TimeProvider>,
}

impl SqliteJobRepository {
    pub fn new(pool: SqlitePool, time_provider: Arc<dyn TimeProvider>) -> Self {
        Self {
            pool,
            time_provider,
        }
    }
}

/// Shared by the repository and its transactions
pub(crate) async fn insert_job<'e, E>(executor: E, job: &Job) -> Result<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        r#"
        INSERT INTO jobs (
            id, queue, job_type, priority, state,
            created_at, available_at, started_at, finished_at,
            payload, attempts, max_attempts, backoff_factor,
            parent_job_id, chain_group_id, chain_position, error
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&job.id)
    .bind(&job.queue)
    .bind(job.job_type.as_str())
    .bind(job.priority)
    .bind(job.state.to_string())
    .bind(job.created_at)
    .bind(job.available_at)
    .bind(job.started_at)
    .bind(job.finished_at)
    .bind(job.payload.as_value().to_string())
    .bind(job.attempts)
    .bind(job.max_attempts)
    .bind(job.backoff_factor)
    .bind(&job.parent_job_id)
    .bind(&job.chain_group_id)
    .bind(job.chain_position)
    .bind(&job.error)
    .execute(executor)
    .await
    .map_err(map_sqlx_error)?;

    Ok(())
}

#[async_trait]
impl JobRepository for SqliteJobRepository {
    async fn insert(&self, job: &Job) -> Result<()> {
        insert_job(&self.pool, job).await
    }

    async fn find_by_id(&self, id: &JobId) -> Result<Option<Job>> {
        let row = sqlx::query_as::<_, JobRow>("SELECT * FROM jobs WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        row.map(JobRow::into_job).transpose()
    }

    async fn update(&self, job: &Job) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE jobs
            SET state = ?, available_at = ?, started_at = ?, finished_at = ?,
                attempts = ?, max_attempts = ?, error = ?
            WHERE id = ?
            "#,
        )
        .bind(job.state.to_string())
        .bind(job.available_at)
        .bind(job.started_at)
        .bind(job.finished_at)
        .bind(job.attempts)
        .bind(job.max_attempts)
        .bind(&job.error)
        .bind(&job.id)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Job {} not found", job.id)));
        }
        Ok(())
    }

    async fn pop_next(&self, queue: &str) -> Result<Option<Job>> {
        // Chain members wait for their predecessor to be DONE. A single
        // UPDATE takes the write lock before selecting, so concurrent
        // workers never claim the same row.
        let now = self.time_provider.now_millis();
        let state_running = JobState::Running.to_string();
        let state_queued = JobState::Queued.to_string();
        let state_done = JobState::Done.to_string();

        let row = sqlx::query_as::<_, JobRow>(
            r#"
            UPDATE jobs
            SET state = ?, started_at = ?, attempts = attempts + 1
            WHERE id = (
                SELECT j.id FROM jobs j
                WHERE j.queue = ? AND j.state = ? AND j.available_at <= ?
                  AND (
                      j.parent_job_id IS NULL
                      OR EXISTS (
                          SELECT 1 FROM jobs p
                          WHERE p.id = j.parent_job_id AND p.state = ?
                      )
                  )
                ORDER BY j.priority DESC, j.created_at ASC, j.rowid ASC
                LIMIT 1
            )
            AND state = ?
            RETURNING *
            "#,
        )
        .bind(&state_running)
        .bind(now)
        .bind(queue)
        .bind(&state_queued)
        .bind(now)
        .bind(&state_done)
        .bind(&state_queued)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        row.map(JobRow::into_job).transpose()
    }

    async fn cancel_chain(&self, chain_group_id: &str) -> Result<u64> {
        let now = self.time_provider.now_millis();

        let result = sqlx::query(
            r#"
            UPDATE jobs
            SET state = ?, finished_at = ?
            WHERE chain_group_id = ? AND state = ?
            "#,
        )
        .bind(JobState::Cancelled.to_string())
        .bind(now)
        .bind(chain_group_id)
        .bind(JobState::Queued.to_string())
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(result.rows_affected())
    }

    async fn count_by_state(&self, queue: &str, state: JobState) -> Result<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM jobs WHERE queue = ? AND state = ?")
                .bind(queue)
                .bind(state.to_string())
                .fetch_one(&self.pool)
                .await
                .map_err(map_sqlx_error)?;

        Ok(count)
    }

    async fn find_by_state(&self, state: JobState) -> Result<Vec<Job>> {
        let rows: Vec<JobRow> = sqlx::query_as(
            r#"
            SELECT * FROM jobs
            WHERE state = ?
            ORDER BY created_at ASC, rowid ASC
            "#,
        )
        .bind(state.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        rows.into_iter().map(JobRow::into_job).collect()
    }

    async fn find_chain(&self, chain_group_id: &str) -> Result<Vec<Job>> {
        let rows: Vec<JobRow> = sqlx::query_as(
            r#"
            SELECT * FROM jobs
            WHERE chain_group_id = ?
            ORDER BY chain_position ASC
            "#,
        )
        .bind(chain_group_id)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        rows.into_iter().map(JobRow::into_job).collect()
    }
}

#[async_trait]
impl TransactionalJobRepository for SqliteJobRepository {
    async fn begin_transaction(&self) -> Result<Box<dyn JobRepositoryTransaction>> {
        let tx = self.pool.begin().await.map_err(map_sqlx_error)?;
        Ok(Box::new(SqliteJobTransaction::new(tx)))
    }
}

/// SQLite row representation
#[derive(Debug, sqlx::FromRow)]
struct JobRow {
    id: String,
    queue: String,
    job_type: String,
    priority: i32,
    state: String,
    created_at: i64,
    available_at: i64,
    started_at: Option<i64>,
    finished_at: Option<i64>,
    payload: String,
    attempts: i32,
    max_attempts: i32,
    backoff_factor: f64,
    parent_job_id: Option<String>,
    chain_group_id: Option<String>,
    chain_position: Option<i64>,
    error: Option<String>,
}

impl JobRow {
    fn into_job(self) -> Result<Job> {
        let state: JobState = self.state.parse()?;
        let payload: serde_json::Value = serde_json::from_str(&self.payload)?;

        Ok(Job {
            id: self.id,
            queue: self.queue,
            job_type: JobType::new(self.job_type),
            priority: self.priority,
            state,
            created_at: self.created_at,
            available_at: self.available_at,
            started_at: self.started_at,
            finished_at: self.finished_at,
            payload: JobPayload::new(payload),
            attempts: self.attempts,
            max_attempts: self.max_attempts,
            backoff_factor: self.backoff_factor,
            parent_job_id: self.parent_job_id,
            chain_group_id: self.chain_group_id,
            chain_position: self.chain_position,
            error: self.error,
        })
    }
}

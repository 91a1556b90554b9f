// SQLite Transaction Implementation

use crate::error::map_sqlx_error;
use crate::job_repository::insert_job;
use async_trait::async_trait;
use lagprobe_core::domain::Job;
use lagprobe_core::error::Result;
use lagprobe_core::port::{JobRepositoryTransaction, Transaction};
use sqlx::{Sqlite, Transaction as SqlxTransaction};

/// Dropping without commit rolls back
pub struct SqliteJobTransaction {
    tx: SqlxTransaction<'static, Sqlite>,
}

impl SqliteJobTransaction {
    pub fn new(tx: SqlxTransaction<'static, Sqlite>) -> Self {
        Self { tx }
    }
}

#[async_trait]
impl Transaction for SqliteJobTransaction {
    async fn commit(self: Box<Self>) -> Result<()> {
        self.tx.commit().await.map_err(map_sqlx_error)
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        self.tx.rollback().await.map_err(map_sqlx_error)
    }
}

#[async_trait]
impl JobRepositoryTransaction for SqliteJobTransaction {
    async fn insert(&mut self, job: &Job) -> Result<()> {
        insert_job(&mut *self.tx, job).await
    }
}

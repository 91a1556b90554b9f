// Probe Executor - runs one probe task against the stores

use crate::domain::{ExecutionResult, Job, ProbeKind, ProbeTask};
use crate::error::AppError;
use crate::port::{ExecutionError, ResultReporter, Stores, TaskExecutor, TimeProvider};
use async_trait::async_trait;
use rand::Rng;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// Inclusive range of the pseudo-random content written by write probes
pub const PAYLOAD_MIN: i64 = 1;
pub const PAYLOAD_MAX: i64 = 1000;

fn store_error(err: AppError) -> ExecutionError {
    ExecutionError::Store(err.to_string())
}

/// Executes probe tasks and reports each observation
pub struct ProbeExecutor {
    stores: Stores,
    reporter: Arc<dyn ResultReporter>,
    time_provider: Arc<dyn TimeProvider>,
}

impl ProbeExecutor {
    pub fn new(
        stores: Stores,
        reporter: Arc<dyn ResultReporter>,
        time_provider: Arc<dyn TimeProvider>,
    ) -> Self {
        Self {
            stores,
            reporter,
            time_provider,
        }
    }

    /// Run a probe without reporting it.
    ///
    /// Write: insert a random row on the primary, then count the primary.
    /// Read: count the store the task targets.
    /// `success` is `rows > 0` in both cases; only a store error is an `Err`.
    pub async fn run(&self, task: &ProbeTask) -> Result<ExecutionResult, ExecutionError> {
        let started = Instant::now();
        let store_role = task.target_store();
        let store = self.stores.get(store_role);

        if task.kind == ProbeKind::Write {
            let content = rand::thread_rng().gen_range(PAYLOAD_MIN..=PAYLOAD_MAX);
            let row_id = store
                .insert_row(content, self.time_provider.now_millis())
                .await
                .map_err(store_error)?;
            debug!(row_id, content, store = %store_role, "Probe row inserted");
        }

        let observed_rows = store.count_rows().await.map_err(store_error)?;

        Ok(ExecutionResult {
            task: *task,
            store: store_role,
            observed_rows,
            success: observed_rows > 0,
            duration_ms: started.elapsed().as_millis() as i64,
        })
    }
}

#[async_trait]
impl TaskExecutor for ProbeExecutor {
    async fn execute(&self, job: &Job) -> Result<ExecutionResult, ExecutionError> {
        let task = job
            .probe_task()
            .map_err(|e| ExecutionError::InvalidPayload(e.to_string()))?;

        let result = self.run(&task).await?;
        self.reporter.report(&job.id, &result);
        Ok(result)
    }
}

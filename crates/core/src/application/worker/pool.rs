// Worker pool - N workers sharing one queue

use super::{ShutdownToken, Worker};
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Handle over a set of spawned workers.
///
/// Shutdown is driven through the `ShutdownToken` the pool was spawned with;
/// in-flight jobs finish, no new jobs are taken.
pub struct WorkerPool {
    joins: Vec<JoinHandle<usize>>,
}

impl WorkerPool {
    /// Spawn `size` copies of `worker` (ids 0..size) running until shutdown
    pub fn spawn(size: usize, worker: Worker, shutdown: ShutdownToken) -> Self {
        Self::spawn_with(size, worker, shutdown, false)
    }

    /// Spawn `size` workers that each exit once the queue is drained
    pub fn spawn_until_idle(size: usize, worker: Worker, shutdown: ShutdownToken) -> Self {
        Self::spawn_with(size, worker, shutdown, true)
    }

    fn spawn_with(size: usize, worker: Worker, shutdown: ShutdownToken, until_idle: bool) -> Self {
        info!(size, queue = %worker.queue(), until_idle, "Starting worker pool");

        let joins = (0..size.max(1))
            .map(|id| {
                let w = worker.clone().with_id(id);
                let token = shutdown.clone();
                tokio::spawn(async move {
                    let outcome = if until_idle {
                        w.run_until_idle(token).await
                    } else {
                        w.run(token).await.map(|_| 0)
                    };
                    match outcome {
                        Ok(processed) => processed,
                        Err(e) => {
                            error!(worker = w.id(), error = %e, "Worker failed");
                            0
                        }
                    }
                })
            })
            .collect();

        Self { joins }
    }

    pub fn size(&self) -> usize {
        self.joins.len()
    }

    /// Wait for every worker to stop. Returns jobs processed across the pool
    /// (only counted in drain mode).
    pub async fn join(self) -> usize {
        let mut total = 0;
        for join in self.joins {
            match join.await {
                Ok(processed) => total += processed,
                Err(e) => error!(error = %e, "Worker task aborted"),
            }
        }
        total
    }
}

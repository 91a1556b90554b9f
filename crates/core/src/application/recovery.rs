// Crash recovery logic
use crate::application::worker::constants::DEFAULT_RECOVERY_WINDOW_MS;
use crate::domain::{Job, JobState};
use crate::port::{JobRepository, TimeProvider};
use std::sync::Arc;
use tracing::{info, warn};

/// Crash recovery service
///
/// On worker startup, finds jobs that were RUNNING when a previous worker
/// process died and puts them back on the queue (at-least-once delivery).
pub struct RecoveryService {
    job_repo: Arc<dyn JobRepository>,
    time_provider: Arc<dyn TimeProvider>,
    recovery_window_ms: i64,
}

impl RecoveryService {
    /// Create a new recovery service
    ///
    /// # Arguments
    /// * `job_repo` - Job repository
    /// * `time_provider` - Time provider
    /// * `recovery_window_ms` - Optional custom recovery window (default: 5 minutes)
    pub fn new(
        job_repo: Arc<dyn JobRepository>,
        time_provider: Arc<dyn TimeProvider>,
        recovery_window_ms: Option<i64>,
    ) -> Self {
        Self {
            job_repo,
            time_provider,
            recovery_window_ms: recovery_window_ms.unwrap_or(DEFAULT_RECOVERY_WINDOW_MS),
        }
    }

    /// Recover orphaned jobs
    ///
    /// 1. Find all RUNNING jobs with `started_at < now - recovery_window`
    /// 2. Requeue them, giving back the attempt the crash consumed
    /// 3. RUNNING jobs without `started_at` are inconsistent and marked FAILED
    ///
    /// # Returns
    /// Number of jobs recovered
    pub async fn recover_orphaned_jobs(&self) -> crate::error::Result<usize> {
        let now = self.time_provider.now_millis();
        let cutoff = now - self.recovery_window_ms;

        info!(
            cutoff_time = %cutoff,
            recovery_window_ms = %self.recovery_window_ms,
            "Starting orphaned job recovery"
        );

        let running_jobs = self.job_repo.find_by_state(JobState::Running).await?;
        let mut recovered_count = 0;

        for mut job in running_jobs {
            match job.started_at {
                Some(started_at) if started_at < cutoff => {
                    info!(
                        job_id = %job.id,
                        started_at = %started_at,
                        cutoff = %cutoff,
                        "Requeuing orphaned job"
                    );
                    self.requeue(&mut job, now).await?;
                    recovered_count += 1;
                }
                Some(_) => {}
                None => {
                    warn!(
                        job_id = %job.id,
                        "RUNNING job without started_at, marking as FAILED"
                    );
                    job.fail(now, "running without start time");
                    self.job_repo.update(&job).await?;
                    if let Some(group) = &job.chain_group_id {
                        self.job_repo.cancel_chain(group).await?;
                    }
                    recovered_count += 1;
                }
            }
        }

        info!(recovered_count = %recovered_count, "Orphaned job recovery complete");
        Ok(recovered_count)
    }

    async fn requeue(&self, job: &mut Job, now: i64) -> crate::error::Result<()> {
        job.requeue(now)?;
        job.attempts = (job.attempts - 1).max(0);
        job.error = Some("worker crashed mid-execution".to_string());
        self.job_repo.update(job).await
    }
}

// Worker - Job execution loop

pub mod constants;
mod pool;
mod shutdown;

use constants::*;
pub use pool::WorkerPool;
pub use shutdown::{shutdown_channel, ShutdownSender, ShutdownToken};

use crate::application::retry::{RetryDecision, RetryPolicy};
use crate::domain::{Job, JobState};
use crate::error::Result;
use crate::port::{JobRepository, TaskExecutor, TimeProvider};
use std::sync::Arc;
use tokio::time::sleep;
use tracing::{error, info, warn};

/// Outcome of one drain iteration
enum DrainStep {
    Processed,
    /// Jobs remain but none is poppable yet (backoff, chain, other worker)
    Waiting,
    Empty,
}

/// Worker processes jobs from a queue
#[derive(Clone)]
pub struct Worker {
    id: usize,
    queue: String,
    job_repo: Arc<dyn JobRepository>,
    task_executor: Arc<dyn TaskExecutor>,
    retry_policy: Arc<RetryPolicy>,
    time_provider: Arc<dyn TimeProvider>, // For deterministic testing
}

impl Worker {
    pub fn new(
        queue: impl Into<String>,
        job_repo: Arc<dyn JobRepository>,
        task_executor: Arc<dyn TaskExecutor>,
        retry_policy: Arc<RetryPolicy>,
        time_provider: Arc<dyn TimeProvider>,
    ) -> Self {
        Self {
            id: 0,
            queue: queue.into(),
            job_repo,
            task_executor,
            retry_policy,
            time_provider,
        }
    }

    /// Same worker under another id (used for log fields)
    pub fn with_id(mut self, id: usize) -> Self {
        self.id = id;
        self
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn queue(&self) -> &str {
        &self.queue
    }

    /// Run worker loop with graceful shutdown support
    pub async fn run(&self, mut shutdown: ShutdownToken) -> Result<()> {
        info!(worker = self.id, "Worker started for queue: {}", self.queue);
        loop {
            if shutdown.is_shutdown() {
                info!(worker = self.id, "Worker shutting down for queue: {}", self.queue);
                break;
            }
            match self.process_next_job().await {
                Ok(true) => {}
                Ok(false) => {
                    // No job available, sleep briefly (or wait for shutdown)
                    tokio::select! {
                        _ = sleep(IDLE_SLEEP_DURATION) => {},
                        _ = shutdown.wait() => {
                            info!(worker = self.id, "Worker interrupted during idle");
                            break;
                        }
                    }
                }
                Err(e) => {
                    error!(worker = self.id, "Worker error: {}", e);
                    tokio::select! {
                        _ = sleep(ERROR_RECOVERY_SLEEP_DURATION) => {},
                        _ = shutdown.wait() => {
                            info!(worker = self.id, "Worker interrupted during error recovery");
                            break;
                        }
                    }
                }
            }
        }
        info!(worker = self.id, "Worker stopped for queue: {}", self.queue);
        Ok(())
    }

    /// Process jobs until the queue holds nothing QUEUED or RUNNING.
    ///
    /// Jobs waiting on a backoff or on a chain predecessor held by another
    /// worker keep this loop alive. Returns the number of jobs this worker
    /// processed.
    pub async fn run_until_idle(&self, mut shutdown: ShutdownToken) -> Result<usize> {
        let mut processed = 0;
        while !shutdown.is_shutdown() {
            let pause = match self.drain_step().await {
                Ok(DrainStep::Processed) => {
                    processed += 1;
                    continue;
                }
                Ok(DrainStep::Waiting) => IDLE_SLEEP_DURATION,
                Ok(DrainStep::Empty) => break,
                Err(e) => {
                    error!(worker = self.id, "Worker error: {}", e);
                    ERROR_RECOVERY_SLEEP_DURATION
                }
            };
            tokio::select! {
                _ = sleep(pause) => {},
                _ = shutdown.wait() => break,
            }
        }
        info!(worker = self.id, processed, "Worker drained queue: {}", self.queue);
        Ok(processed)
    }

    async fn drain_step(&self) -> Result<DrainStep> {
        if self.process_next_job().await? {
            return Ok(DrainStep::Processed);
        }
        if self.outstanding().await? == 0 {
            return Ok(DrainStep::Empty);
        }
        Ok(DrainStep::Waiting)
    }

    async fn outstanding(&self) -> Result<i64> {
        let queued = self
            .job_repo
            .count_by_state(&self.queue, JobState::Queued)
            .await?;
        let running = self
            .job_repo
            .count_by_state(&self.queue, JobState::Running)
            .await?;
        Ok(queued + running)
    }

    /// Process next job from queue (returns true if job was processed)
    pub async fn process_next_job(&self) -> Result<bool> {
        // Pop next job (already atomically set to RUNNING in DB)
        let job = match self.job_repo.pop_next(&self.queue).await? {
            Some(j) => j,
            None => return Ok(false),
        };

        info!(
            worker = self.id,
            job_id = %job.id,
            job_type = %job.job_type.as_str(),
            attempt = job.attempts,
            "Processing job"
        );

        // Execute in a separate task so a panicking probe only fails its job
        let job_arc = Arc::new(job);
        let job_for_exec = Arc::clone(&job_arc);
        let task_executor = Arc::clone(&self.task_executor);

        let handle =
            tokio::task::spawn(async move { task_executor.execute(&job_for_exec).await });

        let execution_result = handle.await;

        // Extract job from Arc for mutation (try_unwrap to avoid clone if possible)
        let mut job = Arc::try_unwrap(job_arc).unwrap_or_else(|arc| (*arc).clone());

        match execution_result {
            Ok(Ok(result)) => {
                let now = self.time_provider.now_millis();
                job.complete(now)?;
                info!(
                    worker = self.id,
                    job_id = %job.id,
                    rows = result.observed_rows,
                    verdict = result.verdict(),
                    duration_ms = result.duration_ms,
                    "Job completed"
                );
                self.job_repo.update(&job).await?;
            }
            Ok(Err(e)) => match self.retry_policy.should_retry(&job) {
                RetryDecision::Retry(delay_ms) => {
                    info!(
                        job_id = %job.id,
                        attempt = %job.attempts,
                        delay_ms = %delay_ms,
                        error = %e,
                        "Retrying job after failure"
                    );
                    job.requeue(self.retry_policy.retry_at(delay_ms))?;
                    job.error = Some(e.to_string());
                    self.job_repo.update(&job).await?;
                }
                RetryDecision::Failed => {
                    error!("Job failed {} after {} attempt(s): {}", job.id, job.attempts, e);
                    self.fail_job(&mut job, e.to_string()).await?;
                }
            },
            Err(join_err) => {
                // Panicked or cancelled (non-retryable)
                if join_err.is_panic() {
                    error!("Job panicked {}: {:?}", job.id, join_err);
                } else {
                    error!("Job cancelled {}: {:?}", job.id, join_err);
                }
                self.fail_job(&mut job, format!("aborted: {}", join_err)).await?;
            }
        }
        Ok(true)
    }

    /// Mark a job FAILED and abandon the rest of its chain
    async fn fail_job(&self, job: &mut Job, reason: String) -> Result<()> {
        let now = self.time_provider.now_millis();
        job.fail(now, reason);
        self.job_repo.update(job).await?;

        if let Some(group) = &job.chain_group_id {
            let cancelled = self.job_repo.cancel_chain(group).await?;
            if cancelled > 0 {
                warn!(
                    job_id = %job.id,
                    chain_group_id = %group,
                    cancelled,
                    "Chain abandoned after failure"
                );
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::dispatch::DispatchService;
    use crate::domain::ProbeTask;
    use crate::port::id_provider::mocks::SequentialIdProvider;
    use crate::port::job_repository::mocks::InMemoryJobRepository;
    use crate::port::task_executor::mocks::{MockBehavior, MockTaskExecutor};
    use crate::port::time_provider::mocks::FixedTimeProvider;

    struct Harness {
        clock: Arc<FixedTimeProvider>,
        repo: Arc<InMemoryJobRepository>,
        executor: Arc<MockTaskExecutor>,
        dispatch: DispatchService,
        worker: Worker,
    }

    fn harness(executor: MockTaskExecutor, max_attempts: i32) -> Harness {
        let clock = Arc::new(FixedTimeProvider::new(1_000));
        let repo = Arc::new(InMemoryJobRepository::new(clock.clone()));
        let executor = Arc::new(executor);
        let dispatch = DispatchService::new(
            repo.clone(),
            Arc::new(SequentialIdProvider::new("job")),
            clock.clone(),
        )
        .with_max_attempts(max_attempts);
        let worker = Worker::new(
            "default",
            repo.clone(),
            executor.clone(),
            Arc::new(RetryPolicy::new(clock.clone(), DEFAULT_RETRY_BASE_DELAY_MS)),
            clock.clone(),
        );
        Harness {
            clock,
            repo,
            executor,
            dispatch,
            worker,
        }
    }

    #[tokio::test]
    async fn test_process_empty_queue() {
        let h = harness(MockTaskExecutor::new_success(), 1);
        assert!(!h.worker.process_next_job().await.unwrap());
    }

    #[tokio::test]
    async fn test_success_marks_done() {
        let h = harness(MockTaskExecutor::new_success(), 1);
        let id = h.dispatch.submit(ProbeTask::write_expect_write()).await.unwrap();

        assert!(h.worker.process_next_job().await.unwrap());

        let job = h.repo.find_by_id(&id).await.unwrap().unwrap();
        assert_eq!(job.state, JobState::Done);
        assert_eq!(job.attempts, 1);
    }

    #[tokio::test]
    async fn test_chain_runs_in_order() {
        let h = harness(MockTaskExecutor::new_success(), 1);
        let ids = h
            .dispatch
            .submit_chain(&[
                ProbeTask::read_expect_read(),
                ProbeTask::write_expect_write(),
                ProbeTask::read_expect_write(),
            ])
            .await
            .unwrap();

        let (_tx, token) = shutdown_channel();
        let processed = h.worker.run_until_idle(token).await.unwrap();

        assert_eq!(processed, 3);
        assert_eq!(h.executor.executed(), ids);
    }

    #[tokio::test]
    async fn test_chain_member_waits_for_parent() {
        let h = harness(MockTaskExecutor::new_success(), 1);
        let ids = h
            .dispatch
            .submit_chain(&[ProbeTask::read_expect_read(), ProbeTask::read_expect_write()])
            .await
            .unwrap();

        // Claim the head without finishing it
        let head = h.repo.pop_next("default").await.unwrap().unwrap();
        assert_eq!(head.id, ids[0]);

        // The successor is blocked while the head is RUNNING
        assert!(!h.worker.process_next_job().await.unwrap());
    }

    #[tokio::test]
    async fn test_failure_abandons_rest_of_chain() {
        let h = harness(MockTaskExecutor::new_success(), 1);
        let ids = h
            .dispatch
            .submit_chain(&[
                ProbeTask::read_expect_read(),
                ProbeTask::write_expect_write(),
                ProbeTask::read_expect_write(),
            ])
            .await
            .unwrap();
        h.executor.fail_job(ids[1].clone());

        let (_tx, token) = shutdown_channel();
        h.worker.run_until_idle(token).await.unwrap();

        let states: Vec<JobState> = {
            let mut out = Vec::new();
            for id in &ids {
                out.push(h.repo.find_by_id(id).await.unwrap().unwrap().state);
            }
            out
        };
        assert_eq!(
            states,
            vec![JobState::Done, JobState::Failed, JobState::Cancelled]
        );
        assert_eq!(h.executor.executed(), vec![ids[0].clone(), ids[1].clone()]);
    }

    #[tokio::test]
    async fn test_retry_requeues_with_backoff() {
        let h = harness(MockTaskExecutor::new_fail("store unavailable"), 2);
        let id = h.dispatch.submit(ProbeTask::read_expect_read()).await.unwrap();

        assert!(h.worker.process_next_job().await.unwrap());
        let job = h.repo.find_by_id(&id).await.unwrap().unwrap();
        assert_eq!(job.state, JobState::Queued);
        assert!(job.available_at > 1_000);
        assert!(job.error.as_deref().unwrap().contains("store unavailable"));

        // Not poppable until the backoff passes
        assert!(!h.worker.process_next_job().await.unwrap());

        h.clock.advance(5_000);
        h.executor.set_behavior(MockBehavior::Success);
        assert!(h.worker.process_next_job().await.unwrap());

        let job = h.repo.find_by_id(&id).await.unwrap().unwrap();
        assert_eq!(job.state, JobState::Done);
        assert_eq!(job.attempts, 2);
        assert_eq!(h.executor.call_count(), 2);
    }

    #[tokio::test]
    async fn test_exhausted_retries_fail() {
        let h = harness(MockTaskExecutor::new_fail("boom"), 1);
        let id = h.dispatch.submit(ProbeTask::write_expect_write()).await.unwrap();

        assert!(h.worker.process_next_job().await.unwrap());

        let job = h.repo.find_by_id(&id).await.unwrap().unwrap();
        assert_eq!(job.state, JobState::Failed);
        assert!(job.finished_at.is_some());
    }

    #[tokio::test]
    async fn test_panic_is_isolated() {
        let h = harness(MockTaskExecutor::new_panic_inducing("probe exploded"), 3);
        let id = h.dispatch.submit(ProbeTask::read_expect_read()).await.unwrap();

        // Worker survives and the job fails without retry
        assert!(h.worker.process_next_job().await.unwrap());

        let job = h.repo.find_by_id(&id).await.unwrap().unwrap();
        assert_eq!(job.state, JobState::Failed);
        assert!(job.error.unwrap().starts_with("aborted"));
    }

    /// Fails the first `pop_next` like a busy database, then delegates
    struct FlakyRepository {
        inner: Arc<InMemoryJobRepository>,
        failures_left: std::sync::atomic::AtomicUsize,
    }

    #[async_trait::async_trait]
    impl JobRepository for FlakyRepository {
        async fn insert(&self, job: &Job) -> Result<()> {
            self.inner.insert(job).await
        }
        async fn find_by_id(&self, id: &crate::domain::JobId) -> Result<Option<Job>> {
            self.inner.find_by_id(id).await
        }
        async fn update(&self, job: &Job) -> Result<()> {
            self.inner.update(job).await
        }
        async fn pop_next(&self, queue: &str) -> Result<Option<Job>> {
            use std::sync::atomic::Ordering;
            let left = self.failures_left.load(Ordering::SeqCst);
            if left > 0 {
                self.failures_left.store(left - 1, Ordering::SeqCst);
                return Err(crate::error::AppError::Database(
                    "Database locked (SQLITE_BUSY)".to_string(),
                ));
            }
            self.inner.pop_next(queue).await
        }
        async fn cancel_chain(&self, chain_group_id: &str) -> Result<u64> {
            self.inner.cancel_chain(chain_group_id).await
        }
        async fn count_by_state(&self, queue: &str, state: JobState) -> Result<i64> {
            self.inner.count_by_state(queue, state).await
        }
        async fn find_by_state(&self, state: JobState) -> Result<Vec<Job>> {
            self.inner.find_by_state(state).await
        }
        async fn find_chain(&self, chain_group_id: &str) -> Result<Vec<Job>> {
            self.inner.find_chain(chain_group_id).await
        }
    }

    #[tokio::test]
    async fn test_drain_survives_transient_repository_error() {
        let h = harness(MockTaskExecutor::new_success(), 1);
        let id = h.dispatch.submit(ProbeTask::write_expect_write()).await.unwrap();

        let repo = Arc::new(FlakyRepository {
            inner: h.repo.clone(),
            failures_left: std::sync::atomic::AtomicUsize::new(1),
        });
        let worker = Worker::new(
            "default",
            repo,
            h.executor.clone(),
            Arc::new(RetryPolicy::new(h.clock.clone(), DEFAULT_RETRY_BASE_DELAY_MS)),
            h.clock.clone(),
        );

        let (_tx, token) = shutdown_channel();
        let processed = tokio::time::timeout(
            ERROR_RECOVERY_SLEEP_DURATION * 5,
            worker.run_until_idle(token),
        )
        .await
        .expect("drain should finish")
        .unwrap();

        assert_eq!(processed, 1);
        let job = h.repo.find_by_id(&id).await.unwrap().unwrap();
        assert_eq!(job.state, JobState::Done);
        assert_eq!(h.repo.count_by_state("default", JobState::Queued).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let h = harness(MockTaskExecutor::new_success(), 1);
        let (tx, token) = shutdown_channel();

        let worker = h.worker.clone();
        let handle = tokio::spawn(async move { worker.run(token).await });

        tx.shutdown();
        let result = tokio::time::timeout(std::time::Duration::from_secs(2), handle)
            .await
            .expect("worker should stop");
        assert!(result.unwrap().is_ok());
    }
}

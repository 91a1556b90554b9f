// Dispatch Service - puts probe tasks on the queue

pub mod plan;

#[cfg(test)]
mod dispatch_test;

pub use plan::{DispatchPlan, Submission};

use crate::domain::{DomainError, Job, JobId, ProbeTask};
use crate::error::Result;
use crate::port::{IdProvider, TimeProvider, TransactionalJobRepository};
use std::sync::Arc;
use tracing::{debug, info};

/// Maximum queue name length
pub const MAX_QUEUE_NAME_LEN: usize = 64;

/// Queue used when none is configured
pub const DEFAULT_QUEUE: &str = "default";

/// What a dispatch put on the queue
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchSummary {
    pub jobs: usize,
    pub chains: usize,
}

/// Queue names: non-empty, at most 64 chars, alphanumeric plus `_`, `-`, `.`
pub fn validate_queue_name(queue: &str) -> std::result::Result<(), DomainError> {
    if queue.is_empty() {
        return Err(DomainError::ValidationError(
            "queue name must not be empty".to_string(),
        ));
    }
    if queue.len() > MAX_QUEUE_NAME_LEN {
        return Err(DomainError::ValidationError(format!(
            "queue name too long ({} > {})",
            queue.len(),
            MAX_QUEUE_NAME_LEN
        )));
    }
    if !queue
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
    {
        return Err(DomainError::ValidationError(format!(
            "queue name must be alphanumeric (with _ - .): {}",
            queue
        )));
    }
    Ok(())
}

/// Dispatch Service
pub struct DispatchService {
    job_repo: Arc<dyn TransactionalJobRepository>,
    id_provider: Arc<dyn IdProvider>,
    time_provider: Arc<dyn TimeProvider>,
    queue: String,
    max_attempts: i32,
}

impl DispatchService {
    pub fn new(
        job_repo: Arc<dyn TransactionalJobRepository>,
        id_provider: Arc<dyn IdProvider>,
        time_provider: Arc<dyn TimeProvider>,
    ) -> Self {
        Self {
            job_repo,
            id_provider,
            time_provider,
            queue: DEFAULT_QUEUE.to_string(),
            max_attempts: 1,
        }
    }

    /// Target a different queue
    pub fn with_queue(mut self, queue: impl Into<String>) -> Result<Self> {
        let queue = queue.into();
        validate_queue_name(&queue)?;
        self.queue = queue;
        Ok(self)
    }

    /// Executions allowed per job before it is marked FAILED (at least 1)
    pub fn with_max_attempts(mut self, max_attempts: i32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn queue(&self) -> &str {
        &self.queue
    }

    fn new_job(&self, task: &ProbeTask, created_at: i64) -> Result<Job> {
        let mut job = Job::for_probe(self.id_provider.generate_id(), created_at, &self.queue, task)?;
        job.max_attempts = self.max_attempts;
        Ok(job)
    }

    /// Enqueue one independent task. Returns without waiting for execution.
    pub async fn submit(&self, task: ProbeTask) -> Result<JobId> {
        let job = self.new_job(&task, self.time_provider.now_millis())?;

        let mut tx = self.job_repo.begin_transaction().await?;
        tx.insert(&job).await?;
        tx.commit().await?;

        debug!(job_id = %job.id, job_type = %job.job_type.as_str(), "Job enqueued");
        Ok(job.id)
    }

    /// Enqueue an ordered chain atomically. Each member points at its
    /// predecessor; an empty chain is a no-op.
    pub async fn submit_chain(&self, tasks: &[ProbeTask]) -> Result<Vec<JobId>> {
        if tasks.is_empty() {
            return Ok(Vec::new());
        }

        let now = self.time_provider.now_millis();
        let chain_group_id = self.id_provider.generate_id();

        let mut jobs = Vec::with_capacity(tasks.len());
        let mut parent: Option<JobId> = None;
        for (position, task) in tasks.iter().enumerate() {
            let mut job = self.new_job(task, now)?;
            job.parent_job_id = parent.take();
            job.chain_group_id = Some(chain_group_id.clone());
            job.chain_position = Some(position as i64);
            parent = Some(job.id.clone());
            jobs.push(job);
        }

        let mut tx = self.job_repo.begin_transaction().await?;
        for job in &jobs {
            if let Err(e) = tx.insert(job).await {
                tx.rollback().await?;
                return Err(e);
            }
        }
        tx.commit().await?;

        debug!(
            chain_group_id = %chain_group_id,
            length = jobs.len(),
            "Chain enqueued"
        );
        Ok(jobs.into_iter().map(|j| j.id).collect())
    }

    /// Enqueue a whole plan in order
    pub async fn dispatch(&self, plan: &DispatchPlan) -> Result<DispatchSummary> {
        let mut summary = DispatchSummary::default();

        for submission in plan.submissions() {
            match submission {
                Submission::Single(task) => {
                    self.submit(*task).await?;
                    summary.jobs += 1;
                }
                Submission::Chain(tasks) => {
                    let ids = self.submit_chain(tasks).await?;
                    summary.jobs += ids.len();
                    summary.chains += 1;
                }
            }
        }

        info!(
            queue = %self.queue,
            jobs = summary.jobs,
            chains = summary.chains,
            "Dispatch complete"
        );
        Ok(summary)
    }
}

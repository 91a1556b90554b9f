// Job Repository Port (Interface)

use crate::domain::{Job, JobId, JobState};
use crate::error::Result;
use async_trait::async_trait;

/// Repository interface for Job persistence
#[async_trait]
pub trait JobRepository: Send + Sync {
    /// Insert a new job
    async fn insert(&self, job: &Job) -> Result<()>;

    /// Find job by ID
    async fn find_by_id(&self, id: &JobId) -> Result<Option<Job>>;

    /// Update job
    async fn update(&self, job: &Job) -> Result<()>;

    /// Atomically claim the next runnable job of a queue.
    ///
    /// Runnable: QUEUED, `available_at <= now`, and either no parent or a DONE
    /// parent. The claimed job comes back RUNNING with `attempts` incremented.
    async fn pop_next(&self, queue: &str) -> Result<Option<Job>>;

    /// Cancel every still-QUEUED member of a chain
    async fn cancel_chain(&self, chain_group_id: &str) -> Result<u64>;

    /// Count jobs by state
    async fn count_by_state(&self, queue: &str, state: JobState) -> Result<i64>;

    /// Find all jobs by state (oldest first)
    async fn find_by_state(&self, state: JobState) -> Result<Vec<Job>>;

    /// Members of a chain in submission order
    async fn find_chain(&self, chain_group_id: &str) -> Result<Vec<Job>>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use crate::port::transaction::{
        JobRepositoryTransaction, Transaction, TransactionalJobRepository,
    };
    use crate::port::TimeProvider;
    use std::sync::{Arc, Mutex};

    /// Vec-backed queue with the same pop rules as the SQLite adapter
    pub struct InMemoryJobRepository {
        jobs: Arc<Mutex<Vec<Job>>>,
        time_provider: Arc<dyn TimeProvider>,
    }

    impl InMemoryJobRepository {
        pub fn new(time_provider: Arc<dyn TimeProvider>) -> Self {
            Self {
                jobs: Arc::new(Mutex::new(Vec::new())),
                time_provider,
            }
        }

        pub fn all(&self) -> Vec<Job> {
            self.jobs.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl JobRepository for InMemoryJobRepository {
        async fn insert(&self, job: &Job) -> Result<()> {
            self.jobs.lock().unwrap().push(job.clone());
            Ok(())
        }

        async fn find_by_id(&self, id: &JobId) -> Result<Option<Job>> {
            Ok(self.jobs.lock().unwrap().iter().find(|j| &j.id == id).cloned())
        }

        async fn update(&self, job: &Job) -> Result<()> {
            let mut jobs = self.jobs.lock().unwrap();
            if let Some(existing) = jobs.iter_mut().find(|j| j.id == job.id) {
                *existing = job.clone();
            }
            Ok(())
        }

        async fn pop_next(&self, queue: &str) -> Result<Option<Job>> {
            let now = self.time_provider.now_millis();
            let mut jobs = self.jobs.lock().unwrap();

            let parent_done = |jobs: &[Job], parent: &Option<JobId>| match parent {
                None => true,
                Some(pid) => jobs
                    .iter()
                    .any(|p| &p.id == pid && p.state == JobState::Done),
            };

            // Insertion order stands in for rowid
            let candidate = jobs
                .iter()
                .enumerate()
                .filter(|(_, j)| {
                    j.queue == queue
                        && j.state == JobState::Queued
                        && j.available_at <= now
                        && parent_done(&jobs, &j.parent_job_id)
                })
                .max_by(|(ia, a), (ib, b)| {
                    a.priority
                        .cmp(&b.priority)
                        .then(b.created_at.cmp(&a.created_at))
                        .then(ib.cmp(ia))
                })
                .map(|(i, _)| i);

            match candidate {
                Some(i) => {
                    jobs[i].start(now)?;
                    Ok(Some(jobs[i].clone()))
                }
                None => Ok(None),
            }
        }

        async fn cancel_chain(&self, chain_group_id: &str) -> Result<u64> {
            let now = self.time_provider.now_millis();
            let mut cancelled = 0;
            for job in self.jobs.lock().unwrap().iter_mut() {
                if job.chain_group_id.as_deref() == Some(chain_group_id)
                    && job.state == JobState::Queued
                {
                    job.state = JobState::Cancelled;
                    job.finished_at = Some(now);
                    cancelled += 1;
                }
            }
            Ok(cancelled)
        }

        async fn count_by_state(&self, queue: &str, state: JobState) -> Result<i64> {
            Ok(self
                .jobs
                .lock()
                .unwrap()
                .iter()
                .filter(|j| j.queue == queue && j.state == state)
                .count() as i64)
        }

        async fn find_by_state(&self, state: JobState) -> Result<Vec<Job>> {
            let mut found: Vec<Job> = self
                .jobs
                .lock()
                .unwrap()
                .iter()
                .filter(|j| j.state == state)
                .cloned()
                .collect();
            found.sort_by_key(|j| j.created_at);
            Ok(found)
        }

        async fn find_chain(&self, chain_group_id: &str) -> Result<Vec<Job>> {
            let mut chain: Vec<Job> = self
                .jobs
                .lock()
                .unwrap()
                .iter()
                .filter(|j| j.chain_group_id.as_deref() == Some(chain_group_id))
                .cloned()
                .collect();
            chain.sort_by_key(|j| j.chain_position);
            Ok(chain)
        }
    }

    #[async_trait]
    impl TransactionalJobRepository for InMemoryJobRepository {
        async fn begin_transaction(&self) -> Result<Box<dyn JobRepositoryTransaction>> {
            Ok(Box::new(InMemoryTransaction {
                jobs: Arc::clone(&self.jobs),
                pending: Vec::new(),
            }))
        }
    }

    /// Buffers inserts until commit
    pub struct InMemoryTransaction {
        jobs: Arc<Mutex<Vec<Job>>>,
        pending: Vec<Job>,
    }

    #[async_trait]
    impl Transaction for InMemoryTransaction {
        async fn commit(self: Box<Self>) -> Result<()> {
            let this = *self;
            this.jobs.lock().unwrap().extend(this.pending);
            Ok(())
        }

        async fn rollback(self: Box<Self>) -> Result<()> {
            Ok(())
        }
    }

    #[async_trait]
    impl JobRepositoryTransaction for InMemoryTransaction {
        async fn insert(&mut self, job: &Job) -> Result<()> {
            self.pending.push(job.clone());
            Ok(())
        }
    }
}

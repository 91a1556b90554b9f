// Task Executor Port
// Abstraction for running the work a job describes

use crate::domain::{ExecutionResult, Job};
use async_trait::async_trait;
use thiserror::Error;

/// Execution errors
#[derive(Error, Debug)]
pub enum ExecutionError {
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    #[error("Store error: {0}")]
    Store(String),
}

/// Task Executor trait
///
/// Implementations:
/// - ProbeExecutor: runs a probe task against the primary/secondary stores
#[async_trait]
pub trait TaskExecutor: Send + Sync {
    /// Execute a job and return the observation
    ///
    /// # Errors
    /// - ExecutionError::InvalidPayload if job payload is malformed
    /// - ExecutionError::Store if a store query fails
    async fn execute(&self, job: &Job) -> Result<ExecutionResult, ExecutionError>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use crate::domain::{ProbeTask, StoreRole};
    use std::collections::HashSet;
    use std::sync::{Arc, Mutex};

    /// Mock executor behavior
    #[derive(Debug, Clone)]
    pub enum MockBehavior {
        /// Always succeed
        Success,
        /// Always fail with message
        Fail(String),
        /// Panic with message (for panic isolation testing)
        Panic(String),
    }

    /// Mock Task Executor for testing
    ///
    /// Records executed job ids in order. Jobs listed via `fail_job` fail
    /// regardless of the default behavior.
    pub struct MockTaskExecutor {
        behavior: Arc<Mutex<MockBehavior>>,
        failing_jobs: Arc<Mutex<HashSet<String>>>,
        executed: Arc<Mutex<Vec<String>>>,
    }

    impl MockTaskExecutor {
        pub fn new(behavior: MockBehavior) -> Self {
            Self {
                behavior: Arc::new(Mutex::new(behavior)),
                failing_jobs: Arc::new(Mutex::new(HashSet::new())),
                executed: Arc::new(Mutex::new(Vec::new())),
            }
        }
        pub fn new_success() -> Self {
            Self::new(MockBehavior::Success)
        }
        pub fn new_fail(message: impl Into<String>) -> Self {
            Self::new(MockBehavior::Fail(message.into()))
        }
        pub fn new_panic_inducing(message: impl Into<String>) -> Self {
            Self::new(MockBehavior::Panic(message.into()))
        }
        pub fn set_behavior(&self, behavior: MockBehavior) {
            *self.behavior.lock().unwrap() = behavior;
        }
        pub fn fail_job(&self, job_id: impl Into<String>) {
            self.failing_jobs.lock().unwrap().insert(job_id.into());
        }
        pub fn call_count(&self) -> usize {
            self.executed.lock().unwrap().len()
        }
        pub fn executed(&self) -> Vec<String> {
            self.executed.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl TaskExecutor for MockTaskExecutor {
        async fn execute(&self, job: &Job) -> Result<ExecutionResult, ExecutionError> {
            self.executed.lock().unwrap().push(job.id.clone());

            if self.failing_jobs.lock().unwrap().contains(&job.id) {
                return Err(ExecutionError::Store(format!("{} marked failing", job.id)));
            }

            let behavior = self.behavior.lock().unwrap().clone();

            match behavior {
                MockBehavior::Success => Ok(ExecutionResult {
                    task: job
                        .probe_task()
                        .unwrap_or_else(|_| ProbeTask::read_expect_read()),
                    store: StoreRole::Primary,
                    observed_rows: 1,
                    success: true,
                    duration_ms: 1,
                }),
                MockBehavior::Fail(msg) => Err(ExecutionError::Store(msg)),
                MockBehavior::Panic(msg) => {
                    panic!("{}", msg); // Actually panic for panic isolation testing
                }
            }
        }
    }
}

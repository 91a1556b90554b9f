// Job Domain Model - the queue envelope around a probe task

use super::error::{DomainError, Result};
use super::probe::ProbeTask;
use serde::{Deserialize, Serialize};

/// Job ID (UUID v4)
pub type JobId = String;

/// Queue identifier
pub type QueueId = String;

/// Priority (higher number = higher priority)
pub type Priority = i32;

/// Job State
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobState {
    Queued,
    Running,
    Done,
    Failed,
    Cancelled,
}

impl JobState {
    pub const ALL: [JobState; 5] = [
        JobState::Queued,
        JobState::Running,
        JobState::Done,
        JobState::Failed,
        JobState::Cancelled,
    ];

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Done | JobState::Failed | JobState::Cancelled)
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobState::Queued => write!(f, "QUEUED"),
            JobState::Running => write!(f, "RUNNING"),
            JobState::Done => write!(f, "DONE"),
            JobState::Failed => write!(f, "FAILED"),
            JobState::Cancelled => write!(f, "CANCELLED"),
        }
    }
}

impl std::str::FromStr for JobState {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "QUEUED" => Ok(JobState::Queued),
            "RUNNING" => Ok(JobState::Running),
            "DONE" => Ok(JobState::Done),
            "FAILED" => Ok(JobState::Failed),
            "CANCELLED" => Ok(JobState::Cancelled),
            other => Err(DomainError::ValidationError(format!(
                "unknown job state: {}",
                other
            ))),
        }
    }
}

/// Job Type (one per probe variant)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobType(String);

impl JobType {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Job Payload (JSON serializable)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobPayload(serde_json::Value);

impl JobPayload {
    pub fn new(value: serde_json::Value) -> Self {
        Self(value)
    }

    pub fn as_value(&self) -> &serde_json::Value {
        &self.0
    }
}

/// Job Entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    // Identity
    pub id: JobId,
    pub queue: QueueId,
    pub job_type: JobType,

    pub priority: Priority,
    pub state: JobState,

    pub created_at: i64,   // epoch ms
    pub available_at: i64, // epoch ms, not poppable before this
    pub started_at: Option<i64>,
    pub finished_at: Option<i64>,

    pub payload: JobPayload,

    // Retry
    pub attempts: i32,
    pub max_attempts: i32,
    pub backoff_factor: f64,

    // Chains
    pub parent_job_id: Option<JobId>,
    pub chain_group_id: Option<String>,
    pub chain_position: Option<i64>,

    /// Last failure message
    pub error: Option<String>,
}

impl Job {
    /// Create a new Job
    ///
    /// # Arguments
    ///
    /// * `id` - Unique job ID (injected, not generated)
    /// * `created_at` - Creation timestamp in epoch ms (injected, not system time)
    /// * `queue` - Queue name
    /// * `job_type` - Job type
    /// * `payload` - Job payload
    pub fn new(
        id: impl Into<String>,
        created_at: i64,
        queue: impl Into<String>,
        job_type: JobType,
        payload: JobPayload,
    ) -> Self {
        Self {
            id: id.into(),
            queue: queue.into(),
            job_type,
            priority: 0,
            state: JobState::Queued,
            created_at,
            available_at: created_at,
            started_at: None,
            finished_at: None,
            payload,
            attempts: 0,
            max_attempts: 1,
            backoff_factor: 2.0,
            parent_job_id: None,
            chain_group_id: None,
            chain_position: None,
            error: None,
        }
    }

    /// Wrap a probe task in a queued job
    pub fn for_probe(
        id: impl Into<String>,
        created_at: i64,
        queue: impl Into<String>,
        task: &ProbeTask,
    ) -> Result<Self> {
        let id = id.into();
        let payload = serde_json::to_value(task).map_err(|e| DomainError::InvalidPayload {
            job_id: id.clone(),
            reason: e.to_string(),
        })?;
        Ok(Self::new(
            id,
            created_at,
            queue,
            JobType::new(task.job_type()),
            JobPayload::new(payload),
        ))
    }

    /// Create a probe job with deterministic ID and timestamp (for tests only)
    ///
    /// Uses a simple counter for IDs (test-1, test-2, ...).
    /// Timestamps start at 1000 and increment by 1000.
    pub fn new_test(queue: impl Into<String>, task: ProbeTask) -> Self {
        use std::sync::atomic::{AtomicU64, Ordering};
        static TEST_COUNTER: AtomicU64 = AtomicU64::new(1);

        let counter = TEST_COUNTER.fetch_add(1, Ordering::SeqCst);
        let id = format!("test-{}", counter);
        let created_at = (counter * 1000) as i64;

        Self::new(
            id,
            created_at,
            queue,
            JobType::new(task.job_type()),
            JobPayload::new(serde_json::json!({
                "kind": task.kind,
                "expected": task.expected,
            })),
        )
    }

    /// Decode the probe task carried by this job
    pub fn probe_task(&self) -> Result<ProbeTask> {
        let task: ProbeTask = serde_json::from_value(self.payload.as_value().clone()).map_err(
            |e| DomainError::InvalidPayload {
                job_id: self.id.clone(),
                reason: e.to_string(),
            },
        )?;

        if task.job_type() != self.job_type.as_str() {
            return Err(DomainError::InvalidPayload {
                job_id: self.id.clone(),
                reason: format!(
                    "payload is {} but job type is {}",
                    task.job_type(),
                    self.job_type.as_str()
                ),
            });
        }
        Ok(task)
    }

    pub fn has_attempts_left(&self) -> bool {
        self.attempts < self.max_attempts
    }

    /// Transition to Running state with explicit timestamp
    pub fn start(&mut self, now_millis: i64) -> Result<()> {
        if self.state != JobState::Queued {
            return Err(DomainError::InvalidStateTransition {
                from: self.state.to_string(),
                to: JobState::Running.to_string(),
            });
        }
        self.state = JobState::Running;
        self.started_at = Some(now_millis);
        self.attempts += 1;
        Ok(())
    }

    /// Transition to Done state with explicit timestamp
    pub fn complete(&mut self, now_millis: i64) -> Result<()> {
        if self.state != JobState::Running {
            return Err(DomainError::InvalidStateTransition {
                from: self.state.to_string(),
                to: JobState::Done.to_string(),
            });
        }
        self.state = JobState::Done;
        self.finished_at = Some(now_millis);
        self.error = None;
        Ok(())
    }

    /// Put a running job back on the queue, not poppable before `available_at`
    pub fn requeue(&mut self, available_at: i64) -> Result<()> {
        if self.state != JobState::Running {
            return Err(DomainError::InvalidStateTransition {
                from: self.state.to_string(),
                to: JobState::Queued.to_string(),
            });
        }
        self.state = JobState::Queued;
        self.started_at = None;
        self.available_at = available_at;
        Ok(())
    }

    /// Mark as Failed with explicit timestamp
    pub fn fail(&mut self, now_millis: i64, reason: impl Into<String>) {
        self.state = JobState::Failed;
        self.finished_at = Some(now_millis);
        self.error = Some(reason.into());
    }
}

// Domain Layer - Pure business logic and entities

pub mod error;
pub mod job;
pub mod probe;

// Re-exports
pub use error::DomainError;
pub use job::{Job, JobId, JobPayload, JobState, JobType, Priority, QueueId};
pub use probe::{ExecutionResult, ProbeKind, ProbeRow, ProbeTask, StoreRole};
